//! Tic-tac-toe session state.
//!
//! One [`GameSession`] per GAMEID. Turn numbers start at 1 and advance by
//! one per placed mark, so the number of filled cells always equals
//! `turn - 1`. The receiver relies on that to reject duplicated or
//! out-of-order move datagrams.

use std::fmt::Write as _;

use thiserror::Error;

use lsnp_core::{GameOutcome, Symbol, UserId};

const WIN_LINES: [[u8; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoveError {
    #[error("not your turn")]
    NotYourTurn,
    #[error("unexpected TURN: got {got}, expected {expected}")]
    WrongTurn { got: u32, expected: u32 },
    #[error("position {0} out of range")]
    OutOfRange(u8),
    #[error("position {0} already taken")]
    Taken(u8),
    #[error("unexpected symbol")]
    WrongSymbol,
}

#[derive(Debug, Clone)]
pub struct GameSession {
    pub board: [Option<Symbol>; 9],
    pub turn: u32,
    pub my_symbol: Symbol,
    pub opponent_symbol: Symbol,
    pub opponent: UserId,
    pub my_turn: bool,
    pub token: String,
}

impl GameSession {
    /// Game created by our own invite: we take X and move first.
    pub fn initiated(opponent: UserId, token: String) -> GameSession {
        GameSession {
            board: [None; 9],
            turn: 1,
            my_symbol: Symbol::X,
            opponent_symbol: Symbol::O,
            opponent,
            my_turn: true,
            token,
        }
    }

    /// Game created from a received invite carrying the inviter's symbol.
    pub fn invited(opponent: UserId, inviter_symbol: Symbol, token: String) -> GameSession {
        GameSession {
            board: [None; 9],
            turn: 1,
            my_symbol: inviter_symbol.other(),
            opponent_symbol: inviter_symbol,
            opponent,
            my_turn: false,
            token,
        }
    }

    fn place(&mut self, position: u8, symbol: Symbol) -> Result<(), MoveError> {
        if position > 8 {
            return Err(MoveError::OutOfRange(position));
        }
        let cell = &mut self.board[position as usize];
        if cell.is_some() {
            return Err(MoveError::Taken(position));
        }
        *cell = Some(symbol);
        self.turn += 1;
        Ok(())
    }

    /// A move we make ourselves. Legality is checked here before the frame
    /// ever leaves the process.
    pub fn apply_local_move(&mut self, position: u8) -> Result<(), MoveError> {
        if !self.my_turn {
            return Err(MoveError::NotYourTurn);
        }
        self.place(position, self.my_symbol)?;
        self.my_turn = false;
        Ok(())
    }

    /// A move arriving off the wire. `turn` must match exactly; stale or
    /// repeated datagrams fail the check and are dropped by the caller.
    pub fn apply_remote_move(
        &mut self,
        turn: u32,
        position: u8,
        symbol: Symbol,
    ) -> Result<(), MoveError> {
        if turn != self.turn {
            return Err(MoveError::WrongTurn {
                got: turn,
                expected: self.turn,
            });
        }
        if symbol != self.opponent_symbol {
            return Err(MoveError::WrongSymbol);
        }
        self.place(position, symbol)?;
        self.my_turn = true;
        Ok(())
    }

    pub fn filled(&self) -> usize {
        self.board.iter().filter(|c| c.is_some()).count()
    }

    /// Winning symbol and line, if any.
    pub fn winner(&self) -> Option<(Symbol, [u8; 3])> {
        for line in WIN_LINES {
            let [a, b, c] = line.map(|i| self.board[i as usize]);
            if let (Some(s), true) = (a, a == b && b == c) {
                return Some((s, line));
            }
        }
        None
    }

    /// Terminal outcome, if the board has reached one.
    pub fn outcome(&self) -> Option<(GameOutcome, Option<(Symbol, [u8; 3])>)> {
        if let Some(win) = self.winner() {
            Some((GameOutcome::Win, Some(win)))
        } else if self.filled() == 9 {
            Some((GameOutcome::Draw, None))
        } else {
            None
        }
    }

    /// Three-row board rendering for the shell.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for row in 0..3 {
            if row > 0 {
                out.push_str("-----------\n");
            }
            let cells: Vec<&str> = (0..3)
                .map(|col| self.board[row * 3 + col].map_or(" ", Symbol::as_str))
                .collect();
            let _ = writeln!(out, " {} | {} | {} ", cells[0], cells[1], cells[2]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bob() -> UserId {
        "bob@10.0.0.2".parse().unwrap()
    }

    fn exchange(game: &mut GameSession, local: &[u8], remote: &[u8], local_first: bool) {
        // interleave local and remote moves with running turn numbers
        let mut l = local.iter();
        let mut r = remote.iter();
        let mut local_next = local_first;
        loop {
            if local_next {
                match l.next() {
                    Some(&pos) => game.apply_local_move(pos).unwrap(),
                    None => break,
                }
            } else {
                match r.next() {
                    Some(&pos) => {
                        let turn = game.turn;
                        game.apply_remote_move(turn, pos, game.opponent_symbol)
                            .unwrap()
                    }
                    None => break,
                }
            }
            local_next = !local_next;
        }
    }

    #[test]
    fn filled_cells_track_turn_counter() {
        let mut game = GameSession::initiated(bob(), "t".into());
        assert_eq!(game.filled() as u32, game.turn - 1);
        game.apply_local_move(4).unwrap();
        assert_eq!(game.filled() as u32, game.turn - 1);
        game.apply_remote_move(2, 0, Symbol::O).unwrap();
        assert_eq!(game.filled() as u32, game.turn - 1);
        game.apply_local_move(8).unwrap();
        assert_eq!(game.filled(), 3);
        assert_eq!(game.turn, 4);
    }

    #[test]
    fn local_move_requires_the_turn() {
        let mut game = GameSession::invited(bob(), Symbol::X, "t".into());
        assert_eq!(game.my_symbol, Symbol::O);
        assert_eq!(game.apply_local_move(0), Err(MoveError::NotYourTurn));
        game.apply_remote_move(1, 0, Symbol::X).unwrap();
        assert!(game.my_turn);
        game.apply_local_move(4).unwrap();
        assert!(!game.my_turn);
    }

    #[test]
    fn remote_move_rejects_stale_turn_and_taken_cell() {
        let mut game = GameSession::initiated(bob(), "t".into());
        game.apply_local_move(0).unwrap();
        game.apply_remote_move(2, 4, Symbol::O).unwrap();
        // replayed datagram: same turn again
        assert_eq!(
            game.apply_remote_move(2, 4, Symbol::O),
            Err(MoveError::WrongTurn { got: 2, expected: 3 })
        );
        game.apply_local_move(1).unwrap();
        assert_eq!(game.apply_remote_move(4, 0, Symbol::O), Err(MoveError::Taken(0)));
        assert_eq!(
            game.apply_remote_move(4, 9, Symbol::O),
            Err(MoveError::OutOfRange(9))
        );
        assert_eq!(
            game.apply_remote_move(4, 5, Symbol::X),
            Err(MoveError::WrongSymbol)
        );
        // the failed attempts left no marks behind
        assert_eq!(game.filled() as u32, game.turn - 1);
    }

    #[test]
    fn diagonal_win_is_detected_with_line() {
        let mut game = GameSession::initiated(bob(), "t".into());
        exchange(&mut game, &[0, 4], &[1, 2], true);
        assert_eq!(game.outcome(), None);
        game.apply_local_move(8).unwrap();
        let (outcome, win) = game.outcome().unwrap();
        assert_eq!(outcome, GameOutcome::Win);
        assert_eq!(win, Some((Symbol::X, [0, 4, 8])));
    }

    #[test]
    fn full_board_without_line_is_a_draw() {
        // X: 0 2 3 7 8, O: 1 4 5 6 -- no three in a row anywhere
        let mut game = GameSession::initiated(bob(), "t".into());
        exchange(&mut game, &[0, 2, 3, 7, 8], &[1, 4, 5, 6], true);
        assert_eq!(game.filled(), 9);
        assert_eq!(game.turn, 10);
        assert_eq!(game.outcome(), Some((GameOutcome::Draw, None)));
    }

    #[test]
    fn render_shows_marks_in_place() {
        let mut game = GameSession::initiated(bob(), "t".into());
        game.apply_local_move(4).unwrap();
        let board = game.render();
        assert!(board.contains(" X "));
        assert_eq!(board.lines().count(), 5);
    }
}

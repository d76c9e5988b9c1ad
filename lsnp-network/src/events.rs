//! Inbound happenings the display layer may want to surface. The receive
//! loop pushes these over an mpsc channel; a slow or absent consumer never
//! stalls the dispatcher.

use lsnp_core::{GameOutcome, LikeAction, MessageId, Symbol, UserId};

#[derive(Debug, Clone)]
pub enum Event {
    ProfileUpdated {
        user: UserId,
        display_name: String,
    },
    PostReceived {
        from: UserId,
        content: String,
    },
    DmReceived {
        from: UserId,
        content: String,
    },
    DmAcked {
        message_id: MessageId,
    },
    FollowerAdded {
        user: UserId,
    },
    FollowerRemoved {
        user: UserId,
    },
    LikeReceived {
        from: UserId,
        action: LikeAction,
        post_timestamp: u64,
    },
    GameInvite {
        game_id: String,
        from: UserId,
        my_symbol: Symbol,
    },
    GameBoard {
        game_id: String,
        board: String,
        my_turn: bool,
    },
    GameOver {
        game_id: String,
        result: GameOutcome,
        winner_symbol: Option<Symbol>,
        board: String,
    },
    GroupCreated {
        group_id: String,
        name: String,
        creator: UserId,
    },
    GroupUpdated {
        group_id: String,
    },
    GroupMessageReceived {
        group_id: String,
        from: UserId,
        content: String,
    },
    FileOffered {
        file_id: String,
        from: UserId,
        filename: String,
        filesize: u64,
    },
    FileCompleted {
        file_id: String,
        from: UserId,
        filename: String,
        size: usize,
    },
    FileDelivered {
        file_id: String,
        by: UserId,
    },
}

//! LSNP wire codec.
//!
//! On the wire a frame is a run of `KEY: VALUE` lines terminated by a blank
//! line. Keys are uppercase ASCII; values are newline-free UTF-8. [`Frame`]
//! keeps the open key/value form (insertion order preserved, unknown keys
//! kept); [`Message`] is the typed view the dispatcher works with, one
//! variant per TYPE.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::id::{MessageId, UserId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("frame has no TYPE key")]
    NoType,
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error("{msg_type} frame missing mandatory key {key}")]
    MissingKey {
        msg_type: &'static str,
        key: &'static str,
    },
    #[error("{msg_type} frame has bad {key} value {value:?}")]
    BadValue {
        msg_type: &'static str,
        key: &'static str,
        value: String,
    },
}

/// Open key/value form of one datagram.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    entries: Vec<(String, String)>,
}

impl Frame {
    pub fn new() -> Frame {
        Frame::default()
    }

    /// Parse the raw text form. Lines without a colon are skipped; both key
    /// and value are trimmed. Never fails: garbage input parses to a frame
    /// with no usable keys and is rejected later by [`Message::from_frame`].
    pub fn parse(raw: &str) -> Frame {
        let mut entries = Vec::new();
        for line in raw.split('\n') {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            entries.push((key.trim().to_string(), value.trim().to_string()));
        }
        Frame { entries }
    }

    /// Emit the text form: keys in insertion order, `\n\n` terminator.
    pub fn craft(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out.push('\n');
        out
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    fn with(mut self, key: &str, value: impl fmt::Display) -> Frame {
        self.push(key, value.to_string());
        self
    }

    fn with_opt(self, key: &str, value: Option<impl fmt::Display>) -> Frame {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    /// Last occurrence wins, matching the duplicate-key overwrite rule.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn frame_type(&self) -> Option<&str> {
        self.get("TYPE")
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Symbol a player marks cells with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    pub fn other(self) -> Symbol {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Symbol::X => "X",
            Symbol::O => "O",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbol {
    type Err = ();

    fn from_str(s: &str) -> Result<Symbol, ()> {
        match s {
            "X" => Ok(Symbol::X),
            "O" => Ok(Symbol::O),
            _ => Err(()),
        }
    }
}

/// Terminal outcome of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    Win,
    Draw,
}

impl GameOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            GameOutcome::Win => "WIN",
            GameOutcome::Draw => "DRAW",
        }
    }
}

impl fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameOutcome {
    type Err = ();

    fn from_str(s: &str) -> Result<GameOutcome, ()> {
        match s {
            "WIN" => Ok(GameOutcome::Win),
            "DRAW" => Ok(GameOutcome::Draw),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeAction {
    Like,
    Unlike,
}

impl LikeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LikeAction::Like => "LIKE",
            LikeAction::Unlike => "UNLIKE",
        }
    }
}

impl fmt::Display for LikeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LikeAction {
    type Err = ();

    fn from_str(s: &str) -> Result<LikeAction, ()> {
        match s {
            "LIKE" => Ok(LikeAction::Like),
            "UNLIKE" => Ok(LikeAction::Unlike),
            _ => Err(()),
        }
    }
}

/// Inline profile picture. The data stays base64; decoding is the display
/// layer's problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avatar {
    pub mime: String,
    pub encoding: String,
    pub data: String,
}

/// One LSNP message, typed per TYPE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Profile {
        user_id: UserId,
        display_name: String,
        status: String,
        avatar: Option<Avatar>,
    },
    Ping {
        user_id: UserId,
    },
    Post {
        user_id: UserId,
        content: String,
        ttl: u64,
        message_id: MessageId,
        timestamp: Option<u64>,
        token: String,
    },
    Dm {
        from: UserId,
        to: UserId,
        content: String,
        timestamp: u64,
        message_id: MessageId,
        token: String,
    },
    Ack {
        message_id: MessageId,
        status: String,
    },
    Follow {
        from: UserId,
        to: UserId,
        message_id: MessageId,
        timestamp: u64,
        token: String,
    },
    Unfollow {
        from: UserId,
        to: UserId,
        message_id: MessageId,
        timestamp: u64,
        token: String,
    },
    Like {
        from: UserId,
        to: UserId,
        post_timestamp: u64,
        action: LikeAction,
        timestamp: u64,
        token: String,
    },
    Revoke {
        token: String,
    },
    TicTacToeInvite {
        from: UserId,
        recipient: UserId,
        message_id: MessageId,
        game_id: String,
        symbol: Symbol,
        timestamp: u64,
        token: String,
    },
    TicTacToeMove {
        from: UserId,
        recipient: UserId,
        game_id: String,
        message_id: MessageId,
        turn: u32,
        position: u8,
        symbol: Symbol,
        token: String,
    },
    TicTacToeResult {
        from: UserId,
        to: UserId,
        game_id: String,
        message_id: MessageId,
        result: GameOutcome,
        symbol: Option<Symbol>,
        winning_line: Option<[u8; 3]>,
        timestamp: u64,
    },
    GroupCreate {
        from: UserId,
        group_id: String,
        group_name: String,
        members: Vec<UserId>,
        timestamp: u64,
        token: String,
    },
    GroupUpdate {
        from: UserId,
        group_id: String,
        add: Vec<UserId>,
        remove: Vec<UserId>,
        timestamp: u64,
        token: String,
    },
    GroupMessage {
        from: UserId,
        group_id: String,
        content: String,
        timestamp: u64,
        token: String,
    },
    FileOffer {
        from: UserId,
        to: UserId,
        filename: String,
        filesize: u64,
        filetype: String,
        file_id: String,
        description: Option<String>,
        timestamp: u64,
        token: String,
    },
    FileChunk {
        from: UserId,
        to: UserId,
        file_id: String,
        chunk_index: u32,
        total_chunks: u32,
        chunk_size: u32,
        data: String,
        token: String,
    },
    FileReceived {
        from: UserId,
        to: UserId,
        file_id: String,
        status: String,
        timestamp: u64,
    },
}

fn need<'a>(
    frame: &'a Frame,
    msg_type: &'static str,
    key: &'static str,
) -> Result<&'a str, WireError> {
    frame.get(key).ok_or(WireError::MissingKey { msg_type, key })
}

fn need_parsed<T: FromStr>(
    frame: &Frame,
    msg_type: &'static str,
    key: &'static str,
) -> Result<T, WireError> {
    let raw = need(frame, msg_type, key)?;
    raw.parse().map_err(|_| WireError::BadValue {
        msg_type,
        key,
        value: raw.to_string(),
    })
}

fn opt_parsed<T: FromStr>(
    frame: &Frame,
    msg_type: &'static str,
    key: &'static str,
) -> Result<Option<T>, WireError> {
    match frame.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| WireError::BadValue {
                msg_type,
                key,
                value: raw.to_string(),
            }),
    }
}

fn user_list(raw: &str, msg_type: &'static str, key: &'static str) -> Result<Vec<UserId>, WireError> {
    let mut users = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let user = part.parse().map_err(|_| WireError::BadValue {
            msg_type,
            key,
            value: part.to_string(),
        })?;
        if !users.contains(&user) {
            users.push(user);
        }
    }
    Ok(users)
}

fn join_users(users: &[UserId]) -> String {
    users
        .iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl Message {
    pub fn msg_type(&self) -> &'static str {
        match self {
            Message::Profile { .. } => "PROFILE",
            Message::Ping { .. } => "PING",
            Message::Post { .. } => "POST",
            Message::Dm { .. } => "DM",
            Message::Ack { .. } => "ACK",
            Message::Follow { .. } => "FOLLOW",
            Message::Unfollow { .. } => "UNFOLLOW",
            Message::Like { .. } => "LIKE",
            Message::Revoke { .. } => "REVOKE",
            Message::TicTacToeInvite { .. } => "TICTACTOE_INVITE",
            Message::TicTacToeMove { .. } => "TICTACTOE_MOVE",
            Message::TicTacToeResult { .. } => "TICTACTOE_RESULT",
            Message::GroupCreate { .. } => "GROUP_CREATE",
            Message::GroupUpdate { .. } => "GROUP_UPDATE",
            Message::GroupMessage { .. } => "GROUP_MESSAGE",
            Message::FileOffer { .. } => "FILE_OFFER",
            Message::FileChunk { .. } => "FILE_CHUNK",
            Message::FileReceived { .. } => "FILE_RECEIVED",
        }
    }

    pub fn from_frame(frame: &Frame) -> Result<Message, WireError> {
        let ty = frame.frame_type().ok_or(WireError::NoType)?;
        match ty {
            "PROFILE" => {
                let t = "PROFILE";
                let avatar = match (frame.get("AVATAR_TYPE"), frame.get("AVATAR_DATA")) {
                    (Some(mime), Some(data)) => Some(Avatar {
                        mime: mime.to_string(),
                        encoding: frame
                            .get("AVATAR_ENCODING")
                            .unwrap_or("base64")
                            .to_string(),
                        data: data.to_string(),
                    }),
                    _ => None,
                };
                Ok(Message::Profile {
                    user_id: need_parsed(frame, t, "USER_ID")?,
                    display_name: need(frame, t, "DISPLAY_NAME")?.to_string(),
                    status: need(frame, t, "STATUS")?.to_string(),
                    avatar,
                })
            }
            "PING" => Ok(Message::Ping {
                user_id: need_parsed(frame, "PING", "USER_ID")?,
            }),
            "POST" => {
                let t = "POST";
                Ok(Message::Post {
                    user_id: need_parsed(frame, t, "USER_ID")?,
                    content: need(frame, t, "CONTENT")?.to_string(),
                    ttl: need_parsed(frame, t, "TTL")?,
                    message_id: need_parsed(frame, t, "MESSAGE_ID")?,
                    timestamp: opt_parsed(frame, t, "TIMESTAMP")?,
                    token: need(frame, t, "TOKEN")?.to_string(),
                })
            }
            "DM" => {
                let t = "DM";
                Ok(Message::Dm {
                    from: need_parsed(frame, t, "FROM")?,
                    to: need_parsed(frame, t, "TO")?,
                    content: need(frame, t, "CONTENT")?.to_string(),
                    timestamp: need_parsed(frame, t, "TIMESTAMP")?,
                    message_id: need_parsed(frame, t, "MESSAGE_ID")?,
                    token: need(frame, t, "TOKEN")?.to_string(),
                })
            }
            "ACK" => {
                let t = "ACK";
                Ok(Message::Ack {
                    message_id: need_parsed(frame, t, "MESSAGE_ID")?,
                    status: need(frame, t, "STATUS")?.to_string(),
                })
            }
            "FOLLOW" | "UNFOLLOW" => {
                let t = if ty == "FOLLOW" { "FOLLOW" } else { "UNFOLLOW" };
                let from = need_parsed(frame, t, "FROM")?;
                let to = need_parsed(frame, t, "TO")?;
                let message_id = need_parsed(frame, t, "MESSAGE_ID")?;
                let timestamp = need_parsed(frame, t, "TIMESTAMP")?;
                let token = need(frame, t, "TOKEN")?.to_string();
                if ty == "FOLLOW" {
                    Ok(Message::Follow {
                        from,
                        to,
                        message_id,
                        timestamp,
                        token,
                    })
                } else {
                    Ok(Message::Unfollow {
                        from,
                        to,
                        message_id,
                        timestamp,
                        token,
                    })
                }
            }
            "LIKE" => {
                let t = "LIKE";
                Ok(Message::Like {
                    from: need_parsed(frame, t, "FROM")?,
                    to: need_parsed(frame, t, "TO")?,
                    post_timestamp: need_parsed(frame, t, "POST_TIMESTAMP")?,
                    action: need_parsed(frame, t, "ACTION")?,
                    timestamp: need_parsed(frame, t, "TIMESTAMP")?,
                    token: need(frame, t, "TOKEN")?.to_string(),
                })
            }
            "REVOKE" => Ok(Message::Revoke {
                token: need(frame, "REVOKE", "TOKEN")?.to_string(),
            }),
            "TICTACTOE_INVITE" => {
                let t = "TICTACTOE_INVITE";
                Ok(Message::TicTacToeInvite {
                    from: need_parsed(frame, t, "FROM")?,
                    recipient: need_parsed(frame, t, "RECIPIENT")?,
                    message_id: need_parsed(frame, t, "MESSAGE_ID")?,
                    game_id: need(frame, t, "GAMEID")?.to_string(),
                    symbol: need_parsed(frame, t, "SYMBOL")?,
                    timestamp: need_parsed(frame, t, "TIMESTAMP")?,
                    token: need(frame, t, "TOKEN")?.to_string(),
                })
            }
            "TICTACTOE_MOVE" => {
                let t = "TICTACTOE_MOVE";
                Ok(Message::TicTacToeMove {
                    from: need_parsed(frame, t, "FROM")?,
                    recipient: need_parsed(frame, t, "RECIPIENT")?,
                    game_id: need(frame, t, "GAMEID")?.to_string(),
                    message_id: need_parsed(frame, t, "MESSAGE_ID")?,
                    turn: need_parsed(frame, t, "TURN")?,
                    position: need_parsed(frame, t, "POSITION")?,
                    symbol: need_parsed(frame, t, "SYMBOL")?,
                    token: need(frame, t, "TOKEN")?.to_string(),
                })
            }
            "TICTACTOE_RESULT" => {
                let t = "TICTACTOE_RESULT";
                let winning_line = match frame.get("WINNING_LINE") {
                    None => None,
                    Some(raw) => {
                        let cells: Vec<u8> = raw
                            .split(',')
                            .map(|p| p.trim().parse::<u8>())
                            .collect::<Result<_, _>>()
                            .map_err(|_| WireError::BadValue {
                                msg_type: t,
                                key: "WINNING_LINE",
                                value: raw.to_string(),
                            })?;
                        let line: [u8; 3] =
                            cells.try_into().map_err(|_| WireError::BadValue {
                                msg_type: t,
                                key: "WINNING_LINE",
                                value: raw.to_string(),
                            })?;
                        Some(line)
                    }
                };
                Ok(Message::TicTacToeResult {
                    from: need_parsed(frame, t, "FROM")?,
                    to: need_parsed(frame, t, "TO")?,
                    game_id: need(frame, t, "GAMEID")?.to_string(),
                    message_id: need_parsed(frame, t, "MESSAGE_ID")?,
                    result: need_parsed(frame, t, "RESULT")?,
                    symbol: opt_parsed(frame, t, "SYMBOL")?,
                    winning_line,
                    timestamp: need_parsed(frame, t, "TIMESTAMP")?,
                })
            }
            "GROUP_CREATE" => {
                let t = "GROUP_CREATE";
                Ok(Message::GroupCreate {
                    from: need_parsed(frame, t, "FROM")?,
                    group_id: need(frame, t, "GROUP_ID")?.to_string(),
                    group_name: need(frame, t, "GROUP_NAME")?.to_string(),
                    members: user_list(need(frame, t, "MEMBERS")?, t, "MEMBERS")?,
                    timestamp: need_parsed(frame, t, "TIMESTAMP")?,
                    token: need(frame, t, "TOKEN")?.to_string(),
                })
            }
            "GROUP_UPDATE" => {
                let t = "GROUP_UPDATE";
                Ok(Message::GroupUpdate {
                    from: need_parsed(frame, t, "FROM")?,
                    group_id: need(frame, t, "GROUP_ID")?.to_string(),
                    add: user_list(frame.get("ADD").unwrap_or(""), t, "ADD")?,
                    remove: user_list(frame.get("REMOVE").unwrap_or(""), t, "REMOVE")?,
                    timestamp: need_parsed(frame, t, "TIMESTAMP")?,
                    token: need(frame, t, "TOKEN")?.to_string(),
                })
            }
            "GROUP_MESSAGE" => {
                let t = "GROUP_MESSAGE";
                Ok(Message::GroupMessage {
                    from: need_parsed(frame, t, "FROM")?,
                    group_id: need(frame, t, "GROUP_ID")?.to_string(),
                    content: need(frame, t, "CONTENT")?.to_string(),
                    timestamp: need_parsed(frame, t, "TIMESTAMP")?,
                    token: need(frame, t, "TOKEN")?.to_string(),
                })
            }
            "FILE_OFFER" => {
                let t = "FILE_OFFER";
                Ok(Message::FileOffer {
                    from: need_parsed(frame, t, "FROM")?,
                    to: need_parsed(frame, t, "TO")?,
                    filename: need(frame, t, "FILENAME")?.to_string(),
                    filesize: need_parsed(frame, t, "FILESIZE")?,
                    filetype: need(frame, t, "FILETYPE")?.to_string(),
                    file_id: need(frame, t, "FILEID")?.to_string(),
                    description: frame.get("DESCRIPTION").map(str::to_string),
                    timestamp: need_parsed(frame, t, "TIMESTAMP")?,
                    token: need(frame, t, "TOKEN")?.to_string(),
                })
            }
            "FILE_CHUNK" => {
                let t = "FILE_CHUNK";
                Ok(Message::FileChunk {
                    from: need_parsed(frame, t, "FROM")?,
                    to: need_parsed(frame, t, "TO")?,
                    file_id: need(frame, t, "FILEID")?.to_string(),
                    chunk_index: need_parsed(frame, t, "CHUNK_INDEX")?,
                    total_chunks: need_parsed(frame, t, "TOTAL_CHUNKS")?,
                    chunk_size: need_parsed(frame, t, "CHUNK_SIZE")?,
                    data: need(frame, t, "DATA")?.to_string(),
                    token: need(frame, t, "TOKEN")?.to_string(),
                })
            }
            "FILE_RECEIVED" => {
                let t = "FILE_RECEIVED";
                Ok(Message::FileReceived {
                    from: need_parsed(frame, t, "FROM")?,
                    to: need_parsed(frame, t, "TO")?,
                    file_id: need(frame, t, "FILEID")?.to_string(),
                    status: need(frame, t, "STATUS")?.to_string(),
                    timestamp: need_parsed(frame, t, "TIMESTAMP")?,
                })
            }
            other => Err(WireError::UnknownType(other.to_string())),
        }
    }

    pub fn to_frame(&self) -> Frame {
        let frame = Frame::new().with("TYPE", self.msg_type());
        match self {
            Message::Profile {
                user_id,
                display_name,
                status,
                avatar,
            } => {
                let frame = frame
                    .with("USER_ID", user_id)
                    .with("DISPLAY_NAME", display_name)
                    .with("STATUS", status);
                match avatar {
                    Some(a) => frame
                        .with("AVATAR_TYPE", &a.mime)
                        .with("AVATAR_ENCODING", &a.encoding)
                        .with("AVATAR_DATA", &a.data),
                    None => frame,
                }
            }
            Message::Ping { user_id } => frame.with("USER_ID", user_id),
            Message::Post {
                user_id,
                content,
                ttl,
                message_id,
                timestamp,
                token,
            } => frame
                .with("USER_ID", user_id)
                .with("CONTENT", content)
                .with("TTL", ttl)
                .with("MESSAGE_ID", message_id)
                .with_opt("TIMESTAMP", timestamp.as_ref())
                .with("TOKEN", token),
            Message::Dm {
                from,
                to,
                content,
                timestamp,
                message_id,
                token,
            } => frame
                .with("FROM", from)
                .with("TO", to)
                .with("CONTENT", content)
                .with("TIMESTAMP", timestamp)
                .with("MESSAGE_ID", message_id)
                .with("TOKEN", token),
            Message::Ack { message_id, status } => {
                frame.with("MESSAGE_ID", message_id).with("STATUS", status)
            }
            Message::Follow {
                from,
                to,
                message_id,
                timestamp,
                token,
            }
            | Message::Unfollow {
                from,
                to,
                message_id,
                timestamp,
                token,
            } => frame
                .with("FROM", from)
                .with("TO", to)
                .with("MESSAGE_ID", message_id)
                .with("TIMESTAMP", timestamp)
                .with("TOKEN", token),
            Message::Like {
                from,
                to,
                post_timestamp,
                action,
                timestamp,
                token,
            } => frame
                .with("FROM", from)
                .with("TO", to)
                .with("POST_TIMESTAMP", post_timestamp)
                .with("ACTION", action)
                .with("TIMESTAMP", timestamp)
                .with("TOKEN", token),
            Message::Revoke { token } => frame.with("TOKEN", token),
            Message::TicTacToeInvite {
                from,
                recipient,
                message_id,
                game_id,
                symbol,
                timestamp,
                token,
            } => frame
                .with("FROM", from)
                .with("RECIPIENT", recipient)
                .with("MESSAGE_ID", message_id)
                .with("GAMEID", game_id)
                .with("SYMBOL", symbol)
                .with("TIMESTAMP", timestamp)
                .with("TOKEN", token),
            Message::TicTacToeMove {
                from,
                recipient,
                game_id,
                message_id,
                turn,
                position,
                symbol,
                token,
            } => frame
                .with("FROM", from)
                .with("RECIPIENT", recipient)
                .with("GAMEID", game_id)
                .with("MESSAGE_ID", message_id)
                .with("TURN", turn)
                .with("POSITION", position)
                .with("SYMBOL", symbol)
                .with("TOKEN", token),
            Message::TicTacToeResult {
                from,
                to,
                game_id,
                message_id,
                result,
                symbol,
                winning_line,
                timestamp,
            } => frame
                .with("FROM", from)
                .with("TO", to)
                .with("GAMEID", game_id)
                .with("MESSAGE_ID", message_id)
                .with("RESULT", result)
                .with_opt("SYMBOL", symbol.as_ref())
                .with_opt(
                    "WINNING_LINE",
                    winning_line
                        .as_ref()
                        .map(|l| format!("{},{},{}", l[0], l[1], l[2])),
                )
                .with("TIMESTAMP", timestamp),
            Message::GroupCreate {
                from,
                group_id,
                group_name,
                members,
                timestamp,
                token,
            } => frame
                .with("FROM", from)
                .with("GROUP_ID", group_id)
                .with("GROUP_NAME", group_name)
                .with("MEMBERS", join_users(members))
                .with("TIMESTAMP", timestamp)
                .with("TOKEN", token),
            Message::GroupUpdate {
                from,
                group_id,
                add,
                remove,
                timestamp,
                token,
            } => frame
                .with("FROM", from)
                .with("GROUP_ID", group_id)
                .with_opt(
                    "ADD",
                    if add.is_empty() {
                        None
                    } else {
                        Some(join_users(add))
                    },
                )
                .with_opt(
                    "REMOVE",
                    if remove.is_empty() {
                        None
                    } else {
                        Some(join_users(remove))
                    },
                )
                .with("TIMESTAMP", timestamp)
                .with("TOKEN", token),
            Message::GroupMessage {
                from,
                group_id,
                content,
                timestamp,
                token,
            } => frame
                .with("FROM", from)
                .with("GROUP_ID", group_id)
                .with("CONTENT", content)
                .with("TIMESTAMP", timestamp)
                .with("TOKEN", token),
            Message::FileOffer {
                from,
                to,
                filename,
                filesize,
                filetype,
                file_id,
                description,
                timestamp,
                token,
            } => frame
                .with("FROM", from)
                .with("TO", to)
                .with("FILENAME", filename)
                .with("FILESIZE", filesize)
                .with("FILETYPE", filetype)
                .with("FILEID", file_id)
                .with_opt("DESCRIPTION", description.as_ref())
                .with("TIMESTAMP", timestamp)
                .with("TOKEN", token),
            Message::FileChunk {
                from,
                to,
                file_id,
                chunk_index,
                total_chunks,
                chunk_size,
                data,
                token,
            } => frame
                .with("FROM", from)
                .with("TO", to)
                .with("FILEID", file_id)
                .with("CHUNK_INDEX", chunk_index)
                .with("TOTAL_CHUNKS", total_chunks)
                .with("CHUNK_SIZE", chunk_size)
                .with("DATA", data)
                .with("TOKEN", token),
            Message::FileReceived {
                from,
                to,
                file_id,
                status,
                timestamp,
            } => frame
                .with("FROM", from)
                .with("TO", to)
                .with("FILEID", file_id)
                .with("STATUS", status)
                .with("TIMESTAMP", timestamp),
        }
    }

    /// Text form ready for `send_to`.
    pub fn craft(&self) -> String {
        self.to_frame().craft()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserId {
        "alice@10.0.0.1".parse().unwrap()
    }

    fn bob() -> UserId {
        "bob@10.0.0.2".parse().unwrap()
    }

    fn mid(s: &str) -> MessageId {
        s.parse().unwrap()
    }

    fn roundtrip(msg: Message) {
        let text = msg.craft();
        assert!(text.ends_with("\n\n"), "frame must end with a blank line");
        let parsed = Message::from_frame(&Frame::parse(&text)).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn profile_roundtrip_with_avatar() {
        roundtrip(Message::Profile {
            user_id: alice(),
            display_name: "Alice".into(),
            status: "exploring the mesh".into(),
            avatar: Some(Avatar {
                mime: "image/png".into(),
                encoding: "base64".into(),
                data: "aGVsbG8=".into(),
            }),
        });
        roundtrip(Message::Profile {
            user_id: alice(),
            display_name: "Alice".into(),
            status: String::new(),
            avatar: None,
        });
    }

    #[test]
    fn dm_and_ack_roundtrip() {
        roundtrip(Message::Dm {
            from: alice(),
            to: bob(),
            content: "hi there: colons are fine in values".into(),
            timestamp: 1000,
            message_id: mid("0000000000000001"),
            token: "alice@10.0.0.1|4600|chat".into(),
        });
        roundtrip(Message::Ack {
            message_id: mid("0000000000000001"),
            status: "RECEIVED".into(),
        });
    }

    #[test]
    fn game_messages_roundtrip() {
        roundtrip(Message::TicTacToeInvite {
            from: alice(),
            recipient: bob(),
            message_id: mid("00000000000000aa"),
            game_id: "g7".into(),
            symbol: Symbol::X,
            timestamp: 5,
            token: "alice@10.0.0.1|4600|game".into(),
        });
        roundtrip(Message::TicTacToeMove {
            from: alice(),
            recipient: bob(),
            game_id: "g7".into(),
            message_id: mid("00000000000000ab"),
            turn: 3,
            position: 8,
            symbol: Symbol::O,
            token: "alice@10.0.0.1|4600|game".into(),
        });
        roundtrip(Message::TicTacToeResult {
            from: alice(),
            to: bob(),
            game_id: "g7".into(),
            message_id: mid("00000000000000ac"),
            result: GameOutcome::Win,
            symbol: Some(Symbol::X),
            winning_line: Some([0, 4, 8]),
            timestamp: 9,
        });
        roundtrip(Message::TicTacToeResult {
            from: alice(),
            to: bob(),
            game_id: "g7".into(),
            message_id: mid("00000000000000ad"),
            result: GameOutcome::Draw,
            symbol: None,
            winning_line: None,
            timestamp: 9,
        });
    }

    #[test]
    fn group_messages_roundtrip() {
        roundtrip(Message::GroupCreate {
            from: alice(),
            group_id: "studygrp1".into(),
            group_name: "Study Group".into(),
            members: vec![alice(), bob()],
            timestamp: 100,
            token: "alice@10.0.0.1|4600|group".into(),
        });
        roundtrip(Message::GroupUpdate {
            from: alice(),
            group_id: "studygrp1".into(),
            add: vec![bob()],
            remove: vec![],
            timestamp: 101,
            token: "alice@10.0.0.1|4600|group".into(),
        });
        roundtrip(Message::GroupMessage {
            from: alice(),
            group_id: "studygrp1".into(),
            content: "meeting at 5".into(),
            timestamp: 102,
            token: "alice@10.0.0.1|4600|group".into(),
        });
    }

    #[test]
    fn file_messages_roundtrip() {
        roundtrip(Message::FileOffer {
            from: alice(),
            to: bob(),
            filename: "notes.txt".into(),
            filesize: 2048,
            filetype: "text/plain".into(),
            file_id: "f1a2b3c4".into(),
            description: Some("lecture notes".into()),
            timestamp: 50,
            token: "alice@10.0.0.1|4600|file".into(),
        });
        roundtrip(Message::FileChunk {
            from: alice(),
            to: bob(),
            file_id: "f1a2b3c4".into(),
            chunk_index: 1,
            total_chunks: 2,
            chunk_size: 1024,
            data: "QUJD".into(),
            token: "alice@10.0.0.1|4600|file".into(),
        });
    }

    #[test]
    fn post_timestamp_is_optional() {
        roundtrip(Message::Post {
            user_id: alice(),
            content: "first post".into(),
            ttl: 3600,
            message_id: mid("00000000000000ff"),
            timestamp: None,
            token: "alice@10.0.0.1|4600|broadcast".into(),
        });
        roundtrip(Message::Post {
            user_id: alice(),
            content: "second post".into(),
            ttl: 3600,
            message_id: mid("0000000000000100"),
            timestamp: Some(777),
            token: "alice@10.0.0.1|4600|broadcast".into(),
        });
    }

    #[test]
    fn parse_skips_lines_without_colon() {
        let frame = Frame::parse("garbage line\nTYPE: PING\nUSER_ID: alice@10.0.0.1\n\n");
        assert_eq!(frame.frame_type(), Some("PING"));
        assert_eq!(
            Message::from_frame(&frame).unwrap(),
            Message::Ping { user_id: alice() }
        );
    }

    #[test]
    fn later_duplicate_key_wins() {
        let frame = Frame::parse("TYPE: PING\nUSER_ID: alice@10.0.0.1\nUSER_ID: bob@10.0.0.2\n\n");
        assert_eq!(frame.get("USER_ID"), Some("bob@10.0.0.2"));
    }

    #[test]
    fn unknown_keys_are_preserved_and_ignored() {
        let frame = Frame::parse("TYPE: PING\nUSER_ID: alice@10.0.0.1\nX_CUSTOM: 42\n\n");
        assert_eq!(frame.get("X_CUSTOM"), Some("42"));
        assert!(Message::from_frame(&frame).is_ok());
    }

    #[test]
    fn whitespace_is_trimmed_around_key_and_value() {
        let frame = Frame::parse("TYPE:   PING  \n  USER_ID  :alice@10.0.0.1\n\n");
        assert_eq!(frame.frame_type(), Some("PING"));
        assert_eq!(frame.get("USER_ID"), Some("alice@10.0.0.1"));
    }

    #[test]
    fn missing_mandatory_key_is_an_error() {
        let frame = Frame::parse("TYPE: DM\nFROM: alice@10.0.0.1\nTO: bob@10.0.0.2\n\n");
        assert_eq!(
            Message::from_frame(&frame),
            Err(WireError::MissingKey {
                msg_type: "DM",
                key: "CONTENT"
            })
        );
    }

    #[test]
    fn unknown_type_is_an_error() {
        let frame = Frame::parse("TYPE: TELEPORT\nFROM: alice@10.0.0.1\n\n");
        assert_eq!(
            Message::from_frame(&frame),
            Err(WireError::UnknownType("TELEPORT".into()))
        );
        assert_eq!(Message::from_frame(&Frame::parse("\n")), Err(WireError::NoType));
    }

    #[test]
    fn bad_numeric_value_is_an_error() {
        let frame = Frame::parse(
            "TYPE: TICTACTOE_MOVE\nFROM: alice@10.0.0.1\nRECIPIENT: bob@10.0.0.2\nGAMEID: g1\nMESSAGE_ID: 0000000000000001\nTURN: soon\nPOSITION: 4\nSYMBOL: X\nTOKEN: t\n\n",
        );
        assert!(matches!(
            Message::from_frame(&frame),
            Err(WireError::BadValue { key: "TURN", .. })
        ));
    }
}

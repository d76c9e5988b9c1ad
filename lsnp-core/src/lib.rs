//! Core LSNP primitives: identifiers, the line-oriented wire codec, and
//! capability tokens.
//
// Modules
pub mod id;
pub mod token;
pub mod wire;

pub use id::{new_file_id, new_game_id, new_group_id, IdError, MessageId, UserId};
pub use token::{validate_token, Scope, Token, TokenError};
pub use wire::{Avatar, Frame, GameOutcome, LikeAction, Message, Symbol, WireError};

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the UNIX epoch, best-effort (pre-epoch clocks read as 0).
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

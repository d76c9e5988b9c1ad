//! Protocol identifiers.
//!
//! A user is addressed as `username@ipv4`; the IP half doubles as the
//! unicast destination for everything we send that user. Message ids are
//! 64 random bits rendered as 16 lowercase hex digits. Game and group ids
//! are short URL-safe tokens whose uniqueness is sender-local.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid user id {0:?}: expected username@ipv4")]
    BadUserId(String),
    #[error("invalid message id {0:?}: expected 16 lowercase hex digits")]
    BadMessageId(String),
}

/// `username@ipv4` pair identifying one peer process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId {
    pub username: String,
    pub ip: Ipv4Addr,
}

impl UserId {
    pub fn new(username: impl Into<String>, ip: Ipv4Addr) -> Self {
        Self {
            username: username.into(),
            ip,
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.ip)
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, IdError> {
        let (name, ip) = s
            .split_once('@')
            .ok_or_else(|| IdError::BadUserId(s.to_string()))?;
        if name.is_empty() || name.contains('@') {
            return Err(IdError::BadUserId(s.to_string()));
        }
        let ip = ip
            .parse::<Ipv4Addr>()
            .map_err(|_| IdError::BadUserId(s.to_string()))?;
        Ok(UserId::new(name, ip))
    }
}

impl TryFrom<String> for UserId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, IdError> {
        s.parse()
    }
}

impl From<UserId> for String {
    fn from(u: UserId) -> String {
        u.to_string()
    }
}

/// 16 lowercase hex digits; 64 bits of entropy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageId(String);

impl MessageId {
    pub fn random() -> Self {
        MessageId(hex::encode(rand::random::<[u8; 8]>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MessageId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, IdError> {
        let ok = s.len() == 16
            && s.bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if ok {
            Ok(MessageId(s.to_string()))
        } else {
            Err(IdError::BadMessageId(s.to_string()))
        }
    }
}

impl TryFrom<String> for MessageId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, IdError> {
        s.parse()
    }
}

impl From<MessageId> for String {
    fn from(m: MessageId) -> String {
        m.0
    }
}

/// Short game identifier, e.g. `g4k2nq1z`. Unique per initiating peer.
pub fn new_game_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect();
    format!("g{suffix}")
}

/// Random 8-character alphanumeric group identifier.
pub fn new_group_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

/// Short file-transfer identifier, e.g. `fq91xk3d`.
pub fn new_file_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect();
    format!("f{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_roundtrip() {
        let u: UserId = "alice@10.0.0.1".parse().unwrap();
        assert_eq!(u.username, "alice");
        assert_eq!(u.ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(u.to_string(), "alice@10.0.0.1");
    }

    #[test]
    fn user_id_rejects_garbage() {
        assert!("alice".parse::<UserId>().is_err());
        assert!("@10.0.0.1".parse::<UserId>().is_err());
        assert!("alice@nothost".parse::<UserId>().is_err());
        assert!("a@b@10.0.0.1".parse::<UserId>().is_err());
    }

    #[test]
    fn message_id_is_16_lowercase_hex() {
        let id = MessageId::random();
        assert_eq!(id.as_str().len(), 16);
        assert!(id
            .as_str()
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
        assert_eq!(id.as_str().parse::<MessageId>().unwrap(), id);
    }

    #[test]
    fn message_id_rejects_bad_forms() {
        assert!("0000".parse::<MessageId>().is_err());
        assert!("000000000000000G".parse::<MessageId>().is_err());
        assert!("00000000DEADBEEF".parse::<MessageId>().is_err());
    }

    #[test]
    fn game_and_group_ids_are_url_safe() {
        let g = new_game_id();
        assert!(g.len() >= 3 && g.len() <= 16);
        assert!(g.chars().all(|c| c.is_ascii_alphanumeric()));
        let gr = new_group_id();
        assert_eq!(gr.len(), 8);
        assert!(gr.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}

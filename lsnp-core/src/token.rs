//! Bearer-style capability tokens.
//!
//! A token is the string `user|expiry|scope`. Nothing is signed; the token
//! binds by convention only. Both sides validate: the sender before
//! transmit, the receiver before acting. Revocation is process-local and
//! monotonic.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::UserId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid token format")]
    InvalidFormat,
    #[error("Expired token")]
    Expired,
    #[error("Scope mismatch")]
    ScopeMismatch,
    #[error("Token has been revoked")]
    Revoked,
}

/// Operation class a token grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Broadcast,
    Chat,
    Follow,
    File,
    Game,
    Group,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Broadcast => "broadcast",
            Scope::Chat => "chat",
            Scope::Follow => "follow",
            Scope::File => "file",
            Scope::Game => "game",
            Scope::Group => "group",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, TokenError> {
        match s {
            "broadcast" => Ok(Scope::Broadcast),
            "chat" => Ok(Scope::Chat),
            "follow" => Ok(Scope::Follow),
            "file" => Ok(Scope::File),
            "game" => Ok(Scope::Game),
            "group" => Ok(Scope::Group),
            _ => Err(TokenError::InvalidFormat),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub user: UserId,
    pub expiry: u64,
    pub scope: Scope,
}

impl Token {
    /// Mint a token expiring `ttl` seconds from `now`.
    pub fn mint(user: UserId, now: u64, ttl: u64, scope: Scope) -> Token {
        Token {
            user,
            expiry: now.saturating_add(ttl),
            scope,
        }
    }

    pub fn parse(raw: &str) -> Result<Token, TokenError> {
        let parts: Vec<&str> = raw.split('|').collect();
        if parts.len() != 3 {
            return Err(TokenError::InvalidFormat);
        }
        let user: UserId = parts[0].parse().map_err(|_| TokenError::InvalidFormat)?;
        let expiry: u64 = parts[1].parse().map_err(|_| TokenError::InvalidFormat)?;
        let scope: Scope = parts[2].parse()?;
        Ok(Token {
            user,
            expiry,
            scope,
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.user, self.expiry, self.scope)
    }
}

/// Full receive-side (and send-side) check. Failure order: format, expiry,
/// scope, revocation. Returns the parsed token so callers can bind the
/// `user` field against the claimed sender.
pub fn validate_token(
    raw: &str,
    required: Scope,
    now: u64,
    revoked: &HashSet<String>,
) -> Result<Token, TokenError> {
    let token = Token::parse(raw)?;
    if token.expiry < now {
        return Err(TokenError::Expired);
    }
    if token.scope != required {
        return Err(TokenError::ScopeMismatch);
    }
    if revoked.contains(raw) {
        return Err(TokenError::Revoked);
    }
    Ok(token)
}

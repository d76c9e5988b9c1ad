//! Named groups with creator-authoritative membership.
//!
//! Only frames from the recorded creator may change membership, and within
//! that origin the newest TIMESTAMP wins; anything older is stale and
//! ignored. Message history is append-only and purely local.

use serde::Serialize;
use thiserror::Error;

use lsnp_core::UserId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupError {
    #[error("unknown group {0:?}")]
    Unknown(String),
    #[error("update from {0} ignored: not the group creator")]
    NotCreator(UserId),
    #[error("stale update: timestamp {got} older than {have}")]
    Stale { got: u64, have: u64 },
    #[error("{0} is not a member of the group")]
    NotMember(UserId),
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupMessageRecord {
    pub from: UserId,
    pub content: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
pub struct Group {
    pub name: String,
    pub members: Vec<UserId>,
    pub creator: UserId,
    pub created_at: u64,
    pub updated_at: u64,
    pub messages: Vec<GroupMessageRecord>,
}

impl Group {
    pub fn new(name: String, members: Vec<UserId>, creator: UserId, timestamp: u64) -> Group {
        let mut group = Group {
            name,
            members: Vec::new(),
            creator,
            created_at: timestamp,
            updated_at: timestamp,
            messages: Vec::new(),
        };
        for member in members {
            group.add_member(member);
        }
        group
    }

    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }

    fn add_member(&mut self, user: UserId) {
        if !self.members.contains(&user) {
            self.members.push(user);
        }
    }

    fn remove_member(&mut self, user: &UserId) {
        self.members.retain(|m| m != user);
    }

    /// Apply a membership delta from `from`. Adds happen before removes, so
    /// an id named in both ends up out of the group.
    pub fn apply_update(
        &mut self,
        from: &UserId,
        add: &[UserId],
        remove: &[UserId],
        timestamp: u64,
    ) -> Result<(), GroupError> {
        if *from != self.creator {
            return Err(GroupError::NotCreator(from.clone()));
        }
        if timestamp < self.updated_at {
            return Err(GroupError::Stale {
                got: timestamp,
                have: self.updated_at,
            });
        }
        for user in add {
            self.add_member(user.clone());
        }
        for user in remove {
            self.remove_member(user);
        }
        self.updated_at = timestamp;
        Ok(())
    }

    /// Append a message after the sender's membership checks out.
    pub fn push_message(
        &mut self,
        from: UserId,
        content: String,
        timestamp: u64,
    ) -> Result<(), GroupError> {
        if !self.is_member(&from) {
            return Err(GroupError::NotMember(from));
        }
        self.messages.push(GroupMessageRecord {
            from,
            content,
            timestamp,
        });
        Ok(())
    }
}

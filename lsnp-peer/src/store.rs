//! Process-wide catalog of everything this peer knows: its own profile,
//! discovered peers with their posts and DMs, the social graph, in-flight
//! DM acknowledgements, token bookkeeping, games, groups, and file
//! transfers. All mutation funnels through here; the network layer wraps
//! one instance in `Arc<Mutex<_>>` and holds the lock per datagram.

use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use lsnp_core::{Avatar, LikeAction, Message, MessageId, UserId};

use crate::file::{ChunkProgress, FileError, IncomingFile};
use crate::game::GameSession;
use crate::group::{Group, GroupError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("own profile is not set")]
    ProfileNotSet,
    #[error("username cannot change once set")]
    UsernameImmutable,
}

#[derive(Debug, Clone)]
pub struct OwnProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub status: String,
    pub avatar: Option<Avatar>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub content: String,
    pub timestamp: Option<u64>,
    pub ttl: u64,
    pub message_id: MessageId,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DmRecord {
    pub content: String,
    pub timestamp: u64,
    pub message_id: MessageId,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeRecord {
    pub from: UserId,
    pub post_timestamp: u64,
    pub content: String,
    pub timestamp: u64,
}

/// Everything known about one remote peer.
#[derive(Debug, Clone)]
pub struct Peer {
    pub display_name: String,
    pub status: String,
    pub avatar: Option<Avatar>,
    pub posts: Vec<Post>,
    pub dms: Vec<DmRecord>,
    pub likes: Vec<LikeRecord>,
    /// Source address of the most recent datagram from this user. Unicast
    /// prefers this over the `ip@port-from-config` fallback.
    pub last_addr: Option<SocketAddr>,
}

impl Peer {
    fn placeholder(user_id: &UserId) -> Peer {
        Peer {
            display_name: user_id.to_string(),
            status: String::new(),
            avatar: None,
            posts: Vec::new(),
            dms: Vec::new(),
            likes: Vec::new(),
            last_addr: None,
        }
    }
}

/// One outstanding DM awaiting its ACK.
#[derive(Debug, Clone)]
pub struct PendingAck {
    pub payload: String,
    pub addr: SocketAddr,
    pub first_sent: Instant,
    pub last_sent: Instant,
    pub attempts: u32,
}

/// One retransmission the watcher owes the network.
#[derive(Debug, Clone)]
pub struct Retry {
    pub message_id: MessageId,
    pub payload: String,
    pub addr: SocketAddr,
    pub attempt: u32,
}

#[derive(Debug, Default)]
pub struct RetryBatch {
    pub resend: Vec<Retry>,
    pub dropped: Vec<MessageId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmDelivery {
    Stored,
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct OutgoingFile {
    pub to: UserId,
    pub filename: String,
    pub acknowledged: bool,
}

#[derive(Debug, Default)]
pub struct PeerStore {
    own: Option<OwnProfile>,
    own_posts: Vec<Post>,
    peers: HashMap<UserId, Peer>,
    following: HashSet<UserId>,
    followers: Vec<UserId>,
    pending_acks: HashMap<MessageId, PendingAck>,
    seen_dm_ids: HashSet<MessageId>,
    revoked_tokens: HashSet<String>,
    issued_tokens: Vec<String>,
    received_likes: Vec<LikeRecord>,
    games: HashMap<String, GameSession>,
    groups: HashMap<String, Group>,
    owned_groups: HashSet<String>,
    incoming_files: HashMap<String, IncomingFile>,
    outgoing_files: HashMap<String, OutgoingFile>,
}

impl PeerStore {
    pub fn new() -> PeerStore {
        PeerStore::default()
    }

    // ---- own profile ------------------------------------------------------

    /// Create or update the local profile. The username half of the UserId
    /// is fixed by the first call; later calls may only change display
    /// name, status, and avatar. Returns whether this was the first call.
    pub fn set_own_profile(
        &mut self,
        username: &str,
        ip: Ipv4Addr,
        display_name: String,
        status: String,
        avatar: Option<Avatar>,
    ) -> Result<bool, StoreError> {
        match &mut self.own {
            Some(own) => {
                if own.user_id.username != username {
                    return Err(StoreError::UsernameImmutable);
                }
                own.display_name = display_name;
                own.status = status;
                if avatar.is_some() {
                    own.avatar = avatar;
                }
                Ok(false)
            }
            None => {
                self.own = Some(OwnProfile {
                    user_id: UserId::new(username, ip),
                    display_name,
                    status,
                    avatar,
                });
                Ok(true)
            }
        }
    }

    pub fn own(&self) -> Option<&OwnProfile> {
        self.own.as_ref()
    }

    pub fn own_user_id(&self) -> Option<&UserId> {
        self.own.as_ref().map(|o| &o.user_id)
    }

    pub fn is_own(&self, user: &UserId) -> bool {
        self.own_user_id() == Some(user)
    }

    /// PROFILE frame announcing the local profile, if one is set.
    pub fn profile_message(&self) -> Option<Message> {
        self.own.as_ref().map(|own| Message::Profile {
            user_id: own.user_id.clone(),
            display_name: own.display_name.clone(),
            status: own.status.clone(),
            avatar: own.avatar.clone(),
        })
    }

    // ---- peers ------------------------------------------------------------

    fn ensure_peer(&mut self, user_id: &UserId) -> &mut Peer {
        self.peers
            .entry(user_id.clone())
            .or_insert_with(|| Peer::placeholder(user_id))
    }

    pub fn add_or_update_peer(
        &mut self,
        user_id: &UserId,
        display_name: &str,
        status: &str,
        avatar: Option<Avatar>,
    ) {
        let peer = self.ensure_peer(user_id);
        peer.display_name = display_name.to_string();
        peer.status = status.to_string();
        if avatar.is_some() {
            peer.avatar = avatar;
        }
    }

    /// Remember where the latest datagram from this user came from.
    pub fn note_peer_addr(&mut self, user_id: &UserId, addr: SocketAddr) {
        self.ensure_peer(user_id).last_addr = Some(addr);
    }

    pub fn peer(&self, user_id: &UserId) -> Option<&Peer> {
        self.peers.get(user_id)
    }

    pub fn peers(&self) -> &HashMap<UserId, Peer> {
        &self.peers
    }

    /// Unicast destination for a user: their last seen source address, or
    /// the IP baked into the UserId at the configured port.
    pub fn addr_of(&self, user: &UserId, default_port: u16) -> SocketAddr {
        self.peers
            .get(user)
            .and_then(|p| p.last_addr)
            .unwrap_or_else(|| SocketAddr::from((user.ip, default_port)))
    }

    pub fn display_name_of(&self, user: &UserId) -> String {
        if let Some(own) = &self.own {
            if own.user_id == *user {
                return own.display_name.clone();
            }
        }
        self.peers
            .get(user)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| user.to_string())
    }

    // ---- posts & DMs ------------------------------------------------------

    pub fn add_post(&mut self, user_id: &UserId, post: Post) {
        self.ensure_peer(user_id).posts.push(post);
    }

    pub fn add_own_post(&mut self, post: Post) {
        self.own_posts.push(post);
    }

    pub fn own_posts(&self) -> &[Post] {
        &self.own_posts
    }

    pub fn own_post_at(&self, timestamp: u64) -> Option<&Post> {
        self.own_posts
            .iter()
            .find(|p| p.timestamp == Some(timestamp))
    }

    /// Append a DM unless its MessageId was already delivered once.
    pub fn add_dm(&mut self, from: &UserId, dm: DmRecord) -> DmDelivery {
        if !self.seen_dm_ids.insert(dm.message_id.clone()) {
            return DmDelivery::Duplicate;
        }
        self.ensure_peer(from).dms.push(dm);
        DmDelivery::Stored
    }

    // ---- social graph -----------------------------------------------------

    /// Register `from` as a follower, provided the frame was addressed to
    /// us. Repeat FOLLOWs are no-ops.
    pub fn add_follower(&mut self, to: &UserId, from: &UserId) -> bool {
        if !self.is_own(to) {
            return false;
        }
        self.ensure_peer(from);
        if self.followers.contains(from) {
            false
        } else {
            self.followers.push(from.clone());
            true
        }
    }

    pub fn remove_follower(&mut self, to: &UserId, from: &UserId) -> bool {
        if !self.is_own(to) {
            return false;
        }
        let before = self.followers.len();
        self.followers.retain(|f| f != from);
        self.followers.len() != before
    }

    pub fn followers(&self) -> &[UserId] {
        &self.followers
    }

    pub fn follower_addrs(&self, default_port: u16) -> Vec<SocketAddr> {
        self.followers
            .iter()
            .map(|f| self.addr_of(f, default_port))
            .collect()
    }

    /// Start following a user. Following oneself is refused.
    pub fn follow(&mut self, user: UserId) -> bool {
        if self.is_own(&user) {
            return false;
        }
        self.following.insert(user)
    }

    pub fn unfollow(&mut self, user: &UserId) -> bool {
        self.following.remove(user)
    }

    pub fn is_following(&self, user: &UserId) -> bool {
        self.following.contains(user)
    }

    pub fn following(&self) -> &HashSet<UserId> {
        &self.following
    }

    // ---- likes ------------------------------------------------------------

    /// Record a like/unlike on one of our posts. The newest action from a
    /// given user wins; UNLIKE simply clears any previous LIKE.
    pub fn record_received_like(
        &mut self,
        from: UserId,
        post_timestamp: u64,
        action: LikeAction,
        timestamp: u64,
    ) -> bool {
        let Some(post) = self.own_post_at(post_timestamp) else {
            return false;
        };
        let content = post.content.clone();
        self.received_likes
            .retain(|l| !(l.from == from && l.post_timestamp == post_timestamp));
        if action == LikeAction::Like {
            self.received_likes.push(LikeRecord {
                from,
                post_timestamp,
                content,
                timestamp,
            });
        }
        true
    }

    pub fn received_likes(&self) -> &[LikeRecord] {
        &self.received_likes
    }

    /// Track a like we sent, under the post author's peer record.
    pub fn record_sent_like(
        &mut self,
        target: &UserId,
        post_timestamp: u64,
        action: LikeAction,
        content: String,
        timestamp: u64,
    ) -> Result<(), StoreError> {
        let own = self
            .own_user_id()
            .cloned()
            .ok_or(StoreError::ProfileNotSet)?;
        let peer = self.ensure_peer(target);
        peer.likes
            .retain(|l| !(l.from == own && l.post_timestamp == post_timestamp));
        if action == LikeAction::Like {
            peer.likes.push(LikeRecord {
                from: own,
                post_timestamp,
                content,
                timestamp,
            });
        }
        Ok(())
    }

    // ---- pending ACKs -----------------------------------------------------

    /// Track an outbound DM until its ACK lands. At most one entry per
    /// MessageId; re-sending the same id is a no-op.
    pub fn insert_pending_ack(
        &mut self,
        message_id: MessageId,
        payload: String,
        addr: SocketAddr,
    ) -> bool {
        if self.pending_acks.contains_key(&message_id) {
            return false;
        }
        let now = Instant::now();
        self.pending_acks.insert(
            message_id,
            PendingAck {
                payload,
                addr,
                first_sent: now,
                last_sent: now,
                attempts: 1,
            },
        );
        true
    }

    pub fn clear_pending_ack(&mut self, message_id: &MessageId) -> bool {
        self.pending_acks.remove(message_id).is_some()
    }

    pub fn pending_ack_count(&self) -> usize {
        self.pending_acks.len()
    }

    /// Collect entries whose ACK is overdue. Entries still under the
    /// attempt budget are bumped and returned for resending; exhausted ones
    /// are dropped. The caller does the actual sends after releasing the
    /// store lock.
    pub fn due_retransmits(&mut self, timeout: Duration, max_attempts: u32) -> RetryBatch {
        let now = Instant::now();
        let mut batch = RetryBatch::default();
        self.pending_acks.retain(|id, entry| {
            if now.duration_since(entry.last_sent) < timeout {
                return true;
            }
            if entry.attempts < max_attempts {
                entry.attempts += 1;
                entry.last_sent = now;
                batch.resend.push(Retry {
                    message_id: id.clone(),
                    payload: entry.payload.clone(),
                    addr: entry.addr,
                    attempt: entry.attempts,
                });
                true
            } else {
                batch.dropped.push(id.clone());
                false
            }
        });
        batch
    }

    // ---- tokens -----------------------------------------------------------

    pub fn revoke_token(&mut self, raw: String) -> bool {
        self.revoked_tokens.insert(raw)
    }

    pub fn revoked_tokens(&self) -> &HashSet<String> {
        &self.revoked_tokens
    }

    pub fn issue_token(&mut self, raw: String) {
        self.issued_tokens.push(raw);
    }

    pub fn issued_tokens(&self) -> &[String] {
        &self.issued_tokens
    }

    // ---- games ------------------------------------------------------------

    /// Register a new game. Refused if the GAMEID is already live (a
    /// duplicated invite datagram, typically).
    pub fn insert_game(&mut self, game_id: String, session: GameSession) -> bool {
        if self.games.contains_key(&game_id) {
            return false;
        }
        self.games.insert(game_id, session);
        true
    }

    pub fn game(&self, game_id: &str) -> Option<&GameSession> {
        self.games.get(game_id)
    }

    pub fn game_mut(&mut self, game_id: &str) -> Option<&mut GameSession> {
        self.games.get_mut(game_id)
    }

    pub fn remove_game(&mut self, game_id: &str) -> Option<GameSession> {
        self.games.remove(game_id)
    }

    pub fn games(&self) -> &HashMap<String, GameSession> {
        &self.games
    }

    // ---- groups -----------------------------------------------------------

    /// Create a group we own. The creator is always a member. Returns the
    /// effective member list.
    pub fn create_own_group(
        &mut self,
        group_id: String,
        name: String,
        mut members: Vec<UserId>,
        timestamp: u64,
    ) -> Result<Vec<UserId>, StoreError> {
        let own = self
            .own_user_id()
            .cloned()
            .ok_or(StoreError::ProfileNotSet)?;
        if !members.contains(&own) {
            members.push(own.clone());
        }
        let group = Group::new(name, members, own, timestamp);
        let effective = group.members.clone();
        self.groups.insert(group_id.clone(), group);
        self.owned_groups.insert(group_id);
        Ok(effective)
    }

    /// Incoming GROUP_CREATE: only honored when we are on the member list,
    /// and newest creation wins against anything already recorded.
    pub fn handle_group_create(
        &mut self,
        from: UserId,
        group_id: String,
        name: String,
        members: Vec<UserId>,
        timestamp: u64,
    ) -> bool {
        let Some(own) = self.own_user_id() else {
            return false;
        };
        if !members.contains(own) {
            return false;
        }
        if let Some(existing) = self.groups.get(&group_id) {
            if existing.updated_at > timestamp {
                return false;
            }
        }
        self.groups
            .insert(group_id, Group::new(name, members, from, timestamp));
        true
    }

    pub fn is_group_owner(&self, group_id: &str) -> bool {
        self.owned_groups.contains(group_id)
    }

    /// Membership delta for a group we own.
    pub fn update_own_group(
        &mut self,
        group_id: &str,
        add: &[UserId],
        remove: &[UserId],
        timestamp: u64,
    ) -> Result<(), GroupError> {
        let own = self
            .own_user_id()
            .cloned()
            .ok_or_else(|| GroupError::Unknown(group_id.to_string()))?;
        let group = self
            .groups
            .get_mut(group_id)
            .ok_or_else(|| GroupError::Unknown(group_id.to_string()))?;
        group.apply_update(&own, add, remove, timestamp)
    }

    pub fn handle_group_update(
        &mut self,
        from: &UserId,
        group_id: &str,
        add: &[UserId],
        remove: &[UserId],
        timestamp: u64,
    ) -> Result<(), GroupError> {
        let group = self
            .groups
            .get_mut(group_id)
            .ok_or_else(|| GroupError::Unknown(group_id.to_string()))?;
        group.apply_update(from, add, remove, timestamp)
    }

    pub fn handle_group_message(
        &mut self,
        from: UserId,
        group_id: &str,
        content: String,
        timestamp: u64,
    ) -> Result<(), GroupError> {
        let group = self
            .groups
            .get_mut(group_id)
            .ok_or_else(|| GroupError::Unknown(group_id.to_string()))?;
        group.push_message(from, content, timestamp)
    }

    pub fn record_own_group_message(
        &mut self,
        group_id: &str,
        content: String,
        timestamp: u64,
    ) -> Result<(), GroupError> {
        let own = self
            .own_user_id()
            .cloned()
            .ok_or_else(|| GroupError::Unknown(group_id.to_string()))?;
        self.handle_group_message(own, group_id, content, timestamp)
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.get(group_id)
    }

    pub fn groups(&self) -> &HashMap<String, Group> {
        &self.groups
    }

    /// Unicast destinations for every current member except ourselves.
    pub fn group_recipient_addrs(&self, group_id: &str, default_port: u16) -> Vec<SocketAddr> {
        let Some(group) = self.groups.get(group_id) else {
            return Vec::new();
        };
        group
            .members
            .iter()
            .filter(|m| !self.is_own(m))
            .map(|m| self.addr_of(m, default_port))
            .collect()
    }

    // ---- file transfers ---------------------------------------------------

    pub fn register_file_offer(&mut self, file_id: String, file: IncomingFile) {
        self.incoming_files.insert(file_id, file);
    }

    pub fn store_file_chunk(
        &mut self,
        file_id: &str,
        index: u32,
        total: u32,
        data: &str,
    ) -> Result<ChunkProgress, FileError> {
        let file = self
            .incoming_files
            .get_mut(file_id)
            .ok_or_else(|| FileError::Unknown(file_id.to_string()))?;
        file.store_chunk(index, total, data)
    }

    pub fn incoming_file(&self, file_id: &str) -> Option<&IncomingFile> {
        self.incoming_files.get(file_id)
    }

    pub fn register_outgoing_file(&mut self, file_id: String, to: UserId, filename: String) {
        self.outgoing_files.insert(
            file_id,
            OutgoingFile {
                to,
                filename,
                acknowledged: false,
            },
        );
    }

    pub fn complete_outgoing_file(&mut self, file_id: &str) -> bool {
        match self.outgoing_files.get_mut(file_id) {
            Some(f) => {
                f.acknowledged = true;
                true
            }
            None => false,
        }
    }

    pub fn outgoing_file(&self, file_id: &str) -> Option<&OutgoingFile> {
        self.outgoing_files.get(file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    fn user(s: &str) -> UserId {
        s.parse().unwrap()
    }

    fn store_with_profile() -> PeerStore {
        let mut store = PeerStore::new();
        store
            .set_own_profile("bob", ip(2), "Bob".into(), "around".into(), None)
            .unwrap();
        store
    }

    fn dm(id: &str) -> DmRecord {
        DmRecord {
            content: "hi".into(),
            timestamp: 1000,
            message_id: id.parse().unwrap(),
            token: "alice@10.0.0.1|4600|chat".into(),
        }
    }

    #[test]
    fn username_is_immutable_after_first_set() {
        let mut store = store_with_profile();
        assert_eq!(
            store.set_own_profile("robert", ip(2), "Bob".into(), "x".into(), None),
            Err(StoreError::UsernameImmutable)
        );
        // same username: fields update fine
        let first = store
            .set_own_profile("bob", ip(2), "Bobby".into(), "busy".into(), None)
            .unwrap();
        assert!(!first);
        assert_eq!(store.own().unwrap().display_name, "Bobby");
    }

    #[test]
    fn followers_are_registered_once() {
        let mut store = store_with_profile();
        let bob = store.own_user_id().unwrap().clone();
        let alice = user("alice@10.0.0.1");

        assert!(store.add_follower(&bob, &alice));
        assert!(!store.add_follower(&bob, &alice));
        assert_eq!(store.followers(), &[alice.clone()]);

        assert!(store.remove_follower(&bob, &alice));
        assert!(!store.remove_follower(&bob, &alice));
        assert!(store.followers().is_empty());
    }

    #[test]
    fn follow_requests_addressed_elsewhere_are_ignored() {
        let mut store = store_with_profile();
        let alice = user("alice@10.0.0.1");
        let carol = user("carol@10.0.0.3");
        assert!(!store.add_follower(&carol, &alice));
        assert!(store.followers().is_empty());
    }

    #[test]
    fn cannot_follow_self() {
        let mut store = store_with_profile();
        let own = store.own_user_id().unwrap().clone();
        assert!(!store.follow(own.clone()));
        assert!(!store.is_following(&own));
        assert!(store.follow(user("alice@10.0.0.1")));
    }

    #[test]
    fn duplicate_dm_is_reported_not_stored() {
        let mut store = store_with_profile();
        let alice = user("alice@10.0.0.1");
        assert_eq!(store.add_dm(&alice, dm("0000000000000001")), DmDelivery::Stored);
        assert_eq!(
            store.add_dm(&alice, dm("0000000000000001")),
            DmDelivery::Duplicate
        );
        assert_eq!(store.peer(&alice).unwrap().dms.len(), 1);
    }

    #[test]
    fn own_posts_never_land_in_a_peer_record() {
        let mut store = store_with_profile();
        store.add_own_post(Post {
            content: "mine".into(),
            timestamp: Some(1),
            ttl: 3600,
            message_id: MessageId::random(),
            token: "bob@10.0.0.2|999|broadcast".into(),
        });
        let own = store.own_user_id().unwrap().clone();
        assert_eq!(store.own_posts().len(), 1);
        assert!(store.peer(&own).map_or(true, |p| p.posts.is_empty()));
    }

    #[test]
    fn pending_ack_is_unique_per_message_id() {
        let mut store = store_with_profile();
        let id: MessageId = "00000000000000aa".parse().unwrap();
        let addr: SocketAddr = "10.0.0.1:50999".parse().unwrap();
        assert!(store.insert_pending_ack(id.clone(), "frame".into(), addr));
        assert!(!store.insert_pending_ack(id.clone(), "frame".into(), addr));
        assert_eq!(store.pending_ack_count(), 1);
        assert!(store.clear_pending_ack(&id));
        assert!(!store.clear_pending_ack(&id));
    }

    #[test]
    fn retransmits_are_bounded_then_dropped() {
        let mut store = store_with_profile();
        let id: MessageId = "00000000000000ab".parse().unwrap();
        let addr: SocketAddr = "10.0.0.1:50999".parse().unwrap();
        store.insert_pending_ack(id.clone(), "frame".into(), addr);

        // with a zero timeout every pass is overdue immediately
        let b1 = store.due_retransmits(Duration::ZERO, 3);
        assert_eq!(b1.resend.len(), 1);
        assert_eq!(b1.resend[0].attempt, 2);
        let b2 = store.due_retransmits(Duration::ZERO, 3);
        assert_eq!(b2.resend[0].attempt, 3);
        let b3 = store.due_retransmits(Duration::ZERO, 3);
        assert!(b3.resend.is_empty());
        assert_eq!(b3.dropped, vec![id]);
        assert_eq!(store.pending_ack_count(), 0);
    }

    #[test]
    fn group_create_requires_membership() {
        let mut store = store_with_profile();
        let carol = user("carol@10.0.0.3");
        assert!(!store.handle_group_create(
            carol.clone(),
            "grp1".into(),
            "No Bobs".into(),
            vec![carol.clone(), user("alice@10.0.0.1")],
            100,
        ));
        assert!(store.group("grp1").is_none());

        let own = store.own_user_id().unwrap().clone();
        assert!(store.handle_group_create(
            carol.clone(),
            "grp2".into(),
            "Bobs Welcome".into(),
            vec![carol.clone(), own],
            100,
        ));
        assert_eq!(store.group("grp2").unwrap().creator, carol);
    }

    #[test]
    fn likes_keep_only_latest_action_per_user() {
        let mut store = store_with_profile();
        store.add_own_post(Post {
            content: "sunset pic".into(),
            timestamp: Some(500),
            ttl: 3600,
            message_id: MessageId::random(),
            token: "bob@10.0.0.2|999|broadcast".into(),
        });
        let alice = user("alice@10.0.0.1");
        assert!(store.record_received_like(alice.clone(), 500, LikeAction::Like, 600));
        assert!(store.record_received_like(alice.clone(), 500, LikeAction::Like, 601));
        assert_eq!(store.received_likes().len(), 1);
        assert!(store.record_received_like(alice.clone(), 500, LikeAction::Unlike, 602));
        assert!(store.received_likes().is_empty());
        // a like on a post we never made is refused
        assert!(!store.record_received_like(alice, 999, LikeAction::Like, 603));
    }

    #[test]
    fn addr_prefers_last_seen_source() {
        let mut store = store_with_profile();
        let alice = user("alice@10.0.0.1");
        assert_eq!(
            store.addr_of(&alice, 50999),
            "10.0.0.1:50999".parse().unwrap()
        );
        let observed: SocketAddr = "10.0.0.1:61001".parse().unwrap();
        store.note_peer_addr(&alice, observed);
        assert_eq!(store.addr_of(&alice, 50999), observed);
    }
}

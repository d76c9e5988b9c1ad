//! Outbound primitives the shell drives.
//!
//! Every primitive builds the frame, validates its own freshly minted
//! token, transmits, records the local side effects, and appends the token
//! to the issued list so it can be revoked at shutdown. The store lock is
//! never held across a send except where a reactive reply belongs to the
//! same critical section.

use anyhow::{anyhow, bail, Result};
use futures::future::join_all;

use lsnp_core::{
    new_file_id, new_game_id, new_group_id, unix_now, validate_token, Avatar, LikeAction, Message,
    MessageId, Scope, Symbol, Token, UserId,
};
use lsnp_peer::{encode_chunks, GameSession, PeerStore, Post};

use crate::logging;
use crate::node::Node;
use crate::transport;

/// Raw bytes carried per FILE_CHUNK before base64 expansion.
const CHUNK_RAW_BYTES: usize = 1024;

/// Mint a token and run it through the same validation the receiver will.
fn mint_checked(
    store: &PeerStore,
    own: &UserId,
    now: u64,
    ttl: u64,
    scope: Scope,
    msg_type: &str,
) -> Result<String> {
    let raw = Token::mint(own.clone(), now, ttl, scope).to_string();
    if let Err(e) = validate_token(&raw, scope, now, store.revoked_tokens()) {
        logging::log_reject(msg_type, &e);
        bail!("{msg_type} rejected: {e}");
    }
    Ok(raw)
}

fn own_id(store: &PeerStore) -> Result<UserId> {
    store
        .own_user_id()
        .cloned()
        .ok_or_else(|| anyhow!("own profile is not set"))
}

impl Node {
    /// Create or update the local profile and announce it immediately.
    pub async fn set_profile(
        &self,
        username: &str,
        display_name: &str,
        status: &str,
        avatar: Option<Avatar>,
    ) -> Result<()> {
        let announce = {
            let mut store = self.store.lock().await;
            store.set_own_profile(
                username,
                self.local_ip,
                display_name.to_string(),
                status.to_string(),
                avatar,
            )?;
            store.profile_message()
        };
        if let Some(msg) = announce {
            transport::send_message(&self.socket, &msg, self.broadcast_dest).await;
        }
        Ok(())
    }

    /// Publish a post to everyone currently following us, one unicast each.
    pub async fn post(&self, content: &str) -> Result<MessageId> {
        let now = unix_now();
        let (msg, dests, message_id) = {
            let mut store = self.store.lock().await;
            let own = own_id(&store)?;
            let token = mint_checked(&store, &own, now, self.cfg.token_ttl, Scope::Broadcast, "POST")?;
            let message_id = MessageId::random();
            store.add_own_post(Post {
                content: content.to_string(),
                timestamp: Some(now),
                ttl: self.cfg.token_ttl,
                message_id: message_id.clone(),
                token: token.clone(),
            });
            store.issue_token(token.clone());
            let msg = Message::Post {
                user_id: own,
                content: content.to_string(),
                ttl: self.cfg.token_ttl,
                message_id: message_id.clone(),
                timestamp: Some(now),
                token,
            };
            (msg, store.follower_addrs(self.port), message_id)
        };
        join_all(
            dests
                .iter()
                .map(|addr| transport::send_message(&self.socket, &msg, *addr)),
        )
        .await;
        Ok(message_id)
    }

    /// Send a reliable direct message; it stays in the pending table until
    /// the ACK lands or the retransmit budget runs out.
    pub async fn dm(&self, to: &UserId, content: &str) -> Result<MessageId> {
        let now = unix_now();
        let (msg, addr, message_id) = {
            let mut store = self.store.lock().await;
            let own = own_id(&store)?;
            let token = mint_checked(&store, &own, now, self.cfg.token_ttl, Scope::Chat, "DM")?;
            let message_id = MessageId::random();
            let msg = Message::Dm {
                from: own,
                to: to.clone(),
                content: content.to_string(),
                timestamp: now,
                message_id: message_id.clone(),
                token: token.clone(),
            };
            let addr = store.addr_of(to, self.port);
            store.insert_pending_ack(message_id.clone(), msg.craft(), addr);
            store.issue_token(token);
            (msg, addr, message_id)
        };
        transport::send_message(&self.socket, &msg, addr).await;
        Ok(message_id)
    }

    pub async fn follow(&self, target: &UserId) -> Result<()> {
        let now = unix_now();
        let (msg, addr) = {
            let mut store = self.store.lock().await;
            let own = own_id(&store)?;
            if own == *target {
                bail!("cannot follow yourself");
            }
            let token = mint_checked(&store, &own, now, self.cfg.token_ttl, Scope::Follow, "FOLLOW")?;
            store.follow(target.clone());
            store.issue_token(token.clone());
            let msg = Message::Follow {
                from: own,
                to: target.clone(),
                message_id: MessageId::random(),
                timestamp: now,
                token,
            };
            (msg, store.addr_of(target, self.port))
        };
        transport::send_message(&self.socket, &msg, addr).await;
        Ok(())
    }

    pub async fn unfollow(&self, target: &UserId) -> Result<()> {
        let now = unix_now();
        let (msg, addr) = {
            let mut store = self.store.lock().await;
            let own = own_id(&store)?;
            if !store.is_following(target) {
                bail!("not following {target}");
            }
            let token =
                mint_checked(&store, &own, now, self.cfg.token_ttl, Scope::Follow, "UNFOLLOW")?;
            store.unfollow(target);
            store.issue_token(token.clone());
            let msg = Message::Unfollow {
                from: own,
                to: target.clone(),
                message_id: MessageId::random(),
                timestamp: now,
                token,
            };
            (msg, store.addr_of(target, self.port))
        };
        transport::send_message(&self.socket, &msg, addr).await;
        Ok(())
    }

    /// Like or unlike a post we hold from a user we follow.
    pub async fn like(&self, target: &UserId, post_timestamp: u64, action: LikeAction) -> Result<()> {
        let now = unix_now();
        let (msg, addr) = {
            let mut store = self.store.lock().await;
            let own = own_id(&store)?;
            if !store.is_following(target) {
                bail!("can only like posts of users you follow");
            }
            let content = store
                .peer(target)
                .and_then(|p| {
                    p.posts
                        .iter()
                        .find(|post| post.timestamp == Some(post_timestamp))
                })
                .map(|post| post.content.clone())
                .ok_or_else(|| anyhow!("no post from {target} at {post_timestamp}"))?;
            let token =
                mint_checked(&store, &own, now, self.cfg.token_ttl, Scope::Broadcast, "LIKE")?;
            store.record_sent_like(target, post_timestamp, action, content, now)?;
            store.issue_token(token.clone());
            let msg = Message::Like {
                from: own,
                to: target.clone(),
                post_timestamp,
                action,
                timestamp: now,
                token,
            };
            (msg, store.addr_of(target, self.port))
        };
        transport::send_message(&self.socket, &msg, addr).await;
        Ok(())
    }

    /// Invite a peer to a game. We are X and move first.
    pub async fn invite_game(&self, opponent: &UserId) -> Result<String> {
        let now = unix_now();
        let (msg, addr, game_id) = {
            let mut store = self.store.lock().await;
            let own = own_id(&store)?;
            let token = mint_checked(
                &store,
                &own,
                now,
                self.cfg.token_ttl,
                Scope::Game,
                "TICTACTOE_INVITE",
            )?;
            let game_id = new_game_id();
            let session = GameSession::initiated(opponent.clone(), token.clone());
            if !store.insert_game(game_id.clone(), session) {
                bail!("game id collision, try again");
            }
            store.issue_token(token.clone());
            let msg = Message::TicTacToeInvite {
                from: own,
                recipient: opponent.clone(),
                message_id: MessageId::random(),
                game_id: game_id.clone(),
                symbol: Symbol::X,
                timestamp: now,
                token,
            };
            (msg, store.addr_of(opponent, self.port), game_id)
        };
        transport::send_message(&self.socket, &msg, addr).await;
        Ok(game_id)
    }

    /// Place our mark. Emits the MOVE, and the RESULT too when this move
    /// ends the game. Returns the board for display.
    pub async fn play_move(&self, game_id: &str, position: u8) -> Result<String> {
        let now = unix_now();
        let (move_msg, result_msg, addr, board) = {
            let mut store = self.store.lock().await;
            let own = own_id(&store)?;
            let token = mint_checked(
                &store,
                &own,
                now,
                self.cfg.token_ttl,
                Scope::Game,
                "TICTACTOE_MOVE",
            )?;
            let game = store
                .game_mut(game_id)
                .ok_or_else(|| anyhow!("no active game {game_id}"))?;
            let turn = game.turn;
            game.apply_local_move(position)?;
            let opponent = game.opponent.clone();
            let symbol = game.my_symbol;
            let board = game.render();
            let outcome = game.outcome();

            let addr = store.addr_of(&opponent, self.port);
            store.issue_token(token.clone());
            let move_msg = Message::TicTacToeMove {
                from: own.clone(),
                recipient: opponent.clone(),
                game_id: game_id.to_string(),
                message_id: MessageId::random(),
                turn,
                position,
                symbol,
                token,
            };
            let result_msg = outcome.map(|(result, win)| {
                store.remove_game(game_id);
                Message::TicTacToeResult {
                    from: own,
                    to: opponent,
                    game_id: game_id.to_string(),
                    message_id: MessageId::random(),
                    result,
                    symbol: win.map(|(s, _)| s),
                    winning_line: win.map(|(_, line)| line),
                    timestamp: now,
                }
            });
            (move_msg, result_msg, addr, board)
        };
        transport::send_message(&self.socket, &move_msg, addr).await;
        if let Some(result_msg) = result_msg {
            transport::send_message(&self.socket, &result_msg, addr).await;
        }
        Ok(board)
    }

    /// Create a group and announce it to every member.
    pub async fn create_group(&self, name: &str, members: Vec<UserId>) -> Result<String> {
        let now = unix_now();
        let (msg, dests, group_id) = {
            let mut store = self.store.lock().await;
            let own = own_id(&store)?;
            let token =
                mint_checked(&store, &own, now, self.cfg.token_ttl, Scope::Group, "GROUP_CREATE")?;
            let group_id = new_group_id();
            let members = store.create_own_group(group_id.clone(), name.to_string(), members, now)?;
            store.issue_token(token.clone());
            let msg = Message::GroupCreate {
                from: own,
                group_id: group_id.clone(),
                group_name: name.to_string(),
                members,
                timestamp: now,
                token,
            };
            let dests = store.group_recipient_addrs(&group_id, self.port);
            (msg, dests, group_id)
        };
        join_all(
            dests
                .iter()
                .map(|addr| transport::send_message(&self.socket, &msg, *addr)),
        )
        .await;
        Ok(group_id)
    }

    /// Change membership of a group we created.
    pub async fn update_group(
        &self,
        group_id: &str,
        add: Vec<UserId>,
        remove: Vec<UserId>,
    ) -> Result<()> {
        let now = unix_now();
        let (msg, dests) = {
            let mut store = self.store.lock().await;
            let own = own_id(&store)?;
            if !store.is_group_owner(group_id) {
                bail!("only the creator may update {group_id}");
            }
            let token =
                mint_checked(&store, &own, now, self.cfg.token_ttl, Scope::Group, "GROUP_UPDATE")?;
            store.update_own_group(group_id, &add, &remove, now)?;
            store.issue_token(token.clone());
            let msg = Message::GroupUpdate {
                from: own,
                group_id: group_id.to_string(),
                add,
                remove,
                timestamp: now,
                token,
            };
            // evicted members are already off the recipient list
            (msg, store.group_recipient_addrs(group_id, self.port))
        };
        join_all(
            dests
                .iter()
                .map(|addr| transport::send_message(&self.socket, &msg, *addr)),
        )
        .await;
        Ok(())
    }

    /// Say something to every current member of a group we belong to.
    pub async fn group_message(&self, group_id: &str, content: &str) -> Result<()> {
        let now = unix_now();
        let (msg, dests) = {
            let mut store = self.store.lock().await;
            let own = own_id(&store)?;
            match store.group(group_id) {
                Some(group) if group.is_member(&own) => {}
                Some(_) => bail!("not a member of {group_id}"),
                None => bail!("unknown group {group_id}"),
            }
            let token = mint_checked(
                &store,
                &own,
                now,
                self.cfg.token_ttl,
                Scope::Group,
                "GROUP_MESSAGE",
            )?;
            store.record_own_group_message(group_id, content.to_string(), now)?;
            store.issue_token(token.clone());
            let msg = Message::GroupMessage {
                from: own,
                group_id: group_id.to_string(),
                content: content.to_string(),
                timestamp: now,
                token,
            };
            (msg, store.group_recipient_addrs(group_id, self.port))
        };
        join_all(
            dests
                .iter()
                .map(|addr| transport::send_message(&self.socket, &msg, *addr)),
        )
        .await;
        Ok(())
    }

    /// Offer a file to a peer and stream its chunks. The payload rides in
    /// memory; one `file` token covers the offer and every chunk.
    pub async fn send_file(
        &self,
        to: &UserId,
        filename: &str,
        filetype: &str,
        bytes: &[u8],
        description: Option<String>,
    ) -> Result<String> {
        let now = unix_now();
        let (frames, addr, file_id) = {
            let mut store = self.store.lock().await;
            let own = own_id(&store)?;
            let token =
                mint_checked(&store, &own, now, self.cfg.token_ttl, Scope::File, "FILE_OFFER")?;
            let file_id = new_file_id();
            store.register_outgoing_file(file_id.clone(), to.clone(), filename.to_string());
            store.issue_token(token.clone());

            let chunks = encode_chunks(bytes, CHUNK_RAW_BYTES);
            let total_chunks = chunks.len() as u32;
            let mut frames = Vec::with_capacity(chunks.len() + 1);
            frames.push(Message::FileOffer {
                from: own.clone(),
                to: to.clone(),
                filename: filename.to_string(),
                filesize: bytes.len() as u64,
                filetype: filetype.to_string(),
                file_id: file_id.clone(),
                description,
                timestamp: now,
                token: token.clone(),
            });
            for (i, data) in chunks.into_iter().enumerate() {
                let chunk_size = if (i as u32) + 1 < total_chunks {
                    CHUNK_RAW_BYTES
                } else {
                    bytes.len() - CHUNK_RAW_BYTES * i
                };
                frames.push(Message::FileChunk {
                    from: own.clone(),
                    to: to.clone(),
                    file_id: file_id.clone(),
                    chunk_index: i as u32,
                    total_chunks,
                    chunk_size: chunk_size as u32,
                    data,
                    token: token.clone(),
                });
            }
            (frames, store.addr_of(to, self.port), file_id)
        };
        for msg in &frames {
            transport::send_message(&self.socket, msg, addr).await;
        }
        Ok(file_id)
    }

    /// Best-effort REVOKE broadcast for every token this process minted.
    pub async fn shutdown(&self) {
        let tokens = {
            let store = self.store.lock().await;
            store.issued_tokens().to_vec()
        };
        for token in tokens {
            let msg = Message::Revoke { token };
            transport::send_message(&self.socket, &msg, self.broadcast_dest).await;
        }
    }
}

//! Routes each inbound datagram to its per-TYPE handler.
//!
//! One datagram is one critical section: the handler takes the store lock,
//! validates the token, mutates state, and sends any reactive frame (ACK,
//! FILE_RECEIVED) before releasing. Replies go to the observed source
//! address of the datagram. Display events are emitted after the lock is
//! gone.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use lsnp_core::{
    unix_now, validate_token, Avatar, Frame, GameOutcome, LikeAction, Message, MessageId, Scope,
    Symbol, UserId,
};
use lsnp_peer::{ChunkProgress, DmDelivery, DmRecord, GameSession, IncomingFile, PeerStore, Post};

use crate::events::Event;
use crate::logging;
use crate::transport;

#[derive(Clone)]
pub(crate) struct Handler {
    pub socket: Arc<UdpSocket>,
    pub store: Arc<Mutex<PeerStore>>,
    pub events: mpsc::Sender<Event>,
}

/// Receiver-side token check, including the binding between the token's
/// `user` field and the claimed sender.
fn check_token(store: &PeerStore, raw: &str, scope: Scope, sender: &UserId, msg_type: &str) -> bool {
    match validate_token(raw, scope, unix_now(), store.revoked_tokens()) {
        Ok(token) if token.user == *sender => true,
        Ok(_) => {
            logging::log_reject(msg_type, "token user does not match sender");
            false
        }
        Err(e) => {
            logging::log_reject(msg_type, e);
            false
        }
    }
}

impl Handler {
    pub async fn handle_datagram(&self, raw: &[u8], src: SocketAddr) {
        let Ok(text) = std::str::from_utf8(raw) else {
            logging::log_parse(&src, "not valid UTF-8");
            return;
        };
        let frame = Frame::parse(text);
        let msg = match Message::from_frame(&frame) {
            Ok(msg) => msg,
            Err(e) => {
                logging::log_drop("frame", e);
                return;
            }
        };
        logging::log_recv(msg.msg_type(), &src);

        if let Some(event) = self.dispatch(msg, src).await {
            let _ = self.events.send(event).await;
        }
    }

    async fn dispatch(&self, msg: Message, src: SocketAddr) -> Option<Event> {
        match msg {
            Message::Profile {
                user_id,
                display_name,
                status,
                avatar,
            } => self.on_profile(user_id, display_name, status, avatar, src).await,
            Message::Ping { .. } => None,
            Message::Post {
                user_id,
                content,
                ttl,
                message_id,
                timestamp,
                token,
            } => {
                self.on_post(user_id, content, ttl, message_id, timestamp, token, src)
                    .await
            }
            Message::Dm {
                from,
                to,
                content,
                timestamp,
                message_id,
                token,
            } => {
                self.on_dm(from, to, content, timestamp, message_id, token, src)
                    .await
            }
            Message::Ack { message_id, .. } => self.on_ack(message_id).await,
            Message::Follow {
                from, to, token, ..
            } => self.on_follow(from, to, token, src).await,
            Message::Unfollow {
                from, to, token, ..
            } => self.on_unfollow(from, to, token, src).await,
            Message::Like {
                from,
                to,
                post_timestamp,
                action,
                timestamp,
                token,
            } => {
                self.on_like(from, to, post_timestamp, action, timestamp, token)
                    .await
            }
            Message::Revoke { token } => self.on_revoke(token).await,
            Message::TicTacToeInvite {
                from,
                recipient,
                game_id,
                symbol,
                token,
                ..
            } => self.on_game_invite(from, recipient, game_id, symbol, token, src).await,
            Message::TicTacToeMove {
                from,
                recipient,
                game_id,
                turn,
                position,
                symbol,
                token,
                ..
            } => {
                self.on_game_move(from, recipient, game_id, turn, position, symbol, token, src)
                    .await
            }
            Message::TicTacToeResult {
                to,
                game_id,
                result,
                symbol,
                ..
            } => self.on_game_result(to, game_id, result, symbol).await,
            Message::GroupCreate {
                from,
                group_id,
                group_name,
                members,
                timestamp,
                token,
            } => {
                self.on_group_create(from, group_id, group_name, members, timestamp, token, src)
                    .await
            }
            Message::GroupUpdate {
                from,
                group_id,
                add,
                remove,
                timestamp,
                token,
            } => {
                self.on_group_update(from, group_id, add, remove, timestamp, token, src)
                    .await
            }
            Message::GroupMessage {
                from,
                group_id,
                content,
                timestamp,
                token,
            } => {
                self.on_group_message(from, group_id, content, timestamp, token, src)
                    .await
            }
            Message::FileOffer {
                from,
                to,
                filename,
                filesize,
                filetype,
                file_id,
                description,
                token,
                ..
            } => {
                self.on_file_offer(
                    from, to, filename, filesize, filetype, file_id, description, token, src,
                )
                .await
            }
            Message::FileChunk {
                from,
                to,
                file_id,
                chunk_index,
                total_chunks,
                data,
                token,
                ..
            } => {
                self.on_file_chunk(from, to, file_id, chunk_index, total_chunks, data, token, src)
                    .await
            }
            Message::FileReceived {
                from, to, file_id, ..
            } => self.on_file_received(from, to, file_id).await,
        }
    }

    async fn on_profile(
        &self,
        user_id: UserId,
        display_name: String,
        status: String,
        avatar: Option<Avatar>,
        src: SocketAddr,
    ) -> Option<Event> {
        let mut store = self.store.lock().await;
        if store.is_own(&user_id) {
            // our own broadcast looped back
            return None;
        }
        store.add_or_update_peer(&user_id, &display_name, &status, avatar);
        store.note_peer_addr(&user_id, src);
        Some(Event::ProfileUpdated {
            user: user_id,
            display_name,
        })
    }

    async fn on_post(
        &self,
        user_id: UserId,
        content: String,
        ttl: u64,
        message_id: MessageId,
        timestamp: Option<u64>,
        token: String,
        src: SocketAddr,
    ) -> Option<Event> {
        let mut store = self.store.lock().await;
        if !check_token(&store, &token, Scope::Broadcast, &user_id, "POST") {
            return None;
        }
        if !store.is_following(&user_id) {
            debug!(target: "lsnp", "POST from {user_id} ignored (not following)");
            return None;
        }
        store.note_peer_addr(&user_id, src);
        store.add_post(
            &user_id,
            Post {
                content: content.clone(),
                timestamp,
                ttl,
                message_id,
                token,
            },
        );
        Some(Event::PostReceived {
            from: user_id,
            content,
        })
    }

    async fn on_dm(
        &self,
        from: UserId,
        to: UserId,
        content: String,
        timestamp: u64,
        message_id: MessageId,
        token: String,
        src: SocketAddr,
    ) -> Option<Event> {
        let mut store = self.store.lock().await;
        if !store.is_own(&to) {
            debug!(target: "lsnp", "DM addressed to {to} ignored");
            return None;
        }
        if !check_token(&store, &token, Scope::Chat, &from, "DM") {
            return None;
        }
        store.note_peer_addr(&from, src);
        let delivery = store.add_dm(
            &from,
            DmRecord {
                content: content.clone(),
                timestamp,
                message_id: message_id.clone(),
                token,
            },
        );
        // duplicates mean our earlier ACK was lost; answer again either way
        let ack = Message::Ack {
            message_id,
            status: "RECEIVED".into(),
        };
        transport::send_message(&self.socket, &ack, src).await;
        match delivery {
            DmDelivery::Stored => Some(Event::DmReceived { from, content }),
            DmDelivery::Duplicate => None,
        }
    }

    async fn on_ack(&self, message_id: MessageId) -> Option<Event> {
        let mut store = self.store.lock().await;
        if store.clear_pending_ack(&message_id) {
            Some(Event::DmAcked { message_id })
        } else {
            None
        }
    }

    async fn on_follow(
        &self,
        from: UserId,
        to: UserId,
        token: String,
        src: SocketAddr,
    ) -> Option<Event> {
        let mut store = self.store.lock().await;
        if !store.is_own(&to) {
            return None;
        }
        if !check_token(&store, &token, Scope::Follow, &from, "FOLLOW") {
            return None;
        }
        store.note_peer_addr(&from, src);
        if store.add_follower(&to, &from) {
            Some(Event::FollowerAdded { user: from })
        } else {
            None
        }
    }

    async fn on_unfollow(
        &self,
        from: UserId,
        to: UserId,
        token: String,
        src: SocketAddr,
    ) -> Option<Event> {
        let mut store = self.store.lock().await;
        if !store.is_own(&to) {
            return None;
        }
        if !check_token(&store, &token, Scope::Follow, &from, "UNFOLLOW") {
            return None;
        }
        store.note_peer_addr(&from, src);
        if store.remove_follower(&to, &from) {
            Some(Event::FollowerRemoved { user: from })
        } else {
            None
        }
    }

    async fn on_like(
        &self,
        from: UserId,
        to: UserId,
        post_timestamp: u64,
        action: LikeAction,
        timestamp: u64,
        token: String,
    ) -> Option<Event> {
        let mut store = self.store.lock().await;
        if !store.is_own(&to) {
            return None;
        }
        if !check_token(&store, &token, Scope::Broadcast, &from, "LIKE") {
            return None;
        }
        if store.record_received_like(from.clone(), post_timestamp, action, timestamp) {
            Some(Event::LikeReceived {
                from,
                action,
                post_timestamp,
            })
        } else {
            logging::log_drop("LIKE", format!("no post of ours at {post_timestamp}"));
            None
        }
    }

    async fn on_revoke(&self, token: String) -> Option<Event> {
        let mut store = self.store.lock().await;
        if store.revoke_token(token.clone()) {
            debug!(target: "lsnp", "token revoked: {token}");
        }
        None
    }

    async fn on_game_invite(
        &self,
        from: UserId,
        recipient: UserId,
        game_id: String,
        symbol: Symbol,
        token: String,
        src: SocketAddr,
    ) -> Option<Event> {
        let mut store = self.store.lock().await;
        if !store.is_own(&recipient) {
            return None;
        }
        if !check_token(&store, &token, Scope::Game, &from, "TICTACTOE_INVITE") {
            return None;
        }
        store.note_peer_addr(&from, src);
        let session = GameSession::invited(from.clone(), symbol, token);
        if !store.insert_game(game_id.clone(), session) {
            debug!(target: "lsnp", "duplicate invite for game {game_id} ignored");
            return None;
        }
        Some(Event::GameInvite {
            game_id,
            from,
            my_symbol: symbol.other(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_game_move(
        &self,
        from: UserId,
        recipient: UserId,
        game_id: String,
        turn: u32,
        position: u8,
        symbol: Symbol,
        token: String,
        src: SocketAddr,
    ) -> Option<Event> {
        let mut store = self.store.lock().await;
        if !store.is_own(&recipient) {
            return None;
        }
        if !check_token(&store, &token, Scope::Game, &from, "TICTACTOE_MOVE") {
            return None;
        }
        store.note_peer_addr(&from, src);
        let Some(game) = store.game_mut(&game_id) else {
            logging::log_drop("TICTACTOE_MOVE", format!("unknown game {game_id}"));
            return None;
        };
        if let Err(e) = game.apply_remote_move(turn, position, symbol) {
            logging::log_drop("TICTACTOE_MOVE", e);
            return None;
        }
        let board = game.render();
        let my_turn = game.my_turn;
        Some(Event::GameBoard {
            game_id,
            board,
            my_turn,
        })
    }

    async fn on_game_result(
        &self,
        to: UserId,
        game_id: String,
        result: GameOutcome,
        symbol: Option<Symbol>,
    ) -> Option<Event> {
        let mut store = self.store.lock().await;
        if !store.is_own(&to) {
            return None;
        }
        let Some(game) = store.remove_game(&game_id) else {
            logging::log_drop("TICTACTOE_RESULT", format!("no active game {game_id}"));
            return None;
        };
        Some(Event::GameOver {
            game_id,
            result,
            winner_symbol: symbol,
            board: game.render(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_group_create(
        &self,
        from: UserId,
        group_id: String,
        group_name: String,
        members: Vec<UserId>,
        timestamp: u64,
        token: String,
        src: SocketAddr,
    ) -> Option<Event> {
        let mut store = self.store.lock().await;
        if store.is_own(&from) {
            return None;
        }
        if !check_token(&store, &token, Scope::Group, &from, "GROUP_CREATE") {
            return None;
        }
        store.note_peer_addr(&from, src);
        if store.handle_group_create(
            from.clone(),
            group_id.clone(),
            group_name.clone(),
            members,
            timestamp,
        ) {
            Some(Event::GroupCreated {
                group_id,
                name: group_name,
                creator: from,
            })
        } else {
            debug!(target: "lsnp", "GROUP_CREATE for {group_id} ignored (not a member or stale)");
            None
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_group_update(
        &self,
        from: UserId,
        group_id: String,
        add: Vec<UserId>,
        remove: Vec<UserId>,
        timestamp: u64,
        token: String,
        src: SocketAddr,
    ) -> Option<Event> {
        let mut store = self.store.lock().await;
        if store.is_own(&from) {
            return None;
        }
        if !check_token(&store, &token, Scope::Group, &from, "GROUP_UPDATE") {
            return None;
        }
        store.note_peer_addr(&from, src);
        match store.handle_group_update(&from, &group_id, &add, &remove, timestamp) {
            Ok(()) => Some(Event::GroupUpdated { group_id }),
            Err(e) => {
                logging::log_drop("GROUP_UPDATE", e);
                None
            }
        }
    }

    async fn on_group_message(
        &self,
        from: UserId,
        group_id: String,
        content: String,
        timestamp: u64,
        token: String,
        src: SocketAddr,
    ) -> Option<Event> {
        let mut store = self.store.lock().await;
        if store.is_own(&from) {
            return None;
        }
        if !check_token(&store, &token, Scope::Group, &from, "GROUP_MESSAGE") {
            return None;
        }
        store.note_peer_addr(&from, src);
        match store.handle_group_message(from.clone(), &group_id, content.clone(), timestamp) {
            Ok(()) => Some(Event::GroupMessageReceived {
                group_id,
                from,
                content,
            }),
            Err(e) => {
                logging::log_drop("GROUP_MESSAGE", e);
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_file_offer(
        &self,
        from: UserId,
        to: UserId,
        filename: String,
        filesize: u64,
        filetype: String,
        file_id: String,
        description: Option<String>,
        token: String,
        src: SocketAddr,
    ) -> Option<Event> {
        let mut store = self.store.lock().await;
        if !store.is_own(&to) {
            return None;
        }
        if !check_token(&store, &token, Scope::File, &from, "FILE_OFFER") {
            return None;
        }
        store.note_peer_addr(&from, src);
        store.register_file_offer(
            file_id.clone(),
            IncomingFile::new(
                from.clone(),
                filename.clone(),
                filesize,
                filetype,
                description,
            ),
        );
        Some(Event::FileOffered {
            file_id,
            from,
            filename,
            filesize,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_file_chunk(
        &self,
        from: UserId,
        to: UserId,
        file_id: String,
        chunk_index: u32,
        total_chunks: u32,
        data: String,
        token: String,
        src: SocketAddr,
    ) -> Option<Event> {
        let mut store = self.store.lock().await;
        if !store.is_own(&to) {
            return None;
        }
        if !check_token(&store, &token, Scope::File, &from, "FILE_CHUNK") {
            return None;
        }
        match store.store_file_chunk(&file_id, chunk_index, total_chunks, &data) {
            Ok(ChunkProgress::Pending(received, total)) => {
                debug!(target: "lsnp", "file {file_id}: {received}/{total} chunks");
                None
            }
            Ok(ChunkProgress::Complete) => {
                let own = store.own_user_id().cloned()?;
                let (filename, size) = {
                    let file = store.incoming_file(&file_id)?;
                    (
                        file.filename.clone(),
                        file.payload().map(|p| p.len()).unwrap_or_default(),
                    )
                };
                let receipt = Message::FileReceived {
                    from: own,
                    to: from.clone(),
                    file_id: file_id.clone(),
                    status: "COMPLETE".into(),
                    timestamp: unix_now(),
                };
                transport::send_message(&self.socket, &receipt, src).await;
                Some(Event::FileCompleted {
                    file_id,
                    from,
                    filename,
                    size,
                })
            }
            Err(e) => {
                logging::log_drop("FILE_CHUNK", e);
                None
            }
        }
    }

    async fn on_file_received(&self, from: UserId, to: UserId, file_id: String) -> Option<Event> {
        let mut store = self.store.lock().await;
        if !store.is_own(&to) {
            return None;
        }
        if store.complete_outgoing_file(&file_id) {
            Some(Event::FileDelivered { file_id, by: from })
        } else {
            None
        }
    }
}

//! Domain state for one LSNP peer process: the peer catalog, tic-tac-toe
//! sessions, group membership, and file-transfer reassembly.
//
// Modules
pub mod file;
pub mod game;
pub mod group;
pub mod store;

pub use file::{encode_chunks, ChunkProgress, FileError, IncomingFile};
pub use game::{GameSession, MoveError};
pub use group::{Group, GroupError, GroupMessageRecord};
pub use store::{
    DmDelivery, DmRecord, LikeRecord, OutgoingFile, OwnProfile, Peer, PeerStore, PendingAck, Post,
    Retry, RetryBatch, StoreError,
};

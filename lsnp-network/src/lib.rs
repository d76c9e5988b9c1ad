//! LSNP networking: one UDP socket, broadcast discovery, a per-TYPE
//! dispatcher, reliable DMs, and the outbound primitives a shell drives.
//!
//! Responsibilities
//! ----------------
//! • Bind the shared socket (`SO_REUSEADDR` + `SO_BROADCAST`) and run the
//!   receive loop.
//! • Periodically broadcast presence (PROFILE / PING).
//! • Retransmit unacknowledged DMs on a watcher tick, bounded attempts.
//! • Route every parsed frame through the per-TYPE state machines.
//! • Forward display-worthy happenings to the caller over an mpsc channel.
//! • Expose the outbound action primitives as methods on [`Node`].

mod actions;
mod broadcaster;
pub mod config;
pub mod discovery;
mod dispatcher;
pub mod events;
pub mod logging;
mod node;
mod reliability;
pub mod transport;

pub use config::{Config, DEFAULT_PORT};
pub use events::Event;
pub use node::Node;

//! Protocol event log helpers.
//!
//! Thin wrappers over `tracing` that keep the terminal taxonomy uniform:
//! SEND/RECV/RETRY at debug (the verbose view), DROP/REJECT/PARSE at warn,
//! socket failures at error.

use std::fmt;
use std::net::SocketAddr;

use tracing::{debug, error, warn};

use lsnp_core::MessageId;

pub fn log_send(msg_type: &str, dest: &SocketAddr) {
    debug!(target: "lsnp", "SEND {msg_type} -> {dest}");
}

pub fn log_recv(msg_type: &str, src: &SocketAddr) {
    debug!(target: "lsnp", "RECV {msg_type} <- {src}");
}

pub fn log_drop(context: &str, reason: impl fmt::Display) {
    warn!(target: "lsnp", "DROP {context}: {reason}");
}

pub fn log_reject(msg_type: &str, reason: impl fmt::Display) {
    warn!(target: "lsnp", "REJECT {msg_type}: {reason}");
}

pub fn log_retry(message_id: &MessageId, attempt: u32) {
    debug!(target: "lsnp", "RETRY {message_id} (attempt {attempt})");
}

pub fn log_parse(src: &SocketAddr, reason: impl fmt::Display) {
    warn!(target: "lsnp", "PARSE dropped datagram from {src}: {reason}");
}

pub fn log_send_error(msg_type: &str, dest: &SocketAddr, err: impl fmt::Display) {
    error!(target: "lsnp", "ERROR sending {msg_type} to {dest}: {err}");
}

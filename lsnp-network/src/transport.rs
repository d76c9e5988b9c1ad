//! The one UDP socket everything speaks through.
//!
//! Built via `socket2` so `SO_REUSEADDR` and `SO_BROADCAST` are set before
//! the bind, then handed to tokio. Sends are best-effort: a failed
//! `send_to` is logged and forgotten (the DM retransmission path is the
//! only retry mechanism in the protocol).

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use lsnp_core::Message;

use crate::logging;

/// Hard ceiling on datagram size.
pub const MAX_DATAGRAM: usize = 65_535;

/// Bind the shared socket. Must run inside a tokio runtime.
pub fn bind_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

/// Serialize and transmit one frame, one `send_to` per call.
pub async fn send_message(socket: &UdpSocket, msg: &Message, addr: SocketAddr) {
    let payload = msg.craft();
    match socket.send_to(payload.as_bytes(), addr).await {
        Ok(_) => logging::log_send(msg.msg_type(), &addr),
        Err(e) => logging::log_send_error(msg.msg_type(), &addr, e),
    }
}

/// Transmit an already-crafted frame (retransmissions resend the original
/// bytes untouched).
pub async fn send_raw(socket: &UdpSocket, payload: &str, addr: SocketAddr) {
    if let Err(e) = socket.send_to(payload.as_bytes(), addr).await {
        logging::log_send_error("frame", &addr, e);
    }
}

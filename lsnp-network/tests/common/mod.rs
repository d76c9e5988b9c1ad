//! Shared plumbing for the loopback integration tests: a scripted "remote
//! peer" on a plain UDP socket talking to a real node.

// each test binary uses a different subset of these helpers
#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};

use lsnp_core::{unix_now, Frame, Message, Scope, Token, UserId};
use lsnp_network::{Config, Event, Node};
use lsnp_peer::PeerStore;

pub fn test_config() -> Config {
    Config {
        port: 0,
        // keep every frame on the loopback, never the LAN
        broadcast_addr: Some(Ipv4Addr::LOCALHOST),
        broadcast_period_secs: 300,
        ..Config::default()
    }
}

/// Bind a node on an ephemeral port and start its loops.
pub async fn start_node(cfg: Config) -> (Node, SocketAddr, mpsc::Receiver<Event>) {
    let node = Node::bind(cfg).await.expect("bind node");
    let (tx, rx) = mpsc::channel(64);
    node.start(tx);
    let port = node.local_addr().expect("local addr").port();
    (node, SocketAddr::from(([127, 0, 0, 1], port)), rx)
}

pub async fn harness_socket() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.expect("bind harness")
}

pub async fn send(socket: &UdpSocket, msg: &Message, to: SocketAddr) {
    socket
        .send_to(msg.craft().as_bytes(), to)
        .await
        .expect("send frame");
}

pub async fn send_text(socket: &UdpSocket, raw: &[u8], to: SocketAddr) {
    socket.send_to(raw, to).await.expect("send raw");
}

/// Next inbound frame on the harness socket, or None on timeout.
pub async fn recv_frame(socket: &UdpSocket, timeout: Duration) -> Option<Frame> {
    let mut buf = vec![0u8; 65_535];
    match tokio::time::timeout(timeout, socket.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => {
            let text = std::str::from_utf8(&buf[..len]).expect("frame is UTF-8");
            Some(Frame::parse(text))
        }
        _ => None,
    }
}

/// Poll a store predicate until it holds or the suite gives up.
pub async fn eventually<F>(store: &Arc<Mutex<PeerStore>>, mut probe: F, what: &str)
where
    F: FnMut(&PeerStore) -> bool,
{
    for _ in 0..200 {
        if probe(&*store.lock().await) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}

pub fn user(s: &str) -> UserId {
    s.parse().expect("user id")
}

pub fn token_for(user: &UserId, scope: Scope) -> String {
    Token::mint(user.clone(), unix_now(), 3600, scope).to_string()
}

pub fn profile_of(user: &UserId, display_name: &str) -> Message {
    Message::Profile {
        user_id: user.clone(),
        display_name: display_name.to_string(),
        status: "testing".to_string(),
        avatar: None,
    }
}

//! One LSNP peer process: the shared socket, the peer store, and the three
//! background loops (receive, presence broadcast, ACK watcher).

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use lsnp_peer::PeerStore;

use crate::broadcaster;
use crate::config::Config;
use crate::discovery;
use crate::dispatcher::Handler;
use crate::events::Event;
use crate::reliability;
use crate::transport::{self, MAX_DATAGRAM};

pub struct Node {
    pub(crate) cfg: Config,
    pub(crate) socket: Arc<UdpSocket>,
    pub(crate) store: Arc<Mutex<PeerStore>>,
    pub(crate) local_ip: Ipv4Addr,
    /// Port peers are addressed at: the configured one, or the actually
    /// bound one when the config asked for an ephemeral bind.
    pub(crate) port: u16,
    pub(crate) broadcast_dest: SocketAddr,
}

impl Node {
    /// Bind the UDP socket. The only fatal failure in the process
    /// lifecycle; everything after this is logged and survived.
    pub async fn bind(cfg: Config) -> Result<Node> {
        let socket = transport::bind_socket(SocketAddr::from(([0, 0, 0, 0], cfg.port)))
            .with_context(|| format!("failed to bind UDP port {}", cfg.port))?;
        let bound_port = socket.local_addr()?.port();
        let port = if cfg.port != 0 { cfg.port } else { bound_port };
        let broadcast_ip = cfg
            .broadcast_addr
            .unwrap_or_else(discovery::broadcast_address);
        let local_ip = discovery::local_ip();
        info!("listening on 0.0.0.0:{bound_port}, broadcasting to {broadcast_ip}:{port}");
        Ok(Node {
            cfg,
            socket: Arc::new(socket),
            store: Arc::new(Mutex::new(PeerStore::new())),
            local_ip,
            port,
            broadcast_dest: SocketAddr::from((broadcast_ip, port)),
        })
    }

    /// Spawn the background tasks. The caller keeps the receiving half of
    /// the event channel and renders whatever it cares about.
    pub fn start(&self, events: mpsc::Sender<Event>) {
        let handler = Handler {
            socket: Arc::clone(&self.socket),
            store: Arc::clone(&self.store),
            events,
        };
        tokio::spawn(recv_loop(Arc::clone(&self.socket), handler));
        reliability::spawn_ack_watcher(
            Arc::clone(&self.socket),
            Arc::clone(&self.store),
            self.cfg.clone(),
        );
        broadcaster::spawn_broadcaster(
            Arc::clone(&self.socket),
            Arc::clone(&self.store),
            self.cfg.clone(),
            self.broadcast_dest,
        );
    }

    pub fn store(&self) -> Arc<Mutex<PeerStore>> {
        Arc::clone(&self.store)
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn local_ip(&self) -> Ipv4Addr {
        self.local_ip
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Port used when addressing peers by UserId.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn broadcast_dest(&self) -> SocketAddr {
        self.broadcast_dest
    }
}

async fn recv_loop(socket: Arc<UdpSocket>, handler: Handler) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, src)) => handler.handle_datagram(&buf[..len], src).await,
            Err(e) => {
                warn!("UDP recv error: {e:?}");
            }
        }
    }
}

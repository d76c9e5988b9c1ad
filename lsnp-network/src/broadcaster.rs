//! Periodic presence announcements.
//!
//! While a profile is set, every period one frame goes to the broadcast
//! address: the full PROFILE and a bare PING, alternating. Either one tells
//! the subnet we exist; the PROFILE additionally refreshes names and
//! avatars on peers that missed earlier ones.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use lsnp_core::Message;
use lsnp_peer::PeerStore;

use crate::config::Config;
use crate::transport;

pub(crate) fn spawn_broadcaster(
    socket: Arc<UdpSocket>,
    store: Arc<Mutex<PeerStore>>,
    cfg: Config,
    dest: SocketAddr,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick: u64 = 0;
        loop {
            tokio::time::sleep(cfg.broadcast_period()).await;
            let msg = {
                let store = store.lock().await;
                match store.own() {
                    None => None,
                    Some(own) if tick % 2 == 1 => Some(Message::Ping {
                        user_id: own.user_id.clone(),
                    }),
                    Some(_) => store.profile_message(),
                }
            };
            tick = tick.wrapping_add(1);
            if let Some(msg) = msg {
                transport::send_message(&socket, &msg, dest).await;
            }
        }
    })
}

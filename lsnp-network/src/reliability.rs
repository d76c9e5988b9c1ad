//! DM retransmit-until-ack.
//!
//! A watcher ticks over the pending-ACK table, resending overdue frames
//! until the attempt budget runs out. The table mutation happens under the
//! store lock; the actual sends happen after it is released.

use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use lsnp_peer::PeerStore;

use crate::config::Config;
use crate::logging;
use crate::transport;

pub(crate) fn spawn_ack_watcher(
    socket: Arc<UdpSocket>,
    store: Arc<Mutex<PeerStore>>,
    cfg: Config,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(cfg.ack_tick());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let batch = {
                let mut store = store.lock().await;
                store.due_retransmits(cfg.dm_ack_timeout(), cfg.dm_max_attempts)
            };
            for message_id in &batch.dropped {
                logging::log_drop(
                    "DM",
                    format!(
                        "gave up on {message_id} after {} attempts",
                        cfg.dm_max_attempts
                    ),
                );
            }
            for retry in batch.resend {
                logging::log_retry(&retry.message_id, retry.attempt);
                transport::send_raw(&socket, &retry.payload, retry.addr).await;
            }
        }
    })
}

//! Runtime knobs, all defaulted so a bare `Config::default()` peer works
//! on a typical LAN.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 50999;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// UDP bind/send port. Port 0 binds ephemerally (handy in tests); the
    /// bound port is then used for outbound addressing too.
    pub port: u16,
    /// Default lifetime of minted tokens, in seconds.
    pub token_ttl: u64,
    /// Broadcast destination override. Unset means: derive the subnet
    /// broadcast address from the primary interface.
    pub broadcast_addr: Option<Ipv4Addr>,
    /// Seconds between presence announcements.
    pub broadcast_period_secs: u64,
    /// How long a DM may sit unacknowledged before a retransmit, in ms.
    pub dm_ack_timeout_ms: u64,
    /// Total transmissions (first send included) before a DM is dropped.
    pub dm_max_attempts: u32,
    /// ACK watcher tick, in ms.
    pub ack_tick_ms: u64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            port: DEFAULT_PORT,
            token_ttl: 3600,
            broadcast_addr: None,
            broadcast_period_secs: 30,
            dm_ack_timeout_ms: 2000,
            dm_max_attempts: 3,
            ack_tick_ms: 500,
        }
    }
}

impl Config {
    pub fn broadcast_period(&self) -> Duration {
        Duration::from_secs(self.broadcast_period_secs)
    }

    pub fn dm_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.dm_ack_timeout_ms)
    }

    pub fn ack_tick(&self) -> Duration {
        Duration::from_millis(self.ack_tick_ms)
    }
}

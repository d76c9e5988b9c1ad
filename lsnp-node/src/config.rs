//! Configuration layering: built-in defaults, then an optional JSON file,
//! then `LSNP_*` environment variables, then CLI flags.

use std::env;
use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use lsnp_network::Config;

#[derive(Debug, Parser)]
#[command(name = "lsnp-node", about = "LSNP peer with an interactive shell", version)]
pub struct Cli {
    /// JSON config file (all keys optional).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// UDP bind/send port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Broadcast destination override.
    #[arg(long)]
    pub broadcast_addr: Option<Ipv4Addr>,

    /// Default token lifetime in seconds.
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Presence announcement interval in seconds.
    #[arg(long)]
    pub broadcast_period: Option<u64>,

    /// Log every SEND/RECV line.
    #[arg(short, long)]
    pub verbose: bool,
}

fn env_layer(cfg: &mut Config) -> Result<()> {
    if let Ok(v) = env::var("LSNP_PORT") {
        cfg.port = v.parse().context("LSNP_PORT must be a port number")?;
    }
    if let Ok(v) = env::var("LSNP_TTL") {
        cfg.token_ttl = v.parse().context("LSNP_TTL must be seconds")?;
    }
    if let Ok(v) = env::var("LSNP_BROADCAST_ADDR") {
        cfg.broadcast_addr = Some(v.parse().context("LSNP_BROADCAST_ADDR must be an IPv4")?);
    }
    if let Ok(v) = env::var("LSNP_BROADCAST_PERIOD") {
        cfg.broadcast_period_secs = v.parse().context("LSNP_BROADCAST_PERIOD must be seconds")?;
    }
    if let Ok(v) = env::var("LSNP_DM_ACK_TIMEOUT_MS") {
        cfg.dm_ack_timeout_ms = v.parse().context("LSNP_DM_ACK_TIMEOUT_MS must be ms")?;
    }
    if let Ok(v) = env::var("LSNP_DM_MAX_ATTEMPTS") {
        cfg.dm_max_attempts = v.parse().context("LSNP_DM_MAX_ATTEMPTS must be a count")?;
    }
    Ok(())
}

pub fn load(cli: &Cli) -> Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => Config::default(),
    };
    env_layer(&mut cfg)?;
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    if let Some(addr) = cli.broadcast_addr {
        cfg.broadcast_addr = Some(addr);
    }
    if let Some(ttl) = cli.ttl {
        cfg.token_ttl = ttl;
    }
    if let Some(period) = cli.broadcast_period {
        cfg.broadcast_period_secs = period;
    }
    Ok(cfg)
}

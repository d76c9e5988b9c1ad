// LSNP peer: UDP protocol engine + interactive shell.

mod config;
mod shell;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, reload, util::SubscriberInitExt};

use lsnp_network::Node;

use crate::shell::FilterHandle;

fn init_tracing(verbose: bool) -> FilterHandle {
    let default_directives = if verbose { "info,lsnp=debug" } else { "info" };
    let directives =
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_directives.to_string());
    let (filter, handle) = reload::Layer::new(EnvFilter::new(directives));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
    handle
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = config::Cli::parse();
    let filter = init_tracing(cli.verbose);
    let cfg = config::load(&cli)?;

    let node = Arc::new(Node::bind(cfg).await?);
    let (tx, rx) = mpsc::channel(64);
    node.start(tx);
    tokio::spawn(shell::render_events(Arc::clone(&node), rx));

    shell::run(node, filter).await
}

//! Paxchain node.
//!
//! Runs one of the five cluster peers: TCP listener, console, and the
//! consensus event loop.
//!
//! ```bash
//! paxchain-node --config cluster.toml --id 1 --data-dir ./data
//! ```
//!
//! On startup the node reloads its last snapshot (if any) and immediately
//! runs catch-up, so a restarted process rejoins the quorum at the current
//! depth before taking new commands.

use anyhow::{bail, Context, Result};
use clap::Parser;
use paxchain_core::Event;
use paxchain_node::NodeStateMachine;
use paxchain_paxos::PaxosConfig;
use paxchain_production::{
    spawn_console, spawn_listener, ChainView, ClusterConfig, NodeRunner, Outbound, SnapshotStore,
    TimerManager,
};
use paxchain_sync::CatchupConfig;
use paxchain_types::{NodeId, NET_DELAY, NUM_NODES};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Paxchain cluster node.
#[derive(Parser, Debug)]
#[command(name = "paxchain-node")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the peer configuration file (TOML).
    #[arg(short, long)]
    config: PathBuf,

    /// This node's id (1..=5).
    #[arg(long)]
    id: u64,

    /// Directory for the snapshot file.
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Log level filter (overridden by RUST_LOG).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.id == 0 || cli.id > NUM_NODES {
        bail!("--id must be in 1..={NUM_NODES}, got {}", cli.id);
    }
    let me = NodeId(cli.id);

    let cluster = Arc::new(ClusterConfig::load(&cli.config).context("loading peer config")?);
    let listen = cluster
        .addr(me)
        .context("own node id missing from peer config")?;

    std::fs::create_dir_all(&cli.data_dir).context("creating data directory")?;
    let store = SnapshotStore::for_node(&cli.data_dir, me);
    let recovered = store.load().context("loading snapshot")?.unwrap_or_default();
    info!(node = %me, depth = recovered.depth(), "starting");

    let (event_tx, event_rx) = mpsc::channel(1024);
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let failed = Arc::new(AtomicBool::new(false));

    let (bound, _listener) = spawn_listener(listen, event_tx.clone(), Arc::clone(&failed))
        .await
        .context("binding listen socket")?;
    info!(addr = %bound, "listening");

    let outbound = Outbound::new(Arc::clone(&cluster), me, Arc::clone(&failed), NET_DELAY);
    let timers = TimerManager::new(event_tx.clone());
    let view = ChainView::shared(recovered.clone());
    let machine = NodeStateMachine::new(
        me,
        rand::random(),
        PaxosConfig::default(),
        CatchupConfig::default(),
        recovered,
    );

    let _console = spawn_console(event_tx.clone(), Arc::clone(&view), shutdown_tx.clone());

    // Rejoin the quorum: catch up to whatever committed while we were away.
    event_tx
        .send(Event::Recover)
        .await
        .expect("runner not started yet");

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(()).await;
    });

    let runner = NodeRunner::new(machine, event_rx, timers, outbound, store, view, failed);
    runner.run(shutdown_rx).await?;
    Ok(())
}

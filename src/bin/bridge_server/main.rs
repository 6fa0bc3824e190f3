use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser as _;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::error;
use tracing::info;
use tracing_subscriber::filter as tracing_filter;
use tracing_subscriber::layer::SubscriberExt;
use utreexo::accumulator::forest::Forest;
use utreexo::bridge::BlockServer;
use utreexo::bridge::BlockSource;
use utreexo::bridge::DirBlockSource;
use utreexo::bridge::ShutdownOutcome;
use utreexo::bridge::Supervisor;
use utreexo::simchain::SimChain;

mod cli;

use cli::Mode;

// Configure logger
fn set_tracing_subscriber(log_level: tracing::Level) -> anyhow::Result<()> {
    let targets_filter = tracing_filter::Targets::new()
        .with_targets([("utreexo", log_level), ("bridge_server", log_level)]);
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_line_number(true);
    let tracing_subscriber = tracing_subscriber::registry()
        .with(targets_filter)
        .with(stdout_layer);
    tracing::subscriber::set_global_default(tracing_subscriber)
        .context("setting default subscriber failed")
}

/// Writes `blocks` synthetic blocks to `datadir`. Each block is the 32 byte hashes of the
/// leaves it creates, and its proof covers the leaves it spends.
fn generate(
    datadir: &Path,
    blocks: u32,
    adds_per_block: u32,
    duration_mask: u32,
    seed: u64,
) -> anyhow::Result<()> {
    let mut chain = SimChain::with_seed(duration_mask, seed);
    let mut forest = Forest::new();

    for _ in 0..blocks {
        let (adds, dels) = chain.next_block(adds_per_block);
        let height = chain.block_height();

        let proof = forest
            .prove_block(&dels)
            .with_context(|| format!("proving block {height}"))?;
        let block: Vec<u8> = adds.iter().flat_map(|leaf| leaf.hash.to_vec()).collect();
        DirBlockSource::write_block(datadir, height, &block, &proof.to_bytes())?;

        forest
            .modify(&adds, proof.targets())
            .with_context(|| format!("applying block {height}"))?;
    }

    info!(
        blocks,
        leaves = forest.num_leaves(),
        datadir = %datadir.display(),
        "generated chain"
    );
    Ok(())
}

async fn serve(
    datadir: PathBuf,
    listen_addr: std::net::SocketAddr,
    max_height: Option<i32>,
    shutdown_timeout: std::time::Duration,
) -> anyhow::Result<ShutdownOutcome> {
    let source = Arc::new(DirBlockSource::open(datadir, max_height)?);
    info!(max_height = source.max_height(), "serving up to and including this height");
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;

    let supervisor = Supervisor::new(shutdown_timeout);
    let server = BlockServer::new(source, supervisor.token(), supervisor.tracker());
    supervisor.tracker().spawn(async move {
        if let Err(err) = server.run(listener).await {
            error!(%err, "block server failed");
        }
    });

    let (interrupt_tx, interrupt_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "can't listen for ctrl-c, exiting");
        }
        let _ = interrupt_tx.send(()).await;
    });

    Ok(supervisor.wait(interrupt_rx).await)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = cli.get_config()?;
    set_tracing_subscriber(config.log_level)?;

    match config.mode {
        Mode::Generate {
            datadir,
            blocks,
            adds_per_block,
            duration_mask,
            seed,
        } => generate(&datadir, blocks, adds_per_block, duration_mask, seed),
        Mode::Serve {
            datadir,
            listen_addr,
            max_height,
            shutdown_timeout,
        } => match serve(datadir, listen_addr, max_height, shutdown_timeout).await? {
            ShutdownOutcome::Clean => Ok(()),
            ShutdownOutcome::Forced => std::process::exit(1),
        },
    }
}

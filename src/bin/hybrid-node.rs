#![forbid(unsafe_code)]
//! Runs a single HYBRID ledger node: block production loop, expiry sweep
//! and (with the `api` feature) the REST API.

use clap::Parser;
use hybridledger::clock::SystemClock;
use hybridledger::config::load_config_from;
use hybridledger::crypto::address_from_string;
use hybridledger::node::LedgerCore;
use hybridledger::transaction::{Payload, TxBody};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = hybridledger::config::DEFAULT_CONFIG_PATH)]
    config: String,
    /// Stop after this many block ticks
    #[arg(long)]
    ticks: Option<u64>,
    /// Number of synthetic senders feeding the pool
    #[arg(long, default_value_t = 0)]
    demo_senders: usize,
    /// Maximum log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_max_level(cli.log_level).init();

    let config = load_config_from(&cli.config)?;
    let core = Arc::new(LedgerCore::new(config, Arc::new(SystemClock))?);
    let genesis = core.seed_default_genesis().await?;
    info!(hash = %genesis.hash_str(), "node.genesis");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    #[cfg(feature = "api")]
    {
        let api_core = core.clone();
        let port = core.config().node.api_port;
        let mut api_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let signal = async move {
                let _ = api_shutdown.wait_for(|stop| *stop).await;
            };
            if let Err(e) = hybridledger::api::run_api_server(api_core, port, signal).await {
                warn!(error = %e, "api.failed");
            }
        });
    }

    if cli.demo_senders > 0 {
        let interval = core.config().node.block_interval / 2;
        tokio::spawn(feed_demo_load(
            core.clone(),
            cli.demo_senders,
            interval,
            shutdown_rx.clone(),
        ));
    }

    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("node.interrupt");
            let _ = ctrl_c_tx.send(true);
        }
    });

    let produced = core.clone().run_block_production(shutdown_rx, cli.ticks).await;
    let _ = shutdown_tx.send(true);

    let stats = core.chain_stats().await;
    info!(
        produced,
        height = ?stats.latest_height,
        transactions = stats.total_transactions,
        "node.stopped"
    );
    Ok(())
}

/// Submits one transfer per synthetic sender on every interval with a
/// random fee, so the pool always has competing transactions.
async fn feed_demo_load(
    core: Arc<LedgerCore>,
    senders: usize,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let addresses: Vec<_> = (0..senders)
        .map(|i| address_from_string(&format!("demo-sender-{}", i)))
        .collect();
    let recipient = address_from_string("demo-recipient");
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for sender in &addresses {
                    let nonce = core.expected_nonce(sender).await;
                    let (amount, fee) = {
                        let mut rng = rand::thread_rng();
                        (rng.gen_range(1..1_000), rng.gen_range(21_000..210_000))
                    };
                    let tx = TxBody::new(
                        *sender,
                        recipient,
                        amount,
                        fee,
                        nonce,
                        Payload::Transfer,
                        chrono::Utc::now().timestamp_millis().max(0) as u64,
                    )
                    .seal();
                    if let Err(e) = core.submit(tx).await {
                        warn!(error = %e, "demo.submit_failed");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

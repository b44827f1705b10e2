//! # Vendora Worker — Notification Queue Daemon
//!
//! Drains the durable notification queue: claims due records on a fixed
//! tick and delivers them through the configured channels.
//!
//! Usage:
//!   vendora-worker                         # Run with ~/.vendora/notify.toml
//!   vendora-worker --config notify.toml    # Explicit config file
//!   vendora-worker --from-env              # Configure from environment vars
//!   vendora-worker --once                  # One sweep, then exit

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vendora_channels::ChannelGateway;
use vendora_core::config::NotifyConfig;
use vendora_dispatch::worker::{WorkerOptions, run_queue_sweep, spawn_worker};
use vendora_dispatch::{Dispatcher, QueueDb, SqliteRecorder};

#[derive(Parser)]
#[command(
    name = "vendora-worker",
    version,
    about = "📬 Vendora Worker — Notification Queue Daemon"
)]
struct Cli {
    /// Config file (default: ~/.vendora/notify.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Build configuration from environment variables instead of a file
    #[arg(long)]
    from_env: bool,

    /// Queue database path (default: ~/.vendora/queue.db)
    #[arg(long)]
    queue_db: Option<PathBuf>,

    /// Ledger database path (default: ~/.vendora/ledger.db)
    #[arg(long)]
    ledger_db: Option<PathBuf>,

    /// Seconds between queue sweeps (overrides config)
    #[arg(long)]
    tick: Option<u64>,

    /// Max notifications claimed per sweep (overrides config)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Run one sweep and exit
    #[arg(long)]
    once: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "vendora=debug,vendora_dispatch=debug,vendora_channels=debug"
    } else {
        "vendora=info,vendora_dispatch=info,vendora_channels=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Load configuration
    let config = if cli.from_env {
        NotifyConfig::from_env()?
    } else if let Some(path) = &cli.config {
        NotifyConfig::load_from(path)?
    } else {
        NotifyConfig::load()?
    };
    let config = Arc::new(config);

    let mut options = WorkerOptions::from_config(&config.worker);
    if let Some(tick) = cli.tick {
        options.tick = std::time::Duration::from_secs(tick);
    }
    if let Some(batch) = cli.batch_size {
        options.batch_size = batch;
    }

    // Open stores
    let queue_path = cli.queue_db.unwrap_or_else(QueueDb::default_path);
    let ledger_path = cli.ledger_db.unwrap_or_else(SqliteRecorder::default_path);
    let queue = Arc::new(QueueDb::open(&queue_path)?);
    let recorder = Arc::new(SqliteRecorder::open(&ledger_path)?);

    let gateway = Arc::new(ChannelGateway::new(config.clone()));
    let dispatcher = Arc::new(Dispatcher::new(config.clone(), gateway, queue, recorder));

    let enabled: Vec<&str> = [
        config.email.as_ref().map(|c| c.enabled).unwrap_or(false).then_some("email"),
        config.sms.as_ref().map(|c| c.enabled).unwrap_or(false).then_some("sms"),
        config.push.as_ref().map(|c| c.enabled).unwrap_or(false).then_some("push"),
        config.webhook.as_ref().map(|c| c.enabled).unwrap_or(false).then_some("webhook"),
    ]
    .into_iter()
    .flatten()
    .collect();

    println!("📬 Vendora Worker v{}", env!("CARGO_PKG_VERSION"));
    println!("   🗄️  Queue DB:   {}", queue_path.display());
    println!("   📒 Ledger DB:  {}", ledger_path.display());
    println!(
        "   📡 Channels:   {}",
        if enabled.is_empty() { "(none enabled)".to_string() } else { enabled.join(", ") }
    );
    println!(
        "   ⏱️  Sweep:      every {}s, batch {}",
        options.tick.as_secs(),
        options.batch_size
    );
    println!();

    if enabled.is_empty() {
        tracing::warn!("⚠️  No channels are enabled; every delivery will fail validation.");
    }

    if cli.once {
        let processed = run_queue_sweep(&dispatcher, options.batch_size).await;
        println!("✅ Sweep complete: {processed} notification(s) processed");
        return Ok(());
    }

    let handle = spawn_worker(dispatcher, options);

    tokio::signal::ctrl_c().await?;
    println!("\n👋 Shutting down");
    handle.abort();

    Ok(())
}

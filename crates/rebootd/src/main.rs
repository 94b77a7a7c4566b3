//! rebootd — the rebootwatch daemon.
//!
//! Polls MAD admin servers for device status, power-cycles PoE devices that
//! stopped reporting, and keeps one webhook alert per troubled device.
//!
//! # Usage
//!
//! ```text
//! rebootd run --config /etc/rebootwatch.toml
//! rebootd check --config /etc/rebootwatch.toml
//! rebootd once --config /etc/rebootwatch.toml
//! ```

mod wiring;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use rebootwatch_core::Settings;
use rebootwatch_health::{Poller, TickOutcome, epoch_secs};

#[derive(Parser)]
#[command(name = "rebootd", about = "PoE device health monitor and remediation daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll continuously until interrupted.
    Run {
        /// Path to the TOML configuration file.
        #[arg(long, default_value = "rebootwatch.toml")]
        config: PathBuf,
    },

    /// Validate the configuration and print a summary.
    Check {
        #[arg(long, default_value = "rebootwatch.toml")]
        config: PathBuf,
    },

    /// Run a single outage check and sweep, then exit.
    Once {
        #[arg(long, default_value = "rebootwatch.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,rebootd=debug,rebootwatch=debug"))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => run(&config).await,
        Command::Check { config } => check(&config),
        Command::Once { config } => once(&config).await,
    }
}

fn load(path: &Path) -> anyhow::Result<Settings> {
    let settings = Settings::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    info!(
        path = %path.display(),
        servers = settings.servers.len(),
        devices = settings.devices.len(),
        "config loaded"
    );
    Ok(settings)
}

fn check(path: &Path) -> anyhow::Result<()> {
    let settings = load(path)?;
    println!("{} is valid", path.display());
    println!("{}", wiring::describe(&settings));
    Ok(())
}

async fn once(path: &Path) -> anyhow::Result<()> {
    let settings = load(path)?;
    let mut poller = Poller::new(&settings, wiring::collaborators(&settings)?);

    match poller.tick(epoch_secs()).await {
        TickOutcome::Swept(report) => {
            println!(
                "servers ok {}, failed {}; evaluated {}, online {}, stale {}, \
                 remediated {}, cooldown {}, recovered {}",
                report.servers_ok,
                report.servers_failed,
                report.evaluated,
                report.online,
                report.stale,
                report.remediated,
                report.cooldown_denied,
                report.recovered,
            );
        }
        TickOutcome::Gated => warn!("upstream ban in effect, sweep skipped"),
    }
    Ok(())
}

async fn run(path: &Path) -> anyhow::Result<()> {
    info!("rebootwatch daemon starting");
    let settings = load(path)?;
    let mut poller = Poller::new(&settings, wiring::collaborators(&settings)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poller_handle = tokio::spawn(async move {
        poller.run(shutdown_rx).await;
    });

    supervise(poller_handle, shutdown_tx, tokio::signal::ctrl_c()).await?;

    info!("rebootwatch daemon stopped");
    Ok(())
}

/// Wait for `signal`, then stop the poller and wait for it to finish.
///
/// If the signal cannot be listened for, the poller keeps running and
/// `shutdown_tx` stays alive until it ends on its own.
async fn supervise(
    poller_handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    signal: impl Future<Output = std::io::Result<()>>,
) -> anyhow::Result<()> {
    match signal.await {
        Ok(()) => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
        Err(e) => warn!(error = %e, "failed to listen for ctrl-c, running until the poller stops"),
    }

    poller_handle.await.context("poller task failed")?;
    drop(shutdown_tx);
    Ok(())
}

//! ripsyncd - RIP-v2 route mirroring daemon
//!
//! Installs routes heard on the RIP-v2 multicast group into the kernel
//! routing table and withdraws them when the advertisers go quiet.

use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::Parser;
use ripsync_common::ShellRunner;
use ripsyncd::{serve, Args, DaemonConfig, RouteReconciler, UdpDatagramSource};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("ripsyncd: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("--- Starting ripsyncd ---");

    match run(args).await {
        Ok(()) => {
            info!("ripsyncd exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "ripsyncd: fatal error");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .with_context(|| format!("invalid log filter '{}'", default_filter))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .try_init()
        .map_err(|e| anyhow!("failed to set logger: {}", e))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = DaemonConfig::load(&args).context("cannot load configuration")?;

    let source = UdpDatagramSource::bind_multicast(
        config.listen,
        config.port,
        config.group,
        &config.interface,
    )
    .context("cannot start RIP listener")?;

    let runner = match config.command_timeout {
        Some(timeout) => ShellRunner::with_timeout(timeout),
        None => {
            info!("No route command timeout set, a hung route command will stall updates");
            ShellRunner::new()
        }
    };

    let reconciler = RouteReconciler::new(config.reconciler_config(), runner);

    serve(reconciler, source, config.queue_capacity, shutdown_signal())
        .await
        .context("daemon stopped")
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received SIGINT"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for SIGINT, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

//! maintwatch - real-time maintenance notification delivery service
//!
//! Persists and delivers notifications for equipment failures, service-order
//! changes, and system alerts, over live WebSocket connections and durable
//! push subscriptions.

use anyhow::Result;
use clap::Parser;
use maintwatch::{app::App, cli::Cli, config::Config, ops, scanners::ManualCheckKind};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment,
    // and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {err}");
        // Exit if configuration fails, as it's a critical step.
        std::process::exit(1);
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("maintwatch starting up...");
    info!(
        realtime_addr = %config.realtime.listen_addr,
        push_enabled = config.push.enabled,
        dedup_window_seconds = config.deduplication.window_seconds,
        "Configuration loaded"
    );

    let manual_check = match &cli.check {
        Some(kind) => match ManualCheckKind::parse(kind) {
            Some(kind) => Some(kind),
            None => {
                error!(kind = %kind, "Unknown check kind (expected equipment, maintenance, service-orders, or all)");
                std::process::exit(2);
            }
        },
        None => None,
    };

    // =========================================================================
    // Create Shutdown Channel
    // =========================================================================
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut builder = App::builder(config.clone());
    if config.ops.enabled {
        builder = builder.prometheus_handle(ops::install_recorder()?);
    }
    let app = builder.build(shutdown_rx).await?;

    if let Some(kind) = manual_check {
        let result = app.run_manual_check(kind).await;
        shutdown_tx.send(true).ok();
        app.run().await?;
        return result;
    }

    // Wait for Ctrl-C, then propagate the shutdown signal to every task.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received. Shutting down gracefully...");
            shutdown_tx.send(true).ok();
        }
    });

    app.run().await?;
    info!("All tasks shut down. Exiting.");
    Ok(())
}

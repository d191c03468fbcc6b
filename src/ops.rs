//! Operational HTTP endpoints.
//!
//! A small `axum` server exposing `/metrics` (Prometheus exposition format)
//! and `/stats` (live connection registry statistics). The server listens
//! for the application shutdown signal and terminates cleanly.

use crate::registry::ConnectionRegistry;
use axum::{routing::get, Json, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, trace};

/// Installs the global Prometheus recorder and registers metric
/// descriptions. Call once at startup, before any metric is touched.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    metrics::describe_counter!(
        "notifications_created_total",
        "Total notification rows persisted by the dispatcher."
    );
    metrics::describe_counter!(
        "dispatch_suppressed_total",
        "Total dispatch events dropped by the anti-storm window."
    );
    metrics::describe_counter!(
        "push_sent_total",
        "Total push payloads accepted by the relay."
    );
    metrics::describe_counter!(
        "push_failed_total",
        "Total push deliveries that failed, permanent and transient."
    );
    metrics::describe_counter!(
        "scheduler_ticks_skipped_total",
        "Total job ticks skipped because the previous run was still in flight."
    );
    metrics::describe_counter!(
        "retention_rows_deleted_total",
        "Total rows removed by the retention sweeper."
    );
    metrics::describe_gauge!(
        "realtime_connected_clients",
        "Number of authenticated realtime connections."
    );
    metrics::describe_gauge!(
        "dedup_cache_entries",
        "Entries currently held by the anti-storm window cache."
    );
}

/// Serves the operational endpoints until shutdown.
pub struct OpsServer {
    listener: TcpListener,
    prom_handle: PrometheusHandle,
    registry: Arc<ConnectionRegistry>,
    shutdown_rx: watch::Receiver<bool>,
}

impl OpsServer {
    pub fn new(
        listener: TcpListener,
        prom_handle: PrometheusHandle,
        registry: Arc<ConnectionRegistry>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            prom_handle,
            registry,
            shutdown_rx,
        }
    }

    /// Returns a future that runs the server until a shutdown signal.
    pub fn run(mut self) -> impl Future<Output = ()> {
        let prom_handle = self.prom_handle.clone();
        let registry = self.registry.clone();
        let app = Router::new()
            .route("/metrics", get(move || async move { prom_handle.render() }))
            .route(
                "/stats",
                get(move || async move { Json(registry.stats()) }),
            );

        async move {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => {
                    trace!("Ops server received shutdown signal.");
                }
                result = axum::serve(self.listener, app.into_make_service()) => {
                    if let Err(e) = result {
                        error!(error = %e, "Ops server error");
                    }
                }
            }
            trace!("Ops server task finished.");
        }
    }
}

//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    core::{ConditionSource, NotificationStore},
    deduplication::Deduplicator,
    dispatch::Dispatcher,
    ops::OpsServer,
    push::{HttpPushClient, PushDelivery, PushRelay},
    registry::{ConnectionRegistry, RealtimeServer},
    scanners::{ManualCheckKind, ScannerSet},
    scheduler::{JobHandler, Scheduler},
    storage::PgStore,
    sweeper::RetentionSweeper,
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    scheduler: Arc<Scheduler>,
    scanners: Arc<ScannerSet>,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<ConnectionRegistry>,
    realtime_addr: SocketAddr,
    ops_addr: Option<SocketAddr>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the realtime listener is bound to.
    pub fn realtime_addr(&self) -> SocketAddr {
        self.realtime_addr
    }

    /// The address the ops server is bound to, when enabled.
    pub fn ops_addr(&self) -> Option<SocketAddr> {
        self.ops_addr
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// Operator entrypoint: runs one scan outside the schedule.
    pub async fn run_manual_check(&self, kind: ManualCheckKind) -> Result<()> {
        self.scanners.run_manual_check(kind).await
    }

    /// Waits for the shutdown signal, then cancels the jobs and drains all
    /// tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        shutdown_rx.changed().await.ok();
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.scheduler.stop();
        self.task_manager.shutdown(Duration::from_secs(10)).await;

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// This pattern allows for a clean separation of concerns between
/// constructing the application's components and running the application.
/// It also provides a convenient way to override collaborators for testing
/// purposes.
pub struct AppBuilder {
    config: Config,
    store_override: Option<Arc<dyn NotificationStore>>,
    push_relay_override: Option<Arc<dyn PushRelay>>,
    condition_source_override: Option<Arc<dyn ConditionSource>>,
    prometheus_handle: Option<PrometheusHandle>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store_override: None,
            push_relay_override: None,
            condition_source_override: None,
            prometheus_handle: None,
        }
    }

    /// Overrides the notification store for testing.
    pub fn store_override(mut self, store: Arc<dyn NotificationStore>) -> Self {
        self.store_override = Some(store);
        self
    }

    /// Overrides the push relay client for testing.
    pub fn push_relay_override(mut self, relay: Arc<dyn PushRelay>) -> Self {
        self.push_relay_override = Some(relay);
        self
    }

    /// Overrides the domain-state source the scanners read.
    pub fn condition_source_override(mut self, source: Arc<dyn ConditionSource>) -> Self {
        self.condition_source_override = Some(source);
        self
    }

    /// Supplies the installed Prometheus recorder handle; without one the
    /// ops server is not started.
    pub fn prometheus_handle(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus_handle = Some(handle);
        self
    }

    /// Builds and initializes all application components, returning a
    /// runnable `App`.
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // =====================================================================
        // 1. Store and shared collaborators
        // =====================================================================
        let store: Arc<dyn NotificationStore> = match self.store_override {
            Some(store) => store,
            None => Arc::new(
                PgStore::connect(&config.store)
                    .await
                    .context("connecting notification store")?,
            ),
        };

        let registry = Arc::new(ConnectionRegistry::new());

        let push_relay: Arc<dyn PushRelay> = match self.push_relay_override {
            Some(relay) => relay,
            None => Arc::new(
                HttpPushClient::new(Duration::from_secs(config.push.timeout_seconds))
                    .context("building push relay client")?,
            ),
        };
        let push = Arc::new(PushDelivery::new(
            store.clone(),
            push_relay,
            config.push.clone(),
        ));

        let deduplicator = Arc::new(Deduplicator::new(
            Duration::from_secs(config.deduplication.window_seconds),
            config.deduplication.cache_size as u64,
        ));

        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            registry.clone(),
            push,
            deduplicator,
        ));

        // =====================================================================
        // 2. Scanners, sweeper, and the job table
        // =====================================================================
        let source: Arc<dyn ConditionSource> = self
            .condition_source_override
            .unwrap_or_else(|| Arc::new(crate::scanners::NoopConditionSource));
        let scanners = Arc::new(ScannerSet::new(source, dispatcher.clone()));
        let sweeper = Arc::new(RetentionSweeper::new(
            store.clone(),
            config.retention.clone(),
        ));

        let scheduler = Arc::new(Scheduler::new(task_manager.get_shutdown_rx()));
        let cadences = &config.scheduler;

        let scan = scanners.clone();
        let equipment_job: JobHandler = Arc::new(move || {
            let scan = scan.clone();
            Box::pin(async move { scan.scan_equipment().await })
        });
        scheduler.schedule_job(
            "equipment-scan",
            Duration::from_secs(cadences.equipment_scan_seconds),
            equipment_job,
        );

        let scan = scanners.clone();
        let maintenance_job: JobHandler = Arc::new(move || {
            let scan = scan.clone();
            Box::pin(async move { scan.scan_maintenance().await })
        });
        scheduler.schedule_job(
            "maintenance-scan",
            Duration::from_secs(cadences.maintenance_scan_seconds),
            maintenance_job,
        );

        let scan = scanners.clone();
        let service_order_job: JobHandler = Arc::new(move || {
            let scan = scan.clone();
            Box::pin(async move { scan.scan_service_orders().await })
        });
        scheduler.schedule_job(
            "service-order-scan",
            Duration::from_secs(cadences.service_order_scan_seconds),
            service_order_job,
        );

        let sweep = sweeper.clone();
        let sweep_job: JobHandler = Arc::new(move || {
            let sweep = sweep.clone();
            Box::pin(async move { sweep.sweep().await.map(|_| ()) })
        });
        scheduler.schedule_job(
            "retention-sweep",
            Duration::from_secs(cadences.retention_sweep_seconds),
            sweep_job,
        );

        // =====================================================================
        // 3. Realtime listener
        // =====================================================================
        let listener = TcpListener::bind(&config.realtime.listen_addr)
            .await
            .with_context(|| format!("binding realtime listener on {}", config.realtime.listen_addr))?;
        let realtime_addr = listener.local_addr()?;
        let realtime_server = RealtimeServer::new(
            listener,
            registry.clone(),
            store.clone(),
            task_manager.get_shutdown_rx(),
        );
        task_manager.spawn("RealtimeServer", realtime_server.run());

        // =====================================================================
        // 4. Ops server
        // =====================================================================
        let ops_addr = match (config.ops.enabled, self.prometheus_handle) {
            (true, Some(handle)) => {
                let listener = TcpListener::bind(&config.ops.listen_addr)
                    .await
                    .with_context(|| format!("binding ops server on {}", config.ops.listen_addr))?;
                let addr = listener.local_addr()?;
                let ops_server = OpsServer::new(
                    listener,
                    handle,
                    registry.clone(),
                    task_manager.get_shutdown_rx(),
                );
                task_manager.spawn("OpsServer", ops_server.run());
                Some(addr)
            }
            _ => None,
        };

        info!("maintwatch initialized successfully.");

        Ok(App {
            task_manager,
            scheduler,
            scanners,
            dispatcher,
            registry,
            realtime_addr,
            ops_addr,
        })
    }
}

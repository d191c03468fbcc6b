//! Manages the lifecycle of the service's long-running tasks.

use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A centralized manager for the service's spawned tasks.
///
/// Tracks each long-running task by name so shutdown can wait for all of
/// them, bounded by a drain timeout so one wedged task cannot hang the
/// process forever.
#[derive(Clone, Debug)]
pub struct TaskManager {
    handles: Arc<Mutex<Vec<(&'static str, JoinHandle<()>)>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskManager {
    pub fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            handles: Arc::new(Mutex::new(Vec::new())),
            shutdown_rx,
        }
    }

    /// Spawns a named task and tracks its handle.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(task_name = name, "Spawning task");
        let handle = tokio::spawn(future);
        self.handles.lock().unwrap().push((name, handle));
    }

    /// Returns a clone of the shutdown receiver for tasks to select on.
    pub fn get_shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Waits for every managed task to complete, up to `drain_timeout`.
    pub async fn shutdown(self, drain_timeout: Duration) {
        let handles = self.handles.lock().unwrap().drain(..).collect::<Vec<_>>();
        info!(count = handles.len(), "Waiting for tasks to complete");

        let task_names: Vec<&'static str> = handles.iter().map(|(name, _)| *name).collect();
        let joined = join_all(handles.into_iter().map(|(_, handle)| handle));

        let results = match tokio::time::timeout(drain_timeout, joined).await {
            Ok(results) => results,
            Err(_) => {
                warn!(tasks = ?task_names, "Drain timeout elapsed; abandoning remaining tasks");
                return;
            }
        };

        let mut panicked = 0;
        for (name, result) in task_names.iter().zip(results) {
            match result {
                Ok(()) => debug!(task_name = name, "Task shut down gracefully."),
                Err(e) => {
                    panicked += 1;
                    error!(task_name = name, error = %e, "Task panicked during shutdown.");
                }
            }
        }
        if panicked == 0 {
            info!("All tasks shut down gracefully.");
        }
    }
}

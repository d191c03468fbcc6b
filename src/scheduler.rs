//! Data-driven periodic job scheduling.
//!
//! Jobs are registered as `{name, cadence, handler}`; registration is
//! idempotent by name, and each job runs on its own independent timer. A
//! tick spawns the job body, so a run that outlives the interval would
//! overlap the next tick; a per-job `in_flight` flag skips (and logs) the
//! overlapping tick instead of running two instances concurrently. A failed
//! run is logged and the job stays registered; the next tick still fires.

use anyhow::Result;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A job body: produces one run's future per invocation.
pub type JobHandler = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct ScheduledJob {
    timer: JoinHandle<()>,
}

/// Fires named jobs on their cadences until stopped.
pub struct Scheduler {
    jobs: Mutex<HashMap<&'static str, ScheduledJob>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            shutdown_rx,
        }
    }

    /// Registers `job` under `name`, replacing any prior registration of the
    /// same name, and begins firing it on `cadence` (first run immediate).
    pub fn schedule_job(&self, name: &'static str, cadence: Duration, job: JobHandler) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(prior) = jobs.remove(name) {
            debug!(job = name, "Replacing existing job registration");
            prior.timer.abort();
        }

        let in_flight = Arc::new(AtomicBool::new(false));
        let mut shutdown_rx = self.shutdown_rx.clone();
        let timer = tokio::spawn(async move {
            let mut timer = tokio::time::interval(cadence);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        debug!(job = name, "Job timer received shutdown signal.");
                        break;
                    }
                    _ = timer.tick() => {
                        // swap returns the previous value: if a run is still
                        // in flight it owns the flag and this tick is skipped.
                        if in_flight.swap(true, Ordering::AcqRel) {
                            warn!(job = name, "Previous run still in flight; skipping tick");
                            metrics::counter!("scheduler_ticks_skipped_total", "job" => name)
                                .increment(1);
                            continue;
                        }
                        let run = job();
                        let in_flight = in_flight.clone();
                        tokio::spawn(async move {
                            if let Err(e) = run.await {
                                error!(job = name, error = %e, "Job run failed");
                            }
                            in_flight.store(false, Ordering::Release);
                        });
                    }
                }
            }
        });

        jobs.insert(name, ScheduledJob { timer });
        info!(job = name, cadence_seconds = cadence.as_secs(), "Job scheduled");
    }

    /// Names of the currently registered jobs.
    pub fn job_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.jobs.lock().unwrap().keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Cancels every job. Safe to call more than once.
    pub fn stop(&self) {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.is_empty() {
            return;
        }
        info!(count = jobs.len(), "Stopping scheduler");
        for (name, job) in jobs.drain() {
            debug!(job = name, "Cancelling job timer");
            job.timer.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Periodic driver for the enrichment worker.
//!
//! The host process owns the schedule: it spawns the loop, can trigger an
//! immediate run, and stops it with `shutdown`. A run in progress is never
//! cut short; shutdown takes effect between runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::housekeeping::Housekeeping;
use super::worker::{EnrichmentWorker, WorkerError};

/// Handle to a spawned worker loop.
#[derive(Debug)]
pub struct EnrichmentWorkerHandle {
    shutdown: Arc<Notify>,
    trigger: Arc<Notify>,
    join: Option<JoinHandle<()>>,
}

impl EnrichmentWorkerHandle {
    /// Ask for a run now instead of waiting for the next tick. Repeated
    /// triggers before the loop wakes up coalesce into one run.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                error!(error = %e, "enrichment loop task failed");
            }
        }
    }
}

impl EnrichmentWorker {
    /// Run on a fixed interval (first run immediately) until shut down.
    /// Each tick is followed by a housekeeping pass when one is given.
    pub fn spawn(
        self: &Arc<Self>,
        interval: Duration,
        housekeeping: Option<Housekeeping>,
    ) -> EnrichmentWorkerHandle {
        let shutdown = Arc::new(Notify::new());
        let trigger = Arc::new(Notify::new());
        let join = tokio::spawn(worker_loop(
            self.clone(),
            interval.max(Duration::from_millis(1)),
            housekeeping,
            shutdown.clone(),
            trigger.clone(),
        ));

        EnrichmentWorkerHandle {
            shutdown,
            trigger,
            join: Some(join),
        }
    }
}

async fn worker_loop(
    worker: Arc<EnrichmentWorker>,
    interval: Duration,
    housekeeping: Option<Housekeeping>,
    shutdown: Arc<Notify>,
    trigger: Arc<Notify>,
) {
    info!(interval_ms = interval.as_millis() as u64, "enrichment worker started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.notified() => break,
            _ = ticker.tick() => {}
            _ = trigger.notified() => {}
        }

        match worker.run().await {
            Ok(_) => {}
            Err(WorkerError::AlreadyRunning) => {
                warn!("skipping tick, previous run still active");
            }
        }

        if let Some(housekeeping) = &housekeeping {
            housekeeping.run().await;
        }
    }

    info!("enrichment worker stopped");
}

//! Background poller that re-runs the gated cycle for one source on a fixed interval.
//!
//! The first cycle runs immediately. Missed ticks are skipped rather than
//! bursted, and an in-flight cycle always finishes before the task exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use sheetflow_core::SheetflowError;

use crate::ingestor::{CycleOutcome, Ingestor};

pub struct Poller {
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl Poller {
    pub fn spawn(ingestor: Arc<Ingestor>, url: String, interval: Duration) -> Self {
        let shutdown = Arc::new(Notify::new());
        let signal = shutdown.clone();
        let handle = tokio::spawn(async move {
            run_poller(ingestor, url, interval, signal).await;
        });
        Self { shutdown, handle }
    }

    /// Signal the poller to stop and wait for the task to exit.
    pub async fn stop(self) {
        // notify_one stores a permit, so the signal is not lost if the task is mid-cycle.
        self.shutdown.notify_one();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "poller task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn run_poller(ingestor: Arc<Ingestor>, url: String, interval: Duration, shutdown: Arc<Notify>) {
    info!(url = %url, interval_secs = interval.as_secs_f64(), "poller started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.notified() => break,
            _ = ticker.tick() => {}
        }

        match ingestor.run_cycle(&url).await {
            Ok(CycleOutcome::Changed(report)) => info!(
                url = %url,
                processed = %report.artifacts.processed.display(),
                selected = %report.artifacts.selected.display(),
                tps = report.tps,
                "poller: published new tables"
            ),
            Ok(CycleOutcome::Unchanged(_)) | Ok(CycleOutcome::Skipped) => {}
            Err(SheetflowError::Fetch(e)) => {
                warn!(url = %url, error = %e, "poller: fetch failed, retrying next tick")
            }
            Err(e) => warn!(url = %url, error = %e, "poller: cycle failed"),
        }
    }

    info!(url = %url, "poller stopped");
}

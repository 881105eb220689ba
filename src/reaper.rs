//! Background removal of expired session documents

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::collection::Collection;
use crate::document::{epoch_millis, Filter};
use crate::error::SessionError;

/// Longest period the reaping timer is armed with
const MAX_REAP_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Whether a store is reaping expired sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapingStatus {
    /// No interval configured, or one below the floor
    Disabled,
    /// Reaping every `interval`
    Running { interval: Duration },
    /// Reaping was shut down
    Stopped,
}

/// Handle to the reaping task
///
/// The task is cancelled by [`Reaper::shutdown`] or, failing that, aborted
/// when the handle is dropped.
pub(crate) struct Reaper {
    interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Reaper {
    /// Spawn the reaping loop on the current Tokio runtime
    pub(crate) fn start(
        collection: Arc<dyn Collection>,
        interval: Duration,
        log_reaping: bool,
    ) -> Result<Self, SessionError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            SessionError::Runtime(format!("reaping needs a Tokio runtime: {}", e))
        })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = runtime.spawn(run(collection, interval, log_reaping, shutdown_rx));

        info!(
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "Reaping sessions enabled"
        );

        Ok(Self {
            interval,
            shutdown_tx,
            task: Mutex::new(Some(task)),
            stopped: AtomicBool::new(false),
        })
    }

    pub(crate) fn status(&self) -> ReapingStatus {
        if self.stopped.load(Ordering::SeqCst) {
            return ReapingStatus::Stopped;
        }
        match self.task.lock().as_ref() {
            Some(task) if !task.is_finished() => ReapingStatus::Running {
                interval: self.interval,
            },
            _ => ReapingStatus::Stopped,
        }
    }

    /// Stop the loop and wait for an in-flight reap to finish
    ///
    /// Calling this more than once is a no-op.
    pub(crate) async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.shutdown_tx.send(true);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Reaping task ended abnormally");
            }
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

async fn run(
    collection: Arc<dyn Collection>,
    period: Duration,
    log_reaping: bool,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let period = period.min(MAX_REAP_PERIOD);

    // First reap happens one full period after start
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                reap_once(collection.as_ref(), log_reaping).await;
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("Reaping sessions closed");
}

/// Remove every document whose `expires` has passed
///
/// Failures are logged and swallowed; the next tick simply tries again.
pub(crate) async fn reap_once(collection: &dyn Collection, log_reaping: bool) -> Option<u64> {
    let now = epoch_millis();
    match collection.remove(&Filter::ExpiresAtOrBefore(now)).await {
        Ok(result) => {
            if log_reaping {
                info!(removed = result.deleted, at = now, "Reaping sessions");
            }
            Some(result.deleted)
        }
        Err(e) => {
            warn!(error = %e, "Reaping sessions failed");
            None
        }
    }
}

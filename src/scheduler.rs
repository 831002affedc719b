//! Periodic safety-net export of the note store to the attached file.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::mirror::FileMirror;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5);
const MIN_SYNC_INTERVAL: Duration = Duration::from_millis(10);

struct Running {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct SyncScheduler {
    mirror: Arc<FileMirror>,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl SyncScheduler {
    pub fn new(mirror: Arc<FileMirror>, interval: Duration) -> Self {
        Self {
            mirror,
            interval: interval.max(MIN_SYNC_INTERVAL),
            running: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Arm the timer. The first export happens one interval from now.
    /// Returns `false` if it was already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            debug!("sync scheduler already running");
            return false;
        }

        let (stop, mut stopped) = oneshot::channel();
        let mirror = self.mirror.clone();
        let period = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        if !mirror.is_attached() {
                            trace!("sync tick skipped, no file attached");
                            continue;
                        }
                        if let Err(e) = mirror.export().await {
                            warn!("scheduled export failed, retrying next tick: {e}");
                        }
                    }
                }
            }
            debug!("sync scheduler loop exited");
        });

        *running = Some(Running { stop, task });
        info!(interval_ms = period.as_millis() as u64, "sync scheduler started");
        true
    }

    /// Disarm the timer. Once this returns no further export will start;
    /// an export already in flight is allowed to finish first.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(Running { stop, task }) = running else {
            return;
        };
        let _ = stop.send(());
        if let Err(e) = task.await {
            error!("sync scheduler task ended abnormally: {e}");
        }
        info!("sync scheduler stopped");
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if let Some(running) = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            running.task.abort();
        }
    }
}

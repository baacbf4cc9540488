//! Periodic expired-entry sweep.
//!
//! The sweep runs on a tokio task that holds only a [`Weak`] reference to its
//! manager, so it never keeps the manager alive. It stops when:
//! - [`CleanupScheduler::stop`] is called,
//! - the scheduler (and with it the manager) is dropped,
//! - or the manager is gone at the next tick.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::types::SchedulerState;
use super::{CacheManager, CacheValue};
use crate::error::CacheError;

/// Something the scheduler can sweep.
pub(crate) trait Sweep: Send + Sync {
    /// Remove expired entries; returns how many went.
    fn sweep(&self) -> usize;
}

struct RunningSweep {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the background sweep task of one manager.
pub struct CleanupScheduler {
    interval: Duration,
    running: Option<RunningSweep>,
}

impl CleanupScheduler {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval, running: None }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        match &self.running {
            Some(running) if !running.handle.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Spawn the sweep task on the current tokio runtime.
    ///
    /// Starting a running scheduler is a no-op.
    pub(crate) fn start(&mut self, target: Weak<dyn Sweep>) -> Result<(), CacheError> {
        if self.is_running() {
            debug!("Cleanup scheduler already running");
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = runtime.spawn(run_sweeps(target, self.interval, shutdown_rx));
        self.running = Some(RunningSweep { shutdown, handle });

        crate::metrics::set_scheduler_running(true);
        info!(interval_ms = self.interval.as_millis() as u64, "Cleanup scheduler started");
        Ok(())
    }

    /// Cancel the sweep task. Returns whether it was running.
    pub fn stop(&mut self) -> bool {
        let Some(running) = self.running.take() else {
            return false;
        };
        let _ = running.shutdown.send(true);
        running.handle.abort();

        crate::metrics::set_scheduler_running(false);
        info!("Cleanup scheduler stopped");
        true
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_sweeps(target: Weak<dyn Sweep>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let start = tokio::time::Instant::now() + period;
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let Some(target) = target.upgrade() else {
                    debug!("Cache manager dropped, ending cleanup task");
                    break;
                };
                let started = Instant::now();
                let removed = target.sweep();
                crate::metrics::record_sweep_duration(started.elapsed());
                if removed > 0 {
                    debug!(removed, "Periodic sweep removed expired entries");
                }
            }
        }
    }
}

impl<V: CacheValue> Sweep for CacheManager<V> {
    fn sweep(&self) -> usize {
        self.cleanup_expired()
    }
}

impl<V: CacheValue> CacheManager<V> {
    /// Start the periodic sweep (every `cleanup_interval_ms`).
    ///
    /// Needs a running tokio runtime. A disabled manager has nothing to sweep
    /// and never spawns a task.
    ///
    /// # Errors
    ///
    /// [`CacheError::NoRuntime`] when called outside a tokio runtime.
    pub fn start_cleanup(self: &Arc<Self>) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        let target: Weak<dyn Sweep> = weak;
        self.scheduler.lock().start(target)
    }

    /// Stop the periodic sweep. Returns whether it was running.
    pub fn stop_cleanup(&self) -> bool {
        self.scheduler.lock().stop()
    }

    #[must_use]
    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.lock().state()
    }
}

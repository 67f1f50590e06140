//! Periodic session liveness check
//!
//! A [`SessionMonitor`] owns one background task bound to one user id. The
//! task runs the supplied check every period until the check asks it to stop
//! or the monitor is cancelled. Dropping the monitor cancels the task.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// What the monitor should do after a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatus {
    Continue,
    Stop,
}

pub struct SessionMonitor {
    user_id: u64,
    handle: JoinHandle<()>,
}

impl SessionMonitor {
    /// Spawn the check loop for `user_id`. The first check runs one full
    /// `period` after spawning.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn spawn<F, Fut>(user_id: u64, period: Duration, mut check: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = MonitorStatus> + Send + 'static,
    {
        assert!(!period.is_zero(), "session monitor period must be non-zero");

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if check().await == MonitorStatus::Stop {
                    break;
                }
            }

            debug!(user_id, "Session monitor stopped");
        });

        debug!(user_id, period_ms = period.as_millis() as u64, "Session monitor started");
        Self { user_id, handle }
    }

    /// User whose session this monitor checks
    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Whether the check loop is still scheduled
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the check loop
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            debug!(user_id = self.user_id, "Session monitor cancelled");
        }
        self.handle.abort();
    }
}

//! Recurring callbacks.
//!
//! The tracker and the file watcher both need "call this every N ms until
//! told to stop". [`Scheduler`] is that seam; [`TokioScheduler`] runs each
//! callback on a tokio interval and stops it through a [`CancellationToken`].

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Runs a callback periodically.
pub trait Scheduler {
    /// Calls `callback` every `period`, first after one full period.
    ///
    /// The callback stops the schedule by returning `ControlFlow::Break`.
    fn schedule_every<F>(&self, period: Duration, callback: F) -> ScheduledTask
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static;
}

/// Handle to a running schedule. Dropping it cancels the schedule.
#[derive(Debug)]
pub struct ScheduledTask {
    token: CancellationToken,
}

impl ScheduledTask {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Stops future invocations. A callback already running completes.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// [`Scheduler`] backed by the tokio runtime.
///
/// Every schedule gets a child of the scheduler's own token, so
/// [`shutdown`](Self::shutdown) stops all of them at once.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    token: CancellationToken,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ties every schedule to `parent`, e.g. the process shutdown token.
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
        }
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_every<F>(&self, period: Duration, mut callback: F) -> ScheduledTask
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let token = self.token.child_token();
        let cancel_token = token.clone();

        tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + period, period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    _ = cancel_token.cancelled() => {
                        debug!("Schedule cancelled");
                        break;
                    }

                    _ = tick.tick() => {
                        if callback().is_break() {
                            debug!("Schedule stopped by its callback");
                            break;
                        }
                    }
                }
            }
        });

        ScheduledTask::new(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnMut() -> ControlFlow<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_runs_each_period() {
        let scheduler = TokioScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _task = scheduler.schedule_every(Duration::from_secs(1), counting(&count));

        sleep(Duration::from_millis(3_500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_future_ticks() {
        let scheduler = TokioScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let task = scheduler.schedule_every(Duration::from_secs(1), counting(&count));

        sleep(Duration::from_millis(2_500)).await;
        task.cancel();
        assert!(task.is_cancelled());
        sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_can_stop_itself() {
        let scheduler = TokioScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let _task = scheduler.schedule_every(Duration::from_secs(1), move || {
            if inner.fetch_add(1, Ordering::SeqCst) + 1 >= 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_all_schedules() {
        let scheduler = TokioScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _a = scheduler.schedule_every(Duration::from_secs(1), counting(&count));
        let _b = scheduler.schedule_every(Duration::from_secs(1), counting(&count));

        sleep(Duration::from_millis(1_500)).await;
        scheduler.shutdown();
        sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}

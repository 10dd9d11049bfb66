//! Scheduling of timed protocol work
//!
//! Every retransmission step, INVITE timeout, registration renewal and
//! health check goes through a [`Scheduler`]. Tasks are futures that run
//! once after a delay; each returns a [`TimerHandle`] that cancels it.
//!
//! Cancellation only prevents a task that has not started yet. Tasks
//! therefore re-check the state that justified them when they fire.
//!
//! - [`TokioScheduler`]: wall clock, one spawned task per timer
//! - [`ManualScheduler`]: fake clock advanced explicitly by tests

mod manual;

pub use manual::ManualScheduler;

use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;

/// A unit of timed work
pub type TimerTask = BoxFuture<'static, ()>;

/// Runs tasks after a delay
pub trait Scheduler: Send + Sync {
    /// Current time on this scheduler's clock
    fn now(&self) -> Instant;

    /// Run `task` once `delay` has elapsed unless cancelled first
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;
}

/// Cancels one scheduled task
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub(crate) fn new(cancelled: Arc<AtomicBool>, abort: Option<AbortHandle>) -> Self {
        Self { cancelled, abort }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Wall-clock scheduler on the current tokio runtime
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::SeqCst) {
                task.await;
            }
        });
        TimerHandle::new(cancelled, Some(join.abort_handle()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_tokio_scheduler_runs_and_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        let scheduler = TokioScheduler;

        let counter = fired.clone();
        scheduler.schedule(
            Duration::from_millis(10),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );
        let counter = fired.clone();
        let handle = scheduler.schedule(
            Duration::from_millis(10),
            async move {
                counter.fetch_add(10, Ordering::SeqCst);
            }
            .boxed(),
        );
        handle.cancel();
        assert!(handle.is_cancelled());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::{Scheduler, TimerHandle, TimerTask};

struct Pending {
    due: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    task: TimerTask,
}

struct ManualState {
    elapsed: Duration,
    next_seq: u64,
    pending: Vec<Pending>,
}

/// Fake clock for deterministic timer tests.
///
/// Nothing runs until [`advance`](ManualScheduler::advance) is awaited. Due
/// tasks run in deadline order (ties in scheduling order) with the clock
/// set to their deadline, so tasks scheduled by a running task are picked
/// up within the same call.
pub struct ManualScheduler {
    origin: Instant,
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Mutex::new(ManualState {
                elapsed: Duration::ZERO,
                next_seq: 0,
                pending: Vec::new(),
            }),
        }
    }

    /// Time advanced so far
    pub fn elapsed(&self) -> Duration {
        self.state.lock().elapsed
    }

    /// Number of scheduled, not yet cancelled tasks
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .pending
            .iter()
            .filter(|p| !p.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Move the clock forward by `by`, running every task that falls due
    pub async fn advance(&self, by: Duration) {
        let target = self.elapsed() + by;
        loop {
            let next = {
                let mut state = self.state.lock();
                let index = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(i, _)| i);
                index.map(|i| {
                    let pending = state.pending.swap_remove(i);
                    state.elapsed = pending.due;
                    pending
                })
            };
            match next {
                Some(pending) if !pending.cancelled.load(Ordering::SeqCst) => pending.task.await,
                Some(_) => {}
                None => break,
            }
        }
        self.state.lock().elapsed = target;
    }

    /// Advance to an absolute offset from creation
    pub async fn advance_to(&self, at: Duration) {
        let now = self.elapsed();
        if at > now {
            self.advance(at - now).await;
        }
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due = state.elapsed + delay;
        state.pending.push(Pending {
            due,
            seq,
            cancelled: cancelled.clone(),
            task,
        });
        TimerHandle::new(cancelled, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> TimerTask {
        let log = log.clone();
        async move { log.lock().push(name) }.boxed()
    }

    #[tokio::test]
    async fn test_runs_in_deadline_order() {
        let scheduler = ManualScheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        scheduler.schedule(Duration::from_secs(2), recorder(&log, "b"));
        scheduler.schedule(Duration::from_secs(1), recorder(&log, "a"));
        scheduler.schedule(Duration::from_secs(2), recorder(&log, "c"));

        scheduler.advance(Duration::from_millis(999)).await;
        assert!(log.lock().is_empty());
        scheduler.advance(Duration::from_secs(5)).await;
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
        assert_eq!(scheduler.elapsed(), Duration::from_millis(5999));
    }

    #[tokio::test]
    async fn test_cancelled_tasks_never_run() {
        let scheduler = ManualScheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = scheduler.schedule(Duration::from_secs(1), recorder(&log, "x"));
        assert_eq!(scheduler.pending(), 1);
        handle.cancel();
        assert_eq!(scheduler.pending(), 0);
        scheduler.advance(Duration::from_secs(2)).await;
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_chained_tasks_use_fire_time() {
        let scheduler = Arc::new(ManualScheduler::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner = scheduler.clone();
        let inner_log = log.clone();
        scheduler.schedule(
            Duration::from_secs(1),
            async move {
                inner.schedule(Duration::from_secs(1), recorder(&inner_log, "second"));
            }
            .boxed(),
        );
        scheduler.advance(Duration::from_millis(1999)).await;
        assert!(log.lock().is_empty());
        scheduler.advance(Duration::from_millis(1)).await;
        assert_eq!(*log.lock(), vec!["second"]);
    }
}

//! Deferred and periodic tasks with cancel-on-supersede semantics.
//!
//! A `TaskSlot` owns at most one spawned task. Scheduling into an occupied
//! slot aborts the previous task first, which gives debouncing for free.
//! Dropping the slot aborts whatever it still holds, so timers never outlive
//! the component that owns them.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

#[derive(Debug, Default)]
pub struct TaskSlot {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl TaskSlot {
    pub fn new(name: &'static str) -> Self {
        Self { name, handle: None }
    }

    /// Run `task` now, replacing anything already in the slot.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(task));
    }

    /// Run `task` once `delay` has elapsed, replacing anything already in the slot.
    pub fn schedule_after<F>(&mut self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
    }

    /// Run `tick` every `period`, starting one period from now.
    ///
    /// Ticks never overlap: a slow tick delays the next one instead of
    /// queueing a burst.
    pub fn schedule_every<F, Fut>(&mut self, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                tick().await;
            }
        });
    }

    /// Abort the pending task, if any. Returns whether one was still pending.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                if pending {
                    trace!(slot = self.name, "Cancelled pending task");
                }
                pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_schedule_after_fires_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut slot = TaskSlot::new("test");
        let counter = Arc::clone(&hits);
        slot.schedule_after(Duration::from_millis(50), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(slot.is_pending());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!slot.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_supersedes_previous() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut slot = TaskSlot::new("test");
        for _ in 0..3 {
            let counter = Arc::clone(&hits);
            slot.schedule_after(Duration::from_millis(50), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_drop_abort() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut slot = TaskSlot::new("test");
        let counter = Arc::clone(&hits);
        slot.schedule_after(Duration::from_millis(50), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(slot.cancel());
        assert!(!slot.cancel());

        {
            let mut dropped = TaskSlot::new("dropped");
            let counter = Arc::clone(&hits);
            dropped.schedule_after(Duration::from_millis(50), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_every_ticks_until_cancelled() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut slot = TaskSlot::new("poll");
        let counter = Arc::clone(&hits);
        slot.schedule_every(Duration::from_millis(100), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        slot.cancel();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}

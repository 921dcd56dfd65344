//! Expiry scheduler
//!
//! One tokio timer per active block. A timer does nothing but report its
//! block identifier on a channel; the agent decides what firing means, so
//! every state change still happens on the agent task.

use crate::clock::Clock;
use crate::registry::BlockId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// One-shot timers keyed by block
pub struct ExpiryScheduler {
    timers: HashMap<BlockId, JoinHandle<()>>,
    fired: mpsc::UnboundedSender<BlockId>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ExpiryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryScheduler")
            .field("timers", &self.timers.len())
            .finish()
    }
}

impl ExpiryScheduler {
    /// Create a scheduler and the receiving end of its firings
    pub fn new(clock: Arc<dyn Clock>) -> (Self, mpsc::UnboundedReceiver<BlockId>) {
        let (fired, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            timers: HashMap::new(),
            fired,
            clock,
        };
        (scheduler, rx)
    }

    /// Arm (or re-arm) the timer for `block_id` to fire at `unblock_timestamp`
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&mut self, block_id: BlockId, unblock_timestamp: i64) {
        let delay = self.delay_until(unblock_timestamp);
        let fired = self.fired.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(block_id, "Expiry timer fired");
            // Receiver gone means the agent is shutting down
            let _ = fired.send(block_id);
        });

        if let Some(previous) = self.timers.insert(block_id, handle) {
            previous.abort();
        }
        debug!(block_id, delay_secs = delay.as_secs(), "Scheduled expiry");
    }

    /// Disarm the timer for `block_id`, returning whether one existed
    pub fn cancel(&mut self, block_id: BlockId) -> bool {
        match self.timers.remove(&block_id) {
            Some(handle) => {
                handle.abort();
                debug!(block_id, "Cancelled expiry timer");
                true
            }
            None => false,
        }
    }

    /// Forget a timer that has already fired
    pub fn acknowledge(&mut self, block_id: BlockId) {
        if self
            .timers
            .get(&block_id)
            .is_some_and(JoinHandle::is_finished)
        {
            self.timers.remove(&block_id);
        }
    }

    /// Disarm every timer
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }

    /// Whether a timer is pending for `block_id`
    pub fn is_scheduled(&self, block_id: BlockId) -> bool {
        self.timers
            .get(&block_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Number of pending timers
    pub fn len(&self) -> usize {
        self.timers.values().filter(|h| !h.is_finished()).count()
    }

    /// Whether no timer is pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn delay_until(&self, unblock_timestamp: i64) -> Duration {
        let secs = unblock_timestamp.saturating_sub(self.clock.now()).max(0);
        Duration::from_secs(u64::try_from(secs).unwrap_or(0))
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn scheduler(now: i64) -> (ExpiryScheduler, mpsc::UnboundedReceiver<BlockId>) {
        ExpiryScheduler::new(Arc::new(ManualClock::new(now)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_at_deadline() {
        let (mut scheduler, mut rx) = scheduler(1_000);
        scheduler.schedule(7, 1_060);
        assert!(scheduler.is_scheduled(7));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rx.recv().await, Some(7));

        scheduler.acknowledge(7);
        assert!(!scheduler.is_scheduled(7));
        assert!(scheduler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_deadline_fires_immediately() {
        let (mut scheduler, mut rx) = scheduler(1_000);
        scheduler.schedule(1, 10);
        assert_eq!(rx.recv().await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces() {
        let (mut scheduler, mut rx) = scheduler(0);
        scheduler.schedule(1, 10);
        scheduler.schedule(1, 100);
        assert_eq!(scheduler.len(), 1);

        tokio::time::sleep(Duration::from_secs(50)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(51)).await;
        assert_eq!(rx.recv().await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let (mut scheduler, mut rx) = scheduler(0);
        scheduler.schedule(1, 10);
        scheduler.schedule(2, 10);

        assert!(scheduler.cancel(1));
        assert!(!scheduler.cancel(1));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(rx.recv().await, Some(2));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let (mut scheduler, mut rx) = scheduler(0);
        for id in 0..5 {
            scheduler.schedule(id, 10);
        }
        assert_eq!(scheduler.len(), 5);

        scheduler.cancel_all();
        assert!(scheduler.is_empty());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(rx.try_recv().is_err());
    }
}

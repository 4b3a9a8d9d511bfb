use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::models::record::RecordKey;

/// A timer that ran out. Only honoured if `generation` is still the current
/// schedule for `key`; see [`ExpiryManager::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expired {
    pub key: RecordKey,
    pub generation: u64,
}

struct ScheduledTimer {
    generation: u64,
    task: JoinHandle<()>,
}

/// One-shot per-record timers.
///
/// A fired timer is delivered on the channel returned by [`ExpiryManager::new`]
/// so the owner handles it as an ordinary event.
pub struct ExpiryManager {
    timers: HashMap<RecordKey, ScheduledTimer>,
    next_generation: u64,
    fired_tx: mpsc::UnboundedSender<Expired>,
}

impl ExpiryManager {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Expired>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let manager = Self {
            timers: HashMap::new(),
            next_generation: 0,
            fired_tx,
        };
        (manager, fired_rx)
    }

    /// Starts a timer for `key`, replacing any timer it already had.
    pub fn schedule(&mut self, key: RecordKey, after: Duration) {
        self.cancel(&key);

        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.fired_tx.clone();
        let fired = Expired {
            key: key.clone(),
            generation,
        };
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // The receiver is gone once the engine shut down.
            let _ = tx.send(fired);
        });

        debug!("Scheduled expiry for {} in {:?}", key, after);
        self.timers.insert(key, ScheduledTimer { generation, task });
    }

    /// Cancels the timer for `key`. Safe to call when it already fired or was never set.
    pub fn cancel(&mut self, key: &RecordKey) -> bool {
        match self.timers.remove(key) {
            Some(timer) => {
                timer.task.abort();
                debug!("Cancelled expiry for {}", key);
                true
            }
            None => false,
        }
    }

    /// Takes ownership of a fired timer. Returns false for firings that were
    /// cancelled or replaced after they had already been queued.
    pub fn claim(&mut self, fired: &Expired) -> bool {
        match self.timers.get(&fired.key) {
            Some(timer) if timer.generation == fired.generation => {
                self.timers.remove(&fired.key);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn is_scheduled(&self, key: &RecordKey) -> bool {
        self.timers.contains_key(key)
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for ExpiryManager {
    fn drop(&mut self) {
        for timer in self.timers.values() {
            timer.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> RecordKey {
        RecordKey::PreAlert(id.to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once_after_duration() {
        let (mut expiry, mut fired_rx) = ExpiryManager::new();
        expiry.schedule(key("n1"), Duration::from_secs(120));

        tokio::time::sleep(Duration::from_secs(119)).await;
        assert!(fired_rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let fired = fired_rx.try_recv().unwrap();
        assert_eq!(fired.key, key("n1"));
        assert!(expiry.claim(&fired));
        assert!(!expiry.claim(&fired));
        assert_eq!(expiry.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (mut expiry, mut fired_rx) = ExpiryManager::new();
        expiry.schedule(key("n1"), Duration::from_secs(120));

        assert!(expiry.cancel(&key("n1")));
        assert!(!expiry.cancel(&key("n1")));
        assert!(!expiry.cancel(&key("never")));

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(fired_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_firing_queued_before_cancel_is_not_claimed() {
        let (mut expiry, mut fired_rx) = ExpiryManager::new();
        expiry.schedule(key("n1"), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(11)).await;
        let fired = fired_rx.try_recv().unwrap();

        // the record was matched while the firing sat in the queue
        expiry.cancel(&key("n1"));
        assert!(!expiry.claim(&fired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_previous_timer() {
        let (mut expiry, mut fired_rx) = ExpiryManager::new();
        expiry.schedule(key("n1"), Duration::from_secs(10));
        expiry.schedule(key("n1"), Duration::from_secs(60));
        assert_eq!(expiry.pending(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(fired_rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(31)).await;
        let fired = fired_rx.try_recv().unwrap();
        assert!(expiry.claim(&fired));
    }
}

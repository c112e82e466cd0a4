//! In-process queue with long polling and visibility timeouts.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;
use crate::queue::Queue;
use crate::types::{Delivery, Message, Receipt};

pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(20);
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);
/// Shortest wait of an empty receive, whatever the configured wait time.
pub const MIN_WAIT_TIME: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct Entry {
    message: Message,
    visible_at: Instant,
    receipt: Option<Receipt>,
}

/// Messages in arrival order plus a receipt index for O(1) deletes.
#[derive(Debug, Default)]
struct MemoryQueueState {
    next_id: u64,
    order: VecDeque<u64>,
    entries: HashMap<u64, Entry>,
    receipts: HashMap<Receipt, u64>,
}

impl MemoryQueueState {
    fn push(&mut self, message: Message, now: Instant) {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                message,
                visible_at: now,
                receipt: None,
            },
        );
        self.order.push_back(id);
    }

    /// Hand out the oldest visible message under a fresh receipt.
    fn claim(&mut self, now: Instant, visibility: Duration) -> Option<Delivery> {
        let id = self
            .order
            .iter()
            .copied()
            .find(|id| self.entries.get(id).is_some_and(|e| e.visible_at <= now))?;
        let entry = self.entries.get_mut(&id)?;

        // A redelivered message invalidates its previous receipt.
        if let Some(old) = entry.receipt.take() {
            self.receipts.remove(&old);
        }
        let receipt = Receipt::generate();
        entry.receipt = Some(receipt.clone());
        entry.visible_at = now + visibility;
        self.receipts.insert(receipt.clone(), id);

        Some(Delivery::new(entry.message.clone(), receipt))
    }

    fn remove(&mut self, receipt: &Receipt) -> bool {
        let Some(id) = self.receipts.remove(receipt) else {
            return false;
        };
        self.entries.remove(&id);
        self.order.retain(|other| *other != id);
        true
    }

    fn next_visible_at(&self) -> Option<Instant> {
        self.entries.values().map(|e| e.visible_at).min()
    }
}

/// A [`Queue`] kept entirely in memory.
///
/// Behaves like a hosted queue: `receive` long-polls for up to `wait_time`,
/// and a received message is hidden for `visibility_timeout` unless deleted.
pub struct MemoryQueue {
    state: Mutex<MemoryQueueState>,
    notify: Notify,
    wait_time: Duration,
    visibility_timeout: Duration,
}

impl fmt::Debug for MemoryQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryQueue")
            .field("wait_time", &self.wait_time)
            .field("visibility_timeout", &self.visibility_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT_TIME, DEFAULT_VISIBILITY_TIMEOUT)
    }
}

impl MemoryQueue {
    pub fn new(wait_time: Duration, visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(MemoryQueueState::default()),
            notify: Notify::new(),
            wait_time,
            visibility_timeout,
        }
    }

    /// Number of messages not yet deleted, including in-flight ones.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of messages currently received but not deleted.
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.receipts.len()
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn send(&self, message: &Message) -> Result<(), QueueError> {
        self.state.lock().await.push(message.clone(), Instant::now());
        self.notify.notify_one();
        Ok(())
    }

    async fn receive(&self, cancel: &CancellationToken) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + self.wait_time.max(MIN_WAIT_TIME);

        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            let (delivery, next_visible) = {
                let mut state = self.state.lock().await;
                let delivery = state.claim(Instant::now(), self.visibility_timeout);
                (delivery, state.next_visible_at())
            };
            if delivery.is_some() {
                return Ok(delivery);
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }

            let wake_at = next_visible.map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete(&self, receipt: &Receipt) -> Result<(), QueueError> {
        if self.state.lock().await.remove(receipt) {
            Ok(())
        } else {
            Err(QueueError::ReceiptNotFound(receipt.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> MemoryQueue {
        MemoryQueue::new(Duration::from_millis(50), Duration::from_secs(30))
    }

    #[tokio::test]
    async fn sends_receives_and_deletes() {
        let queue = queue();
        let cancel = CancellationToken::new();

        queue.send(&Message::from([("foo", "bar")])).await.unwrap();

        let delivery = queue.receive(&cancel).await.unwrap().expect("message");
        assert_eq!(delivery.message, Message::from([("foo", "bar")]));
        assert!(!delivery.receipt.as_str().is_empty());

        queue.delete(&delivery.receipt).await.unwrap();
        assert!(queue.receive(&cancel).await.unwrap().is_none());
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn receive_returns_nothing_when_already_cancelled() {
        let queue = queue();
        queue.send(&Message::new()).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(queue.receive(&cancel).await.unwrap().is_none());
        assert_eq!(queue.in_flight().await, 0);
    }

    #[tokio::test]
    async fn receive_wakes_up_for_a_new_message() {
        let queue = std::sync::Arc::new(MemoryQueue::new(
            Duration::from_secs(5),
            Duration::from_secs(30),
        ));
        let cancel = CancellationToken::new();

        let sender = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            sender.send(&Message::for_job("late")).await.unwrap();
        });

        let delivery = queue.receive(&cancel).await.unwrap().expect("message");
        assert_eq!(delivery.message.job(), Some("late"));
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_long_poll() {
        let queue = MemoryQueue::new(Duration::from_secs(60), Duration::from_secs(30));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), queue.receive(&cancel)).await;
        assert!(matches!(result, Ok(Ok(None))));
    }

    #[tokio::test]
    async fn in_flight_message_is_redelivered_after_visibility_timeout() {
        let queue = MemoryQueue::new(Duration::from_millis(200), Duration::from_millis(30));
        let cancel = CancellationToken::new();
        queue.send(&Message::for_job("retry")).await.unwrap();

        let first = queue.receive(&cancel).await.unwrap().expect("first delivery");
        let second = queue.receive(&cancel).await.unwrap().expect("redelivery");
        assert_eq!(first.message, second.message);
        assert_ne!(first.receipt, second.receipt);

        // The stale receipt no longer deletes anything.
        assert!(matches!(
            queue.delete(&first.receipt).await,
            Err(QueueError::ReceiptNotFound(_))
        ));
        queue.delete(&second.receipt).await.unwrap();
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn zero_wait_time_still_waits_before_returning_nothing() {
        let queue = MemoryQueue::new(Duration::ZERO, Duration::from_secs(30));
        let cancel = CancellationToken::new();

        let started = Instant::now();
        assert!(queue.receive(&cancel).await.unwrap().is_none());
        assert!(started.elapsed() >= MIN_WAIT_TIME);
    }

    #[tokio::test]
    async fn delivers_in_send_order() {
        let queue = queue();
        let cancel = CancellationToken::new();
        for n in 0..3 {
            queue
                .send(&Message::for_job("ordered").with("n", n.to_string()))
                .await
                .unwrap();
        }

        for n in 0..3 {
            let delivery = queue.receive(&cancel).await.unwrap().expect("message");
            assert_eq!(delivery.message.get("n"), Some(n.to_string().as_str()));
        }
    }
}

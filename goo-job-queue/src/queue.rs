//! The queue capability consumed by the runner and by request handlers.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;
use crate::types::{Delivery, Message, Receipt};

/// A message queue with receive/delete (at-least-once) semantics.
///
/// A received message stays hidden from other receivers until it is deleted
/// with its receipt or until the backend's visibility timeout lapses, after
/// which it is delivered again.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Put a message on the queue.
    async fn send(&self, message: &Message) -> Result<(), QueueError>;

    /// Wait for the next message.
    ///
    /// Returns `Ok(None)` when nothing arrived within the backend's wait time,
    /// and also when `cancel` is already cancelled or becomes cancelled while
    /// waiting. Cancellation is never reported as an error.
    async fn receive(&self, cancel: &CancellationToken) -> Result<Option<Delivery>, QueueError>;

    /// Acknowledge a received message, removing it from the queue.
    async fn delete(&self, receipt: &Receipt) -> Result<(), QueueError>;
}

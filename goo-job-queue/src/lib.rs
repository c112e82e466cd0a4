//! Queue abstraction and job runner for the Goo newsletter service.
//!
//! Side effects such as sending emails are not performed inside HTTP
//! requests. Request handlers put a [`Message`] on a [`Queue`], and a
//! [`Runner`] running next to the web server picks it up and calls the
//! handler registered for the message's job type.
//!
//! # Architecture
//!
//! - [`Queue`] - Receive/delete queue capability with at-least-once delivery
//! - [`MemoryQueue`] - In-process queue used for tests and local development
//! - [`JobHandler`] - Trait for implementing job handlers
//! - [`HandlerRegistry`] - Job name to handler mapping, owned by the runner
//! - [`Runner`] - The poll/dispatch loop
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use goo_job_queue::{HandlerRegistry, MemoryQueue, Message, Queue, Runner, RunnerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let queue = Arc::new(MemoryQueue::default());
//!
//!     let mut registry = HandlerRegistry::new();
//!     registry.register("hello", |_ctx, message: Message| async move {
//!         println!("hello {}", message.get("name").unwrap_or("world"));
//!         Ok(())
//!     });
//!
//!     let metrics = prometheus::Registry::new();
//!     let runner = Runner::new(queue.clone(), registry, RunnerConfig::default(), &metrics).unwrap();
//!
//!     queue.send(&Message::for_job("hello").with("name", "Goo")).await.unwrap();
//!
//!     let shutdown = CancellationToken::new();
//!     runner.start(shutdown).await;
//! }
//! ```

mod error;
mod handler;
mod memory;
mod metrics;
mod queue;
mod runner;
mod types;

pub use error::{JobError, QueueError};
pub use handler::{FnHandler, HandlerRegistry, JobContext, JobHandler};
pub use memory::{MemoryQueue, DEFAULT_VISIBILITY_TIMEOUT, DEFAULT_WAIT_TIME, MIN_WAIT_TIME};
pub use metrics::RunnerMetrics;
pub use queue::Queue;
pub use runner::{Runner, RunnerConfig, DEFAULT_ERROR_BACKOFF, DEFAULT_JOB_TIMEOUT};
pub use types::{Delivery, Message, Receipt, JOB_KEY};

// Re-exports for implementing handlers and queues without extra dependencies.
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

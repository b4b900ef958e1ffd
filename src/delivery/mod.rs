//! Asynchronous delivery: serial queues and the per-entry decode/submit pipeline.
//!
//! ## Contents
//! - [`DeliveryQueue`] bounded FIFO served by one worker task
//! - [`DeliveryPipeline`] decode per entry, build the
//!   [`Notification`](crate::Notification), submit to the entry's queue
//!
//! Delivery is always out of line: the thread that triggers it only enqueues.
//! No ordering is promised across entries; each queue is FIFO.

mod pipeline;
mod queue;

pub(crate) use pipeline::DeliveryPipeline;
pub use queue::DeliveryQueue;

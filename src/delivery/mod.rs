//! # Delivery Module - Best-Effort Reliable Publish
//!
//! - [`queue`] - bounded buffer of outbound messages with send-or-buffer, flush and
//!   persistence across restarts
//! - [`health`] - watches publish recency and asks for a forced reconnect after
//!   repeated missed windows
//!
//! Loss is bounded rather than excluded: a sustained outage overwrites the oldest
//! buffered entries, and at most `persist_capacity` entries survive a restart.

pub mod health;
pub mod queue;

pub use health::{HealthMonitor, HealthVerdict};
pub use queue::{Delivery, DeliveryQueue, FlushReport, QueueEntry};

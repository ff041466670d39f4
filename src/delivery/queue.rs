//! Bounded outbound queue.
//!
//! Entries are kept in insertion order; the front is the oldest and is flushed first.
//! When the queue is full a new entry overwrites the oldest one.
//!
//! ## Persisted layout
//!
//! ```text
//! buf_count   number of saved entries (decimal)
//! topic_<i>   topic, UTF-8
//! data_<i>    payload bytes
//! ts_<i>      enqueue time, ms since the Unix epoch (decimal)
//! ```
//!
//! A restored snapshot stays in storage until the queue is persisted again, so a
//! second power loss before that point restores the same entries once more.

use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::errors::StoreError;
use crate::metrics;
use crate::storage::{get_u64, set_u64, KvStore};
use crate::transport::Publisher;

pub const DEFAULT_CAPACITY: usize = 20;
pub const DEFAULT_PERSIST_CAPACITY: usize = 10;
pub const DEFAULT_MAX_PAYLOAD: usize = 512;

pub const KEY_COUNT: &str = "buf_count";

fn key_topic(i: usize) -> String {
    format!("topic_{}", i)
}
fn key_data(i: usize) -> String {
    format!("data_{}", i)
}
fn key_ts(i: usize) -> String {
    format!("ts_{}", i)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub topic: String,
    pub payload: Vec<u8>,
    /// Wall-clock ms, so it stays meaningful across restarts.
    pub enqueued_at: u64,
}

/// What happened to a message handed to [`DeliveryQueue::publish_or_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Buffered,
    /// Buffered, and the oldest entry was overwritten to make room.
    BufferedWithLoss,
    /// Could not be sent and exceeds the buffer's payload limit.
    Dropped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub sent: usize,
    pub remaining: usize,
    pub failed: bool,
}

#[derive(Debug)]
pub struct DeliveryQueue {
    entries: VecDeque<QueueEntry>,
    capacity: usize,
    persist_capacity: usize,
    max_payload: usize,
    /// Storage holds a snapshot restored into this queue and not rewritten since.
    snapshot_outstanding: bool,
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_PERSIST_CAPACITY, DEFAULT_MAX_PAYLOAD)
    }
}

impl DeliveryQueue {
    pub fn new(capacity: usize, persist_capacity: usize, max_payload: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            persist_capacity: persist_capacity.min(capacity),
            max_payload,
            snapshot_outstanding: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn persist_capacity(&self) -> usize {
        self.persist_capacity
    }

    /// True after a restore until the next persist. Once a flush has sent restored
    /// entries the snapshot is stale and should be rewritten.
    pub fn snapshot_outstanding(&self) -> bool {
        self.snapshot_outstanding
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    /// Send now when connected, otherwise (or on failure) buffer for the next flush.
    pub fn publish_or_buffer(
        &mut self,
        publisher: &dyn Publisher,
        topic: &str,
        payload: &[u8],
        now: u64,
    ) -> Delivery {
        if publisher.is_connected() {
            match publisher.publish(topic, payload, false) {
                Ok(()) => {
                    metrics::inc_publish_sent();
                    return Delivery::Sent;
                }
                Err(e) => {
                    metrics::inc_publish_failed();
                    debug!("publish to {} failed, buffering: {}", topic, e);
                }
            }
        }
        if payload.len() > self.max_payload {
            warn!(
                "dropping {} byte message for {}: exceeds buffer limit {}",
                payload.len(),
                topic,
                self.max_payload
            );
            return Delivery::Dropped;
        }
        if self.enqueue(topic, payload, now) {
            Delivery::BufferedWithLoss
        } else {
            Delivery::Buffered
        }
    }

    /// Append an entry. Returns true when the oldest entry was overwritten.
    pub fn enqueue(&mut self, topic: &str, payload: &[u8], now: u64) -> bool {
        let overwrote = if self.entries.len() >= self.capacity {
            if let Some(lost) = self.entries.pop_front() {
                warn!(
                    "delivery queue full ({}), overwriting oldest entry for {}",
                    self.capacity, lost.topic
                );
            }
            metrics::inc_queue_overflows();
            true
        } else {
            false
        };
        self.entries.push_back(QueueEntry {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            enqueued_at: now,
        });
        overwrote
    }

    /// Send up to `max` entries oldest first. The first failure ends the call; the
    /// failed entry stays at the front for the next tick.
    pub fn flush(&mut self, publisher: &dyn Publisher, max: usize) -> FlushReport {
        let mut report = FlushReport::default();
        if !publisher.is_connected() {
            report.remaining = self.entries.len();
            return report;
        }
        while report.sent < max {
            let Some(entry) = self.entries.front() else {
                break;
            };
            match publisher.publish(&entry.topic, &entry.payload, false) {
                Ok(()) => {
                    metrics::inc_publish_sent();
                    self.entries.pop_front();
                    report.sent += 1;
                }
                Err(e) => {
                    metrics::inc_publish_failed();
                    debug!("flush stopped at {}: {}", entry.topic, e);
                    report.failed = true;
                    break;
                }
            }
        }
        report.remaining = self.entries.len();
        if report.sent > 0 {
            debug!("flushed {} buffered messages, {} remaining", report.sent, report.remaining);
        }
        report
    }

    /// Save the most recent `persist_capacity` entries. The count is zeroed first and
    /// written last, so an interrupted persist never exposes a half-written entry.
    pub fn persist(&mut self, kv: &dyn KvStore) -> Result<usize, StoreError> {
        let skip = self.entries.len().saturating_sub(self.persist_capacity);
        set_u64(kv, KEY_COUNT, 0)?;
        let mut saved = 0;
        for (i, entry) in self.entries.iter().skip(skip).enumerate() {
            kv.set(&key_topic(i), entry.topic.as_bytes())?;
            kv.set(&key_data(i), &entry.payload)?;
            set_u64(kv, &key_ts(i), entry.enqueued_at)?;
            saved += 1;
        }
        set_u64(kv, KEY_COUNT, saved as u64)?;
        kv.flush()?;
        self.snapshot_outstanding = false;
        metrics::add_entries_persisted(saved as u64);
        debug!("persisted {} queued messages", saved);
        Ok(saved)
    }

    /// Load a saved snapshot behind whatever is already queued. The snapshot is left
    /// in place; the next [`DeliveryQueue::persist`] replaces it.
    pub fn restore(&mut self, kv: &dyn KvStore) -> Result<usize, StoreError> {
        let count = get_u64(kv, KEY_COUNT)?.unwrap_or(0) as usize;
        let count = count.min(self.persist_capacity);
        let mut restored = 0;
        for i in 0..count {
            let (Some(topic), Some(payload)) = (kv.get(&key_topic(i))?, kv.get(&key_data(i))?)
            else {
                warn!("persisted queue entry {} incomplete, stopping restore", i);
                break;
            };
            let topic = String::from_utf8(topic).map_err(|_| StoreError::Corrupt(key_topic(i)))?;
            let ts = get_u64(kv, &key_ts(i))?.unwrap_or(0);
            self.enqueue(&topic, &payload, ts);
            restored += 1;
        }
        if restored > 0 {
            self.snapshot_outstanding = true;
            info!("restored {} queued messages from storage", restored);
            metrics::add_entries_restored(restored as u64);
        }
        Ok(restored)
    }
}

//! Process-wide counters for the decode and delivery paths.
//! Relaxed atomics only; values are advisory and reported in status responses.
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

static FRAMES_DECODED: AtomicU64 = AtomicU64::new(0);
static FRAMES_REJECTED: AtomicU64 = AtomicU64::new(0);
static HEURISTIC_TAGS: AtomicU64 = AtomicU64::new(0);
static TAGS_EVICTED: AtomicU64 = AtomicU64::new(0);
static QUEUE_OVERFLOWS: AtomicU64 = AtomicU64::new(0);
static PUBLISH_SENT: AtomicU64 = AtomicU64::new(0);
static PUBLISH_FAILED: AtomicU64 = AtomicU64::new(0);
static ENTRIES_PERSISTED: AtomicU64 = AtomicU64::new(0);
static ENTRIES_RESTORED: AtomicU64 = AtomicU64::new(0);
static FORCED_RECONNECTS: AtomicU64 = AtomicU64::new(0);

pub fn inc_frames_decoded() {
    FRAMES_DECODED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_frames_rejected() {
    FRAMES_REJECTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_heuristic_tags() {
    HEURISTIC_TAGS.fetch_add(1, Ordering::Relaxed);
}
pub fn add_tags_evicted(n: u64) {
    TAGS_EVICTED.fetch_add(n, Ordering::Relaxed);
}
pub fn inc_queue_overflows() {
    QUEUE_OVERFLOWS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_publish_sent() {
    PUBLISH_SENT.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_publish_failed() {
    PUBLISH_FAILED.fetch_add(1, Ordering::Relaxed);
}
pub fn add_entries_persisted(n: u64) {
    ENTRIES_PERSISTED.fetch_add(n, Ordering::Relaxed);
}
pub fn add_entries_restored(n: u64) {
    ENTRIES_RESTORED.fetch_add(n, Ordering::Relaxed);
}
pub fn inc_forced_reconnects() {
    FORCED_RECONNECTS.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct Snapshot {
    pub frames_decoded: u64,
    pub frames_rejected: u64,
    pub heuristic_tags: u64,
    pub tags_evicted: u64,
    pub queue_overflows: u64,
    pub publish_sent: u64,
    pub publish_failed: u64,
    pub entries_persisted: u64,
    pub entries_restored: u64,
    pub forced_reconnects: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        frames_decoded: FRAMES_DECODED.load(Ordering::Relaxed),
        frames_rejected: FRAMES_REJECTED.load(Ordering::Relaxed),
        heuristic_tags: HEURISTIC_TAGS.load(Ordering::Relaxed),
        tags_evicted: TAGS_EVICTED.load(Ordering::Relaxed),
        queue_overflows: QUEUE_OVERFLOWS.load(Ordering::Relaxed),
        publish_sent: PUBLISH_SENT.load(Ordering::Relaxed),
        publish_failed: PUBLISH_FAILED.load(Ordering::Relaxed),
        entries_persisted: ENTRIES_PERSISTED.load(Ordering::Relaxed),
        entries_restored: ENTRIES_RESTORED.load(Ordering::Relaxed),
        forced_reconnects: FORCED_RECONNECTS.load(Ordering::Relaxed),
    }
}

//! Fixed-capacity tag cache.
//!
//! Slots are keyed by (collection mode, EPC): the two modes are independent tag
//! sets sharing one backing array and one global detection counter. A new key
//! takes an empty slot, else stale tags are evicted and the search retried, else
//! the slot with the oldest `last_seen` is overwritten.

use log::debug;
use serde::Serialize;

use super::CollectionMode;
use crate::metrics;

pub const DEFAULT_MAX_TAGS: usize = 64;
pub const DEFAULT_TAG_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_JSON_ENTRIES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Canonical uppercase hex.
    pub epc: String,
    pub rssi: i32,
    /// 1..=8, 0 when unknown.
    pub antenna: u8,
    pub last_seen: u64,
    pub detections: u32,
    pub mode: CollectionMode,
}

/// Serialized form of one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRecord {
    pub epc: String,
    pub rssi: i32,
    pub ant: u8,
    pub ts: u64,
    pub detections: u32,
}

impl From<&Tag> for TagRecord {
    fn from(tag: &Tag) -> Self {
        Self {
            epc: tag.epc.clone(),
            rssi: tag.rssi,
            ant: tag.antenna,
            ts: tag.last_seen,
            detections: tag.detections,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Updated { slot: usize },
    Inserted { slot: usize },
    /// Store was full with nothing stale; the oldest tag was overwritten.
    Replaced { slot: usize, evicted: String },
}

impl UpsertOutcome {
    pub fn slot(&self) -> usize {
        match self {
            UpsertOutcome::Updated { slot }
            | UpsertOutcome::Inserted { slot }
            | UpsertOutcome::Replaced { slot, .. } => *slot,
        }
    }
}

#[derive(Debug)]
pub struct TagStore {
    slots: Vec<Option<Tag>>,
    timeout_ms: u64,
    max_json_entries: usize,
    total_detections: u64,
}

impl Default for TagStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TAGS, DEFAULT_TAG_TIMEOUT_MS, DEFAULT_MAX_JSON_ENTRIES)
    }
}

impl TagStore {
    pub fn new(max_tags: usize, timeout_ms: u64, max_json_entries: usize) -> Self {
        Self {
            slots: vec![None; max_tags.max(1)],
            timeout_ms,
            max_json_entries,
            total_detections: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len_for(&self, mode: CollectionMode) -> usize {
        self.iter_mode(mode).count()
    }

    pub fn total_detections(&self) -> u64 {
        self.total_detections
    }

    pub fn get(&self, mode: CollectionMode, epc: &str) -> Option<&Tag> {
        self.find(mode, &epc.to_ascii_uppercase())
            .and_then(|i| self.slots[i].as_ref())
    }

    pub fn upsert(
        &mut self,
        epc: &str,
        rssi: i32,
        antenna: u8,
        mode: CollectionMode,
        now: u64,
    ) -> UpsertOutcome {
        let epc = epc.to_ascii_uppercase();
        self.total_detections += 1;

        if let Some(slot) = self.find(mode, &epc) {
            if let Some(tag) = self.slots[slot].as_mut() {
                tag.rssi = rssi;
                tag.antenna = antenna;
                tag.last_seen = tag.last_seen.max(now);
                tag.detections = tag.detections.saturating_add(1);
            }
            return UpsertOutcome::Updated { slot };
        }

        let (slot, evicted) = self.allocate(now);
        debug!(
            "new tag epc={} rssi={} ant={} mode={} slot={}",
            epc,
            rssi,
            antenna,
            mode.as_str(),
            slot
        );
        self.slots[slot] = Some(Tag {
            epc,
            rssi,
            antenna,
            last_seen: now,
            detections: 1,
            mode,
        });
        match evicted {
            Some(evicted) => UpsertOutcome::Replaced { slot, evicted },
            None => UpsertOutcome::Inserted { slot },
        }
    }

    /// Drop every tag idle longer than the timeout. Returns the number removed.
    pub fn evict_stale(&mut self, now: u64) -> usize {
        let timeout = self.timeout_ms;
        let mut removed = 0;
        for slot in self.slots.iter_mut() {
            let stale = matches!(slot, Some(tag) if now.saturating_sub(tag.last_seen) > timeout);
            if stale {
                *slot = None;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("evicted {} stale tags", removed);
            metrics::add_tags_evicted(removed as u64);
        }
        removed
    }

    /// Remove every tag attributed to `mode`.
    pub fn clear(&mut self, mode: CollectionMode) -> usize {
        let mut removed = 0;
        for slot in self.slots.iter_mut() {
            if matches!(slot, Some(tag) if tag.mode == mode) {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }

    /// Live tags of one mode in slot order, capped at the JSON entry limit. Tags
    /// idle past the timeout at `now` are evicted first.
    pub fn records(&mut self, mode: CollectionMode, now: u64) -> Vec<TagRecord> {
        self.evict_stale(now);
        self.iter_mode(mode)
            .take(self.max_json_entries)
            .map(TagRecord::from)
            .collect()
    }

    pub fn to_json(&mut self, mode: CollectionMode, now: u64) -> Vec<u8> {
        serde_json::to_vec(&self.records(mode, now)).unwrap_or_else(|_| b"[]".to_vec())
    }

    fn iter_mode(&self, mode: CollectionMode) -> impl Iterator<Item = &Tag> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref())
            .filter(move |t| t.mode == mode)
    }

    fn find(&self, mode: CollectionMode, epc: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some(tag) if tag.mode == mode && tag.epc == epc))
    }

    fn empty_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_none())
    }

    fn allocate(&mut self, now: u64) -> (usize, Option<String>) {
        if let Some(slot) = self.empty_slot() {
            return (slot, None);
        }
        self.evict_stale(now);
        if let Some(slot) = self.empty_slot() {
            return (slot, None);
        }
        let oldest = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|t| (i, t.last_seen)))
            .min_by_key(|(_, seen)| *seen)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let evicted = self.slots[oldest].take().map(|t| t.epc);
        metrics::add_tags_evicted(1);
        (oldest, evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPC: &str = "E2806915600002166510B331";

    #[test]
    fn repeat_sighting_updates_in_place() {
        let mut store = TagStore::default();
        assert_eq!(
            store.upsert(EPC, -48, 1, CollectionMode::Remote, 100),
            UpsertOutcome::Inserted { slot: 0 }
        );
        assert_eq!(
            store.upsert(&EPC.to_lowercase(), -50, 2, CollectionMode::Remote, 200),
            UpsertOutcome::Updated { slot: 0 }
        );
        let tag = store.get(CollectionMode::Remote, EPC).unwrap();
        assert_eq!(tag.detections, 2);
        assert_eq!(tag.rssi, -50);
        assert_eq!(tag.antenna, 2);
        assert_eq!(tag.last_seen, 200);
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_detections(), 2);
    }

    #[test]
    fn last_seen_never_goes_backwards() {
        let mut store = TagStore::default();
        store.upsert(EPC, -40, 1, CollectionMode::Local, 500);
        store.upsert(EPC, -40, 1, CollectionMode::Local, 400);
        assert_eq!(store.get(CollectionMode::Local, EPC).unwrap().last_seen, 500);
    }

    #[test]
    fn modes_are_independent_sets() {
        let mut store = TagStore::default();
        store.upsert(EPC, -40, 1, CollectionMode::Local, 1);
        store.upsert(EPC, -40, 1, CollectionMode::Remote, 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.clear(CollectionMode::Local), 1);
        assert!(store.get(CollectionMode::Local, EPC).is_none());
        assert!(store.get(CollectionMode::Remote, EPC).is_some());
    }

    #[test]
    fn full_store_overwrites_oldest() {
        let mut store = TagStore::new(3, 30_000, 50);
        store.upsert("E2800001", -40, 1, CollectionMode::Remote, 10);
        store.upsert("E2800002", -40, 1, CollectionMode::Remote, 5);
        store.upsert("E2800003", -40, 1, CollectionMode::Remote, 20);
        let outcome = store.upsert("E2800004", -40, 1, CollectionMode::Remote, 30);
        assert_eq!(
            outcome,
            UpsertOutcome::Replaced {
                slot: 1,
                evicted: "E2800002".into()
            }
        );
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn full_store_prefers_stale_eviction() {
        let mut store = TagStore::new(2, 1_000, 50);
        store.upsert("E2800001", -40, 1, CollectionMode::Remote, 0);
        store.upsert("E2800002", -40, 1, CollectionMode::Remote, 1_500);
        let outcome = store.upsert("E2800003", -40, 1, CollectionMode::Remote, 2_000);
        assert_eq!(outcome, UpsertOutcome::Inserted { slot: 0 });
    }

    #[test]
    fn json_is_filtered_and_capped() {
        let mut store = TagStore::new(8, 30_000, 3);
        for i in 0..5 {
            store.upsert(&format!("E28000{:02X}", i), -40, 1, CollectionMode::Remote, i);
        }
        store.upsert("E2800099", -40, 1, CollectionMode::Local, 9);
        let json: serde_json::Value =
            serde_json::from_slice(&store.to_json(CollectionMode::Remote, 9)).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 3);
        assert_eq!(json[0]["epc"], "E2800000");
        assert_eq!(json[0]["ant"], 1);
        assert_eq!(json[0]["detections"], 1);

        let local: serde_json::Value =
            serde_json::from_slice(&store.to_json(CollectionMode::Local, 9)).unwrap();
        assert_eq!(local.as_array().unwrap().len(), 1);
    }
}

//! Antenna power cache with a single in-flight query.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::errors::LinkError;
use crate::protocol::{ids, Frame};
use crate::transport::Link;

pub const DEFAULT_POWER_DBM: i32 = 30;
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 3_000;
pub const ANTENNA_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerLevels {
    pub ant1: i32,
    pub ant2: i32,
    pub ant3: i32,
    pub ant4: i32,
}

impl Default for PowerLevels {
    fn default() -> Self {
        Self::uniform(DEFAULT_POWER_DBM)
    }
}

impl PowerLevels {
    pub fn uniform(dbm: i32) -> Self {
        Self::from_array([dbm; ANTENNA_COUNT])
    }

    pub fn from_array(a: [i32; ANTENNA_COUNT]) -> Self {
        Self {
            ant1: a[0],
            ant2: a[1],
            ant3: a[2],
            ant4: a[3],
        }
    }

    pub fn as_array(&self) -> [i32; ANTENNA_COUNT] {
        [self.ant1, self.ant2, self.ant3, self.ant4]
    }
}

#[derive(Debug)]
pub struct PowerCache {
    levels: PowerLevels,
    pending: bool,
    request_started_at: u64,
    timeout_ms: u64,
}

impl Default for PowerCache {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_TIMEOUT_MS)
    }
}

impl PowerCache {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            levels: PowerLevels::default(),
            pending: false,
            request_started_at: 0,
            timeout_ms,
        }
    }

    pub fn levels(&self) -> PowerLevels {
        self.levels
    }

    /// Mark a query in flight and send it. A second call supersedes the first.
    /// If the send fails the flag is left clear.
    pub fn begin_query(&mut self, link: &dyn Link, now: u64) -> Result<(), LinkError> {
        self.pending = true;
        self.request_started_at = now;
        if let Err(e) = link.send(&Frame::power_query().encode()) {
            self.pending = false;
            return Err(e);
        }
        Ok(())
    }

    /// Apply a power-query reply. Returns false (and leaves the cache untouched)
    /// when the frame is not a well-formed report.
    pub fn apply_response(&mut self, frame: &Frame) -> bool {
        if !frame.matches(ids::CATEGORY_RFID, ids::MID_POWER_QUERY) {
            return false;
        }
        match parse_report(&frame.payload) {
            Some(levels) => {
                self.levels = levels;
                self.pending = false;
                info!(
                    "power report: ant1={} ant2={} ant3={} ant4={}",
                    levels.ant1, levels.ant2, levels.ant3, levels.ant4
                );
                true
            }
            None => {
                debug!("ignoring malformed power report ({} bytes)", frame.payload.len());
                false
            }
        }
    }

    /// Whether a query is still outstanding; clears the flag once it has timed out.
    pub fn is_pending(&mut self, now: u64) -> bool {
        if self.pending && now.saturating_sub(self.request_started_at) > self.timeout_ms {
            debug!("power query timed out after {} ms", self.timeout_ms);
            self.pending = false;
        }
        self.pending
    }

    /// Send a set-power command; the cache takes the new levels once the send succeeds.
    pub fn set(&mut self, link: &dyn Link, levels: [u8; ANTENNA_COUNT]) -> Result<(), LinkError> {
        link.send(&Frame::power_set(levels).encode())?;
        self.levels = PowerLevels::from_array(levels.map(i32::from));
        info!(
            "power set: ant1={} ant2={} ant3={} ant4={}",
            levels[0], levels[1], levels[2], levels[3]
        );
        Ok(())
    }
}

/// Four (antenna id, level) pairs, ids 1..=4 in ascending order.
fn parse_report(payload: &[u8]) -> Option<PowerLevels> {
    if payload.len() != ANTENNA_COUNT * 2 {
        return None;
    }
    let mut out = [0i32; ANTENNA_COUNT];
    for (i, pair) in payload.chunks_exact(2).enumerate() {
        if pair[0] as usize != i + 1 {
            return None;
        }
        out[i] = pair[1] as i32;
    }
    Some(PowerLevels::from_array(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryLink;

    #[test]
    fn query_then_report_clears_pending() {
        let link = MemoryLink::new();
        let mut cache = PowerCache::default();
        cache.begin_query(&link, 1_000).unwrap();
        assert!(cache.is_pending(1_500));
        assert_eq!(link.sent(), vec![Frame::power_query().encode()]);

        let report = Frame::new(
            ids::CATEGORY_RFID,
            ids::MID_POWER_QUERY,
            vec![1, 0x1E, 2, 0x1E, 3, 0x1E, 4, 0x1E],
        );
        assert!(cache.apply_response(&report));
        assert!(!cache.is_pending(1_600));
        assert_eq!(cache.levels(), PowerLevels::uniform(30));
    }

    #[test]
    fn lost_response_times_out() {
        let link = MemoryLink::new();
        let mut cache = PowerCache::new(3_000);
        cache.begin_query(&link, 0).unwrap();
        assert!(cache.is_pending(3_000));
        assert!(!cache.is_pending(3_001));
    }

    #[test]
    fn rejects_out_of_order_or_short_reports() {
        let mut cache = PowerCache::default();
        let swapped = Frame::new(
            ids::CATEGORY_RFID,
            ids::MID_POWER_QUERY,
            vec![2, 10, 1, 10, 3, 10, 4, 10],
        );
        assert!(!cache.apply_response(&swapped));
        let short = Frame::new(ids::CATEGORY_RFID, ids::MID_POWER_QUERY, vec![1, 10]);
        assert!(!cache.apply_response(&short));
        let wrong_id = Frame::new(ids::CATEGORY_RFID, ids::MID_POWER_SET, vec![1, 10, 2, 10, 3, 10, 4, 10]);
        assert!(!cache.apply_response(&wrong_id));
        assert_eq!(cache.levels(), PowerLevels::default());
    }

    #[test]
    fn set_sends_frame_and_updates_cache() {
        let link = MemoryLink::new();
        let mut cache = PowerCache::default();
        cache.set(&link, [20, 21, 22, 23]).unwrap();
        assert_eq!(link.sent(), vec![Frame::power_set([20, 21, 22, 23]).encode()]);
        assert_eq!(cache.levels().as_array(), [20, 21, 22, 23]);
    }

    #[test]
    fn failed_set_keeps_levels() {
        let link = MemoryLink::new();
        link.set_open(false);
        let mut cache = PowerCache::default();
        assert!(cache.set(&link, [5, 5, 5, 5]).is_err());
        assert_eq!(cache.levels(), PowerLevels::default());
    }
}

//! Connection health monitor.
//!
//! Ticked on a fixed period while the daemon runs. A connected tick within the
//! liveness window of the last success counts as healthy and refreshes it; a
//! connected tick past that window is a miss. The window is the tick interval plus
//! half an interval of grace, so timer jitter alone never reads as a miss.
//! `failure_threshold` consecutive misses produce one
//! [`HealthVerdict::ForceReconnect`], after which the count starts over.

use log::{debug, warn};

use crate::metrics;

pub const DEFAULT_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_PERSIST_WATERMARK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    /// Not connected; nothing tracked this tick.
    Disconnected,
    Healthy,
    Missed { consecutive: u32 },
    /// Caller should drop and re-establish the broker connection.
    ForceReconnect,
}

#[derive(Debug, Clone)]
pub struct HealthMonitor {
    last_successful_publish: u64,
    consecutive_failures: u32,
    interval_ms: u64,
    failure_threshold: u32,
    persist_watermark: usize,
}

impl HealthMonitor {
    pub fn new(now: u64, interval_ms: u64, failure_threshold: u32, persist_watermark: usize) -> Self {
        Self {
            last_successful_publish: now,
            consecutive_failures: 0,
            interval_ms,
            failure_threshold: failure_threshold.max(1),
            persist_watermark,
        }
    }

    pub fn with_defaults(now: u64) -> Self {
        Self::new(
            now,
            DEFAULT_INTERVAL_MS,
            DEFAULT_FAILURE_THRESHOLD,
            DEFAULT_PERSIST_WATERMARK,
        )
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Longest gap since the last success that still counts as healthy.
    pub fn window_ms(&self) -> u64 {
        self.interval_ms.saturating_add(self.interval_ms / 2)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_successful_publish(&self) -> u64 {
        self.last_successful_publish
    }

    pub fn record_publish(&mut self, now: u64) {
        self.last_successful_publish = self.last_successful_publish.max(now);
    }

    pub fn tick(&mut self, now: u64, connected: bool) -> HealthVerdict {
        if !connected {
            debug!("health tick: broker disconnected");
            return HealthVerdict::Disconnected;
        }
        if now.saturating_sub(self.last_successful_publish) <= self.window_ms() {
            self.last_successful_publish = now;
            self.consecutive_failures = 0;
            return HealthVerdict::Healthy;
        }
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.failure_threshold {
            warn!(
                "no successful publish for {} ms over {} health windows, forcing reconnect",
                now.saturating_sub(self.last_successful_publish),
                self.consecutive_failures
            );
            metrics::inc_forced_reconnects();
            self.consecutive_failures = 0;
            self.last_successful_publish = now;
            return HealthVerdict::ForceReconnect;
        }
        debug!("health window missed ({} consecutive)", self.consecutive_failures);
        HealthVerdict::Missed {
            consecutive: self.consecutive_failures,
        }
    }

    /// Whether a backlog this large should be written to storage now.
    pub fn persist_due(&self, backlog: usize) -> bool {
        backlog > self.persist_watermark
    }
}

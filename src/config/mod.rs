//! # Configuration Management Module
//!
//! TOML configuration for the gateway daemon. Every section carries defaults, so a
//! partial file (or an empty one) loads cleanly and only overrides what it names.
//!
//! ## Configuration Structure
//!
//! - [`ReaderConfig`] - serial link and ingestion cadence
//! - [`BrokerConfig`] - device client id and the status topic root
//! - [`TagConfig`] - tag cache capacity, timeout and serialization caps
//! - [`ScannerConfig`] - plausibility windows of the heuristic tag scanner
//! - [`PowerConfig`] - power query timeout
//! - [`QueueConfig`] - delivery buffer sizing and flush cadence
//! - [`HealthConfig`] - connection health window and threshold
//! - [`StorageConfig`] - data directory for the persisted queue
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rfidgate::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     println!("Reader port: {}", config.reader.port);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [reader]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! legacy_stop = true
//!
//! [broker]
//! client_id = "rfid-reader-01"
//! publish_topic = "rfid/tags"
//!
//! [queue]
//! capacity = 20
//! persist_capacity = 10
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

use crate::delivery::{health, queue};
use crate::protocol::{DecodeLimits, ScannerTuning};
use crate::reader::{power, tags};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub tags: TagConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub power: PowerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Stop inventory with message id 0xFF instead of 0x11. Older reader firmware
    /// only understands the former.
    pub legacy_stop: bool,
    /// Structured frames handled per ingestion tick before yielding.
    pub max_frames_per_tick: usize,
    pub read_interval_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            legacy_stop: true,
            max_frames_per_tick: 32,
            read_interval_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub client_id: String,
    /// Root of the retained `<publish_topic>/status` marker.
    pub publish_topic: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            client_id: "rfid-reader-01".to_string(),
            publish_topic: "rfid/tags".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    pub max_tags: usize,
    pub timeout_ms: u64,
    /// Upper bound on tags in one serialized snapshot.
    pub max_json_entries: usize,
    /// Heuristic sightings taken from one serial chunk.
    pub max_tags_per_chunk: usize,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            max_tags: tags::DEFAULT_MAX_TAGS,
            timeout_ms: tags::DEFAULT_TAG_TIMEOUT_MS,
            max_json_entries: tags::DEFAULT_MAX_JSON_ENTRIES,
            max_tags_per_chunk: 10,
        }
    }
}

/// The antenna and RSSI windows have no documented ground truth; tune them
/// against captured reader traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub min_epc_len: usize,
    pub max_epc_len: usize,
    /// RSSI window as absolute dBm values.
    pub rssi_abs_min: i32,
    pub rssi_abs_max: i32,
    pub antenna_min: u8,
    pub antenna_max: u8,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        let tuning = ScannerTuning::default();
        Self {
            min_epc_len: tuning.min_epc_len,
            max_epc_len: tuning.max_epc_len,
            rssi_abs_min: tuning.rssi_abs_min,
            rssi_abs_max: tuning.rssi_abs_max,
            antenna_min: tuning.antenna_min,
            antenna_max: tuning.antenna_max,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    pub query_timeout_ms: u64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: power::DEFAULT_QUERY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
    /// Entries written to storage on persist; must be below `capacity`.
    pub persist_capacity: usize,
    pub max_payload: usize,
    /// Sends per flush tick.
    pub flush_batch: usize,
    pub flush_interval_ms: u64,
    pub batch_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: queue::DEFAULT_CAPACITY,
            persist_capacity: queue::DEFAULT_PERSIST_CAPACITY,
            max_payload: queue::DEFAULT_MAX_PAYLOAD,
            flush_batch: 5,
            flush_interval_ms: 1_000,
            batch_interval_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub interval_secs: u64,
    pub failure_threshold: u32,
    /// Backlog above which a health tick persists the queue.
    pub persist_watermark: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: health::DEFAULT_INTERVAL_MS / 1_000,
            failure_threshold: health::DEFAULT_FAILURE_THRESHOLD,
            persist_watermark: health::DEFAULT_PERSIST_WATERMARK,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

impl StorageConfig {
    /// Location of the key-value database.
    pub fn kv_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("kv")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("rfidgate.log".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config = Self::from_toml(&content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| anyhow!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.broker.client_id.trim().is_empty() {
            return Err(anyhow!("broker.client_id must not be empty"));
        }
        let reserved = |c: char| matches!(c, '/' | '+' | '#');
        if self.broker.client_id.contains(reserved) {
            return Err(anyhow!(
                "broker.client_id '{}' must not contain topic separators or wildcards",
                self.broker.client_id
            ));
        }
        if self.reader.baud_rate == 0 {
            return Err(anyhow!("reader.baud_rate must be positive"));
        }
        if self.reader.max_frames_per_tick == 0 {
            return Err(anyhow!("reader.max_frames_per_tick must be at least 1"));
        }
        if self.tags.max_tags == 0 || self.tags.max_json_entries == 0 {
            return Err(anyhow!("tags.max_tags and tags.max_json_entries must be at least 1"));
        }
        if self.tags.timeout_ms == 0 {
            return Err(anyhow!("tags.timeout_ms must be positive"));
        }
        let scanner = &self.scanner;
        if scanner.min_epc_len == 0
            || scanner.min_epc_len > scanner.max_epc_len
            || scanner.max_epc_len > u8::MAX as usize
        {
            return Err(anyhow!(
                "scanner EPC length window {}..={} must lie within 1..=255",
                scanner.min_epc_len,
                scanner.max_epc_len
            ));
        }
        if scanner.rssi_abs_min < 0
            || scanner.rssi_abs_min > scanner.rssi_abs_max
            || scanner.rssi_abs_max > u8::MAX as i32
        {
            return Err(anyhow!(
                "scanner RSSI window {}..={} must lie within 0..=255",
                scanner.rssi_abs_min,
                scanner.rssi_abs_max
            ));
        }
        if scanner.antenna_min == 0 || scanner.antenna_min > scanner.antenna_max {
            return Err(anyhow!(
                "scanner antenna window {}..={} must start at 1 and not be empty",
                scanner.antenna_min,
                scanner.antenna_max
            ));
        }
        if self.queue.capacity == 0 || self.queue.flush_batch == 0 || self.queue.max_payload == 0 {
            return Err(anyhow!(
                "queue.capacity, queue.flush_batch and queue.max_payload must be at least 1"
            ));
        }
        if self.queue.persist_capacity >= self.queue.capacity {
            return Err(anyhow!(
                "queue.persist_capacity ({}) must be below queue.capacity ({})",
                self.queue.persist_capacity,
                self.queue.capacity
            ));
        }
        if self.queue.flush_interval_ms == 0
            || self.queue.batch_interval_ms == 0
            || self.health.interval_secs == 0
            || self.reader.read_interval_ms == 0
        {
            return Err(anyhow!("intervals must be positive"));
        }
        if self.health.failure_threshold == 0 {
            return Err(anyhow!("health.failure_threshold must be at least 1"));
        }
        Ok(())
    }

    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_frames: self.reader.max_frames_per_tick,
            max_heuristic_tags: self.tags.max_tags_per_chunk,
        }
    }

    pub fn scanner_tuning(&self) -> ScannerTuning {
        ScannerTuning {
            min_epc_len: self.scanner.min_epc_len,
            max_epc_len: self.scanner.max_epc_len,
            rssi_abs_min: self.scanner.rssi_abs_min,
            rssi_abs_max: self.scanner.rssi_abs_max,
            antenna_min: self.scanner.antenna_min,
            antenna_max: self.scanner.antenna_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.tags.max_tags, 64);
        assert_eq!(config.tags.timeout_ms, 30_000);
        assert_eq!(config.queue.capacity, 20);
        assert_eq!(config.queue.persist_capacity, 10);
        assert_eq!(config.queue.max_payload, 512);
        assert_eq!(config.health.interval_secs, 30);
        assert_eq!(config.health.failure_threshold, 3);
        assert_eq!(config.power.query_timeout_ms, 3_000);
        assert_eq!(config.scanner_tuning(), ScannerTuning::default());
    }

    #[test]
    fn scanner_section_reaches_tuning() {
        let config =
            Config::from_toml("[scanner]
antenna_max = 4
rssi_abs_min = 30
").unwrap();
        let tuning = config.scanner_tuning();
        assert_eq!(tuning.antenna_max, 4);
        assert_eq!(tuning.rssi_abs_min, 30);
        assert_eq!(tuning.max_epc_len, 32);
    }

    #[test]
    fn rejects_inverted_scanner_windows() {
        assert!(Config::from_toml("[scanner]
min_epc_len = 40
").is_err());
        assert!(Config::from_toml("[scanner]
antenna_min = 0
").is_err());
        let err = Config::from_toml("[scanner]
rssi_abs_min = 120
").unwrap_err();
        assert!(err.to_string().contains("RSSI"));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = Config::from_toml("[queue]\ncapacity = 40\n").unwrap();
        assert_eq!(config.queue.capacity, 40);
        assert_eq!(config.queue.flush_batch, 5);
        assert_eq!(config.broker.client_id, "rfid-reader-01");
    }

    #[test]
    fn rejects_persist_capacity_at_or_above_capacity() {
        let err = Config::from_toml("[queue]\ncapacity = 10\npersist_capacity = 10\n").unwrap_err();
        assert!(err.to_string().contains("persist_capacity"));
    }

    #[test]
    fn rejects_wildcard_client_id() {
        assert!(Config::from_toml("[broker]\nclient_id = \"a/b\"\n").is_err());
        assert!(Config::from_toml("[broker]\nclient_id = \"  \"\n").is_err());
    }

    #[tokio::test]
    async fn default_file_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();
        Config::create_default(path).await.unwrap();
        let config = Config::load(path).await.unwrap();
        assert_eq!(config.reader.baud_rate, 115_200);
        assert_eq!(config.scanner_tuning(), ScannerTuning::default());
        assert_eq!(config.storage.kv_path(), PathBuf::from("./data").join("kv"));
    }
}

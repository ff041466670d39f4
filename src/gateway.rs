//! # Gateway - RFID Subsystem Context
//!
//! One object owns every piece of shared reader state and the collaborators that
//! move bytes in and out of it. Two execution contexts call into it:
//!
//! - **ingestion**: [`Gateway::ingest`] / [`Gateway::ingest_idle`] with serial chunks
//! - **network**: [`Gateway::handle_inbound`], [`Gateway::flush`],
//!   [`Gateway::publish_batch`], [`Gateway::health_tick`]
//!
//! Every operation is synchronous and bounded; none waits on I/O beyond a single
//! send or publish.
//!
//! ## Locking
//!
//! Each component sits behind its own mutex. A caller holds at most one component
//! lock at a time, except where two are needed together, which always follows
//! `inventory → tags → power → queue`. The health monitor and the reader-info cell
//! are only locked on their own. Poisoned locks are recovered.

use std::sync::{Arc, Mutex};

use log::{debug, info, trace, warn};
use serde::Serialize;

use crate::clock::Clock;
use crate::commands::{
    self, Command, CommandFamily, InventoryAction, PowerAction, Request, Response,
};
use crate::config::Config;
use crate::delivery::{Delivery, DeliveryQueue, FlushReport, HealthMonitor, HealthVerdict};
use crate::errors::{CommandError, LinkError};
use crate::lock_or_recover;
use crate::logutil::{escape_log, hex_snippet};
use crate::metrics;
use crate::protocol::scanner::epc_hex;
use crate::protocol::{
    scan_all, DecodeLimits, Decoded, Frame, FrameStream, Inbound, ScannerTuning,
};
use crate::reader::tags::TagRecord;
use crate::reader::{
    CollectionMode, HardwareAction, InventoryState, PowerCache, PowerLevels, TagStore,
};
use crate::storage::KvStore;
use crate::topics::Topics;
use crate::transport::{CommandLink, Link, Publisher};

pub const STATUS_ONLINE: &str = "online";
pub const STATUS_OFFLINE: &str = "offline";

/// Work done by one ingestion call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub frames: usize,
    pub sightings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModeStatus {
    pub local: bool,
    pub remote: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub backlog: usize,
    pub capacity: usize,
}

/// Snapshot reported by the inventory `status` action and `rfidgate status`.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub inventory: &'static str,
    pub modes: ModeStatus,
    pub last_command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader_info: Option<String>,
    pub tag_count: usize,
    pub total_detections: u64,
    pub power: PowerLevels,
    pub power_pending: bool,
    pub queue: QueueStatus,
    pub connected: bool,
    pub health_failures: u32,
    pub metrics: metrics::Snapshot,
}

#[derive(Serialize)]
struct BatchPayload<'a> {
    device: &'a str,
    timestamp: u64,
    count: usize,
    tags: Vec<TagRecord>,
}

pub struct Gateway {
    topics: Topics,
    link: CommandLink,
    publisher: Arc<dyn Publisher>,
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    legacy_stop: bool,
    flush_batch: usize,
    limits: DecodeLimits,
    tuning: ScannerTuning,
    stream: Mutex<FrameStream>,
    inventory: Mutex<InventoryState>,
    tags: Mutex<TagStore>,
    power: Mutex<PowerCache>,
    queue: Mutex<DeliveryQueue>,
    health: Mutex<HealthMonitor>,
    reader_info: Mutex<Option<String>>,
}

impl Gateway {
    pub fn new(
        config: &Config,
        link: Arc<dyn Link>,
        publisher: Arc<dyn Publisher>,
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            topics: Topics::new(&config.broker.client_id, &config.broker.publish_topic),
            link: CommandLink::new(link),
            publisher,
            kv,
            legacy_stop: config.reader.legacy_stop,
            flush_batch: config.queue.flush_batch,
            limits: config.decode_limits(),
            tuning: config.scanner_tuning(),
            stream: Mutex::new(FrameStream::with_tuning(config.scanner_tuning())),
            inventory: Mutex::new(InventoryState::default()),
            tags: Mutex::new(TagStore::new(
                config.tags.max_tags,
                config.tags.timeout_ms,
                config.tags.max_json_entries,
            )),
            power: Mutex::new(PowerCache::new(config.power.query_timeout_ms)),
            queue: Mutex::new(DeliveryQueue::new(
                config.queue.capacity,
                config.queue.persist_capacity,
                config.queue.max_payload,
            )),
            health: Mutex::new(HealthMonitor::new(
                now,
                config.health.interval_secs.saturating_mul(1_000),
                config.health.failure_threshold,
                config.health.persist_watermark,
            )),
            reader_info: Mutex::new(None),
            clock,
        }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn last_command(&self) -> String {
        self.link.last_command()
    }

    // ---- ingestion ------------------------------------------------------

    /// Feed one serial chunk. At most the configured number of frames is handled;
    /// leftovers stay buffered for the next call.
    pub fn ingest(&self, chunk: &[u8]) -> IngestReport {
        let decoded = lock_or_recover(&self.stream).decode_chunk(chunk, self.limits);
        self.apply_decoded(decoded)
    }

    /// The line went quiet: drain buffered bytes with strict resynchronization.
    pub fn ingest_idle(&self) -> IngestReport {
        let decoded = lock_or_recover(&self.stream).finish(self.limits);
        self.apply_decoded(decoded)
    }

    fn apply_decoded(&self, decoded: Vec<Decoded>) -> IngestReport {
        let mut report = IngestReport::default();
        for item in decoded {
            match item {
                Decoded::Frame(frame) => {
                    report.frames += 1;
                    report.sightings += self.handle_frame(&frame);
                }
                Decoded::Heuristic(tag) => {
                    if self.record_sighting(&tag.epc, tag.rssi, tag.antenna) {
                        report.sightings += 1;
                    }
                }
            }
        }
        report
    }

    /// React to one decoded frame. Returns the number of tag sightings recorded.
    pub fn handle_frame(&self, frame: &Frame) -> usize {
        match Inbound::classify(frame) {
            Inbound::TagLegacy(epc) => {
                usize::from(self.record_sighting(&epc_hex(epc), 0, 0))
            }
            Inbound::TagCurrent(payload) => {
                scan_all(payload, &self.tuning, self.limits.max_heuristic_tags)
                    .iter()
                    .filter(|t| self.record_sighting(&t.epc, t.rssi, t.antenna))
                    .count()
            }
            Inbound::PowerReport(_) => {
                lock_or_recover(&self.power).apply_response(frame);
                0
            }
            Inbound::ConnectionNotice => {
                debug!("reader connection notice, confirming");
                if let Err(e) = self.link.send(&Frame::connection_confirm().encode()) {
                    warn!("failed to confirm reader connection: {}", e);
                }
                0
            }
            Inbound::ReaderInfo(payload) => {
                info!("reader info: {}", hex_snippet(payload, 64));
                *lock_or_recover(&self.reader_info) = Some(hex_snippet(payload, payload.len()));
                0
            }
            Inbound::InventoryAck | Inbound::InventoryStopAck | Inbound::PowerSetAck => {
                trace!(
                    "reader ack cat={:#04x} mid={:#04x}",
                    frame.category,
                    frame.message_id
                );
                0
            }
            Inbound::Unknown {
                category,
                message_id,
            } => {
                debug!(
                    "unhandled frame cat={:#04x} mid={:#04x} len={}",
                    category,
                    message_id,
                    frame.payload.len()
                );
                0
            }
        }
    }

    /// Record one sighting against every enabled collection mode. Ignored while
    /// inventory is off.
    pub fn record_sighting(&self, epc: &str, rssi: i32, antenna: u8) -> bool {
        let modes = lock_or_recover(&self.inventory).enabled_modes();
        if modes.is_empty() {
            return false;
        }
        let now = self.now();
        let mut tags = lock_or_recover(&self.tags);
        for mode in modes {
            tags.upsert(epc, rssi, antenna, mode, now);
        }
        true
    }

    // ---- inventory ------------------------------------------------------

    /// Enable `mode`, clearing its previous tag set. The hardware is started only
    /// when no mode was running; if that send fails the mode stays disabled.
    pub fn start_inventory(&self, mode: CollectionMode) -> Result<HardwareAction, LinkError> {
        let mut inventory = lock_or_recover(&self.inventory);
        let action = inventory.enable(mode);
        let cleared = lock_or_recover(&self.tags).clear(mode);
        if cleared > 0 {
            debug!("cleared {} {} tags on inventory start", cleared, mode.as_str());
        }
        if action == HardwareAction::Start {
            if let Err(e) = self.link.send(&Frame::inventory_start().encode()) {
                inventory.disable(mode);
                return Err(e);
            }
            info!("inventory started ({})", mode.as_str());
        }
        Ok(action)
    }

    /// Disable `mode`. The hardware is stopped only when no other mode still wants it.
    pub fn stop_inventory(&self, mode: CollectionMode) -> Result<HardwareAction, LinkError> {
        let mut inventory = lock_or_recover(&self.inventory);
        let action = inventory.disable(mode);
        if action == HardwareAction::Stop {
            self.link
                .send(&Frame::inventory_stop(self.legacy_stop).encode())?;
            info!("inventory stopped ({})", mode.as_str());
        }
        Ok(action)
    }

    pub fn inventory_state(&self) -> InventoryState {
        *lock_or_recover(&self.inventory)
    }

    /// Live tags of `mode`; anything idle past the timeout is evicted first.
    pub fn tag_records(&self, mode: CollectionMode) -> Vec<TagRecord> {
        let now = self.now();
        lock_or_recover(&self.tags).records(mode, now)
    }

    pub fn tag_count(&self) -> usize {
        lock_or_recover(&self.tags).len()
    }

    pub fn evict_stale_tags(&self) -> usize {
        let now = self.now();
        lock_or_recover(&self.tags).evict_stale(now)
    }

    // ---- power ----------------------------------------------------------

    pub fn query_power(&self) -> Result<(), LinkError> {
        let now = self.now();
        lock_or_recover(&self.power).begin_query(&self.link, now)
    }

    pub fn set_power(&self, levels: [u8; 4]) -> Result<(), LinkError> {
        lock_or_recover(&self.power).set(&self.link, levels)
    }

    pub fn power_levels(&self) -> PowerLevels {
        lock_or_recover(&self.power).levels()
    }

    pub fn power_pending(&self) -> bool {
        let now = self.now();
        lock_or_recover(&self.power).is_pending(now)
    }

    pub fn query_reader_info(&self) -> Result<(), LinkError> {
        self.link.send(&Frame::reader_info_query().encode())
    }

    pub fn reader_info(&self) -> Option<String> {
        lock_or_recover(&self.reader_info).clone()
    }

    // ---- delivery -------------------------------------------------------

    /// Publish now or buffer for a later flush.
    pub fn publish(&self, topic: &str, payload: &[u8]) -> Delivery {
        let wall = self.clock.wall_ms();
        let delivery = lock_or_recover(&self.queue).publish_or_buffer(
            self.publisher.as_ref(),
            topic,
            payload,
            wall,
        );
        if delivery == Delivery::Sent {
            let now = self.now();
            lock_or_recover(&self.health).record_publish(now);
        }
        delivery
    }

    /// Drain part of the backlog. A flush that sent something, or found nothing
    /// failing on a connected broker, counts as a successful delivery.
    ///
    /// Sending restored entries rewrites the stored snapshot, so they are not
    /// replayed after the next restart.
    pub fn flush(&self) -> FlushReport {
        let report = {
            let mut queue = lock_or_recover(&self.queue);
            let report = queue.flush(self.publisher.as_ref(), self.flush_batch);
            if report.sent > 0 && queue.snapshot_outstanding() {
                if let Err(e) = queue.persist(self.kv.as_ref()) {
                    warn!("failed to rewrite persisted delivery queue: {}", e);
                }
            }
            report
        };
        if report.sent > 0 || (!report.failed && self.publisher.is_connected()) {
            let now = self.now();
            lock_or_recover(&self.health).record_publish(now);
        }
        report
    }

    pub fn backlog(&self) -> usize {
        lock_or_recover(&self.queue).len()
    }

    /// Publish the Remote-mode snapshot on the batch topic while inventory runs.
    pub fn publish_batch(&self) -> Option<Delivery> {
        if !self.inventory_state().hardware_enabled() {
            return None;
        }
        let tags = self.tag_records(CollectionMode::Remote);
        let payload = BatchPayload {
            device: self.topics.client_id(),
            timestamp: self.now(),
            count: tags.len(),
            tags,
        };
        let bytes = match serde_json::to_vec(&payload) {
            Ok(b) => b,
            Err(e) => {
                warn!("failed to serialize tag batch: {}", e);
                return None;
            }
        };
        let delivery = self.publish(&self.topics.batch(), &bytes);
        if payload.count > 0 {
            info!("tag batch: {} tags ({:?})", payload.count, delivery);
        }
        Some(delivery)
    }

    /// One health window. Requests a reconnect when the monitor says so and persists
    /// the queue when the backlog is above the watermark.
    pub fn health_tick(&self) -> HealthVerdict {
        let now = self.now();
        let connected = self.publisher.is_connected();
        let verdict = lock_or_recover(&self.health).tick(now, connected);
        if verdict == HealthVerdict::ForceReconnect {
            self.publisher.request_reconnect();
        }
        let backlog = self.backlog();
        let due = lock_or_recover(&self.health).persist_due(backlog);
        if due {
            self.persist_queue();
        }
        verdict
    }

    /// Snapshot the queue to storage. Failures are logged and the queue carries on
    /// in memory only.
    pub fn persist_queue(&self) -> usize {
        let mut queue = lock_or_recover(&self.queue);
        match queue.persist(self.kv.as_ref()) {
            Ok(n) => n,
            Err(e) => {
                warn!("failed to persist delivery queue: {}", e);
                0
            }
        }
    }

    pub fn restore_queue(&self) -> usize {
        let mut queue = lock_or_recover(&self.queue);
        match queue.restore(self.kv.as_ref()) {
            Ok(n) => n,
            Err(e) => {
                warn!("failed to restore delivery queue: {}", e);
                0
            }
        }
    }

    /// Retained online/offline marker, published directly and never buffered.
    pub fn announce(&self, online: bool) -> bool {
        let marker = if online { STATUS_ONLINE } else { STATUS_OFFLINE };
        match self
            .publisher
            .publish(&self.topics.status(), marker.as_bytes(), true)
        {
            Ok(()) => {
                info!("status {} published on {}", marker, self.topics.status());
                true
            }
            Err(e) => {
                warn!("failed to publish status {}: {}", marker, e);
                false
            }
        }
    }

    pub fn status(&self) -> GatewayStatus {
        let inventory = self.inventory_state();
        let (tag_count, total_detections) = {
            let tags = lock_or_recover(&self.tags);
            (tags.len(), tags.total_detections())
        };
        let now = self.now();
        let (power, power_pending) = {
            let mut power = lock_or_recover(&self.power);
            (power.levels(), power.is_pending(now))
        };
        let queue = {
            let queue = lock_or_recover(&self.queue);
            QueueStatus {
                backlog: queue.len(),
                capacity: queue.capacity(),
            }
        };
        GatewayStatus {
            inventory: if inventory.hardware_enabled() {
                "running"
            } else {
                "stopped"
            },
            modes: ModeStatus {
                local: inventory.is_enabled(CollectionMode::Local),
                remote: inventory.is_enabled(CollectionMode::Remote),
            },
            last_command: self.last_command(),
            reader_info: self.reader_info(),
            tag_count,
            total_detections,
            power,
            power_pending,
            queue,
            connected: self.publisher.is_connected(),
            health_failures: lock_or_recover(&self.health).consecutive_failures(),
            metrics: metrics::snapshot(),
        }
    }

    // ---- commands -------------------------------------------------------

    /// Route an inbound broker message. Topics outside this device's command space
    /// are ignored; everything else gets exactly one response on the response topic.
    pub fn handle_inbound(&self, topic: &str, payload: &[u8]) -> Option<Response> {
        self.handle_inbound_from(CollectionMode::Remote, topic, payload)
    }

    /// [`Gateway::handle_inbound`] for a message that arrived on the channel of `origin`.
    pub fn handle_inbound_from(
        &self,
        origin: CollectionMode,
        topic: &str,
        payload: &[u8],
    ) -> Option<Response> {
        let Some(family) = self.topics.parse_command(topic) else {
            trace!("ignoring message on {}", topic);
            return None;
        };
        debug!(
            "{} command on {}: {}",
            origin.as_str(),
            topic,
            escape_log(&String::from_utf8_lossy(payload))
        );
        let response = self.dispatch_from(origin, family, payload);
        self.publish(&self.topics.response(), &response.to_json());
        Some(response)
    }

    /// Execute one broker command (Remote mode) and build its response.
    pub fn dispatch(&self, family: CommandFamily, payload: &[u8]) -> Response {
        self.dispatch_from(CollectionMode::Remote, family, payload)
    }

    /// Execute one command on behalf of `origin`. Inventory start, stop and get act
    /// on that mode's tag set and enable bit.
    pub fn dispatch_from(
        &self,
        origin: CollectionMode,
        family: CommandFamily,
        payload: &[u8],
    ) -> Response {
        match commands::parse(family, payload) {
            Ok(request) => self.execute(origin, family, request),
            Err((err, action)) => {
                debug!("rejected {} command: {}", family.as_str(), err);
                Response::error(family, &action, &err)
            }
        }
    }

    fn execute(&self, mode: CollectionMode, family: CommandFamily, request: Request) -> Response {
        let action = request.action.as_str();
        let result: Result<Response, CommandError> = match request.command {
            Command::Inventory(InventoryAction::Start) => {
                self.start_inventory(mode).map_err(CommandError::from).map(|hw| {
                    Response::success(family, action, "Inventory started")
                        .with_field("mode", mode.as_str())
                        .with_field("hardware_started", hw == HardwareAction::Start)
                })
            }
            Command::Inventory(InventoryAction::Stop) => {
                self.stop_inventory(mode).map_err(CommandError::from).map(|hw| {
                    Response::success(family, action, "Inventory stopped")
                        .with_field("mode", mode.as_str())
                        .with_field("hardware_stopped", hw == HardwareAction::Stop)
                })
            }
            Command::Inventory(InventoryAction::Status) => {
                Ok(Response::info(family, action).with_fields(&self.status()))
            }
            Command::Inventory(InventoryAction::Get) => {
                let records = self.tag_records(mode);
                let json = serde_json::to_vec(&records).unwrap_or_else(|_| b"[]".to_vec());
                let count = records.len();
                self.publish(&self.topics.tags(), &json);
                Ok(Response::success(family, action, "Tag snapshot published")
                    .with_field("count", count)
                    .with_field("topic", self.topics.tags()))
            }
            Command::Power(PowerAction::Set(levels)) => {
                self.set_power(levels).map_err(CommandError::from).map(|()| {
                    Response::success(family, action, "Power set")
                        .with_fields(&PowerLevels::from_array(levels.map(i32::from)))
                })
            }
            Command::Power(PowerAction::Query) => {
                self.query_power().map_err(CommandError::from).map(|()| {
                    Response::success(family, action, "Power query sent")
                        .with_fields(&self.power_levels())
                        .with_field("pending", true)
                })
            }
            Command::Power(PowerAction::Status) => Ok(Response::info(family, action)
                .with_fields(&self.power_levels())
                .with_field("pending", self.power_pending())),
        };
        result.unwrap_or_else(|err| {
            warn!("{} {} failed: {}", family.as_str(), action, err);
            Response::error(family, action, &err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use crate::transport::memory::{MemoryLink, MemoryPublisher};

    struct Rig {
        gw: Gateway,
        link: Arc<MemoryLink>,
        publisher: Arc<MemoryPublisher>,
        clock: Arc<ManualClock>,
    }

    fn rig() -> Rig {
        let link = Arc::new(MemoryLink::new());
        let publisher = Arc::new(MemoryPublisher::new(true));
        let clock = Arc::new(ManualClock::new(1_000));
        let gw = Gateway::new(
            &Config::default(),
            link.clone(),
            publisher.clone(),
            Arc::new(MemoryStore::new()),
            clock.clone(),
        );
        Rig {
            gw,
            link,
            publisher,
            clock,
        }
    }

    #[test]
    fn stopping_one_mode_keeps_hardware_for_the_other() {
        let r = rig();
        r.gw.start_inventory(CollectionMode::Local).unwrap();
        r.gw.start_inventory(CollectionMode::Remote).unwrap();
        assert_eq!(r.link.take_sent(), vec![Frame::inventory_start().encode()]);

        assert_eq!(
            r.gw.stop_inventory(CollectionMode::Local).unwrap(),
            HardwareAction::None
        );
        assert!(r.link.sent().is_empty());
        assert!(r.gw.inventory_state().hardware_enabled());

        r.gw.stop_inventory(CollectionMode::Remote).unwrap();
        assert_eq!(r.link.sent(), vec![Frame::inventory_stop(true).encode()]);
    }

    #[test]
    fn failed_start_leaves_mode_disabled() {
        let r = rig();
        r.link.set_open(false);
        assert!(r.gw.start_inventory(CollectionMode::Remote).is_err());
        assert!(!r.gw.inventory_state().hardware_enabled());
    }

    #[test]
    fn sightings_ignored_while_stopped() {
        let r = rig();
        assert!(!r.gw.record_sighting("E2801122", -40, 1));
        assert_eq!(r.gw.tag_count(), 0);
    }

    #[test]
    fn sighting_attributed_to_every_enabled_mode() {
        let r = rig();
        r.gw.start_inventory(CollectionMode::Local).unwrap();
        r.gw.start_inventory(CollectionMode::Remote).unwrap();
        r.gw.record_sighting("E2801122", -40, 1);
        assert_eq!(r.gw.tag_records(CollectionMode::Local).len(), 1);
        assert_eq!(r.gw.tag_records(CollectionMode::Remote).len(), 1);
    }

    #[test]
    fn connection_notice_is_confirmed() {
        let r = rig();
        r.gw.ingest(&Frame::connection_confirm().encode());
        assert_eq!(r.link.sent(), vec![Frame::connection_confirm().encode()]);
        assert!(r.gw.last_command().starts_with("TX: 5A 00 01 00 12"));
    }

    #[test]
    fn reader_info_reply_is_kept() {
        let r = rig();
        let reply = Frame::new(0x01, 0x00, vec![0x52, 0x46, 0x01]);
        r.gw.ingest(&reply.encode());
        assert_eq!(r.gw.reader_info().as_deref(), Some("524601"));
    }

    #[test]
    fn batch_only_while_running() {
        let r = rig();
        assert!(r.gw.publish_batch().is_none());
        r.gw.start_inventory(CollectionMode::Remote).unwrap();
        r.gw.record_sighting("E2801122", -40, 1);
        assert_eq!(r.gw.publish_batch(), Some(Delivery::Sent));
        let sent = r.publisher.published_on(&r.gw.topics().batch());
        let v: serde_json::Value = serde_json::from_slice(&sent[0].payload).unwrap();
        assert_eq!(v["device"], "rfid-reader-01");
        assert_eq!(v["count"], 1);
        assert_eq!(v["tags"][0]["epc"], "E2801122");
    }

    #[test]
    fn health_tick_requests_reconnect_on_third_miss() {
        let r = rig();
        r.clock.advance(10_000);
        assert_eq!(r.gw.health_tick(), HealthVerdict::Healthy);
        for n in 1..3 {
            r.clock.advance(50_000);
            assert_eq!(r.gw.health_tick(), HealthVerdict::Missed { consecutive: n });
        }
        r.clock.advance(50_000);
        assert_eq!(r.gw.health_tick(), HealthVerdict::ForceReconnect);
        assert_eq!(r.publisher.reconnect_requests(), 1);
    }

    #[test]
    fn status_reports_last_command_and_modes() {
        let r = rig();
        r.gw.query_power().unwrap();
        let status = r.gw.status();
        assert_eq!(status.inventory, "stopped");
        assert_eq!(status.last_command, "TX: 5A 00 01 02 02 00 00 29 59");
        assert!(status.power_pending);
    }

    #[test]
    fn unknown_topic_ignored() {
        let r = rig();
        assert!(r.gw.handle_inbound("reader/other/cmd/rfid", b"{}").is_none());
        assert!(r.publisher.published().is_empty());
    }
}

//! # Server - Gateway Runtime
//!
//! Drives a [`Gateway`] on tokio:
//!
//! - a blocking reader thread pulls chunks from the [`ByteSource`] into a channel
//! - the **ingestion task** drains that channel on a fixed tick, handing a
//!   bounded number of chunks to the gateway per tick and yielding between them, and drains the
//!   frame stream strictly once the line has been quiet for a few ticks
//! - the **network loop** `select!`s over inbound commands, the flush tick, the
//!   batch tick and the health tick until ctrl-c or [`ServerHandle::shutdown`]
//!
//! On shutdown the `offline` marker is published and the delivery queue persisted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::delivery::HealthVerdict;
use crate::gateway::Gateway;
use crate::reader::CollectionMode;
use crate::transport::ByteSource;

const READ_BUF_SIZE: usize = 512;
/// Raw chunks buffered between the reader thread and the ingestion task.
const CHUNK_CHANNEL_DEPTH: usize = 64;
const MAX_CHUNKS_PER_TICK: usize = 8;
/// Consecutive empty ingestion ticks before buffered bytes are drained strictly.
const IDLE_TICKS_BEFORE_DRAIN: u32 = 5;
const EMPTY_READ_BACKOFF: Duration = Duration::from_millis(2);

/// One command message and the channel it came in on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    /// Broker subscriptions act for [`CollectionMode::Remote`], the local console
    /// for [`CollectionMode::Local`].
    pub origin: CollectionMode,
}

impl InboundMessage {
    /// A message received from the broker.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            origin: CollectionMode::Remote,
        }
    }

    pub fn with_origin(mut self, origin: CollectionMode) -> Self {
        self.origin = origin;
        self
    }

    /// Parse a console line `<topic> <payload>`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        let (topic, payload) = line.split_once(char::is_whitespace)?;
        Some(Self::new(topic, payload.trim().as_bytes()).with_origin(CollectionMode::Local))
    }
}

/// Handle for feeding commands into a running server and stopping it.
#[derive(Clone)]
pub struct ServerHandle {
    inbound: mpsc::UnboundedSender<InboundMessage>,
    shutdown: watch::Sender<bool>,
}

impl ServerHandle {
    pub fn send(&self, msg: InboundMessage) -> bool {
        self.inbound.send(msg).is_ok()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

pub struct GatewayServer {
    config: Config,
    gateway: Arc<Gateway>,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    inbound_rx: mpsc::UnboundedReceiver<InboundMessage>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    pub fn new(config: Config, gateway: Arc<Gateway>) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            gateway,
            inbound_tx,
            inbound_rx,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            inbound: self.inbound_tx.clone(),
            shutdown: self.shutdown_tx.clone(),
        }
    }

    pub fn gateway(&self) -> Arc<Gateway> {
        self.gateway.clone()
    }

    /// Restore buffered messages, announce, and poke the reader for its info and
    /// power levels.
    pub fn startup(&self) {
        let restored = self.gateway.restore_queue();
        if restored > 0 {
            info!("{} buffered messages pending delivery", restored);
        }
        self.gateway.announce(true);
        if let Err(e) = self.gateway.query_reader_info() {
            warn!("reader info query failed: {}", e);
        }
        if let Err(e) = self.gateway.query_power() {
            warn!("power query failed: {}", e);
        }
    }

    /// Run until ctrl-c or a shutdown request. `source` is the reader byte stream;
    /// without one the gateway still serves commands and drains its queue.
    pub async fn run(mut self, source: Option<Box<dyn ByteSource>>) -> Result<()> {
        self.startup();

        let ingest = source.map(|s| {
            let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_CHANNEL_DEPTH);
            spawn_reader_thread(s, chunk_tx, self.shutdown_rx.clone());
            tokio::spawn(ingestion_task(
                self.gateway.clone(),
                chunk_rx,
                Duration::from_millis(self.config.reader.read_interval_ms),
                self.shutdown_rx.clone(),
            ))
        });

        let mut flush_tick =
            tokio::time::interval(Duration::from_millis(self.config.queue.flush_interval_ms));
        let mut batch_tick =
            tokio::time::interval(Duration::from_millis(self.config.queue.batch_interval_ms));
        let mut health_tick =
            tokio::time::interval(Duration::from_secs(self.config.health.interval_secs));
        for tick in [&mut flush_tick, &mut batch_tick, &mut health_tick] {
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }
        // interval() fires immediately; skip that first health window.
        health_tick.tick().await;

        let mut shutdown_rx = self.shutdown_rx.clone();
        info!("gateway {} running", self.gateway.topics().client_id());
        loop {
            tokio::select! {
                msg = self.inbound_rx.recv() => {
                    match msg {
                        Some(msg) => {
                            self.gateway.handle_inbound_from(msg.origin, &msg.topic, &msg.payload);
                        }
                        None => debug!("inbound channel closed"),
                    }
                }
                _ = flush_tick.tick() => {
                    self.gateway.flush();
                }
                _ = batch_tick.tick() => {
                    let evicted = self.gateway.evict_stale_tags();
                    if evicted > 0 {
                        debug!("housekeeping evicted {} tags", evicted);
                    }
                    self.gateway.publish_batch();
                }
                _ = health_tick.tick() => {
                    if self.gateway.health_tick() == HealthVerdict::ForceReconnect {
                        warn!("broker connection unhealthy, reconnect requested");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("shutdown requested");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        let _ = self.shutdown_tx.send(true);
        if let Some(task) = ingest {
            let _ = task.await;
        }
        self.shutdown();
        Ok(())
    }

    fn shutdown(&self) {
        let state = self.gateway.inventory_state();
        for mode in CollectionMode::ALL {
            if state.is_enabled(mode) {
                if let Err(e) = self.gateway.stop_inventory(mode) {
                    warn!("failed to stop inventory on shutdown: {}", e);
                }
            }
        }
        let saved = self.gateway.persist_queue();
        info!("persisted {} queued messages on shutdown", saved);
        self.gateway.announce(false);
    }
}

fn spawn_reader_thread(
    mut source: Box<dyn ByteSource>,
    chunks: mpsc::Sender<Vec<u8>>,
    shutdown: watch::Receiver<bool>,
) {
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; READ_BUF_SIZE];
        while !*shutdown.borrow() {
            match source.read_chunk(&mut buf) {
                Ok(0) => std::thread::sleep(EMPTY_READ_BACKOFF),
                Ok(n) => {
                    if chunks.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("reader link read failed: {}", e);
                    break;
                }
            }
        }
        debug!("reader thread exiting");
    });
}

async fn ingestion_task(
    gateway: Arc<Gateway>,
    mut chunks: mpsc::Receiver<Vec<u8>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut idle_ticks = 0u32;
    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = shutdown.changed() => break,
        }
        let mut handled = 0;
        while handled < MAX_CHUNKS_PER_TICK {
            match chunks.try_recv() {
                Ok(chunk) => {
                    gateway.ingest(&chunk);
                    handled += 1;
                    tokio::task::yield_now().await;
                }
                Err(_) => break,
            }
        }
        if handled == 0 {
            idle_ticks += 1;
            // Frames beyond the per-call cap are still buffered.
            gateway.ingest(&[]);
            if idle_ticks == IDLE_TICKS_BEFORE_DRAIN {
                gateway.ingest_idle();
            }
        } else {
            idle_ticks = 0;
        }
    }
    debug!("ingestion task exiting");
}

/// Read `<topic> <payload>` lines from stdin into the server as local-mode
/// commands.
pub fn spawn_stdin_commands(handle: ServerHandle) {
    tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, BufReader};
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match InboundMessage::parse_line(&line) {
                Some(msg) => {
                    if !handle.send(msg) {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => warn!("ignoring console line without payload: {}", line.trim()),
            }
        }
    });
}

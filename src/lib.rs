//! # Rfidgate - UHF RFID Reader Gateway
//!
//! Rfidgate sits between a UHF RFID reader module on a serial link and a message
//! broker. It decodes the reader's binary protocol, keeps a live view of detected
//! tags and antenna power, relays that view reliably across broker outages, and
//! turns inbound JSON commands into reader frames.
//!
//! ## Features
//!
//! - **Frame Decoding**: CRC-16/XMODEM validated frames with single-byte resync, plus a
//!   heuristic EPC scanner for loosely framed inventory bursts
//! - **Tag Cache**: bounded, timeout-evicted, partitioned by collection mode (local / remote)
//! - **Power Cache**: last known antenna levels with a single in-flight query
//! - **Reliable Delivery**: send-or-buffer queue with bounded loss and restart persistence
//! - **Health Monitor**: forced reconnect after repeated missed delivery windows
//! - **Command Dispatch**: typed inventory and power commands with structured responses
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rfidgate::clock::SystemClock;
//! use rfidgate::config::Config;
//! use rfidgate::gateway::Gateway;
//! use rfidgate::server::GatewayServer;
//! use rfidgate::storage::MemoryStore;
//! use rfidgate::transport::{console::ConsolePublisher, NoLink};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let gateway = Arc::new(Gateway::new(
//!         &config,
//!         Arc::new(NoLink),
//!         Arc::new(ConsolePublisher::new()),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(SystemClock::new()),
//!     ));
//!     GatewayServer::new(config, gateway).run(None).await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`protocol`] - frame codec, heuristic scanner, incremental stream
//! - [`reader`] - tag store, power cache, collection-mode state
//! - [`delivery`] - delivery queue and health monitor
//! - [`commands`] - command families, parsing and response envelopes
//! - [`gateway`] - the subsystem context tying the above together
//! - [`server`] - tokio runtime driving a gateway
//! - [`transport`] / [`storage`] / [`clock`] - collaborator seams
//! - [`config`] - TOML configuration
//!
//! ## Architecture
//!
//! ```text
//! serial bytes ──► protocol ──► reader (tags / power)
//!                                   │
//!                        batch / responses
//!                                   ▼
//! inbound cmd ──► commands ──► delivery queue ──► publisher
//!                     │
//!                     └──► reader frames ──► link
//! ```

use std::sync::{Mutex, MutexGuard};

pub mod clock;
pub mod commands;
pub mod config;
pub mod delivery;
pub mod errors;
pub mod gateway;
pub mod logutil;
pub mod metrics;
pub mod protocol;
pub mod reader;
pub mod server;
pub mod storage;
pub mod topics;
pub mod transport;

/// Lock a mutex, taking the data back out of a poisoned lock. Shared state here is
/// plain data updated one record at a time, so a panicked holder leaves it usable.
pub(crate) fn lock_or_recover<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

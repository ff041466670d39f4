//! Test utilities & fixtures.
//! Builds a gateway wired to in-memory collaborators and a hand-driven clock.

use std::sync::Arc;

use rfidgate::clock::ManualClock;
use rfidgate::config::Config;
use rfidgate::gateway::Gateway;
use rfidgate::protocol::crc16_xmodem;
use rfidgate::storage::{KvStore, MemoryStore};
use rfidgate::transport::memory::{MemoryLink, MemoryPublisher};

pub struct Rig {
    pub gw: Gateway,
    pub link: Arc<MemoryLink>,
    pub publisher: Arc<MemoryPublisher>,
    pub clock: Arc<ManualClock>,
}

#[allow(dead_code)]
pub fn rig() -> Rig {
    rig_with(&Config::default(), Arc::new(MemoryStore::new()))
}

#[allow(dead_code)]
pub fn rig_with(config: &Config, kv: Arc<dyn KvStore>) -> Rig {
    let link = Arc::new(MemoryLink::new());
    let publisher = Arc::new(MemoryPublisher::new(true));
    let clock = Arc::new(ManualClock::new(1_000));
    let gw = Gateway::new(config, link.clone(), publisher.clone(), kv, clock.clone());
    Rig {
        gw,
        link,
        publisher,
        clock,
    }
}

/// Append the big-endian CRC-16/XMODEM of `bytes[1..]`.
#[allow(dead_code)]
pub fn with_crc(mut bytes: Vec<u8>) -> Vec<u8> {
    let crc = crc16_xmodem(&bytes[1..]);
    bytes.extend_from_slice(&crc.to_be_bytes());
    bytes
}

#[allow(dead_code)]
pub fn hex(s: &str) -> Vec<u8> {
    rfidgate::logutil::parse_hex(s).expect("valid hex")
}

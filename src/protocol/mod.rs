//! # Protocol Module - Reader Binary Protocol
//!
//! Everything that touches raw bytes from the reader module:
//!
//! - [`frame`] - frame layout, CRC, encoder builders and the stateless decoder
//! - [`scanner`] - heuristic EPC scanner for loosely framed inventory bursts
//! - [`stream`] - incremental decoding over serial chunks
//!
//! [`Inbound::classify`] maps a decoded frame onto the handful of messages the
//! gateway reacts to; everything else is [`Inbound::Unknown`] and only logged.

pub mod frame;
pub mod scanner;
pub mod stream;

pub use frame::{crc16_xmodem, decode, decode_frame, ids, Frame};
pub use scanner::{scan, scan_all, scan_with, HeuristicTag, ScannerTuning};
pub use stream::{DecodeLimits, Decoded, FrameStream};

/// Smallest EPC accepted from a flat legacy tag payload.
const LEGACY_EPC_MIN: usize = 4;
const LEGACY_EPC_MAX: usize = 32;

/// Meaning of an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// Flat EPC payload (category 0x02, mid 0x10).
    TagLegacy(&'a [u8]),
    /// Length-prefixed payload with an embedded EPC field (category 0x02, mid 0x12).
    TagCurrent(&'a [u8]),
    PowerReport(&'a [u8]),
    PowerSetAck,
    InventoryAck,
    InventoryStopAck,
    /// Reader announced itself; answered with a connection confirm.
    ConnectionNotice,
    ReaderInfo(&'a [u8]),
    Unknown { category: u8, message_id: u8 },
}

impl<'a> Inbound<'a> {
    pub fn classify(frame: &'a Frame) -> Self {
        use ids::*;
        let payload = frame.payload.as_slice();
        match (frame.category, frame.message_id) {
            (CATEGORY_RFID, MID_TAG_LEGACY)
                if (LEGACY_EPC_MIN..=LEGACY_EPC_MAX).contains(&payload.len()) =>
            {
                Inbound::TagLegacy(payload)
            }
            // Same id as inventory start; anything not shaped like an EPC is the ack.
            (CATEGORY_RFID, MID_INVENTORY_START) => Inbound::InventoryAck,
            (CATEGORY_RFID, MID_TAG_CURRENT) => Inbound::TagCurrent(payload),
            (CATEGORY_RFID, MID_POWER_QUERY) => Inbound::PowerReport(payload),
            (CATEGORY_RFID, MID_POWER_SET) => Inbound::PowerSetAck,
            (CATEGORY_RFID, MID_INVENTORY_STOP) | (CATEGORY_RFID, MID_INVENTORY_STOP_LEGACY) => {
                Inbound::InventoryStopAck
            }
            (CATEGORY_SYSTEM, MID_CONNECTION_CONFIRM) => Inbound::ConnectionNotice,
            (CATEGORY_INFO, MID_READER_INFO) => Inbound::ReaderInfo(payload),
            (category, message_id) => Inbound::Unknown {
                category,
                message_id,
            },
        }
    }
}

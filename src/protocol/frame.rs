//! Reader frame codec.
//!
//! Wire layout (multi-byte fields big-endian):
//!
//! ```text
//! 5A | type | version | flags|category | message id | len hi | len lo | payload.. | crc hi | crc lo
//! ```
//!
//! The CRC is CRC-16/XMODEM over everything between the header byte and the CRC itself.
//! Decoding is stateless; see [`super::stream::FrameStream`] for the incremental wrapper.

use crc::{Crc, CRC_16_XMODEM};

use crate::errors::DecodeError;

pub const HEADER: u8 = 0x5A;
pub const PROTOCOL_TYPE: u8 = 0x00;
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Control word bit 13 of the 32-bit word, i.e. bit 5 of the category byte.
pub const FLAG_RS485: u8 = 0x20;
/// Control word bit 12 of the 32-bit word, i.e. bit 4 of the category byte.
pub const FLAG_NOTIFY: u8 = 0x10;
pub const CATEGORY_MASK: u8 = 0x0F;

/// Header + control word + message id + length.
pub const PREAMBLE_LEN: usize = 7;
pub const CRC_LEN: usize = 2;
/// Upper bound on declared payload length; anything larger is treated as line noise.
pub const MAX_PAYLOAD_LEN: usize = 1024;

const XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

pub fn crc16_xmodem(data: &[u8]) -> u16 {
    XMODEM.checksum(data)
}

/// Known (category, message id) pairs.
pub mod ids {
    pub const CATEGORY_SYSTEM: u8 = 0x00;
    pub const CATEGORY_INFO: u8 = 0x01;
    pub const CATEGORY_RFID: u8 = 0x02;

    pub const MID_POWER_SET: u8 = 0x01;
    pub const MID_POWER_QUERY: u8 = 0x02;
    pub const MID_INVENTORY_START: u8 = 0x10;
    pub const MID_INVENTORY_STOP: u8 = 0x11;
    pub const MID_INVENTORY_STOP_LEGACY: u8 = 0xFF;
    pub const MID_CONNECTION_CONFIRM: u8 = 0x12;
    pub const MID_READER_INFO: u8 = 0x00;

    /// Tag notification, flat EPC payload.
    pub const MID_TAG_LEGACY: u8 = 0x10;
    /// Tag notification, length-prefixed payload with an embedded EPC field.
    pub const MID_TAG_CURRENT: u8 = 0x12;
}

/// Trailer appended to every power-set payload.
const POWER_SET_TRAILER: [u8; 2] = [0xFF, 0x01];
/// Antenna mask 0x00000001 followed by the continuous-read flag.
const INVENTORY_START_PAYLOAD: [u8; 5] = [0x00, 0x00, 0x00, 0x01, 0x01];

/// One checksum-validated protocol unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub category: u8,
    pub message_id: u8,
    /// `FLAG_RS485` / `FLAG_NOTIFY` bits as carried in the category byte.
    pub flags: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(category: u8, message_id: u8, payload: Vec<u8>) -> Self {
        Self {
            category: category & CATEGORY_MASK,
            message_id,
            flags: 0,
            payload,
        }
    }

    pub fn declared_length(&self) -> u16 {
        self.payload.len() as u16
    }

    pub fn is_notify(&self) -> bool {
        self.flags & FLAG_NOTIFY != 0
    }

    pub fn is_rs485(&self) -> bool {
        self.flags & FLAG_RS485 != 0
    }

    pub fn matches(&self, category: u8, message_id: u8) -> bool {
        self.category == category && self.message_id == message_id
    }

    /// Serialize to wire bytes including header and CRC.
    pub fn encode(&self) -> Vec<u8> {
        let len = self.payload.len().min(u16::MAX as usize);
        let mut out = Vec::with_capacity(PREAMBLE_LEN + len + CRC_LEN);
        out.push(HEADER);
        out.push(PROTOCOL_TYPE);
        out.push(PROTOCOL_VERSION);
        out.push((self.flags & (FLAG_RS485 | FLAG_NOTIFY)) | (self.category & CATEGORY_MASK));
        out.push(self.message_id);
        out.extend_from_slice(&(len as u16).to_be_bytes());
        out.extend_from_slice(&self.payload[..len]);
        let crc = crc16_xmodem(&out[1..]);
        out.extend_from_slice(&crc.to_be_bytes());
        out
    }

    pub fn inventory_start() -> Self {
        Frame::new(
            ids::CATEGORY_RFID,
            ids::MID_INVENTORY_START,
            INVENTORY_START_PAYLOAD.to_vec(),
        )
    }

    pub fn inventory_stop(legacy: bool) -> Self {
        let mid = if legacy {
            ids::MID_INVENTORY_STOP_LEGACY
        } else {
            ids::MID_INVENTORY_STOP
        };
        Frame::new(ids::CATEGORY_RFID, mid, Vec::new())
    }

    pub fn power_query() -> Self {
        Frame::new(ids::CATEGORY_RFID, ids::MID_POWER_QUERY, Vec::new())
    }

    /// Four (antenna id, level) pairs followed by the fixed trailer.
    pub fn power_set(levels: [u8; 4]) -> Self {
        let mut payload = Vec::with_capacity(levels.len() * 2 + POWER_SET_TRAILER.len());
        for (i, level) in levels.iter().enumerate() {
            payload.push(i as u8 + 1);
            payload.push(*level);
        }
        payload.extend_from_slice(&POWER_SET_TRAILER);
        Frame::new(ids::CATEGORY_RFID, ids::MID_POWER_SET, payload)
    }

    pub fn connection_confirm() -> Self {
        Frame::new(ids::CATEGORY_SYSTEM, ids::MID_CONNECTION_CONFIRM, Vec::new())
    }

    pub fn reader_info_query() -> Self {
        Frame::new(ids::CATEGORY_INFO, ids::MID_READER_INFO, Vec::new())
    }
}

/// Structured decode: locate the first header and validate the frame that follows.
///
/// On success returns the frame and the number of bytes consumed, counting any
/// garbage skipped before the header.
pub fn decode_frame(buf: &[u8]) -> Result<(Frame, usize), DecodeError> {
    let offset = buf
        .iter()
        .position(|&b| b == HEADER)
        .ok_or(DecodeError::NoHeader(buf.len()))?;
    let avail = &buf[offset..];

    if avail.len() < PREAMBLE_LEN {
        return Err(DecodeError::Incomplete {
            offset,
            needed: PREAMBLE_LEN + CRC_LEN,
            available: avail.len(),
        });
    }

    let declared = u16::from_be_bytes([avail[5], avail[6]]) as usize;
    if declared > MAX_PAYLOAD_LEN {
        return Err(DecodeError::LengthOverflow {
            offset,
            declared,
            max: MAX_PAYLOAD_LEN,
        });
    }

    let total = PREAMBLE_LEN + declared + CRC_LEN;
    if avail.len() < total {
        return Err(DecodeError::Incomplete {
            offset,
            needed: total,
            available: avail.len(),
        });
    }

    let body_end = PREAMBLE_LEN + declared;
    let expected = u16::from_be_bytes([avail[body_end], avail[body_end + 1]]);
    let actual = crc16_xmodem(&avail[1..body_end]);
    if expected != actual {
        return Err(DecodeError::CrcMismatch {
            offset,
            expected,
            actual,
        });
    }

    let frame = Frame {
        category: avail[3] & CATEGORY_MASK,
        message_id: avail[4],
        flags: avail[3] & (FLAG_RS485 | FLAG_NOTIFY),
        payload: avail[PREAMBLE_LEN..body_end].to_vec(),
    };
    Ok((frame, offset + total))
}

/// Decode with the resynchronization policy applied: any structural failure after a
/// header is reported as "no frame, advance one byte past that header". A buffer
/// without any header is consumed entirely.
pub fn decode(buf: &[u8]) -> (Option<Frame>, usize) {
    match decode_frame(buf) {
        Ok((frame, consumed)) => (Some(frame), consumed),
        Err(DecodeError::NoHeader(len)) => (None, len),
        Err(e) => (None, e.header_offset().map_or(1, |o| o + 1)),
    }
}

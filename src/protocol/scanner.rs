//! Heuristic tag scanner for loosely framed inventory bursts.
//!
//! The reader interleaves well-formed frames with high-rate inventory output whose
//! framing is not reliable. This scanner looks for the EPC class prefix `E2 80`
//! preceded by a plausible length byte and reads RSSI/antenna from nearby trailing
//! bytes. False negatives are acceptable; false positives are bounded by the
//! plausibility windows in [`ScannerTuning`].

use std::fmt::Write;

pub const EPC_CLASS_PREFIX: [u8; 2] = [0xE2, 0x80];

/// Plausibility windows. The antenna offsets in particular have no documented
/// ground truth and are kept adjustable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerTuning {
    pub min_epc_len: usize,
    pub max_epc_len: usize,
    /// Accepted absolute RSSI range (interpreted as negative dBm).
    pub rssi_abs_min: i32,
    pub rssi_abs_max: i32,
    pub antenna_min: u8,
    pub antenna_max: u8,
}

impl Default for ScannerTuning {
    fn default() -> Self {
        Self {
            min_epc_len: 4,
            max_epc_len: 32,
            rssi_abs_min: 20,
            rssi_abs_max: 100,
            antenna_min: 1,
            antenna_max: 8,
        }
    }
}

/// A best-effort tag sighting pulled out of raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeuristicTag {
    /// Uppercase hex.
    pub epc: String,
    /// Negative dBm, or 0 when no candidate byte was plausible.
    pub rssi: i32,
    /// 1..=8, or 0 when unknown.
    pub antenna: u8,
    /// Position of the first EPC byte; its length byte sits just before it.
    pub offset: usize,
    /// Position to resume scanning from.
    pub next_pos: usize,
}

pub fn epc_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{:02X}", b);
    }
    out
}

pub fn scan(buf: &[u8], start: usize) -> Option<HeuristicTag> {
    scan_with(buf, start, &ScannerTuning::default())
}

pub fn scan_with(buf: &[u8], start: usize, tuning: &ScannerTuning) -> Option<HeuristicTag> {
    let len = buf.len();
    let mut i = start;
    while i + 4 < len {
        if buf[i] != EPC_CLASS_PREFIX[0] || buf[i + 1] != EPC_CLASS_PREFIX[1] || i == 0 {
            i += 1;
            continue;
        }
        let epc_len = buf[i - 1] as usize;
        if epc_len < tuning.min_epc_len || epc_len > tuning.max_epc_len {
            i += 1;
            continue;
        }
        if i + epc_len > len {
            // Truncated EPC; everything after this point is shorter still.
            return None;
        }

        let end = i + epc_len;
        let rssi = [end, end + 1]
            .iter()
            .filter_map(|&p| buf.get(p))
            .map(|&b| -(b as i32))
            .find(|r| {
                let a = r.abs();
                a >= tuning.rssi_abs_min && a <= tuning.rssi_abs_max
            })
            .unwrap_or(0);
        let antenna = [end + 2, end + 3]
            .iter()
            .filter_map(|&p| buf.get(p))
            .copied()
            .find(|a| *a >= tuning.antenna_min && *a <= tuning.antenna_max)
            .unwrap_or(0);

        return Some(HeuristicTag {
            epc: epc_hex(&buf[i..end]),
            rssi,
            antenna,
            offset: i,
            next_pos: (end + 4).min(len),
        });
    }
    None
}

/// Collect up to `max` sightings from `buf`.
pub fn scan_all(buf: &[u8], tuning: &ScannerTuning, max: usize) -> Vec<HeuristicTag> {
    let mut out = Vec::new();
    let mut pos = 0;
    while out.len() < max {
        match scan_with(buf, pos, tuning) {
            Some(tag) => {
                pos = tag.next_pos.max(pos + 1);
                out.push(tag);
            }
            None => break,
        }
    }
    out
}

//! Incremental frame stream over serial chunks.
//!
//! Serial reads split frames arbitrarily, so the stream keeps a bounded receive
//! buffer and waits while a header's declared frame is not fully buffered yet.
//! Everything else follows the single-byte slip policy of [`super::frame::decode`].
//! When the line goes idle, [`FrameStream::finish`] applies strict semantics so a
//! stale partial frame cannot hold back the bytes behind it.
//!
//! [`FrameStream::decode_chunk`] is the two-stage entry point used by ingestion:
//! structured frames first, then a heuristic scan over the bytes no frame claimed.
//! A byte is claimed by a frame that decoded, by a frame that failed its checksum,
//! and by a frame that is still waiting for the rest of its bytes. Claimed bytes
//! never become heuristic sightings, so a pending frame's bytes are only scanned
//! once it turns out to be unterminated.

use std::ops::Range;

use bytes::{Buf, BytesMut};
use log::{debug, trace};

use super::frame::{decode_frame, Frame, CRC_LEN, HEADER, PREAMBLE_LEN, PROTOCOL_TYPE, PROTOCOL_VERSION};
use super::scanner::{scan_with, HeuristicTag, ScannerTuning};
use crate::errors::DecodeError;
use crate::logutil::hex_snippet;
use crate::metrics;

/// Receive buffer bound; oldest bytes are dropped beyond this.
pub const MAX_BUFFERED: usize = 4096;

/// Result of decoding one unit from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Frame(Frame),
    Heuristic(HeuristicTag),
}

/// Per-call work bounds.
#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    pub max_frames: usize,
    pub max_heuristic_tags: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_frames: 32,
            max_heuristic_tags: 10,
        }
    }
}

/// One structured decode attempt at the front of the buffer.
enum Step {
    /// Valid frame occupying `span` of the bytes examined.
    Frame(Frame, Range<usize>),
    /// Header rejected; `span` is set when its whole declared frame was present.
    Rejected(Option<Range<usize>>),
    /// Header at this offset waits for more bytes.
    Pending(usize),
    Empty,
}

#[derive(Debug)]
pub struct FrameStream {
    buf: BytesMut,
    tuning: ScannerTuning,
    /// Checksum rejections since creation.
    crc_failures: u64,
    /// The buffer starts with a header whose frame was incomplete after the last read.
    stalled: bool,
}

impl Default for FrameStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes a header declares for its whole frame, once the length field is buffered.
fn declared_total(at_header: &[u8]) -> Option<usize> {
    if at_header.len() < PREAMBLE_LEN {
        return None;
    }
    let declared = u16::from_be_bytes([at_header[5], at_header[6]]) as usize;
    Some(PREAMBLE_LEN + declared + CRC_LEN)
}

fn overlaps(claimed: &[Range<usize>], span: &Range<usize>) -> bool {
    claimed
        .iter()
        .any(|c| c.start < span.end && span.start < c.end)
}

impl FrameStream {
    pub fn new() -> Self {
        Self::with_tuning(ScannerTuning::default())
    }

    pub fn with_tuning(tuning: ScannerTuning) -> Self {
        Self {
            buf: BytesMut::with_capacity(1024),
            tuning,
            crc_failures: 0,
            stalled: false,
        }
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn push(&mut self, data: &[u8]) {
        let data = if data.len() > MAX_BUFFERED {
            &data[data.len() - MAX_BUFFERED..]
        } else {
            data
        };
        let overflow = (self.buf.len() + data.len()).saturating_sub(MAX_BUFFERED);
        if overflow > 0 {
            debug!("receive buffer full, dropping {} oldest bytes", overflow);
            self.buf.advance(overflow.min(self.buf.len()));
            self.stalled = false;
        }
        self.buf.extend_from_slice(data);
    }

    /// Decode at the buffer front and advance past whatever was settled. Spans
    /// are relative to the front before the call.
    fn step(&mut self) -> Step {
        if self.buf.is_empty() {
            return Step::Empty;
        }
        match decode_frame(&self.buf) {
            Ok((frame, consumed)) => {
                self.buf.advance(consumed);
                metrics::inc_frames_decoded();
                let start = consumed - (PREAMBLE_LEN + frame.payload.len() + CRC_LEN);
                Step::Frame(frame, start..consumed)
            }
            Err(DecodeError::NoHeader(_)) => {
                self.buf.clear();
                Step::Empty
            }
            Err(DecodeError::Incomplete { offset, .. }) => {
                self.buf.advance(offset);
                Step::Pending(offset)
            }
            Err(e) => {
                let offset = e.header_offset().unwrap_or(0);
                let span = if matches!(e, DecodeError::CrcMismatch { .. }) {
                    self.crc_failures += 1;
                    declared_total(&self.buf[offset..]).map(|total| offset..offset + total)
                } else {
                    None
                };
                debug!("frame rejected: {} ({})", e, hex_snippet(&self.buf, 16));
                metrics::inc_frames_rejected();
                self.buf.advance(offset + 1);
                Step::Rejected(span)
            }
        }
    }

    /// Next complete frame, waiting (returning `None`) on a partial one.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.step() {
                Step::Frame(frame, _) => {
                    self.stalled = false;
                    return Some(frame);
                }
                Step::Rejected(_) => {}
                Step::Pending(_) => {
                    self.stalled = true;
                    return None;
                }
                Step::Empty => {
                    self.stalled = false;
                    return None;
                }
            }
        }
    }

    /// Where a new header starts inside the declared span of a stalled frame,
    /// at or after `held` (the bytes it had before the latest read).
    ///
    /// A reader notification whose length field overstates its payload never
    /// completes; the next notification starting inside its span gives it away.
    fn superseded_at(&self, held: usize) -> Option<usize> {
        if decode_frame(&self.buf).is_ok() {
            return None;
        }
        let end = declared_total(&self.buf)
            .unwrap_or(self.buf.len())
            .min(self.buf.len());
        let marker = [HEADER, PROTOCOL_TYPE, PROTOCOL_VERSION];
        (held.max(1)..end).find(|&p| self.buf[p..].starts_with(&marker))
    }

    /// Heuristic sightings in `window` whose EPC bytes lie outside every claimed span.
    fn scan_unclaimed(&self, window: &[u8], claimed: &[Range<usize>], max: usize) -> Vec<HeuristicTag> {
        let mut tags = Vec::new();
        let mut pos = 0;
        while tags.len() < max {
            let Some(tag) = scan_with(window, pos, &self.tuning) else {
                break;
            };
            let span = tag.offset - 1..tag.offset + tag.epc.len() / 2;
            if overlaps(claimed, &span) {
                pos = tag.offset + 1;
                continue;
            }
            pos = tag.next_pos.max(tag.offset + 1);
            metrics::inc_heuristic_tags();
            tags.push(tag);
        }
        if !tags.is_empty() {
            trace!("heuristic scan found {} tags in {} bytes", tags.len(), window.len());
        }
        tags
    }

    /// Drain everything buffered with strict slip semantics: a header still waiting
    /// for bytes is given up on, and its bytes go to the heuristic scan like any
    /// other unclaimed bytes.
    pub fn finish(&mut self, limits: DecodeLimits) -> Vec<Decoded> {
        let window = self.buf.to_vec();
        let mut claimed = Vec::new();
        let mut frames = Vec::new();
        let mut base = 0;
        while !self.buf.is_empty() {
            let before = self.buf.len();
            let step = self.step();
            let from = base;
            match step {
                Step::Frame(frame, span) => {
                    claimed.push(from + span.start..from + span.end);
                    frames.push(Decoded::Frame(frame));
                }
                Step::Rejected(Some(span)) => claimed.push(from + span.start..from + span.end),
                Step::Rejected(None) | Step::Empty => {}
                Step::Pending(_) => {
                    metrics::inc_frames_rejected();
                    self.buf.advance(1);
                }
            }
            base += before - self.buf.len();
        }
        self.stalled = false;
        let tags = self.scan_unclaimed(&window, &claimed, limits.max_heuristic_tags);
        frames.extend(tags.into_iter().map(Decoded::Heuristic));
        frames
    }

    /// Push `chunk` and pull bounded work out of the stream. Frames left over past
    /// `max_frames` stay buffered for the next call (pass an empty chunk to drain).
    ///
    /// The heuristic scan covers the new chunk plus the bytes of a frame held back
    /// from earlier reads, minus everything a frame claims.
    pub fn decode_chunk(&mut self, chunk: &[u8], limits: DecodeLimits) -> Vec<Decoded> {
        let prior = self.buf.len();
        self.push(chunk);
        let fresh = chunk.len().min(MAX_BUFFERED);
        let kept = self.buf.len() - fresh;
        let held = if self.stalled && kept == prior {
            prior
        } else {
            0
        };

        let scan_from = kept - held;
        let window = self.buf[scan_from..].to_vec();
        let mut claimed: Vec<Range<usize>> = Vec::new();
        // Bytes advanced out of the buffer during this call.
        let mut base = 0;
        let mut claim = |base: usize, span: Range<usize>| {
            let start = (base + span.start).saturating_sub(scan_from);
            let end = (base + span.end).saturating_sub(scan_from);
            if start < end {
                claimed.push(start..end);
            }
        };

        if held > 0 {
            if let Some(p) = self.superseded_at(held) {
                debug!(
                    "unterminated frame header dropped after {} bytes ({})",
                    p,
                    hex_snippet(&self.buf, 8)
                );
                metrics::inc_frames_rejected();
                self.buf.advance(p);
                base += p;
            }
        }

        let mut out = Vec::new();
        self.stalled = false;
        while out.len() < limits.max_frames {
            let before = self.buf.len();
            let step = self.step();
            let from = base;
            base += before - self.buf.len();
            match step {
                Step::Frame(frame, span) => {
                    claim(from, span);
                    out.push(Decoded::Frame(frame));
                }
                Step::Rejected(Some(span)) => claim(from, span),
                Step::Rejected(None) => {}
                Step::Pending(_) => {
                    self.stalled = true;
                    break;
                }
                Step::Empty => break,
            }
        }
        // Whatever is still buffered belongs to a pending or not yet decoded frame.
        if !self.buf.is_empty() {
            claim(base, 0..self.buf.len());
        }

        let tags = self.scan_unclaimed(&window, &claimed, limits.max_heuristic_tags);
        out.extend(tags.into_iter().map(Decoded::Heuristic));
        out
    }

    pub fn tuning(&self) -> &ScannerTuning {
        &self.tuning
    }

    pub fn crc_failures(&self) -> u64 {
        self.crc_failures
    }
}

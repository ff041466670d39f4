//! Broker stand-in for the daemon: every publish becomes one JSON line on stdout.
//!
//! ```text
//! {"topic":"reader/gw-01/data/batch","retain":false,"payload":{...}}
//! ```
//!
//! Payloads that parse as JSON are embedded as-is, others as a string (UTF-8) or hex.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::warn;
use serde::Serialize;
use serde_json::Value;

use super::Publisher;
use crate::errors::PublishError;
use crate::logutil::hex_snippet;

#[derive(Serialize)]
struct Line<'a> {
    topic: &'a str,
    retain: bool,
    payload: Value,
}

#[derive(Debug)]
pub struct ConsolePublisher {
    connected: AtomicBool,
    reconnects: AtomicU64,
}

impl Default for ConsolePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsolePublisher {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            reconnects: AtomicU64::new(0),
        }
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }
}

fn render_payload(payload: &[u8]) -> Value {
    if let Ok(v) = serde_json::from_slice::<Value>(payload) {
        return v;
    }
    match std::str::from_utf8(payload) {
        Ok(s) => Value::String(s.to_string()),
        Err(_) => Value::String(hex_snippet(payload, payload.len())),
    }
}

impl Publisher for ConsolePublisher {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::NotConnected);
        }
        let line = Line {
            topic,
            retain,
            payload: render_payload(payload),
        };
        let text =
            serde_json::to_string(&line).map_err(|e| PublishError::Rejected(e.to_string()))?;
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{}", text)?;
        out.flush()?;
        Ok(())
    }

    /// Stdout has no session to reset; the request is only counted.
    fn request_reconnect(&self) {
        let n = self.reconnects.fetch_add(1, Ordering::Relaxed) + 1;
        warn!("reconnect requested ({} so far)", n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_rendering() {
        assert_eq!(render_payload(br#"{"a":1}"#)["a"], 1);
        assert_eq!(render_payload(b"online"), Value::String("online".into()));
        assert_eq!(render_payload(&[0xFF, 0x00]), Value::String("ff00".into()));
    }
}

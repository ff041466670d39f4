//! In-process collaborators: a link that records what was sent and a publisher whose
//! connection state and failures can be scripted.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{Link, Publisher};
use crate::errors::{LinkError, PublishError};
use crate::lock_or_recover;

#[derive(Debug)]
pub struct MemoryLink {
    open: AtomicBool,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl Default for MemoryLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLink {
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        lock_or_recover(&self.sent).clone()
    }

    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *lock_or_recover(&self.sent))
    }
}

impl Link for MemoryLink {
    fn send(&self, bytes: &[u8]) -> Result<(), LinkError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(LinkError::NotOpen);
        }
        lock_or_recover(&self.sent).push(bytes.to_vec());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

impl Published {
    pub fn payload_str(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or("")
    }
}

#[derive(Debug)]
pub struct MemoryPublisher {
    connected: AtomicBool,
    /// Number of upcoming publishes that fail even while connected.
    fail_next: AtomicUsize,
    reconnects: AtomicUsize,
    published: Mutex<Vec<Published>>,
}

impl Default for MemoryPublisher {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MemoryPublisher {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
            fail_next: AtomicUsize::new(0),
            reconnects: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn reconnect_requests(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<Published> {
        lock_or_recover(&self.published).clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<Published> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .collect()
    }

    pub fn take_published(&self) -> Vec<Published> {
        std::mem::take(&mut *lock_or_recover(&self.published))
    }
}

impl Publisher for MemoryPublisher {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::NotConnected);
        }
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PublishError::Rejected("scripted failure".into()));
        }
        lock_or_recover(&self.published).push(Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }

    fn request_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
    }
}

//! # Transport Module - Collaborator Seams
//!
//! The gateway core needs two capabilities from the outside world:
//!
//! - [`Link`] - put bytes on the reader link
//! - [`Publisher`] - hand a (topic, payload) pair to the broker
//!
//! Implementations:
//!
//! - [`serial`] - `serialport` backed reader link (feature `serial`)
//! - [`console`] - JSON-lines publisher on stdout, used by the daemon
//! - [`memory`] - recording link and scriptable publisher for tests and offline decoding
//!
//! [`CommandLink`] wraps any link and remembers the last frame it transmitted,
//! rendered as `TX: 5A 00 01 ...` for status responses.

pub mod console;
pub mod memory;
#[cfg(feature = "serial")]
pub mod serial;

use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::errors::{LinkError, PublishError};
use crate::lock_or_recover;
use crate::logutil::hex_spaced;

pub const NO_COMMAND_YET: &str = "No command sent yet";

/// Send bytes to the reader module.
pub trait Link: Send + Sync {
    fn send(&self, bytes: &[u8]) -> Result<(), LinkError>;
}

/// Blocking source of raw reader bytes. `Ok(0)` means nothing arrived within the
/// source's read timeout.
pub trait ByteSource: Send + 'static {
    fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Stand-in used when no reader is attached; every send fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLink;

impl Link for NoLink {
    fn send(&self, _bytes: &[u8]) -> Result<(), LinkError> {
        Err(LinkError::NotOpen)
    }
}

/// Broker side of the gateway.
pub trait Publisher: Send + Sync {
    fn is_connected(&self) -> bool;
    fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> Result<(), PublishError>;
    /// Ask the owner of the connection to tear it down and reconnect.
    fn request_reconnect(&self);
}

impl<T: Link + ?Sized> Link for Arc<T> {
    fn send(&self, bytes: &[u8]) -> Result<(), LinkError> {
        (**self).send(bytes)
    }
}

impl<T: Publisher + ?Sized> Publisher for Arc<T> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
    fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> Result<(), PublishError> {
        (**self).publish(topic, payload, retain)
    }
    fn request_reconnect(&self) {
        (**self).request_reconnect()
    }
}

/// Link wrapper that records the last transmitted command.
pub struct CommandLink {
    inner: Arc<dyn Link>,
    last: Mutex<String>,
}

impl CommandLink {
    pub fn new(inner: Arc<dyn Link>) -> Self {
        Self {
            inner,
            last: Mutex::new(NO_COMMAND_YET.to_string()),
        }
    }

    pub fn last_command(&self) -> String {
        lock_or_recover(&self.last).clone()
    }
}

impl Link for CommandLink {
    fn send(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let rendered = format!("TX: {}", hex_spaced(bytes));
        match self.inner.send(bytes) {
            Ok(()) => {
                debug!("{}", rendered);
                *lock_or_recover(&self.last) = rendered;
                Ok(())
            }
            Err(e) => {
                warn!("reader link send failed: {}", e);
                Err(e)
            }
        }
    }
}

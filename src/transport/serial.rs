//! Serial link to the reader module.

use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::{debug, info};
use serialport::SerialPort;

use super::{ByteSource, Link};
use crate::errors::LinkError;
use crate::lock_or_recover;

pub const DEFAULT_BAUD: u32 = 115_200;
const READ_TIMEOUT: Duration = Duration::from_millis(20);

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// Write half. The read half is a cloned handle so a blocking read never holds the
/// write lock.
pub struct SerialLink {
    port: SharedPort,
}

pub struct SerialReader {
    port: Box<dyn SerialPort>,
}

/// Open the port 8N1 and split it into writer and reader.
pub fn open(port_name: &str, baud_rate: u32) -> Result<(SerialLink, SerialReader)> {
    info!("Opening reader link {} at {} baud", port_name, baud_rate);
    let mut builder = serialport::new(port_name, baud_rate).timeout(READ_TIMEOUT);
    #[cfg(unix)]
    {
        builder = builder
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None);
    }
    let port = builder
        .open()
        .map_err(|e| anyhow!("Failed to open serial port {}: {}", port_name, e))?;
    let _ = port.clear(serialport::ClearBuffer::All);
    let reader = port
        .try_clone()
        .map_err(|e| anyhow!("Failed to clone serial port {}: {}", port_name, e))?;
    debug!("Serial port {} ready", port_name);
    Ok((
        SerialLink {
            port: Arc::new(Mutex::new(port)),
        },
        SerialReader { port: reader },
    ))
}

impl Link for SerialLink {
    fn send(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut port = lock_or_recover(&self.port);
        let written = port.write(bytes)?;
        if written != bytes.len() {
            return Err(LinkError::ShortWrite {
                written,
                expected: bytes.len(),
            });
        }
        port.flush()?;
        Ok(())
    }
}

impl ByteSource for SerialReader {
    /// Read whatever is available; a timeout is an empty read, not an error.
    fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }
}

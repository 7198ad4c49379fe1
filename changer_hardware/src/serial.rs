use std::io::{Read, Write};
use std::time::Duration;

use changer_traits::Transport;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, trace, warn};

use crate::error::{HwError, Result};
use crate::util::read_line_until;

/// Granularity of a single blocking byte read while assembling a line.
const BYTE_POLL: Duration = Duration::from_millis(20);

/// Line transport over a USB/UART MDB bridge (8N1, newline-terminated ASCII).
pub struct SerialLineTransport {
    port: Option<Box<dyn SerialPort>>,
    path: String,
}

impl SerialLineTransport {
    pub fn open(path: &str, baud: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;
        // bridge firmware drops the first bytes written right after open
        std::thread::sleep(Duration::from_millis(100));
        debug!(path, baud, "serial bridge opened");
        Ok(Self {
            port: Some(port),
            path: path.to_string(),
        })
    }

    pub fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(path = %self.path, "serial bridge closed");
        }
    }
}

impl Transport for SerialLineTransport {
    fn write_line(&mut self, line: &str) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let port = self.port.as_mut().ok_or(HwError::NotOpen)?;
        port.write_all(line.as_bytes()).map_err(HwError::from)?;
        port.write_all(b"\n").map_err(HwError::from)?;
        port.flush().map_err(HwError::from)?;
        trace!(line, "serial tx");
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> String {
        let Some(port) = self.port.as_mut() else {
            return String::new();
        };
        let previous = port.timeout();
        if let Err(e) = port.set_timeout(BYTE_POLL.min(timeout.max(Duration::from_millis(1)))) {
            warn!(error = %e, "failed to set serial read timeout");
        }
        let result = read_line_until(
            || {
                let mut byte = [0u8; 1];
                match port.read(&mut byte) {
                    Ok(1) => Ok(Some(byte[0])),
                    Ok(_) => Ok(None),
                    Err(e) => Err(e),
                }
            },
            timeout,
        );
        if let Err(e) = port.set_timeout(previous) {
            warn!(error = %e, "failed to restore serial read timeout");
        }
        match result {
            Ok(line) => {
                trace!(line = %line, "serial rx");
                line
            }
            Err(HwError::Timeout) => String::new(),
            Err(e) => {
                debug!(error = %e, "serial read failed");
                String::new()
            }
        }
    }
}

impl Drop for SerialLineTransport {
    fn drop(&mut self) {
        self.close();
    }
}

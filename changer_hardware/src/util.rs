use std::io::ErrorKind;
use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Longest line the bridge is expected to emit; anything longer is garbage.
pub const MAX_LINE_LEN: usize = 512;

/// Assemble one newline-terminated line from a byte source, or fail once
/// `timeout` expires.
///
/// `next_byte` yields `Ok(Some(b))` for a received byte and `Ok(None)` when
/// nothing is available yet. I/O timeouts reported by the source count as
/// "nothing yet". The returned line is trimmed (CR and surrounding whitespace).
pub fn read_line_until(
    mut next_byte: impl FnMut() -> std::io::Result<Option<u8>>,
    timeout: Duration,
) -> Result<String> {
    let deadline = Instant::now() + timeout;
    let mut buf: Vec<u8> = Vec::with_capacity(64);
    loop {
        match next_byte() {
            Ok(Some(b'\n')) => break,
            Ok(Some(b)) => {
                if buf.len() >= MAX_LINE_LEN {
                    return Err(HwError::Serial(format!(
                        "line exceeds {MAX_LINE_LEN} bytes without terminator"
                    )));
                }
                buf.push(b);
                continue;
            }
            Ok(None) => {}
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => return Err(HwError::Io(e)),
        }
        if Instant::now() >= deadline {
            return Err(HwError::Timeout);
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    Ok(String::from_utf8_lossy(&buf).trim().to_string())
}

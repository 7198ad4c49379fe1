pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Half-duplex, line-oriented link to the MDB bridge.
///
/// Only one request/response exchange may be outstanding at a time; callers
/// serialize access (the engine keeps the transport behind a mutex).
pub trait Transport {
    /// Write one command line. The implementation appends the line terminator.
    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Read one response line, waiting at most `timeout`.
    ///
    /// Returns an empty string on timeout or I/O error; never fails.
    fn read_line(&mut self, timeout: Duration) -> String;

    /// Write `line` and read the single response that follows it.
    fn exchange(
        &mut self,
        line: &str,
        timeout: Duration,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        self.write_line(line)?;
        Ok(self.read_line(timeout))
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write_line(line)
    }

    fn read_line(&mut self, timeout: Duration) -> String {
        (**self).read_line(timeout)
    }
}

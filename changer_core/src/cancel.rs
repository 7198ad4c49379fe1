//! Cooperative cancellation.
//!
//! A `CancelSource` owns the only sender of a zero-capacity channel; cancelling
//! (or dropping the source) disconnects it, which every cloned `CancelToken`
//! observes at its next check or wakes up from its current sleep.

use crossbeam_channel as xch;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub struct CancelSource {
    tx: Option<xch::Sender<()>>,
    token: CancelToken,
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: xch::Receiver<()>,
    // keeps `never()` tokens connected
    _pin: Option<Arc<xch::Sender<()>>>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, rx) = xch::bounded(0);
        Self {
            tx: Some(tx),
            token: CancelToken { rx, _pin: None },
        }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn cancel(&mut self) {
        self.tx.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.is_none()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Token that is never cancelled.
    pub fn never() -> Self {
        let (tx, rx) = xch::bounded(0);
        Self {
            rx,
            _pin: Some(Arc::new(tx)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(xch::TryRecvError::Disconnected))
    }

    /// Sleep for `d` unless cancelled first. Returns `true` when cancelled.
    pub fn sleep(&self, d: Duration) -> bool {
        if d.is_zero() {
            return self.is_cancelled();
        }
        matches!(
            self.rx.recv_timeout(d),
            Err(xch::RecvTimeoutError::Disconnected)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn cancel_wakes_sleepers() {
        let mut src = CancelSource::new();
        let token = src.token();
        let sleeper = std::thread::spawn(move || {
            let start = Instant::now();
            (token.sleep(Duration::from_secs(10)), start.elapsed())
        });
        std::thread::sleep(Duration::from_millis(20));
        src.cancel();
        let (cancelled, took) = sleeper.join().unwrap();
        assert!(cancelled);
        assert!(took < Duration::from_secs(5));
    }

    #[test]
    fn dropping_the_source_cancels() {
        let src = CancelSource::new();
        let token = src.token();
        assert!(!token.is_cancelled());
        drop(src);
        assert!(token.is_cancelled());
    }

    #[test]
    fn never_token_just_sleeps() {
        let token = CancelToken::never();
        assert!(!token.sleep(Duration::from_millis(1)));
        assert!(!token.is_cancelled());
    }
}

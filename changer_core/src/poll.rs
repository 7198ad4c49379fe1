//! Background poll loop.
//!
//! `Poller` spawns exactly one thread running [`run_poll_loop`] for a device
//! and stops it cooperatively when stopped or dropped, so the thread cannot
//! outlive its owner.

use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{error, info, warn};

use crate::cancel::{CancelSource, CancelToken};
use crate::device::{CoinChanger, PollOutcome};
use crate::error::{ChangerError, ErrorKind, Result};
use crate::status::{PollState, PollStateCell};

/// Poll until cancelled (`Ok`) or until consecutive failures exceed
/// `poll.max_failures` (`Err` with `DeviceFatal`).
///
/// Empty replies are not failures. The failure count resets after every
/// exchange that completes.
pub fn run_poll_loop(changer: &CoinChanger, cancel: &CancelToken) -> Result<()> {
    let cfg = changer.config().poll;
    let mut failures: u32 = 0;
    info!("poll loop started");
    while !cancel.is_cancelled() {
        let pause = match changer.poll_once() {
            Ok(PollOutcome::Idle) => {
                failures = 0;
                cfg.idle
            }
            Ok(_) => {
                failures = 0;
                cfg.interval
            }
            Err(e) => {
                failures += 1;
                if failures > cfg.max_failures {
                    error!(failures, error = %e, "poll loop giving up");
                    return Err(ChangerError::new(ErrorKind::DeviceFatal { failures }));
                }
                warn!(failures, error = %e, "poll failed, backing off");
                cfg.error_backoff
            }
        };
        if cancel.sleep(pause) {
            break;
        }
    }
    info!("poll loop stopped");
    Ok(())
}

pub struct Poller {
    cancel: CancelSource,
    state: Arc<PollStateCell>,
    join_handle: Option<JoinHandle<Result<()>>>,
}

impl Poller {
    pub fn spawn(changer: CoinChanger) -> Self {
        let cancel = CancelSource::new();
        let token = cancel.token();
        let state = Arc::new(PollStateCell::new(PollState::Polling));
        let state_thread = state.clone();

        let join_handle = std::thread::spawn(move || {
            let res = run_poll_loop(&changer, &token);
            state_thread.set(if res.is_ok() {
                PollState::Stopped
            } else {
                PollState::Fatal
            });
            res
        });

        Self {
            cancel,
            state,
            join_handle: Some(join_handle),
        }
    }

    pub fn state(&self) -> PollState {
        self.state.get()
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_none_or(JoinHandle::is_finished)
    }

    /// Ask the loop to stop at its next check or sleep.
    pub fn stop(&mut self) {
        self.cancel.cancel();
    }

    /// Wait for the loop to end on its own (fatal) or after `stop`.
    pub fn wait(mut self) -> Result<()> {
        self.join_inner()
    }

    /// Stop and wait.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop();
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<()> {
        match self.join_handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(ChangerError::new(ErrorKind::State(
                    "poll thread panicked".into(),
                )))
            }),
            None => Ok(()),
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
        // An in-flight exchange finishes within its own timeout first.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(_) => tracing::trace!("poll thread joined"),
                Err(e) => tracing::warn!(?e, "poll thread panicked during shutdown"),
            }
        }
    }
}

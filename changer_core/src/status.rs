//! Lifecycle state of the background poll loop.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PollState {
    /// Loop running.
    Polling = 0,
    /// Cancelled cooperatively.
    Stopped = 1,
    /// Gave up after too many consecutive failures; reinitialize first.
    Fatal = 2,
}

/// Lock-free cell shared between the poll thread and its owner.
#[derive(Debug)]
pub struct PollStateCell(AtomicU8);

impl PollStateCell {
    pub fn new(s: PollState) -> Self {
        Self(AtomicU8::new(s as u8))
    }

    pub fn set(&self, s: PollState) {
        self.0.store(s as u8, Ordering::Release);
    }

    pub fn get(&self) -> PollState {
        match self.0.load(Ordering::Acquire) {
            0 => PollState::Polling,
            1 => PollState::Stopped,
            _ => PollState::Fatal,
        }
    }
}

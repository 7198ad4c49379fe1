//! Small shared helpers for changer_core.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Lock a mutex, recovering the guard when a previous holder panicked.
///
/// Every value guarded in this crate is left consistent after each individual
/// mutation, so a poisoned lock carries no torn state.
#[inline]
pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[inline]
pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// Round `100 * part / whole` to the nearest integer; 0 when `whole` is 0.
#[inline]
pub fn percent_rounded(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    let p = u64::from(part) * 200 + u64::from(whole);
    u32::try_from(p / (2 * u64::from(whole))).unwrap_or(u32::MAX)
}

use std::thread;
use std::time::{Duration, Instant};

/// Time source for the waits the engine makes between device commands
/// (reset settle, dispense batch delay).
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);
}

/// Wall-clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            thread::sleep(d);
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_clock {
    use super::*;
    use std::sync::{Arc, Mutex, PoisonError};

    /// Clock that never blocks: every `sleep` is recorded and moves `now()`
    /// forward. Clones share the same record.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        sleeps: Arc<Mutex<Vec<Duration>>>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                sleeps: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Every sleep requested so far, in order.
        pub fn sleeps(&self) -> Vec<Duration> {
            self.sleeps
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Total simulated time slept.
        pub fn elapsed(&self) -> Duration {
            self.sleeps().iter().sum()
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed()
        }

        fn sleep(&self, d: Duration) {
            self.sleeps
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(d);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn sleeps_are_recorded_not_slept() {
            let clock = TestClock::new();
            let shared = clock.clone();
            let start = clock.now();
            let wall = Instant::now();
            shared.sleep(Duration::from_secs(30));
            shared.sleep(Duration::from_millis(150));
            assert!(wall.elapsed() < Duration::from_secs(1));
            assert_eq!(
                clock.sleeps(),
                vec![Duration::from_secs(30), Duration::from_millis(150)]
            );
            assert_eq!(clock.now() - start, Duration::from_millis(30_150));
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
use std::sync::{Arc, Mutex};
#[cfg(any(test, feature = "test-support"))]
use std::time::Duration;

#[cfg(any(test, feature = "test-support"))]
use super::GetUnixTime;

/// Time only advances when you call [`advance`](MockClock::advance) or
/// [`set`](MockClock::set), so window boundaries can be crossed on demand.
///
/// Clones share the same current time.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<Duration>>,
}

#[cfg(any(test, feature = "test-support"))]
impl MockClock {
    /// Starts at the Unix epoch.
    pub fn new() -> Self {
        Self::at(Duration::ZERO)
    }

    pub fn at(since_epoch: Duration) -> Self {
        Self {
            current: Arc::new(Mutex::new(since_epoch)),
        }
    }

    pub fn at_secs(secs: u64) -> Self {
        Self::at(Duration::from_secs(secs))
    }

    pub fn advance(&self, duration: Duration) {
        *self.current.lock().unwrap() += duration;
    }

    /// Set the absolute time (vs. relative [`advance`](Self::advance)).
    pub fn set(&self, since_epoch: Duration) {
        *self.current.lock().unwrap() = since_epoch;
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl GetUnixTime for MockClock {
    fn unix_time(&self) -> Duration {
        *self.current.lock().unwrap()
    }
}

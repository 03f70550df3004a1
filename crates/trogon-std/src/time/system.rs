use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::GetUnixTime;

/// Zero-sized; delegates to `std::time::SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl GetUnixTime for SystemClock {
    /// A system clock set before 1970 reads as the epoch itself.
    #[inline]
    fn unix_time(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

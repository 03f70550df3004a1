use std::time::Duration;

pub trait GetUnixTime {
    /// Time elapsed since `1970-01-01T00:00:00Z`.
    fn unix_time(&self) -> Duration;

    /// Whole seconds since the Unix epoch.
    fn unix_secs(&self) -> u64 {
        self.unix_time().as_secs()
    }
}

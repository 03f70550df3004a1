//! Zero-cost abstraction over the wall clock.
//!
//! Fixed-window rate limiting buckets time by seconds since the Unix epoch,
//! which `std::time::Instant` cannot express. [`GetUnixTime`] is the seam:
//! production code reads [`SystemClock`], tests drive a [`MockClock`].
//!
//! # Examples
//!
//! ```
//! use trogon_std::time::{GetUnixTime, SystemClock};
//!
//! fn hour_bucket<C: GetUnixTime>(clock: &C) -> u64 {
//!     clock.unix_secs() / 3600
//! }
//!
//! let bucket = hour_bucket(&SystemClock);
//! assert!(bucket > 0);
//! ```
//!
//! ```ignore
//! use trogon_std::time::{GetUnixTime, MockClock};
//! use std::time::Duration;
//!
//! let clock = MockClock::at_secs(1_702_512_000);
//! assert_eq!(hour_bucket(&clock), 472_920);
//!
//! clock.advance(Duration::from_secs(3600));
//! assert_eq!(hour_bucket(&clock), 472_921);
//! ```

mod get_unix_time;
mod mock;
mod system;

pub use get_unix_time::GetUnixTime;
#[cfg(any(test, feature = "test-support"))]
pub use mock::MockClock;
pub use system::SystemClock;

//! Zero-cost abstractions over `std` for TrogonStack projects.
//!
//! # Quick Start
//!
//! | Concern | Trait | Production | Test |
//! |---------|-------|------------|------|
//! | Env vars | [`ReadEnv`] | [`SystemEnv`] | [`InMemoryEnv`]* |
//! | Wall clock | [`GetUnixTime`] | [`SystemClock`] | [`MockClock`]* |
//!
//! *Available with `#[cfg(test)]` or the `"test-support"` feature.
//!
//! # Thread Safety
//!
//! Every type here is `Send + Sync`. The test doubles keep their state behind
//! `Arc<Mutex<…>>`, so they can be cloned into a multi-threaded `#[tokio::test]`
//! and shared with a running server.

pub mod env;
pub mod time;

#[cfg(any(test, feature = "test-support"))]
pub use env::InMemoryEnv;
pub use env::{ReadEnv, SystemEnv};
#[cfg(any(test, feature = "test-support"))]
pub use time::MockClock;
pub use time::{GetUnixTime, SystemClock};

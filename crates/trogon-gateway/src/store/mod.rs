//! Shared counter storage for fixed-window rate limiting.
//!
//! The store only needs get and put-with-TTL. It is deliberately not asked
//! for an atomic increment: the limiter's read-then-write cycle defines the
//! observable (soft) limit, and every backend must behave the same way.

pub mod memory;
pub mod nats_kv;

use std::fmt;
use std::future::Future;
use std::time::Duration;

pub use memory::{MemoryCounterStore, MemoryStoreError};
pub use nats_kv::{NatsKvCounterStore, NatsKvError};

/// One fixed-window counter: `"<limiterKey>:<windowIndex>"`, expiring after
/// the window length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    limiter_key: String,
    window_index: u64,
    window: Duration,
}

impl CounterKey {
    pub fn new(limiter_key: impl Into<String>, window_index: u64, window: Duration) -> Self {
        Self {
            limiter_key: limiter_key.into(),
            window_index,
            window,
        }
    }

    pub fn limiter_key(&self) -> &str {
        &self.limiter_key
    }

    pub fn window_index(&self) -> u64 {
        self.window_index
    }

    /// Time-to-live for the stored count; equal to the window length.
    pub fn ttl(&self) -> Duration {
        self.window
    }

    /// End of this key's window, as time since the Unix epoch.
    pub fn window_end(&self) -> Duration {
        let secs = self
            .window
            .as_secs()
            .saturating_mul(self.window_index.saturating_add(1));
        Duration::from_secs(secs)
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.limiter_key, self.window_index)
    }
}

/// Backend holding window counters, shared by every gateway instance.
pub trait CounterStore: Send + Sync + Clone + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Current count, or `None` if the key was never written or has expired.
    fn get(
        &self,
        key: &CounterKey,
    ) -> impl Future<Output = Result<Option<u64>, Self::Error>> + Send;

    /// Overwrite the count and (re)arm its expiry to `key.ttl()`. Backends
    /// with per-entry expiry also cap it at `key.window_end()`.
    fn put(
        &self,
        key: &CounterKey,
        value: u64,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

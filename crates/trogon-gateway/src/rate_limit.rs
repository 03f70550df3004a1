//! Fixed-window, per-client request quotas.
//!
//! # Soft limit
//!
//! [`RateLimiter::check`] reads the window counter and then writes `count + 1`
//! as two separate store operations. Concurrent requests for the same
//! `(limiter key, window)` can all read the same count, so the effective
//! number of admitted requests may exceed `requests_per_window` by up to the
//! number of requests in flight during the race. This bound violation is a
//! known property of the limiter, not a defect to patch around: tightening it
//! (e.g. compare-and-swap on the KV revision) changes observable behaviour
//! under load and must be a deliberate change.

use std::time::Duration;

use tracing::{debug, instrument};
use trogon_std::time::GetUnixTime;

use crate::identity::ClientIdentity;
use crate::store::{CounterKey, CounterStore};

/// Budget size, sent on every quota-bearing response.
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
/// Requests left in the current window.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Requests allowed per fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePolicy {
    pub requests_per_window: u64,
    pub window_seconds: u64,
}

impl RoutePolicy {
    pub const fn new(requests_per_window: u64, window_seconds: u64) -> Self {
        Self {
            requests_per_window,
            window_seconds,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// Budget categories. Several routes may draw from the same category.
///
/// The discriminant indexes [`POLICIES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyTag {
    Search = 0,
    Vision = 1,
    N8n = 2,
}

/// Namespace and budget per [`PolicyTag`]. Adding a category means adding a
/// variant and a row here.
static POLICIES: [(&str, RoutePolicy); 3] = [
    ("search", RoutePolicy::new(100, 3600)),
    ("vision", RoutePolicy::new(50, 3600)),
    ("n8n", RoutePolicy::new(200, 3600)),
];

impl PolicyTag {
    fn row(self) -> &'static (&'static str, RoutePolicy) {
        &POLICIES[self as usize]
    }

    /// Prefix of the limiter key, e.g. `search` in `search:<client>`.
    pub fn namespace(self) -> &'static str {
        self.row().0
    }

    pub fn policy(self) -> RoutePolicy {
        self.row().1
    }

    /// `"<namespace>:<client identity>"`.
    pub fn limiter_key(self, client: &ClientIdentity) -> String {
        format!("{}:{}", self.namespace(), client)
    }
}

/// `floor(now / window)`. A zero-length window is treated as one second.
pub fn window_index(now_secs: u64, window_seconds: u64) -> u64 {
    now_secs / window_seconds.max(1)
}

/// Time left until the window containing `now_secs` ends.
pub fn reset_after(now_secs: u64, window_seconds: u64) -> Duration {
    let window = window_seconds.max(1);
    Duration::from_secs(window - now_secs % window)
}

/// Outcome of one quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub admitted: bool,
    pub remaining: u64,
    pub limit: u64,
    pub reset_after: Duration,
}

/// The store could not be consulted. Callers must not treat this as
/// admission.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StoreUnavailable(pub String);

#[derive(Clone)]
pub struct RateLimiter<S, C> {
    store: S,
    clock: C,
}

impl<S, C> RateLimiter<S, C>
where
    S: CounterStore,
    C: GetUnixTime + Clone + Send + Sync + 'static,
{
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Admit or reject one request for `limiter_key` under `policy`.
    ///
    /// Rejections perform no write, so a rejected request never consumes a
    /// slot.
    #[instrument(name = "rate_limit.check", skip(self, policy), fields(limit = policy.requests_per_window))]
    pub async fn check(
        &self,
        limiter_key: &str,
        policy: RoutePolicy,
    ) -> Result<Decision, StoreUnavailable> {
        let now = self.clock.unix_secs();
        let key = CounterKey::new(
            limiter_key,
            window_index(now, policy.window_seconds),
            policy.window(),
        );
        let reset_after = reset_after(now, policy.window_seconds);

        let count = self
            .store
            .get(&key)
            .await
            .map_err(|e| StoreUnavailable(e.to_string()))?
            .unwrap_or(0);

        if count >= policy.requests_per_window {
            debug!(key = %key, count, "Quota exhausted");
            return Ok(Decision {
                admitted: false,
                remaining: 0,
                limit: policy.requests_per_window,
                reset_after,
            });
        }

        self.store
            .put(&key, count + 1)
            .await
            .map_err(|e| StoreUnavailable(e.to_string()))?;

        Ok(Decision {
            admitted: true,
            remaining: policy.requests_per_window - count - 1,
            limit: policy.requests_per_window,
            reset_after,
        })
    }
}

//! In-memory [`CounterStore`] backed by `Arc<Mutex<HashMap>>`.
//!
//! Suitable for tests and single-process development. Do **not** use it
//! behind more than one gateway instance: counters are not shared, so each
//! instance would grant the full budget.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use trogon_std::time::{GetUnixTime, SystemClock};

use super::{CounterKey, CounterStore};

#[derive(Debug)]
pub struct MemoryStoreError(String);

impl fmt::Display for MemoryStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryCounterStore error: {}", self.0)
    }
}

impl std::error::Error for MemoryStoreError {}

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: u64,
    expires_at: Duration,
}

/// Entries expire against the injected clock, so tests can cross TTLs
/// without sleeping.
#[derive(Clone)]
pub struct MemoryCounterStore<C = SystemClock> {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    writes: Arc<AtomicU64>,
    unavailable: Arc<AtomicBool>,
    clock: C,
}

impl MemoryCounterStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryCounterStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: GetUnixTime> MemoryCounterStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            writes: Arc::new(AtomicU64::new(0)),
            unavailable: Arc::new(AtomicBool::new(false)),
            clock,
        }
    }

    /// Simulate an outage: every `get`/`put` fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful `put` calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Synchronous peek that honours expiry, for assertions.
    pub fn value(&self, key: &CounterKey) -> Option<u64> {
        let now = self.clock.unix_time();
        self.entries
            .lock()
            .unwrap()
            .get(&key.to_string())
            .filter(|e| e.expires_at > now)
            .map(|e| e.value)
    }

    /// Entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), MemoryStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(MemoryStoreError("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl<C> CounterStore for MemoryCounterStore<C>
where
    C: GetUnixTime + Clone + Send + Sync + 'static,
{
    type Error = MemoryStoreError;

    async fn get(&self, key: &CounterKey) -> Result<Option<u64>, Self::Error> {
        self.check_available()?;
        let now = self.clock.unix_time();
        let mut entries = self.entries.lock().unwrap();
        let name = key.to_string();
        match entries.get(&name) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value)),
            Some(_) => {
                entries.remove(&name);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Expiry is `now + ttl`, capped at the end of the key's window. Expired
    /// entries are swept on every write: keys carry their window index, so a
    /// past window's key is never read again and would otherwise never leave.
    async fn put(&self, key: &CounterKey, value: u64) -> Result<(), Self::Error> {
        self.check_available()?;
        let now = self.clock.unix_time();
        let expires_at = (now + key.ttl()).min(key.window_end());
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(key.to_string(), Entry { value, expires_at });
        drop(entries);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trogon_std::time::MockClock;

    const WINDOW: Duration = Duration::from_secs(60);
    /// Start of window 16 for a 60 s window.
    const START: u64 = 960;

    fn key(limiter_key: &str, at_secs: u64) -> CounterKey {
        CounterKey::new(limiter_key, at_secs / WINDOW.as_secs(), WINDOW)
    }

    #[tokio::test]
    async fn missing_key_reads_none() {
        let store = MemoryCounterStore::with_clock(MockClock::at_secs(START));
        assert_eq!(store.get(&key("search:alice", START)).await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = MemoryCounterStore::with_clock(MockClock::at_secs(START));
        let k = key("search:alice", START);
        store.put(&k, 7).await.unwrap();
        assert_eq!(store.get(&k).await.unwrap(), Some(7));
        assert_eq!(store.value(&k), Some(7));
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let clock = MockClock::at_secs(START);
        let store = MemoryCounterStore::with_clock(clock.clone());
        let k = key("search:alice", START);
        store.put(&k, 3).await.unwrap();

        clock.advance(Duration::from_secs(59));
        assert_eq!(store.get(&k).await.unwrap(), Some(3));

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.get(&k).await.unwrap(), None);
        assert_eq!(store.value(&k), None);
    }

    #[tokio::test]
    async fn rewrite_late_in_window_still_expires_at_window_end() {
        let clock = MockClock::at_secs(START);
        let store = MemoryCounterStore::with_clock(clock.clone());
        let k = key("search:alice", START);
        store.put(&k, 1).await.unwrap();

        clock.advance(Duration::from_secs(50));
        store.put(&k, 2).await.unwrap();
        clock.advance(Duration::from_secs(9));
        assert_eq!(store.get(&k).await.unwrap(), Some(2));

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.get(&k).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_windows_are_swept_on_write() {
        let clock = MockClock::at_secs(START);
        let store = MemoryCounterStore::with_clock(clock.clone());

        for _ in 0..1000 {
            let now = clock.unix_secs();
            store.put(&key("search:alice", now), 1).await.unwrap();
            store.put(&key("vision:alice", now), 1).await.unwrap();
            assert!(store.len() <= 2, "expired entries retained: {}", store.len());
            clock.advance(WINDOW);
        }
        assert_eq!(store.write_count(), 2000);
    }

    #[tokio::test]
    async fn sweep_keeps_live_entries() {
        let clock = MockClock::at_secs(START);
        let store = MemoryCounterStore::with_clock(clock.clone());
        store.put(&key("search:alice", START), 5).await.unwrap();

        clock.advance(Duration::from_secs(30));
        store.put(&key("search:bob", START + 30), 1).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.value(&key("search:alice", START)), Some(5));
    }

    #[tokio::test]
    async fn unavailable_store_fails_both_operations() {
        let store = MemoryCounterStore::with_clock(MockClock::at_secs(START));
        let k = key("search:alice", START);
        store.set_unavailable(true);
        assert!(store.get(&k).await.is_err());
        assert!(store.put(&k, 1).await.is_err());
        assert_eq!(store.write_count(), 0);

        store.set_unavailable(false);
        assert!(store.put(&k, 1).await.is_ok());
    }

    #[tokio::test]
    async fn clones_share_counters() {
        let store = MemoryCounterStore::with_clock(MockClock::at_secs(START));
        let other = store.clone();
        let k = key("n8n:carol", START);
        store.put(&k, 4).await.unwrap();
        assert_eq!(other.get(&k).await.unwrap(), Some(4));
    }

    #[test]
    fn error_display_mentions_store() {
        let err = MemoryStoreError("store unavailable".into());
        assert_eq!(err.to_string(), "MemoryCounterStore error: store unavailable");
    }
}

//! [`CounterStore`] backed by NATS JetStream key-value buckets.
//!
//! JetStream KV expires entries per bucket (`max_age`), not per key, so the
//! store keeps one bucket per distinct window length:
//! `<prefix>_<window secs>s`. Buckets are created on first use and cached.
//! `max_age` is measured from the last write, which matches put-with-TTL.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_nats::jetstream::{self, kv};
use async_nats::{ConnectOptions, Event};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::{CounterKey, CounterStore};
use crate::config::{NatsAuth, NatsSettings};

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum NatsKvError {
    #[error("failed to load NATS credentials file: {0}")]
    Credentials(#[source] std::io::Error),

    #[error("failed to connect to NATS servers {servers:?}: {message}")]
    Connect {
        servers: Vec<String>,
        message: String,
    },

    #[error("KV bucket {bucket} unavailable: {message}")]
    Bucket { bucket: String, message: String },

    #[error("KV error: {0}")]
    Kv(String),
}

async fn handle_event(event: Event) {
    match event {
        Event::Connected => info!("NATS connected"),
        Event::Disconnected => warn!("NATS disconnected - will attempt reconnect"),
        Event::ServerError(err) => warn!(error = %err, "NATS server error"),
        Event::ClientError(err) => warn!(error = %err, "NATS client error"),
        other => debug!(event = ?other, "NATS connection event"),
    }
}

/// Exponential backoff, 1 s doubling up to [`MAX_RECONNECT_DELAY`].
fn reconnect_delay(attempts: usize) -> Duration {
    let exponent = u32::try_from(attempts).unwrap_or(u32::MAX);
    let delay = Duration::from_secs(
        MAX_RECONNECT_DELAY
            .as_secs()
            .min(2u64.saturating_pow(exponent)),
    );
    info!(
        attempts,
        delay_secs = delay.as_secs(),
        "NATS reconnect delay"
    );
    delay
}

fn apply_reconnect_options(options: ConnectOptions) -> ConnectOptions {
    options
        .retry_on_initial_connect()
        .connection_timeout(CONNECTION_TIMEOUT)
        .reconnect_delay_callback(reconnect_delay)
        .event_callback(|event| async move { handle_event(event).await })
}

/// Connect to the NATS servers that host the counter buckets.
#[instrument(name = "nats.connect", skip_all, fields(servers = ?settings.servers, auth = settings.auth.description()))]
pub async fn connect(settings: &NatsSettings) -> Result<async_nats::Client, NatsKvError> {
    let options = match &settings.auth {
        NatsAuth::Credentials(path) => ConnectOptions::with_credentials_file(path.clone())
            .await
            .map_err(NatsKvError::Credentials)?,
        NatsAuth::UserPassword { user, password } => {
            ConnectOptions::with_user_and_password(user.clone(), password.clone())
        }
        NatsAuth::Token(token) => ConnectOptions::with_token(token.clone()),
        NatsAuth::None => ConnectOptions::new(),
    };

    // Retries in the background when the servers are down at startup; counter
    // operations fail (503) until the first connection succeeds.
    let client = apply_reconnect_options(options)
        .connect(&settings.servers)
        .await
        .map_err(|e| NatsKvError::Connect {
            servers: settings.servers.clone(),
            message: e.to_string(),
        })?;

    info!("Connected to NATS");
    Ok(client)
}

#[derive(Clone)]
pub struct NatsKvCounterStore {
    js: jetstream::Context,
    bucket_prefix: String,
    buckets: Arc<RwLock<HashMap<u64, kv::Store>>>,
}

impl NatsKvCounterStore {
    pub fn new(js: jetstream::Context, bucket_prefix: impl Into<String>) -> Self {
        Self {
            js,
            bucket_prefix: bucket_prefix.into(),
            buckets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn bucket_name(&self, window: Duration) -> String {
        format!("{}_{}s", self.bucket_prefix, window.as_secs())
    }

    async fn bucket(&self, window: Duration) -> Result<kv::Store, NatsKvError> {
        let secs = window.as_secs();
        let cached = self.buckets.read().unwrap().get(&secs).cloned();
        if let Some(store) = cached {
            return Ok(store);
        }

        let name = self.bucket_name(window);
        let config = kv::Config {
            bucket: name.clone(),
            history: 1,
            max_age: window,
            ..Default::default()
        };
        // Another instance may have created the bucket first.
        let store = match self.js.create_key_value(config).await {
            Ok(store) => store,
            Err(_) => self
                .js
                .get_key_value(&name)
                .await
                .map_err(|e| NatsKvError::Bucket {
                    bucket: name.clone(),
                    message: e.to_string(),
                })?,
        };

        info!(bucket = %name, window_secs = secs, "Rate limit bucket ready");
        self.buckets.write().unwrap().insert(secs, store.clone());
        Ok(store)
    }
}

/// KV keys only allow `[-/_=.a-zA-Z0-9]`; client identities (IPv6 in
/// particular) and the `:` separators do not fit, so the key is hex-encoded.
pub fn kv_key(key: &CounterKey) -> String {
    hex::encode(key.to_string())
}

fn parse_count(raw: &[u8], key: &CounterKey) -> u64 {
    match std::str::from_utf8(raw).ok().and_then(|s| s.trim().parse().ok()) {
        Some(count) => count,
        None => {
            warn!(key = %key, "Unparsable rate limit counter, treating as 0");
            0
        }
    }
}

impl CounterStore for NatsKvCounterStore {
    type Error = NatsKvError;

    async fn get(&self, key: &CounterKey) -> Result<Option<u64>, NatsKvError> {
        let bucket = self.bucket(key.ttl()).await?;
        let value = bucket
            .get(kv_key(key))
            .await
            .map_err(|e| NatsKvError::Kv(e.to_string()))?;
        Ok(value.map(|raw| parse_count(&raw, key)))
    }

    async fn put(&self, key: &CounterKey, value: u64) -> Result<(), NatsKvError> {
        let bucket = self.bucket(key.ttl()).await?;
        bucket
            .put(kv_key(key), value.to_string().into())
            .await
            .map(|_| ())
            .map_err(|e| NatsKvError::Kv(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(limiter_key: &str) -> CounterKey {
        CounterKey::new(limiter_key, 472_920, Duration::from_secs(3600))
    }

    #[test]
    fn kv_key_only_uses_allowed_characters() {
        let encoded = kv_key(&key("search:2001:db8::1"));
        assert!(encoded.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            hex::decode(&encoded).unwrap(),
            b"search:2001:db8::1:472920".to_vec()
        );
    }

    #[test]
    fn kv_key_is_distinct_per_identity() {
        assert_ne!(kv_key(&key("search:alice")), kv_key(&key("search:bob")));
    }

    #[test]
    fn parse_count_reads_decimal_ascii() {
        assert_eq!(parse_count(b"42", &key("n8n:x")), 42);
        assert_eq!(parse_count(b" 7\n", &key("n8n:x")), 7);
    }

    #[test]
    fn parse_count_treats_garbage_as_zero() {
        assert_eq!(parse_count(b"not-a-number", &key("n8n:x")), 0);
        assert_eq!(parse_count(&[0xff, 0xfe], &key("n8n:x")), 0);
        assert_eq!(parse_count(b"-3", &key("n8n:x")), 0);
    }

    #[test]
    fn reconnect_delay_starts_at_one_second() {
        assert_eq!(reconnect_delay(0), Duration::from_secs(1));
    }

    #[test]
    fn reconnect_delay_doubles() {
        assert_eq!(reconnect_delay(1).as_secs(), 2);
        assert_eq!(reconnect_delay(2).as_secs(), 4);
        assert_eq!(reconnect_delay(4).as_secs(), 16);
    }

    #[test]
    fn reconnect_delay_caps_at_max() {
        assert_eq!(reconnect_delay(5), MAX_RECONNECT_DELAY);
        assert_eq!(reconnect_delay(64), MAX_RECONNECT_DELAY);
        assert_eq!(reconnect_delay(usize::MAX), MAX_RECONNECT_DELAY);
    }

    #[test]
    fn connect_error_display_lists_servers() {
        let err = NatsKvError::Connect {
            servers: vec!["localhost:4222".to_string()],
            message: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("localhost:4222"));
        assert!(msg.contains("connection refused"));
    }
}

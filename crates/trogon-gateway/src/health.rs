//! Liveness responder for `/` and `/health`.

use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use trogon_std::time::GetUnixTime;

pub const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    /// RFC 3339, UTC, millisecond precision.
    pub timestamp: String,
    pub version: String,
}

impl HealthStatus {
    pub fn now<C: GetUnixTime>(clock: &C) -> Self {
        let since_epoch = clock.unix_time();
        let timestamp = DateTime::<Utc>::from_timestamp(
            since_epoch.as_secs() as i64,
            since_epoch.subsec_nanos(),
        )
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true);

        Self {
            status: "healthy".to_string(),
            service: SERVICE_NAME.to_string(),
            timestamp,
            version: VERSION.to_string(),
        }
    }
}

pub fn respond<C: GetUnixTime>(clock: &C) -> Json<HealthStatus> {
    Json(HealthStatus::now(clock))
}

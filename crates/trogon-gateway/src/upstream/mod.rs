//! Forwarders: one per third-party API, each turning an admitted inbound
//! request into exactly one upstream call.
//!
//! Forwarders validate their own input (400/405) and pass upstream status and
//! body through untranslated. Only `Content-Type` is copied from the upstream
//! response; every other provider header is dropped so nothing
//! credential-bearing reaches the caller. Each call is bounded by the
//! configured timeout and never retried.

pub mod chat;
pub mod n8n;
pub mod perplexity;
pub mod search;
pub mod vision;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, Uri, header};
use axum::response::Response;
use bytes::Bytes;
use reqwest::RequestBuilder;
use tracing::debug;

use crate::config::UpstreamSettings;
use crate::error::GatewayError;

const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// The parts of an inbound request a forwarder may use.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Shared HTTP client plus provider endpoints and credentials.
#[derive(Clone)]
pub struct Upstreams {
    http: reqwest::Client,
    settings: Arc<UpstreamSettings>,
}

impl Upstreams {
    pub fn new(settings: UpstreamSettings) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(http, settings))
    }

    pub fn with_client(http: reqwest::Client, settings: UpstreamSettings) -> Self {
        Self {
            http,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &UpstreamSettings {
        &self.settings
    }

    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Send `request` with the per-call timeout and relay the answer.
    async fn send(
        &self,
        upstream: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, GatewayError> {
        let timeout = self.timeout();
        let upstream_response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(upstream, timeout, e))?;

        let status = upstream_response.status();
        let content_type = upstream_response
            .headers()
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        let body = upstream_response
            .bytes()
            .await
            .map_err(|e| transport_error(upstream, timeout, e))?;

        debug!(upstream, status = status.as_u16(), bytes = body.len(), "Upstream responded");

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
        Ok(response)
    }
}

/// URLs may carry credentials in the query string, so they are stripped
/// from the error before it can reach a response body or a log line.
fn transport_error(upstream: &'static str, timeout: Duration, e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::UpstreamTimeout { upstream, timeout }
    } else {
        GatewayError::Upstream {
            upstream,
            message: e.without_url().to_string(),
        }
    }
}

/// Reject anything but `POST` on POST-only routes.
fn require_post(inbound: &Inbound) -> Result<(), GatewayError> {
    if inbound.method == Method::POST {
        Ok(())
    } else {
        Err(GatewayError::MethodNotAllowed)
    }
}

/// Decode a JSON body, mapping any failure to a 400.
fn json_body<T: serde::de::DeserializeOwned>(inbound: &Inbound) -> Result<T, GatewayError> {
    serde_json::from_slice(&inbound.body)
        .map_err(|e| GatewayError::Validation(format!("Invalid JSON body: {e}")))
}

/// A required string field: present and not blank.
fn required(field: &'static str, value: Option<String>) -> Result<String, GatewayError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| GatewayError::Validation(format!("Missing required field: {field}")))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn inbound(method: Method, uri: &str, body: &str) -> Inbound {
        Inbound {
            method,
            uri: uri.parse().unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn require_post_rejects_other_verbs() {
        assert!(require_post(&inbound(Method::POST, "/api/vision", "")).is_ok());
        for method in [Method::GET, Method::PUT, Method::DELETE] {
            assert!(matches!(
                require_post(&inbound(method, "/api/vision", "")),
                Err(GatewayError::MethodNotAllowed)
            ));
        }
    }

    #[test]
    fn json_body_rejects_malformed_input() {
        let err = json_body::<serde_json::Value>(&inbound(Method::POST, "/", "{not json"))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(ref m) if m.starts_with("Invalid JSON body")));
    }

    #[test]
    fn required_rejects_missing_and_blank() {
        assert_eq!(required("image", Some("AAA".into())).unwrap(), "AAA");
        assert!(matches!(
            required("image", None),
            Err(GatewayError::Validation(ref m)) if m == "Missing required field: image"
        ));
        assert!(required("image", Some("   ".into())).is_err());
    }
}

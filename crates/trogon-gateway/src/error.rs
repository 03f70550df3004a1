//! Failure taxonomy for one gateway request.
//!
//! Every variant renders as a JSON `{"error": "<message>"}` body; the status
//! code is fixed per variant. CORS decoration happens afterwards in the
//! gateway, so it applies to these responses like any other.

use std::time::Duration;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::rate_limit::{RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// A required field or query parameter is missing or malformed.
    #[error("{0}")]
    Validation(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Rate limit exceeded")]
    RateLimited { limit: u64, retry_after: Duration },

    #[error("Not found")]
    NotFound,

    /// The upstream call failed before a response arrived.
    #[error("{upstream} request failed: {message}")]
    Upstream {
        upstream: &'static str,
        message: String,
    },

    #[error("{upstream} did not respond within {}s", .timeout.as_secs())]
    UpstreamTimeout {
        upstream: &'static str,
        timeout: Duration,
    },

    /// The counter store could not be read or written. Requests fail closed.
    #[error("Rate limit store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_configured(setting: &str) -> Self {
        Self::Internal(format!("{setting} is not configured"))
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let mut message = self.to_string();
        if message.is_empty() {
            message = "Internal server error".to_string();
        }

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let Self::RateLimited { limit, retry_after } = &self {
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
            headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(*limit));
            headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(0u64));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn status_codes_per_variant() {
        let cases = [
            (GatewayError::Validation("x".into()), 400),
            (GatewayError::MethodNotAllowed, 405),
            (GatewayError::PayloadTooLarge { limit: 10 }, 413),
            (
                GatewayError::RateLimited {
                    limit: 100,
                    retry_after: Duration::from_secs(1),
                },
                429,
            ),
            (GatewayError::NotFound, 404),
            (
                GatewayError::Upstream {
                    upstream: "search",
                    message: "refused".into(),
                },
                502,
            ),
            (
                GatewayError::UpstreamTimeout {
                    upstream: "vision",
                    timeout: Duration::from_secs(30),
                },
                504,
            ),
            (GatewayError::StoreUnavailable("down".into()), 503),
            (GatewayError::Internal("boom".into()), 500),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status().as_u16(), expected, "{err:?}");
        }
    }

    #[tokio::test]
    async fn rate_limited_body_and_headers() {
        let response = GatewayError::RateLimited {
            limit: 100,
            retry_after: Duration::from_secs(42),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
        assert_eq!(response.headers()[RATE_LIMIT_LIMIT_HEADER], "100");
        assert_eq!(response.headers()[RATE_LIMIT_REMAINING_HEADER], "0");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Rate limit exceeded" })
        );
    }

    #[tokio::test]
    async fn not_found_body() {
        let body = body_json(GatewayError::NotFound.into_response()).await;
        assert_eq!(body, json!({ "error": "Not found" }));
    }

    #[tokio::test]
    async fn validation_message_is_the_body() {
        let body = body_json(
            GatewayError::Validation("Missing query parameter: q".into()).into_response(),
        )
        .await;
        assert_eq!(body["error"], "Missing query parameter: q");
    }

    #[tokio::test]
    async fn empty_internal_message_gets_placeholder() {
        let body = body_json(GatewayError::Internal(String::new()).into_response()).await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[test]
    fn timeout_display_names_upstream_and_duration() {
        let err = GatewayError::UpstreamTimeout {
            upstream: "perplexity",
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "perplexity did not respond within 30s");
    }

    #[test]
    fn not_configured_is_internal() {
        let err = GatewayError::not_configured("SERPAPI_API_KEY");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "SERPAPI_API_KEY is not configured");
    }
}

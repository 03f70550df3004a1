//! Cross-origin response decoration.
//!
//! Every response leaving the gateway, including rejections and errors, goes
//! through [`CorsPolicy::apply`].

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;

pub const WILDCARD: &str = "*";
pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-User-ID";
pub const MAX_AGE_SECS: &str = "86400";

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    /// An empty list behaves like `*`.
    pub fn new(allowed_origins: Vec<String>) -> Self {
        let allowed_origins = if allowed_origins.is_empty() {
            vec![WILDCARD.to_string()]
        } else {
            allowed_origins
        };
        Self { allowed_origins }
    }

    /// Parse a comma-separated allow-list; entries are trimmed and blanks dropped.
    pub fn from_list(raw: &str) -> Self {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    fn allows_any(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == WILDCARD)
    }

    /// The request's origin when it is allowed (or anything is), otherwise
    /// the first configured origin. A disallowed origin is never echoed.
    pub fn allow_origin(&self, request_origin: Option<&str>) -> String {
        match request_origin {
            Some(origin) if self.allows_any() || self.allowed_origins.iter().any(|o| o == origin) => {
                origin.to_string()
            }
            None if self.allows_any() => WILDCARD.to_string(),
            _ => self.allowed_origins[0].clone(),
        }
    }

    /// Overwrite the CORS header set on `headers`.
    pub fn apply(&self, headers: &mut HeaderMap, request_origin: Option<&str>) {
        let origin = self.allow_origin(request_origin);
        match HeaderValue::from_str(&origin) {
            Ok(value) => {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            }
            Err(_) => {
                tracing::warn!(origin = %origin, "Configured origin is not a valid header value");
            }
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(MAX_AGE_SECS),
        );
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    }

    /// Empty `204` answer to an `OPTIONS` preflight.
    pub fn preflight(&self, request_origin: Option<&str>) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        self.apply(response.headers_mut(), request_origin);
        response
    }
}

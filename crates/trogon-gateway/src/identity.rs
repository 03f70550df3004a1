//! Rate-limit identity derivation.

use std::fmt;

use axum::http::HeaderMap;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const CONNECTING_IP_HEADER: &str = "cf-connecting-ip";
pub const ANONYMOUS: &str = "anonymous";

/// Who a request counts against. Recomputed for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Precedence: `X-User-ID` > `CF-Connecting-IP` > `"anonymous"`.
    /// Blank or non-UTF-8 header values are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let id = header(USER_ID_HEADER)
            .or_else(|| header(CONNECTING_IP_HEADER))
            .unwrap_or(ANONYMOUS);
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

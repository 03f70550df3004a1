//! Workflow webhooks, proxied with the inbound method, body and auth header.

use axum::http::{Method, header};
use axum::response::Response;
use tracing::instrument;

use super::{Inbound, Upstreams};
use crate::error::GatewayError;

pub const UPSTREAM: &str = "n8n";
const FORWARDED_HEADERS: [header::HeaderName; 2] = [header::CONTENT_TYPE, header::AUTHORIZATION];

/// `{base}{sub_path}` plus the inbound query string, if any.
pub fn webhook_url(base: &str, sub_path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{base}{sub_path}?{q}"),
        _ => format!("{base}{sub_path}"),
    }
}

#[instrument(name = "upstream.n8n", skip(upstreams, inbound))]
pub async fn forward(
    upstreams: &Upstreams,
    inbound: &Inbound,
    sub_path: &str,
) -> Result<Response, GatewayError> {
    let base = upstreams
        .settings()
        .n8n_webhook_url
        .as_deref()
        .ok_or_else(|| GatewayError::not_configured("N8N_WEBHOOK_URL"))?;

    let url = webhook_url(base, sub_path, inbound.uri.query());
    let mut request = upstreams.http().request(inbound.method.clone(), url);
    for name in FORWARDED_HEADERS {
        if let Some(value) = inbound.headers.get(&name) {
            request = request.header(name, value.clone());
        }
    }
    if inbound.method != Method::GET && inbound.method != Method::HEAD {
        request = request.body(inbound.body.clone());
    }

    upstreams.send(UPSTREAM, request).await
}

//! Shopping search, forwarded to SerpAPI's Google Shopping engine.

use axum::extract::Query;
use axum::response::Response;
use serde::Deserialize;
use tracing::instrument;

use super::{Inbound, Upstreams};
use crate::error::GatewayError;

pub const UPSTREAM: &str = "search";
const ENGINE: &str = "google_shopping";

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    q: Option<String>,
    gl: Option<String>,
    hl: Option<String>,
    num: Option<String>,
}

/// Resolved outbound query, credential excluded.
#[derive(Debug, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: String,
    pub gl: String,
    pub hl: String,
    pub num: String,
}

impl SearchQuery {
    /// `q` is required; `gl`, `hl` and `num` default to `us`, `en` and `10`.
    pub fn from_inbound(inbound: &Inbound) -> Result<Self, GatewayError> {
        let Query(params) = Query::<SearchParams>::try_from_uri(&inbound.uri)
            .map_err(|e| GatewayError::Validation(format!("Invalid query string: {e}")))?;

        let q = params
            .q
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::Validation("Missing required query parameter: q".to_string())
            })?;

        Ok(Self {
            q,
            gl: params.gl.unwrap_or_else(|| "us".to_string()),
            hl: params.hl.unwrap_or_else(|| "en".to_string()),
            num: params.num.unwrap_or_else(|| "10".to_string()),
        })
    }
}

#[instrument(name = "upstream.search", skip_all)]
pub async fn forward(upstreams: &Upstreams, inbound: &Inbound) -> Result<Response, GatewayError> {
    let query = SearchQuery::from_inbound(inbound)?;
    let settings = upstreams.settings();
    let api_key = settings
        .search_api_key
        .as_deref()
        .ok_or_else(|| GatewayError::not_configured("SERPAPI_API_KEY"))?;

    let url = format!("{}/search.json", settings.search_base_url);
    let request = upstreams.http().get(url).query(&[
        ("engine", ENGINE),
        ("q", query.q.as_str()),
        ("gl", query.gl.as_str()),
        ("hl", query.hl.as_str()),
        ("num", query.num.as_str()),
        ("api_key", api_key),
    ]);

    upstreams.send(UPSTREAM, request).await
}

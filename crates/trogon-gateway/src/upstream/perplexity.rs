//! General web-grounded answers from Perplexity's chat-completions API.

use axum::response::Response;
use serde::Deserialize;
use tracing::instrument;

use super::chat::{ChatCompletionRequest, ChatMessage, MessageContent};
use super::{Inbound, Upstreams, json_body, require_post, required};
use crate::error::GatewayError;

pub const UPSTREAM: &str = "perplexity";
pub const DEFAULT_MODEL: &str = "sonar";
const SYSTEM_PROMPT: &str = "You are a shopping research assistant. Answer concisely and \
     cite sources for prices and availability.";

#[derive(Debug, Deserialize)]
struct PerplexityRequest {
    query: Option<String>,
    model: Option<String>,
}

#[instrument(name = "upstream.perplexity", skip_all)]
pub async fn forward(upstreams: &Upstreams, inbound: &Inbound) -> Result<Response, GatewayError> {
    require_post(inbound)?;
    let body: PerplexityRequest = json_body(inbound)?;
    let query = required("query", body.query)?;

    let settings = upstreams.settings();
    let api_key = settings
        .perplexity_api_key
        .as_deref()
        .ok_or_else(|| GatewayError::not_configured("PERPLEXITY_API_KEY"))?;

    let payload = ChatCompletionRequest {
        model: body.model.as_deref().unwrap_or(DEFAULT_MODEL),
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(MessageContent::Text(&query)),
        ],
        max_tokens: None,
    };

    let url = format!("{}/chat/completions", settings.perplexity_base_url);
    let request = upstreams.http().post(url).bearer_auth(api_key).json(&payload);
    upstreams.send(UPSTREAM, request).await
}

//! Image analysis via an OpenAI-compatible chat-completions endpoint.

use std::borrow::Cow;

use axum::response::Response;
use serde::Deserialize;
use tracing::instrument;

use super::chat::{ChatCompletionRequest, ChatMessage, ContentPart, ImageUrl, MessageContent};
use super::{Inbound, Upstreams, json_body, require_post, required};
use crate::error::GatewayError;

pub const UPSTREAM: &str = "vision";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_PROMPT: &str =
    "Identify the product in this image and describe its key attributes.";
const MAX_TOKENS: u32 = 1000;
const SYSTEM_PROMPT: &str = "You are a shopping assistant. Identify products in images and \
     describe their brand, category, color and notable features so they can be searched for.";

#[derive(Debug, Deserialize)]
struct VisionRequest {
    image: Option<String>,
    prompt: Option<String>,
    model: Option<String>,
}

/// Values already in data-URL form pass through; anything else is treated as
/// bare base64 JPEG.
pub fn image_data_url(image: &str) -> Cow<'_, str> {
    if image.starts_with("data:") {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(format!("data:image/jpeg;base64,{image}"))
    }
}

#[instrument(name = "upstream.vision", skip_all)]
pub async fn forward(upstreams: &Upstreams, inbound: &Inbound) -> Result<Response, GatewayError> {
    require_post(inbound)?;
    let body: VisionRequest = json_body(inbound)?;
    let image = required("image", body.image)?;

    let settings = upstreams.settings();
    let api_key = settings
        .vision_api_key
        .as_deref()
        .ok_or_else(|| GatewayError::not_configured("VISION_API_KEY"))?;

    let prompt = body.prompt.as_deref().unwrap_or(DEFAULT_PROMPT);
    let payload = ChatCompletionRequest {
        model: body.model.as_deref().unwrap_or(DEFAULT_MODEL),
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(MessageContent::Parts(vec![
                ContentPart::Text { text: prompt },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_data_url(&image).into_owned(),
                    },
                },
            ])),
        ],
        max_tokens: Some(MAX_TOKENS),
    };

    let url = format!("{}/chat/completions", settings.vision_base_url);
    let request = upstreams.http().post(url).bearer_auth(api_key).json(&payload);
    upstreams.send(UPSTREAM, request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamSettings;
    use crate::upstream::tests::inbound;
    use axum::http::Method;

    fn unconfigured() -> Upstreams {
        Upstreams::with_client(reqwest::Client::new(), UpstreamSettings::default())
    }

    #[test]
    fn data_urls_pass_through() {
        assert_eq!(
            image_data_url("data:image/png;base64,AAA"),
            "data:image/png;base64,AAA"
        );
    }

    #[test]
    fn bare_base64_is_wrapped_as_jpeg() {
        assert_eq!(image_data_url("AAA"), "data:image/jpeg;base64,AAA");
    }

    #[tokio::test]
    async fn non_post_is_rejected_before_parsing() {
        let err = forward(&unconfigured(), &inbound(Method::GET, "/api/vision", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MethodNotAllowed));
    }

    #[tokio::test]
    async fn missing_image_is_a_validation_error() {
        let err = forward(
            &unconfigured(),
            &inbound(Method::POST, "/api/vision", r#"{"prompt":"what is it"}"#),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(ref m) if m == "Missing required field: image"));
    }

    #[tokio::test]
    async fn missing_credential_is_an_internal_error() {
        let err = forward(
            &unconfigured(),
            &inbound(Method::POST, "/api/vision", r#"{"image":"AAA"}"#),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GatewayError::Internal(ref m) if m == "VISION_API_KEY is not configured"));
    }
}

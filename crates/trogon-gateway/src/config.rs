use std::path::PathBuf;
use std::time::Duration;

use trogon_std::env::ReadEnv;

use crate::cors::CorsPolicy;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_ALLOWED_ORIGINS: &str = "*";
const DEFAULT_SEARCH_BASE_URL: &str = "https://serpapi.com";
const DEFAULT_VISION_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BUCKET_PREFIX: &str = "rate_limits";
const DEFAULT_NATS_URL: &str = "localhost:4222";

/// Where window counters live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// JetStream KV, shared by every gateway instance.
    Nats,
    /// Process-local; only correct for a single instance.
    Memory,
}

impl StoreBackend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "nats" => Some(Self::Nats),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// NATS authentication.
///
/// Priority when resolved from the environment: credentials file
/// (`NATS_CREDS`), then `NATS_USER` + `NATS_PASSWORD`, then `NATS_TOKEN`.
#[derive(Debug, Clone)]
pub enum NatsAuth {
    Credentials(PathBuf),
    UserPassword { user: String, password: String },
    Token(String),
    None,
}

impl NatsAuth {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Credentials(_) => "credentials file",
            Self::UserPassword { .. } => "user/password",
            Self::Token(_) => "token",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NatsSettings {
    pub servers: Vec<String>,
    pub auth: NatsAuth,
}

impl NatsSettings {
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        let servers = env
            .var("NATS_URL")
            .unwrap_or_else(|_| DEFAULT_NATS_URL.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let auth = if let Some(path) = env.non_empty_var("NATS_CREDS") {
            NatsAuth::Credentials(PathBuf::from(path))
        } else if let (Some(user), Some(password)) =
            (env.non_empty_var("NATS_USER"), env.non_empty_var("NATS_PASSWORD"))
        {
            NatsAuth::UserPassword { user, password }
        } else if let Some(token) = env.non_empty_var("NATS_TOKEN") {
            NatsAuth::Token(token)
        } else {
            NatsAuth::None
        };

        Self { servers, auth }
    }
}

/// Provider endpoints and the credentials the gateway injects.
///
/// Credentials are optional so the gateway still starts (and `/health` still
/// answers) when one provider is not provisioned; requests to that provider
/// then fail with a 500.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub search_api_key: Option<String>,
    pub vision_api_key: Option<String>,
    pub perplexity_api_key: Option<String>,
    /// Base URL for `/webhook/...` forwards, without trailing `/`.
    pub n8n_webhook_url: Option<String>,
    pub search_base_url: String,
    pub vision_base_url: String,
    pub perplexity_base_url: String,
    pub timeout: Duration,
}

impl UpstreamSettings {
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        let base_url = |key: &str, default: &str| {
            trim_trailing_slash(env.non_empty_var(key).unwrap_or_else(|| default.to_string()))
        };

        Self {
            search_api_key: env.non_empty_var("SERPAPI_API_KEY"),
            vision_api_key: env.non_empty_var("VISION_API_KEY"),
            perplexity_api_key: env.non_empty_var("PERPLEXITY_API_KEY"),
            n8n_webhook_url: env.non_empty_var("N8N_WEBHOOK_URL").map(trim_trailing_slash),
            search_base_url: base_url("SEARCH_API_BASE_URL", DEFAULT_SEARCH_BASE_URL),
            vision_base_url: base_url("VISION_API_BASE_URL", DEFAULT_VISION_BASE_URL),
            perplexity_base_url: base_url("PERPLEXITY_API_BASE_URL", DEFAULT_PERPLEXITY_BASE_URL),
            timeout: Duration::from_secs(
                env.var("UPSTREAM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            ),
        }
    }
}

impl Default for UpstreamSettings {
    /// Public provider endpoints, no credentials.
    fn default() -> Self {
        Self {
            search_api_key: None,
            vision_api_key: None,
            perplexity_api_key: None,
            n8n_webhook_url: None,
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            vision_base_url: DEFAULT_VISION_BASE_URL.to_string(),
            perplexity_base_url: DEFAULT_PERPLEXITY_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

fn trim_trailing_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Configuration for the gateway.
///
/// Resolved from environment variables:
/// - `GATEWAY_PORT`: HTTP listening port (default: 8080)
/// - `ALLOWED_ORIGINS`: comma-separated CORS allow-list (default: `*`)
/// - `SERPAPI_API_KEY`, `VISION_API_KEY`, `PERPLEXITY_API_KEY`: provider credentials
/// - `N8N_WEBHOOK_URL`: base URL of the workflow webhooks
/// - `SEARCH_API_BASE_URL`, `VISION_API_BASE_URL`, `PERPLEXITY_API_BASE_URL`: provider endpoints
/// - `UPSTREAM_TIMEOUT_SECS`: per-call upstream timeout (default: 30)
/// - `RATE_LIMIT_STORE`: `nats` (default) or `memory`
/// - `RATE_LIMIT_BUCKET_PREFIX`: JetStream KV bucket prefix (default: `rate_limits`)
/// - `NATS_URL`, `NATS_CREDS`, `NATS_USER`, `NATS_PASSWORD`, `NATS_TOKEN`: NATS connection
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub cors: CorsPolicy,
    pub upstreams: UpstreamSettings,
    pub store: StoreBackend,
    pub bucket_prefix: String,
    pub nats: NatsSettings,
}

impl GatewayConfig {
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        Self {
            port: env
                .var("GATEWAY_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            cors: CorsPolicy::from_list(
                &env.var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string()),
            ),
            upstreams: UpstreamSettings::from_env(env),
            store: env
                .var("RATE_LIMIT_STORE")
                .ok()
                .and_then(|v| StoreBackend::parse(&v))
                .unwrap_or(StoreBackend::Nats),
            bucket_prefix: env
                .non_empty_var("RATE_LIMIT_BUCKET_PREFIX")
                .unwrap_or_else(|| DEFAULT_BUCKET_PREFIX.to_string()),
            nats: NatsSettings::from_env(env),
        }
    }
}

//! # trogon-gateway
//!
//! Edge API gateway that forwards client calls to a fixed set of third-party
//! APIs while keeping their credentials server-side and enforcing per-client,
//! per-route request quotas.
//!
//! ## How it works
//!
//! 1. `OPTIONS` requests are answered immediately with the CORS header set.
//! 2. The client is identified by `X-User-ID`, else `CF-Connecting-IP`, else
//!    `anonymous`.
//! 3. The path is classified into a route (`/health`, `/api/search`,
//!    `/api/vision`, `/api/perplexity`, `/api/n8n/*`).
//! 4. Quota-bearing routes are checked against a fixed-window counter in
//!    NATS JetStream KV (`search` 100/h, `vision` 50/h, `n8n` 200/h;
//!    `perplexity` draws from `search`). Exhausted quotas get a 429.
//! 5. Admitted requests are forwarded with the provider credential injected.
//!    Upstream status and body come back verbatim.
//! 6. Every response, errors included, carries CORS headers.
//!
//! ## Configuration (env vars)
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `GATEWAY_PORT` | `8080` | HTTP listening port |
//! | `ALLOWED_ORIGINS` | `*` | Comma-separated CORS allow-list |
//! | `SERPAPI_API_KEY` | | Shopping-search credential |
//! | `VISION_API_KEY` | | Vision LLM credential |
//! | `PERPLEXITY_API_KEY` | | Perplexity credential |
//! | `N8N_WEBHOOK_URL` | | Base URL for `/webhook/...` forwards |
//! | `SEARCH_API_BASE_URL` | `https://serpapi.com` | Shopping-search endpoint |
//! | `VISION_API_BASE_URL` | `https://api.openai.com/v1` | Vision endpoint |
//! | `PERPLEXITY_API_BASE_URL` | `https://api.perplexity.ai` | Perplexity endpoint |
//! | `UPSTREAM_TIMEOUT_SECS` | `30` | Per-call upstream timeout |
//! | `RATE_LIMIT_STORE` | `nats` | `nats` or `memory` (single instance only) |
//! | `RATE_LIMIT_BUCKET_PREFIX` | `rate_limits` | JetStream KV bucket prefix |
//! | `NATS_URL` | `localhost:4222` | NATS server URL(s) |
//! | `NATS_CREDS` / `NATS_USER` + `NATS_PASSWORD` / `NATS_TOKEN` | | NATS auth |

pub mod config;
pub mod cors;
pub mod error;
pub mod gateway;
pub mod health;
pub mod identity;
pub mod rate_limit;
pub mod route;
pub mod store;
pub mod upstream;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use gateway::{Gateway, router, serve};

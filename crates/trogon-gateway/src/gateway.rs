//! Request lifecycle: preflight, identity, classification, quota, dispatch,
//! CORS overlay.
//!
//! Every response leaving [`Gateway::handle`] is CORS-decorated, including
//! rejections, forwarder errors and panics caught at the top level.

use std::any::Any;
use std::error::Error as StdError;
use std::io;
use std::panic::AssertUnwindSafe;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, header};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tracing::{Span, field, info, instrument, warn};
use trogon_std::time::GetUnixTime;

use crate::cors::CorsPolicy;
use crate::error::GatewayError;
use crate::health;
use crate::identity::ClientIdentity;
use crate::rate_limit::{
    Decision, PolicyTag, RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER, RateLimiter,
};
use crate::route::RouteDecision;
use crate::store::CounterStore;
use crate::upstream::{self, Inbound, Upstreams};

/// Inbound bodies larger than this are rejected before forwarding.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Everything one request needs, passed in explicitly so tests can swap the
/// store, the clock and the upstream endpoints.
#[derive(Clone)]
pub struct Gateway<S, C> {
    limiter: RateLimiter<S, C>,
    upstreams: Upstreams,
    cors: CorsPolicy,
    clock: C,
}

impl<S, C> Gateway<S, C>
where
    S: CounterStore,
    C: GetUnixTime + Clone + Send + Sync + 'static,
{
    pub fn new(store: S, clock: C, upstreams: Upstreams, cors: CorsPolicy) -> Self {
        Self {
            limiter: RateLimiter::new(store, clock.clone()),
            upstreams,
            cors,
            clock,
        }
    }

    pub fn limiter(&self) -> &RateLimiter<S, C> {
        &self.limiter
    }

    #[instrument(
        name = "gateway.request",
        skip_all,
        fields(
            method = %req.method(),
            path = %req.uri().path(),
            route = field::Empty,
            status = field::Empty,
        )
    )]
    pub async fn handle(&self, req: Request) -> Response {
        let origin = req
            .headers()
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        if req.method() == Method::OPTIONS {
            Span::current().record("status", 204);
            return self.cors.preflight(origin.as_deref());
        }

        let mut response = match AssertUnwindSafe(self.process(req)).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => error.into_response(),
            Err(panic) => GatewayError::Internal(panic_message(panic.as_ref())).into_response(),
        };

        self.cors.apply(response.headers_mut(), origin.as_deref());
        Span::current().record("status", response.status().as_u16());
        response
    }

    async fn process(&self, req: Request) -> Result<Response, GatewayError> {
        let client = ClientIdentity::from_headers(req.headers());
        let route = RouteDecision::classify(req.method().as_str(), req.uri().path());
        Span::current().record("route", route.name());

        let decision = match route.policy_tag() {
            Some(tag) => Some(self.admit(tag, &client).await?),
            None => None,
        };

        // Forwarder errors still carry the quota headers of the admitted request.
        let mut response = self
            .dispatch(route, req)
            .await
            .unwrap_or_else(IntoResponse::into_response);
        if let Some(decision) = decision {
            quota_headers(response.headers_mut(), &decision);
        }
        Ok(response)
    }

    async fn admit(&self, tag: PolicyTag, client: &ClientIdentity) -> Result<Decision, GatewayError> {
        let decision = self
            .limiter
            .check(&tag.limiter_key(client), tag.policy())
            .await
            .map_err(|e| GatewayError::StoreUnavailable(e.0))?;

        if decision.admitted {
            Ok(decision)
        } else {
            Err(GatewayError::RateLimited {
                limit: decision.limit,
                retry_after: decision.reset_after,
            })
        }
    }

    async fn dispatch(&self, route: RouteDecision, req: Request) -> Result<Response, GatewayError> {
        match route {
            RouteDecision::Health => Ok(health::respond(&self.clock).into_response()),
            RouteDecision::NotFound => Err(GatewayError::NotFound),
            RouteDecision::Search => {
                upstream::search::forward(&self.upstreams, &read_inbound(req).await?).await
            }
            RouteDecision::Vision => {
                upstream::vision::forward(&self.upstreams, &read_inbound(req).await?).await
            }
            RouteDecision::Perplexity => {
                upstream::perplexity::forward(&self.upstreams, &read_inbound(req).await?).await
            }
            RouteDecision::N8nProxy(sub_path) => {
                upstream::n8n::forward(&self.upstreams, &read_inbound(req).await?, &sub_path).await
            }
        }
    }
}

/// Buffer the body, rejecting anything over [`MAX_BODY_BYTES`] with a 413.
/// A declared `Content-Length` is checked before reading; chunked bodies are
/// cut off by the length limit while streaming.
async fn read_inbound(req: Request) -> Result<Inbound, GatewayError> {
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > MAX_BODY_BYTES as u64) {
        return Err(GatewayError::PayloadTooLarge {
            limit: MAX_BODY_BYTES,
        });
    }

    let (parts, body) = req.into_parts();
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| {
            if exceeds_length_limit(&e) {
                GatewayError::PayloadTooLarge {
                    limit: MAX_BODY_BYTES,
                }
            } else {
                GatewayError::Validation(format!("Failed to read request body: {e}"))
            }
        })?;

    Ok(Inbound {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
    })
}

fn exceeds_length_limit(error: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

fn quota_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(
        RATE_LIMIT_REMAINING_HEADER,
        HeaderValue::from(decision.remaining),
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_default()
}

async fn handle_request<S, C>(State(gateway): State<Gateway<S, C>>, req: Request) -> Response
where
    S: CounterStore,
    C: GetUnixTime + Clone + Send + Sync + 'static,
{
    gateway.handle(req).await
}

/// Every path and method lands in [`Gateway::handle`]; routing is done by
/// [`RouteDecision::classify`], not by axum.
pub fn router<S, C>(gateway: Gateway<S, C>) -> Router
where
    S: CounterStore,
    C: GetUnixTime + Clone + Send + Sync + 'static,
{
    Router::new()
        .fallback(handle_request::<S, C>)
        .with_state(gateway)
}

/// Serve until Ctrl+C or SIGTERM, then drain in-flight requests.
pub async fn serve<S, C>(listener: TcpListener, gateway: Gateway<S, C>) -> io::Result<()>
where
    S: CounterStore,
    C: GetUnixTime + Clone + Send + Sync + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Gateway listening");
    }
    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                warn!(%error, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
    info!("Shutdown requested, draining in-flight requests");
}

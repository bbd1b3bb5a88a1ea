use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::ratelimit::{ClientKeyExtractor, FixedWindowLimiter};

#[derive(Copy, Clone)]
pub struct RequestStart(pub Instant);

pub async fn record_request_start(mut request: Request<Body>, next: Next) -> Response {
    request
        .extensions_mut()
        .insert(RequestStart(Instant::now()));
    next.run(request).await
}

/// Budget applied to one public endpoint.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

/// Count the request against the client's window before it reaches the
/// handler. Denied requests get a 429 with retry timing and never touch
/// storage.
pub async fn enforce_rate_limit(
    limiter: Arc<FixedWindowLimiter>,
    extractor: Arc<ClientKeyExtractor>,
    policy: RateLimitPolicy,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = extractor.key(&headers, addr.ip());
    let decision = limiter.check(&key, policy.max_requests, policy.window);

    if decision.allowed {
        return next.run(request).await;
    }

    let retry_after = seconds_until(decision.reset_at);
    let mut response_headers = HeaderMap::new();
    response_headers.insert("retry-after", retry_after.to_string().parse().unwrap());
    response_headers.insert(
        "x-ratelimit-limit",
        policy.max_requests.to_string().parse().unwrap(),
    );
    response_headers.insert(
        "x-ratelimit-remaining",
        decision.remaining.to_string().parse().unwrap(),
    );

    (
        StatusCode::TOO_MANY_REQUESTS,
        response_headers,
        "Too many requests",
    )
        .into_response()
}

/// Whole seconds until the window resets, rounded up so clients never
/// retry early.
fn seconds_until(reset_at: Instant) -> u64 {
    let remaining = reset_at.saturating_duration_since(Instant::now());
    let mut seconds = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        seconds += 1;
    }
    seconds
}

use axum::{http::StatusCode, middleware, routing::get, Router};
use std::sync::Arc;

use crate::ratelimit::{ClientKeyExtractor, FixedWindowLimiter};
use crate::storage::Storage;

use super::handlers::{health_check, scan_asset, ScanState};
use super::middleware::{enforce_rate_limit, record_request_start, RateLimitPolicy};

pub fn create_scan_router(
    storage: Arc<dyn Storage>,
    limiter: Arc<FixedWindowLimiter>,
    extractor: Arc<ClientKeyExtractor>,
    policy: RateLimitPolicy,
    redirect_status: StatusCode,
) -> Router {
    let state = Arc::new(ScanState {
        storage,
        redirect_status,
    });

    // Only the public lookup is rate limited; health stays open for probes.
    let limited = Router::new()
        .route("/{key}", get(scan_asset))
        .route_layer(middleware::from_fn(
            move |connect_info, headers, request, next| {
                let limiter = Arc::clone(&limiter);
                let extractor = Arc::clone(&extractor);
                enforce_rate_limit(limiter, extractor, policy, connect_info, headers, request, next)
            },
        ))
        .with_state(state);

    Router::new()
        .route("/", get(health_check))
        .merge(limited)
        .layer(middleware::from_fn(record_request_start))
}

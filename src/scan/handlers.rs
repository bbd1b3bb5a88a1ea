use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use super::middleware::RequestStart;
use crate::models::QrAsset;
use crate::storage::{Storage, StorageError};

pub struct ScanState {
    pub storage: Arc<dyn Storage>,
    /// Status used when the payload is a redirectable URL. Configurable
    /// because permanent redirects get cached by browsers and CDNs.
    pub redirect_status: StatusCode,
}

/// Resolve a scan, count it, and answer with either a redirect to the
/// asset's payload URL or the payload itself for non-URL content.
pub async fn scan_asset(
    State(state): State<Arc<ScanState>>,
    Path(key): Path<String>,
    Extension(RequestStart(request_start)): Extension<RequestStart>,
) -> Response {
    let handler_start = Instant::now();

    let lookup = resolve_key(&state, &key).await;

    match lookup {
        Ok(Some((asset, cache_hit))) => {
            let now = chrono::Utc::now().timestamp();

            // The scanned flag flips synchronously so the owner sees it on
            // the next read; counts go through the write buffer.
            if !asset.scanned {
                if let Err(err) = state.storage.mark_scanned(asset.id, &asset.code, now).await {
                    tracing::warn!(code = %asset.code, error = %err, "failed to mark asset scanned");
                }
            }
            if let Err(err) = state.storage.record_scans(asset.id, 1, now).await {
                tracing::warn!(code = %asset.code, error = %err, "failed to buffer scan count");
            }

            let handler_time = handler_start.elapsed();
            let total_time = request_start.elapsed();

            let mut response_headers = HeaderMap::new();
            response_headers.insert(
                "x-magpie-cache-hit",
                if cache_hit { "true" } else { "false" }.parse().unwrap(),
            );
            response_headers.insert(
                "x-magpie-timing-total-ms",
                total_time.as_millis().to_string().parse().unwrap(),
            );
            response_headers.insert(
                "x-magpie-timing-handler-ms",
                handler_time.as_millis().to_string().parse().unwrap(),
            );

            if is_http_url(&asset.payload) {
                if let Ok(location) = HeaderValue::from_str(&asset.payload) {
                    response_headers.insert(header::LOCATION, location);
                    return (state.redirect_status, response_headers, ()).into_response();
                }
            }

            // Non-URL payloads (contact cards, wifi strings, plain text)
            // are served inline.
            (StatusCode::OK, response_headers, asset.payload).into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, "QR asset not found").into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response(),
    }
}

/// Numeric keys are tried as internal ids first, then as public codes.
/// Generated codes always start with a letter, so the namespaces stay
/// disjoint; the fallback only matters for hand-assigned codes.
async fn resolve_key(
    state: &ScanState,
    key: &str,
) -> Result<Option<(QrAsset, bool)>, StorageError> {
    if let Ok(id) = key.parse::<i64>() {
        if let Some(asset) = state.storage.get_by_id(id).await? {
            return Ok(Some((asset, false)));
        }
    }

    let result = state.storage.get_with_metadata(key).await?;
    Ok(result.asset.map(|asset| (asset, result.metadata.cache_hit)))
}

fn is_http_url(payload: &str) -> bool {
    payload.starts_with("http://") || payload.starts_with("https://")
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}

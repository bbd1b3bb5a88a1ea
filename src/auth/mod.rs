use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

pub struct AuthService {
    enabled: bool,
    api_keys: Arc<Vec<String>>,
}

impl AuthService {
    pub fn new(enabled: bool, api_keys: Vec<String>) -> Self {
        Self {
            enabled,
            api_keys: Arc::new(api_keys),
        }
    }

    pub fn validate_key(&self, key: &str) -> bool {
        // If authentication is disabled, allow all requests
        if !self.enabled {
            return true;
        }

        // If no API keys configured but auth is enabled, allow all (dev mode)
        if self.api_keys.is_empty() {
            return true;
        }

        self.api_keys.iter().any(|k| k == key)
    }
}

/// Pull the caller's key from either `X-API-Key` or a bearer token.
fn presented_key(headers: &HeaderMap) -> &str {
    if let Some(key) = headers.get("X-API-Key").and_then(|h| h.to_str().ok()) {
        return key;
    }
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or("")
}

pub async fn auth_middleware(
    auth_service: Arc<AuthService>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if auth_service.validate_key(presented_key(&headers)) {
        next.run(request).await
    } else {
        (StatusCode::UNAUTHORIZED, "Invalid or missing API key").into_response()
    }
}

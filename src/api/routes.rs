use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::assets::{AssetLifecycleCoordinator, AssetLocator};
use crate::auth::{auth_middleware, AuthService};
use crate::external::ImageStore;
use crate::storage::Storage;

use super::handlers::{
    create_asset, delete_asset, download_asset, get_asset, get_asset_image, health_check,
    list_assets, update_asset, upload_design_file, AppState,
};

pub fn create_api_router(
    storage: Arc<dyn Storage>,
    store: Option<Arc<dyn ImageStore>>,
    auth_service: Arc<AuthService>,
) -> Router {
    let state = Arc::new(AppState {
        locator: AssetLocator::new(store.clone()),
        lifecycle: AssetLifecycleCoordinator::new(Arc::clone(&storage), store.clone()),
        storage,
        store,
    });

    let protected_routes = Router::new()
        .route("/assets", post(create_asset))
        .route("/assets", get(list_assets))
        .route("/assets/{code}", get(get_asset))
        .route("/assets/{code}", patch(update_asset))
        .route("/assets/{code}", delete(delete_asset))
        .route("/assets/{code}/image", get(get_asset_image))
        .route("/assets/{code}/download", get(download_asset))
        .route("/assets/{code}/uploads", post(upload_design_file))
        .route_layer(middleware::from_fn(move |headers, req, next| {
            let auth = Arc::clone(&auth_service);
            auth_middleware(auth, headers, req, next)
        }))
        .with_state(Arc::clone(&state));

    // Health stays outside the key check so probes never need credentials.
    // The dashboard runs on a different origin, so the whole API is CORS-open;
    // the key check still applies.
    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
}

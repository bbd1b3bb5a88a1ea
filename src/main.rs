use anyhow::Result;
use axum::http::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use magpie::api::create_api_router;
use magpie::auth::AuthService;
use magpie::config::{Config, DatabaseBackend};
use magpie::external::{HttpImageStore, ImageStore};
use magpie::ratelimit::{ClientKeyExtractor, FixedWindowLimiter};
use magpie::scan::middleware::RateLimitPolicy;
use magpie::scan::routes::create_scan_router;
use magpie::storage::{CachedStorage, PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let backend: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections)
                    .await?,
            )
        }
    };

    // Initialize database
    info!("Initializing database...");
    backend.init().await?;
    info!("Database initialized successfully");

    let storage: Arc<dyn Storage> = if config.cache.enabled {
        info!(
            "Read cache enabled ({} entries, {}s scan flush interval)",
            config.cache.max_entries, config.cache.flush_interval_secs
        );
        Arc::new(CachedStorage::new(
            backend,
            config.cache.max_entries,
            config.cache.flush_interval_secs,
        ))
    } else {
        backend
    };

    // The image store is optional; without it assets carry embedded copies only.
    let store: Option<Arc<dyn ImageStore>> = match config.store.as_ref() {
        Some(cfg) => {
            info!("🖼️  Image store configured at {}", cfg.api_base);
            Some(Arc::new(HttpImageStore::new(
                &cfg.api_base,
                &cfg.media_base,
                &cfg.api_key,
            )))
        }
        None => {
            info!("🖼️  No image store configured - images will be embedded only");
            None
        }
    };

    // Initialize auth service
    let auth_service = Arc::new(AuthService::new(
        config.auth.enabled,
        config.auth.api_keys.clone(),
    ));
    if config.auth.enabled && !config.auth.api_keys.is_empty() {
        info!(
            "🔐 API key authentication enabled ({} keys)",
            config.auth.api_keys.len()
        );
    } else {
        info!("🔓 Authentication is disabled - all API requests are allowed");
    }

    // Rate limiting on the public scan side
    let limiter = Arc::new(FixedWindowLimiter::new(Duration::from_secs(
        config.rate_limit.sweep_interval_secs,
    )));
    let extractor = Arc::new(ClientKeyExtractor::new(
        config.scan.trusted_proxy_mode,
        &config.scan.trusted_proxies,
        config.scan.num_trusted_proxies,
    ));
    let policy = RateLimitPolicy {
        max_requests: config.rate_limit.max_requests,
        window: Duration::from_secs(config.rate_limit.window_secs),
    };

    let redirect_status = StatusCode::from_u16(config.scan.redirect_status)?;

    // Create routers
    let api_router = create_api_router(Arc::clone(&storage), store.clone(), auth_service);
    let scan_router = create_scan_router(
        Arc::clone(&storage),
        limiter,
        extractor,
        policy,
        redirect_status,
    );

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);

    // Start scan server
    let scan_addr = format!("{}:{}", config.scan_server.host, config.scan_server.port);
    let scan_listener = tokio::net::TcpListener::bind(&scan_addr).await?;
    info!("🚀 Scan server listening on http://{}", scan_addr);

    // Run both servers concurrently. The scan router resolves rate-limit
    // keys from the peer address, so it needs connect info.
    tokio::try_join!(
        axum::serve(api_listener, api_router),
        axum::serve(
            scan_listener,
            scan_router.into_make_service_with_connect_info::<SocketAddr>()
        ),
    )?;

    Ok(())
}

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub scan_server: ServerConfig,
    pub cache: CacheConfig,
    pub store: Option<StoreConfig>,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,
    pub flush_interval_secs: u64,
}

/// Credentials for the external image host. When absent, generated images
/// exist only as embedded copies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub api_base: String,
    pub media_base: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub enabled: bool,
    pub api_keys: Vec<String>,
}

/// How far to trust proxy-supplied client address headers on the scan side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    None,
    Standard,
    Cloudflare,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub redirect_status: u16,
    pub trusted_proxy_mode: TrustedProxyMode,
    pub trusted_proxies: Vec<String>,
    pub num_trusted_proxies: Option<usize>,
}

fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./magpie.db".to_string());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()?;

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let scan_host = std::env::var("SCAN_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let scan_port = std::env::var("SCAN_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()?;

        let cache_enabled = env_flag("CACHE_ENABLED", true);
        let cache_max_entries = std::env::var("CACHE_MAX_ENTRIES")
            .unwrap_or_else(|_| "10000".to_string())
            .parse::<u64>()?;
        let cache_flush_secs = std::env::var("CACHE_FLUSH_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()?;

        let store = match std::env::var("IMAGE_STORE_API_URL") {
            Ok(api_base) => {
                let media_base = std::env::var("IMAGE_STORE_MEDIA_URL")
                    .context("IMAGE_STORE_MEDIA_URL must be set when IMAGE_STORE_API_URL is set")?;
                let api_key = std::env::var("IMAGE_STORE_API_KEY")
                    .context("IMAGE_STORE_API_KEY must be set when IMAGE_STORE_API_URL is set")?;
                Some(StoreConfig {
                    api_base,
                    media_base,
                    api_key,
                })
            }
            Err(_) => None,
        };

        let max_requests = std::env::var("RATE_LIMIT_MAX_REQUESTS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u32>()?;
        let window_secs = std::env::var("RATE_LIMIT_WINDOW_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()?;
        let sweep_interval_secs = std::env::var("RATE_LIMIT_SWEEP_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse::<u64>()?;

        let auth_enabled = !env_flag("DISABLE_AUTH", false);
        let api_keys = env_list("API_KEYS");

        let redirect_status = std::env::var("SCAN_REDIRECT_STATUS")
            .unwrap_or_else(|_| "302".to_string())
            .parse::<u16>()?;

        let redirect_status = match redirect_status {
            301 | 302 | 303 | 307 | 308 => redirect_status,
            other => {
                tracing::warn!(
                    "Unsupported SCAN_REDIRECT_STATUS '{other}', falling back to 302. Supported values: 301, 302, 303, 307, 308"
                );
                302
            }
        };

        let proxy_mode_str = std::env::var("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase();

        let trusted_proxy_mode = match proxy_mode_str.as_str() {
            "none" => TrustedProxyMode::None,
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, standard, cloudflare"
                );
                TrustedProxyMode::None
            }
        };

        let trusted_proxies = env_list("TRUSTED_PROXIES");
        let num_trusted_proxies = std::env::var("NUM_TRUSTED_PROXIES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok());

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            scan_server: ServerConfig {
                host: scan_host,
                port: scan_port,
            },
            cache: CacheConfig {
                enabled: cache_enabled,
                max_entries: cache_max_entries,
                flush_interval_secs: cache_flush_secs,
            },
            store,
            rate_limit: RateLimitConfig {
                max_requests,
                window_secs,
                sweep_interval_secs,
            },
            auth: AuthConfig {
                enabled: auth_enabled,
                api_keys,
            },
            scan: ScanConfig {
                redirect_status,
                trusted_proxy_mode,
                trusted_proxies,
                num_trusted_proxies,
            },
        })
    }
}

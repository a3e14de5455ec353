//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (ICOPROXY_*)
//! 2. TOML config file (if ICOPROXY_CONFIG_FILE set)
//! 3. Built-in defaults

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Order in which icon sources are tried before the synthesized default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrder {
    /// Probe the site itself, then DuckDuckGo, then Google.
    #[default]
    DiscoveryFirst,
    /// DuckDuckGo, then Google, then probe the site itself.
    ServicesFirst,
}

/// Backing store used for both the metadata store and the edge response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// SQLite database at `db_path`.
    Sqlite,
    /// Process-local maps; nothing survives a restart.
    Memory,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (ICOPROXY_*)
/// 2. TOML config file (if ICOPROXY_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Socket address the HTTP server binds to.
    ///
    /// Set via ICOPROXY_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Credential expected in the `x-api-key` header of maintenance requests.
    ///
    /// Set via ICOPROXY_API_KEY environment variable. When unset the
    /// maintenance endpoint accepts every caller.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Which backing store holds favicon metadata and cached responses.
    ///
    /// Set via ICOPROXY_STORE_BACKEND environment variable.
    #[serde(default = "default_store_backend")]
    pub store_backend: StoreBackend,

    /// Path to the SQLite database (sqlite backend only).
    ///
    /// Set via ICOPROXY_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for outbound requests.
    ///
    /// Set via ICOPROXY_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Source ordering policy.
    ///
    /// Set via ICOPROXY_SOURCE_ORDER environment variable.
    #[serde(default = "default_source_order")]
    pub source_order: SourceOrder,

    /// Retention of a resolved icon URL in the metadata store, in seconds.
    #[serde(default = "default_meta_ttl_secs")]
    pub meta_ttl_secs: u64,

    /// Retention of a normalized response in the edge cache, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// `Cache-Control` directive applied to every icon response.
    #[serde(default = "default_cache_control")]
    pub cache_control: String,

    /// Timeout of the `/favicon.ico` probe in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Timeout of the root HTML page fetch in milliseconds.
    #[serde(default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,

    /// Timeout when validating a discovered or remembered icon URL, in milliseconds.
    #[serde(default = "default_image_timeout_ms")]
    pub image_timeout_ms: u64,

    /// Timeout of each third-party icon service call in milliseconds.
    #[serde(default = "default_service_timeout_ms")]
    pub service_timeout_ms: u64,

    /// Largest icon accepted from any source, in bytes.
    #[serde(default = "default_max_icon_bytes")]
    pub max_icon_bytes: usize,

    /// Maximum number of redirects followed per outbound request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Require `/ico` callers to come from the same host as the proxy.
    ///
    /// Set via ICOPROXY_REQUIRE_SAME_ORIGIN environment variable.
    #[serde(default)]
    pub require_same_origin: bool,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".into()
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Sqlite
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./icoproxy-cache.sqlite")
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; icoproxy/0.1)".into()
}

fn default_source_order() -> SourceOrder {
    SourceOrder::DiscoveryFirst
}

fn default_meta_ttl_secs() -> u64 {
    86_400 // 1 day
}

fn default_cache_ttl_secs() -> u64 {
    604_800 // 7 days, matches s-maxage
}

fn default_cache_control() -> String {
    "public, max-age=86400, s-maxage=604800, stale-while-revalidate=86400".into()
}

fn default_probe_timeout_ms() -> u64 {
    8_000
}

fn default_page_timeout_ms() -> u64 {
    9_000
}

fn default_image_timeout_ms() -> u64 {
    9_000
}

fn default_service_timeout_ms() -> u64 {
    8_000
}

fn default_max_icon_bytes() -> usize {
    500_000
}

fn default_max_redirects() -> usize {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            api_key: None,
            store_backend: default_store_backend(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            source_order: default_source_order(),
            meta_ttl_secs: default_meta_ttl_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_control: default_cache_control(),
            probe_timeout_ms: default_probe_timeout_ms(),
            page_timeout_ms: default_page_timeout_ms(),
            image_timeout_ms: default_image_timeout_ms(),
            service_timeout_ms: default_service_timeout_ms(),
            max_icon_bytes: default_max_icon_bytes(),
            max_redirects: default_max_redirects(),
            require_same_origin: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `ICOPROXY_`
    /// 2. TOML file from `ICOPROXY_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("ICOPROXY_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("ICOPROXY_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parsed bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr.parse().map_err(|e| ConfigError::Invalid {
            field: "listen_addr".into(),
            reason: format!("not a socket address: {e}"),
        })
    }

    /// Whether maintenance requests are accepted without a credential.
    pub fn maintenance_is_open(&self) -> bool {
        self.api_key.as_deref().is_none_or(str::is_empty)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.service_timeout_ms)
    }

    pub fn meta_ttl(&self) -> Duration {
        Duration::from_secs(self.meta_ttl_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

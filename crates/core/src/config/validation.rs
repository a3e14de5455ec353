//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Bounds shared by every outbound timeout.
const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 60_000;

const MAX_ICON_BYTES: usize = 5 * 1024 * 1024;
const MIN_TTL_SECS: u64 = 60;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - any timeout is below 100ms or above 60s
    /// - `max_icon_bytes` is 0 or exceeds 5MB
    /// - a TTL is shorter than one minute
    /// - `user_agent` is empty
    /// - `cache_control` is empty, not `public`, or not a valid header value
    /// - `listen_addr` is not a socket address
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("page_timeout_ms", self.page_timeout_ms),
            ("image_timeout_ms", self.image_timeout_ms),
            ("service_timeout_ms", self.service_timeout_ms),
        ];
        for (field, value) in timeouts {
            if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&value) {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: format!("must be between {MIN_TIMEOUT_MS}ms and {MAX_TIMEOUT_MS}ms"),
                });
            }
        }

        if self.max_icon_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_icon_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_icon_bytes > MAX_ICON_BYTES {
            return Err(ConfigError::Invalid { field: "max_icon_bytes".into(), reason: "must not exceed 5MB".into() });
        }

        for (field, value) in [("meta_ttl_secs", self.meta_ttl_secs), ("cache_ttl_secs", self.cache_ttl_secs)] {
            if value < MIN_TTL_SECS {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must be at least 60 seconds".into() });
            }
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !self.cache_control.split(',').any(|d| d.trim().eq_ignore_ascii_case("public")) {
            return Err(ConfigError::Invalid { field: "cache_control".into(), reason: "must include `public`".into() });
        }
        if !self.cache_control.bytes().all(|b| b == b'\t' || (0x20..0x7f).contains(&b)) {
            return Err(ConfigError::Invalid {
                field: "cache_control".into(),
                reason: "must be printable ASCII".into(),
            });
        }

        self.socket_addr()?;

        if self.maintenance_is_open() {
            tracing::warn!("api_key is not set; the refresh endpoint accepts unauthenticated requests");
        }

        Ok(())
    }
}

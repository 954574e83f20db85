//! Gateway configuration

use bucketgate_core::ratelimit::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_KEY_PREFIX};
use bucketgate_core::session::MAX_SESSION_TTL;
use bucketgate_core::{BucketRegistry, CoreError, RateLimitRule, RateLimitSettings};
use bucketgate_store::S3Config;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration problems detected before the server starts
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required setting is absent
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// A setting has an unusable value
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Bucket registry or rate limit validation failed
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// S3 endpoint URL (empty for AWS)
    pub s3_endpoint: String,
    /// S3 region
    pub s3_region: String,
    /// S3 access key ID
    #[serde(skip_serializing)]
    pub s3_access_key_id: String,
    /// S3 secret access key
    #[serde(skip_serializing)]
    pub s3_secret_access_key: String,
    /// Use path-style S3 addressing
    pub s3_path_style: bool,
    /// Whitelisted real bucket identifiers
    pub bucket_names: Vec<String>,
    /// Display aliases, parallel to `bucket_names` (empty disables aliasing)
    pub bucket_aliases: Vec<String>,
    /// Shared management password
    #[serde(skip_serializing)]
    pub auth_password: String,
    /// Session lifetime (seconds)
    pub session_ttl_secs: u64,
    /// Mark the session cookie `Secure`
    pub secure_cookies: bool,
    /// Login limiter window (seconds)
    pub auth_rate_limit_window_secs: u64,
    /// Login attempts per window
    pub auth_rate_limit_max: u32,
    /// API limiter window (seconds)
    pub api_rate_limit_window_secs: u64,
    /// API requests per window
    pub api_rate_limit_max: u32,
    /// Shared counter store (Redis) URL
    pub redis_url: Option<String>,
    /// Key namespace in the shared counter store
    pub rate_limit_prefix: String,
    /// Take the client address from `X-Forwarded-For`
    pub trust_proxy: bool,
    /// Bound on each storage call (seconds)
    pub storage_timeout_secs: u64,
    /// Production mode hides internal error detail
    pub production: bool,
    /// Use in-memory storage (for development, data will not persist)
    pub use_memory_store: bool,
    /// Maximum request body size for uploads (bytes)
    pub max_upload_size: usize,
    /// CORS allowed origins (`*` for any)
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            s3_endpoint: String::new(),
            s3_region: "us-east-1".to_string(),
            s3_access_key_id: String::new(),
            s3_secret_access_key: String::new(),
            s3_path_style: false,
            bucket_names: Vec::new(),
            bucket_aliases: Vec::new(),
            auth_password: String::new(),
            session_ttl_secs: 24 * 60 * 60, // 24 hours
            secure_cookies: false,
            auth_rate_limit_window_secs: 5 * 60,
            auth_rate_limit_max: 10,
            api_rate_limit_window_secs: 60,
            api_rate_limit_max: 100,
            redis_url: None,
            rate_limit_prefix: DEFAULT_KEY_PREFIX.to_string(),
            trust_proxy: false,
            storage_timeout_secs: 30,
            production: false,
            use_memory_store: false,
            max_upload_size: 5 * 1024 * 1024 * 1024, // 5 GB
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl GatewayConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check required settings and value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_names.is_empty() {
            return Err(ConfigError::Missing("BUCKET_NAMES"));
        }
        if self.auth_password.is_empty() {
            return Err(ConfigError::Missing("AUTH_PASSWORD"));
        }
        if !self.use_memory_store {
            if self.s3_access_key_id.is_empty() {
                return Err(ConfigError::Missing("S3_ACCESS_KEY_ID"));
            }
            if self.s3_secret_access_key.is_empty() {
                return Err(ConfigError::Missing("S3_SECRET_ACCESS_KEY"));
            }
        }
        if self.session_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "SESSION_TTL_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.session_ttl_secs > MAX_SESSION_TTL.as_secs() {
            return Err(ConfigError::Invalid {
                field: "SESSION_TTL_SECS",
                reason: format!("must be at most {}", MAX_SESSION_TTL.as_secs()),
            });
        }
        if self.storage_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "STORAGE_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        self.registry()?;
        self.rate_limit_settings()?;
        Ok(())
    }

    /// Build the bucket registry
    pub fn registry(&self) -> Result<BucketRegistry, CoreError> {
        BucketRegistry::new(self.bucket_names.clone(), self.bucket_aliases.clone())
    }

    /// Build the limiter settings
    pub fn rate_limit_settings(&self) -> Result<RateLimitSettings, CoreError> {
        Ok(RateLimitSettings {
            auth: RateLimitRule::new(
                Duration::from_secs(self.auth_rate_limit_window_secs),
                self.auth_rate_limit_max,
            )?,
            general_api: RateLimitRule::new(
                Duration::from_secs(self.api_rate_limit_window_secs),
                self.api_rate_limit_max,
            )?,
            redis_url: self.redis_url.clone().filter(|url| !url.trim().is_empty()),
            key_prefix: self.rate_limit_prefix.clone(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    /// S3 connection settings
    pub fn s3_config(&self) -> S3Config {
        S3Config {
            endpoint: self.s3_endpoint.clone(),
            region: self.s3_region.clone(),
            access_key_id: self.s3_access_key_id.clone(),
            secret_access_key: self.s3_secret_access_key.clone(),
            path_style: self.s3_path_style,
            request_timeout: self.storage_timeout(),
        }
    }

    /// Bound on each storage call
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }

    /// Session lifetime
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// Split a comma-separated name list.
///
/// A blank string yields an empty list. Entries are trimmed but blank entries
/// are kept so the registry can reject them.
pub fn parse_name_list(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|name| name.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GatewayConfig {
        GatewayConfig {
            bucket_names: parse_name_list("raw-id-1,raw-id-2"),
            bucket_aliases: parse_name_list("docs, media"),
            auth_password: "hunter2".to_string(),
            use_memory_store: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_name_list() {
        assert_eq!(parse_name_list(" a , b,c "), vec!["a", "b", "c"]);
        assert!(parse_name_list("").is_empty());
        assert!(parse_name_list("   ").is_empty());
        assert_eq!(parse_name_list("a,,b"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_valid_config() {
        let config = valid();
        config.validate().unwrap();
        let registry = config.registry().unwrap();
        assert_eq!(registry.resolve("docs"), Some("raw-id-1"));
    }

    #[test]
    fn test_missing_required_settings() {
        let config = GatewayConfig {
            bucket_names: vec![],
            ..valid()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Missing("BUCKET_NAMES"))));

        let config = GatewayConfig {
            auth_password: String::new(),
            ..valid()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Missing("AUTH_PASSWORD"))));

        let config = GatewayConfig {
            use_memory_store: false,
            ..valid()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Missing("S3_ACCESS_KEY_ID"))));
    }

    #[test]
    fn test_alias_mismatch_fails_validation() {
        let config = GatewayConfig {
            bucket_aliases: parse_name_list("only-one"),
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Core(CoreError::AliasCountMismatch { aliases: 1, buckets: 2 }))
        ));
    }

    #[test]
    fn test_zero_quota_fails_validation() {
        let config = GatewayConfig {
            api_rate_limit_max: 0,
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Core(CoreError::InvalidRateLimit(_)))
        ));
    }

    #[test]
    fn test_session_ttl_bounds() {
        for ttl in [0, MAX_SESSION_TTL.as_secs() + 1, 10_000_000_000_000] {
            let config = GatewayConfig {
                session_ttl_secs: ttl,
                ..valid()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::Invalid { field: "SESSION_TTL_SECS", .. })
            ));
        }

        let config = GatewayConfig {
            session_ttl_secs: MAX_SESSION_TTL.as_secs(),
            ..valid()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oversized_rate_limit_window_fails_validation() {
        let config = GatewayConfig {
            api_rate_limit_window_secs: 1 << 61,
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Core(CoreError::InvalidRateLimit(_)))
        ));
    }

    #[test]
    fn test_blank_redis_url_is_unconfigured() {
        let config = GatewayConfig {
            redis_url: Some("  ".to_string()),
            ..valid()
        };
        assert!(config.rate_limit_settings().unwrap().redis_url.is_none());
    }

    #[test]
    fn test_secrets_not_serialized() {
        let json = serde_json::to_string(&valid()).unwrap();
        assert!(!json.contains("hunter2"));
    }
}

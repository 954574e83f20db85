//! Application state

use crate::config::GatewayConfig;
use crate::routes::RATE_LIMIT_EXEMPT_ROUTES;
use bucketgate_core::{exempt_routes, RateLimiterSet, SessionStore, StorageGateway};
use bucketgate_store::FlexibleObjectStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Application state shared across handlers
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Alias-aware object operations
    pub gateway: StorageGateway<FlexibleObjectStore>,
    /// Login and general API limiters
    pub limiters: RateLimiterSet,
    /// Issued session tokens
    pub sessions: SessionStore,
}

impl AppState {
    /// Validate the configuration and build the state over the configured backend
    pub async fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let store = FlexibleObjectStore::from_config(
            &config.s3_config(),
            &config.bucket_names,
            config.use_memory_store,
        )?;

        if store.is_persistent() {
            info!(endpoint = %config.s3_config().endpoint_url(), "✓ Storage mode: S3 (persistent)");
        } else {
            warn!("⚠ Storage mode: In-memory (NOT persistent - for development only)");
        }

        Self::with_store(config, store).await
    }

    /// Build the state over an existing store
    pub async fn with_store(config: GatewayConfig, store: FlexibleObjectStore) -> anyhow::Result<Self> {
        let registry = Arc::new(config.registry()?);
        if registry.aliases_enabled() {
            info!(buckets = registry.len(), "Bucket aliases enabled");
        }

        let gateway = StorageGateway::new(registry, Arc::new(store)).with_timeout(config.storage_timeout());

        let limiters = RateLimiterSet::connect(
            &config.rate_limit_settings()?,
            exempt_routes(RATE_LIMIT_EXEMPT_ROUTES.iter().copied()),
        )
        .await;
        info!(backend = ?limiters.backend(), "Rate limiters ready");

        let sessions = SessionStore::new(config.session_ttl());

        Ok(Self {
            config,
            gateway,
            limiters,
            sessions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketgate_core::CounterBackend;
    use bucketgate_store::MemoryObjectStore;

    fn config() -> GatewayConfig {
        GatewayConfig {
            bucket_names: vec!["raw-id-1".to_string()],
            bucket_aliases: vec!["docs".to_string()],
            auth_password: "secret".to_string(),
            use_memory_store: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_state_with_memory_store() {
        let state = AppState::new(config()).await.unwrap();
        assert_eq!(state.gateway.resolve("docs").unwrap(), "raw-id-1");
        assert_eq!(state.limiters.backend(), CounterBackend::Local);
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_is_fatal() {
        let config = GatewayConfig {
            bucket_aliases: vec!["a".to_string(), "b".to_string()],
            ..config()
        };
        assert!(AppState::new(config).await.is_err());
    }

    #[tokio::test]
    async fn test_proxy_route_is_exempt() {
        let store = FlexibleObjectStore::Memory(MemoryObjectStore::with_buckets(["raw-id-1"]));
        let state = AppState::with_store(config(), store).await.unwrap();
        assert!(state.limiters.general_api.is_exempt("/{bucket}/{*key}"));
        assert!(!state.limiters.general_api.is_exempt("/api/buckets"));
    }
}

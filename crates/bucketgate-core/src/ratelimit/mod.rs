//! Fixed-window rate limiting
//!
//! Each limiter counts requests per `(limiter, client, window index)` where
//! the window index is `floor(now / window)`. A request is allowed while the
//! counter for its window stays at or below the quota.
//!
//! Counters live either in process memory ([`LocalCounterStore`]) or in Redis
//! ([`RedisCounterStore`]) so that replicas behind a load balancer share one
//! budget per client. The backing store is picked once at startup:
//!
//! ```text
//! Unconfigured ──(REDIS_URL set)──▶ ConnectingShared ──ok──▶ SharedActive
//!      │                                   │
//!      └──────(no REDIS_URL)───────────────┴──fail/timeout──▶ LocalFallback
//! ```
//!
//! Both end states are terminal for the process. A counter operation that
//! fails later (Redis went away) allows the request.

mod local;
mod redis;

pub use self::local::LocalCounterStore;
pub use self::redis::RedisCounterStore;

use crate::{CoreError, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{info, warn};

/// Default timeout for connecting to the shared counter store
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default key namespace in the shared counter store
pub const DEFAULT_KEY_PREFIX: &str = "bucketgate:ratelimit";

/// Errors from a counter store; never surfaced to clients
#[derive(Error, Debug)]
pub enum CounterError {
    /// Redis command or connection failure
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// Store did not answer in time
    #[error("counter store timed out after {0:?}")]
    Timeout(Duration),
}

/// Where counters are kept
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterBackend {
    /// In-process map, per replica
    Local,
    /// Redis, shared by all replicas
    Shared,
}

/// Backend selection state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendState {
    /// No decision yet
    Unconfigured,
    /// Shared store configured, connection attempt in progress
    ConnectingShared,
    /// Connected to the shared store
    SharedActive,
    /// Using local counters
    LocalFallback,
}

impl BackendState {
    /// Counter backend implied by a terminal state
    pub fn backend(&self) -> CounterBackend {
        match self {
            Self::SharedActive => CounterBackend::Shared,
            _ => CounterBackend::Local,
        }
    }
}

/// Time span of the window a request falls into, in unix milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowSpan {
    /// Time of the request
    pub now_ms: u64,
    /// Window start (inclusive)
    pub start_ms: u64,
    /// Window end (exclusive); counters may be discarded after this
    pub end_ms: u64,
}

impl WindowSpan {
    /// Window containing `now_ms` for a window length of `window_ms`
    pub fn containing(now_ms: u64, window_ms: u64) -> Self {
        let window_ms = window_ms.max(1);
        let start_ms = (now_ms / window_ms) * window_ms;
        Self {
            now_ms,
            start_ms,
            end_ms: start_ms.saturating_add(window_ms),
        }
    }

    /// Window index, `floor(now / window)`
    pub fn index(&self) -> u64 {
        self.start_ms / (self.end_ms - self.start_ms).max(1)
    }

    /// Time until the next window starts
    pub fn reset_after(&self) -> Duration {
        Duration::from_millis(self.end_ms - self.now_ms)
    }
}

/// Atomic per-key counter storage
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key` and return its new value.
    ///
    /// The counter belongs to `window` and may be discarded after it ends.
    async fn increment(&self, key: &str, window: &WindowSpan) -> std::result::Result<u64, CounterError>;

    /// Which backend this store is
    fn backend(&self) -> CounterBackend;
}

/// Longest window a rule accepts (30 days)
pub const MAX_WINDOW: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Window length and quota of a limiter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitRule {
    window: Duration,
    max_requests: u32,
}

impl RateLimitRule {
    /// Create a rule; zero quotas and windows outside `1ms..=MAX_WINDOW` are rejected
    pub fn new(window: Duration, max_requests: u32) -> Result<Self> {
        if window.as_millis() == 0 {
            return Err(CoreError::InvalidRateLimit("window must be at least 1ms".to_string()));
        }
        if window > MAX_WINDOW {
            return Err(CoreError::InvalidRateLimit(format!(
                "window must be at most {}s",
                MAX_WINDOW.as_secs()
            )));
        }
        if max_requests == 0 {
            return Err(CoreError::InvalidRateLimit("max requests must be at least 1".to_string()));
        }
        Ok(Self { window, max_requests })
    }

    /// Window duration
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Requests allowed per window
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    fn window_ms(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Result of a rate limit check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitOutcome {
    /// Counted and within quota
    Allowed,
    /// Counted and over quota
    Limited,
    /// Not counted
    Exempt,
}

/// Decision plus the quota information reported to clients
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Outcome of the check
    pub outcome: RateLimitOutcome,
    /// Quota per window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Time until the current window ends
    pub reset_after: Duration,
}

impl RateLimitDecision {
    /// Whether the request may proceed
    pub fn is_allowed(&self) -> bool {
        !matches!(self.outcome, RateLimitOutcome::Limited)
    }

    /// Whether quota headers apply to this request
    pub fn is_counted(&self) -> bool {
        !matches!(self.outcome, RateLimitOutcome::Exempt)
    }

    /// Seconds until the window resets, rounded up
    pub fn reset_after_secs(&self) -> u64 {
        self.reset_after.as_millis().div_ceil(1000) as u64
    }
}

/// Predicate over the matched route template deciding exemption
pub type ExemptPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Predicate that exempts nothing
pub fn exempt_none() -> ExemptPredicate {
    Arc::new(|_| false)
}

/// Predicate exempting an explicit list of route templates
pub fn exempt_routes<I, S>(routes: I) -> ExemptPredicate
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let routes: Vec<String> = routes.into_iter().map(Into::into).collect();
    Arc::new(move |route| routes.iter().any(|r| r == route))
}

/// A named fixed-window limiter
pub struct RateLimiter {
    name: String,
    rule: RateLimitRule,
    store: Arc<dyn CounterStore>,
    exempt: ExemptPredicate,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("rule", &self.rule)
            .field("backend", &self.store.backend())
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter over `store`
    pub fn new(
        name: impl Into<String>,
        rule: RateLimitRule,
        store: Arc<dyn CounterStore>,
        exempt: ExemptPredicate,
    ) -> Self {
        Self {
            name: name.into(),
            rule,
            store,
            exempt,
        }
    }

    /// Limiter name, used in counter keys
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Window and quota
    pub fn rule(&self) -> RateLimitRule {
        self.rule
    }

    /// Counter backend in use
    pub fn backend(&self) -> CounterBackend {
        self.store.backend()
    }

    /// Whether requests to `route` bypass this limiter
    pub fn is_exempt(&self, route: &str) -> bool {
        (self.exempt)(route)
    }

    /// Check and count a request from `client` to `route` at the current time
    pub async fn check(&self, client: &str, route: &str) -> RateLimitDecision {
        self.check_at(client, route, SystemTime::now()).await
    }

    /// Check and count a request from `client` to `route` at `now`
    pub async fn check_at(&self, client: &str, route: &str, now: SystemTime) -> RateLimitDecision {
        let now_ms = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let window = WindowSpan::containing(now_ms, self.rule.window_ms());
        let limit = self.rule.max_requests;

        if self.is_exempt(route) {
            return RateLimitDecision {
                outcome: RateLimitOutcome::Exempt,
                limit,
                remaining: limit,
                reset_after: window.reset_after(),
            };
        }

        let key = format!("{}:{}:{}", self.name, client, window.index());
        let count = match self.store.increment(&key, &window).await {
            Ok(count) => count,
            Err(e) => {
                warn!(limiter = %self.name, error = %e, "Counter store unavailable, allowing request");
                return RateLimitDecision {
                    outcome: RateLimitOutcome::Allowed,
                    limit,
                    remaining: limit,
                    reset_after: window.reset_after(),
                };
            }
        };

        let outcome = if count > u64::from(limit) {
            RateLimitOutcome::Limited
        } else {
            RateLimitOutcome::Allowed
        };

        RateLimitDecision {
            outcome,
            limit,
            remaining: u64::from(limit).saturating_sub(count) as u32,
            reset_after: window.reset_after(),
        }
    }
}

/// Settings for building the limiter set
#[derive(Clone, Debug)]
pub struct RateLimitSettings {
    /// Login endpoint rule
    pub auth: RateLimitRule,
    /// Rule for all other API traffic
    pub general_api: RateLimitRule,
    /// Shared counter store URL (`redis://...`)
    pub redis_url: Option<String>,
    /// Namespace for shared counter keys
    pub key_prefix: String,
    /// Bound on the shared store connection attempt
    pub connect_timeout: Duration,
}

/// The process-wide limiters, one per endpoint class
#[derive(Debug)]
pub struct RateLimiterSet {
    /// Strict limiter for the login endpoint
    pub auth: Arc<RateLimiter>,
    /// Limiter for general API traffic
    pub general_api: Arc<RateLimiter>,
    state: BackendState,
}

impl RateLimiterSet {
    /// Pick the counter backend and build both limiters.
    ///
    /// Never fails because of the shared store: an unreachable store downgrades
    /// to local counters with a warning.
    pub async fn connect(settings: &RateLimitSettings, exempt: ExemptPredicate) -> Self {
        let (store, state) = select_backend(settings).await;
        Self::with_store(settings, store, state, exempt)
    }

    /// Build both limiters over an existing store
    pub fn with_store(
        settings: &RateLimitSettings,
        store: Arc<dyn CounterStore>,
        state: BackendState,
        exempt: ExemptPredicate,
    ) -> Self {
        Self {
            auth: Arc::new(RateLimiter::new("auth", settings.auth, Arc::clone(&store), Arc::clone(&exempt))),
            general_api: Arc::new(RateLimiter::new("api", settings.general_api, store, exempt)),
            state,
        }
    }

    /// Terminal backend selection state
    pub fn state(&self) -> BackendState {
        self.state
    }

    /// Counter backend in use
    pub fn backend(&self) -> CounterBackend {
        self.state.backend()
    }
}

async fn select_backend(settings: &RateLimitSettings) -> (Arc<dyn CounterStore>, BackendState) {
    let Some(url) = settings.redis_url.as_deref().filter(|u| !u.trim().is_empty()) else {
        info!("No shared counter store configured, rate limiting with local counters");
        return (Arc::new(LocalCounterStore::new()), BackendState::LocalFallback);
    };

    info!(state = ?BackendState::ConnectingShared, "Connecting to shared counter store");
    match RedisCounterStore::connect(url, &settings.key_prefix, settings.connect_timeout).await {
        Ok(store) => {
            info!("✓ Rate limiting with shared counters");
            (Arc::new(store), BackendState::SharedActive)
        }
        Err(e) => {
            warn!(error = %e, "⚠ Shared counter store unreachable, falling back to local counters");
            (Arc::new(LocalCounterStore::new()), BackendState::LocalFallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PROXY_ROUTE: &str = "/{bucket}/{*key}";

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn limiter(window_secs: u64, max: u32) -> RateLimiter {
        RateLimiter::new(
            "api",
            RateLimitRule::new(Duration::from_secs(window_secs), max).unwrap(),
            Arc::new(LocalCounterStore::new()),
            exempt_routes([PROXY_ROUTE]),
        )
    }

    /// Store that always fails, as a dead Redis would
    struct UnreachableStore;

    #[async_trait]
    impl CounterStore for UnreachableStore {
        async fn increment(&self, _key: &str, _window: &WindowSpan) -> std::result::Result<u64, CounterError> {
            Err(CounterError::Timeout(Duration::from_millis(1)))
        }

        fn backend(&self) -> CounterBackend {
            CounterBackend::Shared
        }
    }

    /// Store that counts how often it is touched
    #[derive(Default)]
    struct TouchCountingStore {
        inner: LocalCounterStore,
        touches: AtomicUsize,
    }

    #[async_trait]
    impl CounterStore for TouchCountingStore {
        async fn increment(&self, key: &str, window: &WindowSpan) -> std::result::Result<u64, CounterError> {
            self.touches.fetch_add(1, Ordering::SeqCst);
            self.inner.increment(key, window).await
        }

        fn backend(&self) -> CounterBackend {
            CounterBackend::Local
        }
    }

    #[test]
    fn test_rule_validation() {
        assert!(RateLimitRule::new(Duration::ZERO, 10).is_err());
        assert!(RateLimitRule::new(Duration::from_secs(60), 0).is_err());
        assert!(RateLimitRule::new(Duration::from_secs(1 << 61), 10).is_err());
        assert!(RateLimitRule::new(MAX_WINDOW + Duration::from_millis(1), 10).is_err());
        assert!(RateLimitRule::new(MAX_WINDOW, 10).is_ok());
        let rule = RateLimitRule::new(Duration::from_secs(60), 100).unwrap();
        assert_eq!(rule.max_requests(), 100);
    }

    #[test]
    fn test_window_span() {
        let span = WindowSpan::containing(125_000, 60_000);
        assert_eq!(span.start_ms, 120_000);
        assert_eq!(span.end_ms, 180_000);
        assert_eq!(span.index(), 2);
        assert_eq!(span.reset_after(), Duration::from_secs(55));
    }

    #[tokio::test]
    async fn test_quota_then_limited_then_next_window() {
        let limiter = limiter(10, 3);
        let t = at(1_000);

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_at("10.0.0.1", "/api/buckets", t).await;
            assert_eq!(decision.outcome, RateLimitOutcome::Allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let rejected = limiter.check_at("10.0.0.1", "/api/buckets", t).await;
        assert_eq!(rejected.outcome, RateLimitOutcome::Limited);
        assert!(!rejected.is_allowed());
        assert_eq!(rejected.remaining, 0);
        assert!(rejected.reset_after <= Duration::from_secs(10));

        let next_window = limiter.check_at("10.0.0.1", "/api/buckets", at(1_010)).await;
        assert_eq!(next_window.outcome, RateLimitOutcome::Allowed);
    }

    #[tokio::test]
    async fn test_general_api_hundred_per_minute() {
        let limiter = limiter(60, 100);
        let start = at(6_000);

        let mut allowed = 0;
        let mut last = None;
        for i in 0..101u64 {
            let decision = limiter
                .check_at("203.0.113.9", "/api/buckets", start + Duration::from_millis(i * 100))
                .await;
            if decision.is_allowed() {
                allowed += 1;
            }
            last = Some(decision);
        }

        let last = last.unwrap();
        assert_eq!(allowed, 100);
        assert_eq!(last.outcome, RateLimitOutcome::Limited);
        assert!(last.reset_after <= Duration::from_secs(60));
        assert!(last.reset_after_secs() <= 60);
    }

    #[tokio::test]
    async fn test_clients_are_counted_separately() {
        let limiter = limiter(60, 1);
        let t = at(60);
        assert!(limiter.check_at("a", "/api/buckets", t).await.is_allowed());
        assert!(!limiter.check_at("a", "/api/buckets", t).await.is_allowed());
        assert!(limiter.check_at("b", "/api/buckets", t).await.is_allowed());
    }

    #[tokio::test]
    async fn test_public_read_route_never_limited_nor_counted() {
        let store = Arc::new(TouchCountingStore::default());
        let limiter = RateLimiter::new(
            "api",
            RateLimitRule::new(Duration::from_secs(60), 1).unwrap(),
            Arc::clone(&store) as Arc<dyn CounterStore>,
            exempt_routes([PROXY_ROUTE]),
        );

        for _ in 0..1_000 {
            let decision = limiter.check_at("10.0.0.1", PROXY_ROUTE, at(120)).await;
            assert_eq!(decision.outcome, RateLimitOutcome::Exempt);
            assert!(!decision.is_counted());
        }
        assert_eq!(store.touches.load(Ordering::SeqCst), 0);

        // Other routes from the same client are still limited
        assert!(limiter.check_at("10.0.0.1", "/api/buckets", at(120)).await.is_allowed());
        assert!(!limiter.check_at("10.0.0.1", "/api/buckets", at(120)).await.is_allowed());
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_open() {
        let limiter = RateLimiter::new(
            "api",
            RateLimitRule::new(Duration::from_secs(60), 1).unwrap(),
            Arc::new(UnreachableStore),
            exempt_none(),
        );

        for _ in 0..50 {
            let decision = limiter.check_at("10.0.0.1", "/api/buckets", at(0)).await;
            assert_eq!(decision.outcome, RateLimitOutcome::Allowed);
            assert_eq!(decision.remaining, 1);
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_not_undercounted() {
        let limiter = Arc::new(limiter(60, 50));
        let t = at(600);

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.check_at("10.0.0.1", "/api/buckets", t).await })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap().is_allowed() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 50);
    }

    fn settings(redis_url: Option<&str>) -> RateLimitSettings {
        RateLimitSettings {
            auth: RateLimitRule::new(Duration::from_secs(300), 10).unwrap(),
            general_api: RateLimitRule::new(Duration::from_secs(60), 100).unwrap(),
            redis_url: redis_url.map(str::to_string),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            connect_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_no_shared_store_uses_local_counters() {
        let set = RateLimiterSet::connect(&settings(None), exempt_none()).await;
        assert_eq!(set.state(), BackendState::LocalFallback);
        assert_eq!(set.auth.backend(), CounterBackend::Local);
        assert_eq!(set.auth.rule().max_requests(), 10);
        assert_eq!(set.general_api.rule().max_requests(), 100);
    }

    #[tokio::test]
    async fn test_unreachable_shared_store_falls_back_to_local() {
        let set = RateLimiterSet::connect(&settings(Some("not a redis url")), exempt_none()).await;
        assert_eq!(set.state(), BackendState::LocalFallback);

        let set = RateLimiterSet::connect(&settings(Some("redis://127.0.0.1:1/")), exempt_none()).await;
        assert_eq!(set.state(), BackendState::LocalFallback);
        assert!(set.general_api.check("10.0.0.1", "/api/buckets").await.is_allowed());
    }

    #[tokio::test]
    async fn test_limiters_do_not_share_counters() {
        let set = RateLimiterSet::with_store(
            &RateLimitSettings {
                auth: RateLimitRule::new(Duration::from_secs(60), 1).unwrap(),
                ..settings(None)
            },
            Arc::new(LocalCounterStore::new()),
            BackendState::LocalFallback,
            exempt_none(),
        );

        let t = at(60);
        assert!(set.auth.check_at("c", "/api/login", t).await.is_allowed());
        assert!(!set.auth.check_at("c", "/api/login", t).await.is_allowed());
        assert!(set.general_api.check_at("c", "/api/login", t).await.is_allowed());
    }
}

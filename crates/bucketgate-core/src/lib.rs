//! # Bucketgate Core
//!
//! Core of the bucket gateway.
//!
//! This crate provides:
//! - **Bucket Registry**: Bidirectional alias ↔ real bucket name resolution
//! - **Rate Limiting**: Fixed-window limiters over local or shared (Redis) counters
//! - **Sessions**: TTL-bounded session tokens
//! - **Storage Gateway**: Object operations that only ever see resolved bucket names
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Routes                │
//! ├──────────────┬──────────────┬───────────┤
//! │ RateLimiter  │ SessionStore │  Gateway  │
//! │     Set      │              │           │
//! ├──────────────┤              ├───────────┤
//! │ Local│Redis  │              │ Registry  │
//! │ counters     │              │ + Store   │
//! └──────────────┴──────────────┴───────────┘
//! ```

pub mod error;
pub mod gateway;
pub mod ratelimit;
pub mod registry;
pub mod session;

pub use error::{CoreError, Result};
pub use gateway::{StorageGateway, DEFAULT_STORAGE_TIMEOUT};
pub use ratelimit::{
    exempt_none, exempt_routes, BackendState, CounterBackend, CounterError, CounterStore,
    ExemptPredicate, LocalCounterStore, RateLimitDecision, RateLimitOutcome, RateLimitRule,
    RateLimitSettings, RateLimiter, RateLimiterSet, RedisCounterStore, WindowSpan,
};
pub use registry::BucketRegistry;
pub use session::{Session, SessionStore};

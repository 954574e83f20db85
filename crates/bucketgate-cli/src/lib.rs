//! # Bucketgate
//!
//! HTTP gateway over a whitelisted set of object-storage buckets.
//!
//! This crate provides:
//! - **Management API**: Listing, upload, delete, move and copy behind a shared password
//! - **Public Proxy**: Unauthenticated, cacheable object reads
//! - **Bucket Aliases**: Every route accepts the alias or the real bucket name
//! - **Rate Limiting**: Per-client fixed windows, shared across instances via Redis
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Browsers / API clients                 │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                     Bucketgate                      │
//! ├─────────────────────────────────────────────────────┤
//! │  Rate Limiter │ Session Auth │ Error Detail Filter  │
//! ├─────────────────────────────────────────────────────┤
//! │          API Handlers  │  Public Read Proxy         │
//! ├─────────────────────────────────────────────────────┤
//! │                  bucketgate-core                    │
//! │        (Registry, Storage Gateway, Sessions)        │
//! ├─────────────────────────────────────────────────────┤
//! │                  bucketgate-store                   │
//! │               (S3, in-memory)                       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{ConfigError, GatewayConfig};
pub use error::{ApiError, ErrorCode};
pub use server::{run_server, run_server_with_shutdown, serve};
pub use state::AppState;

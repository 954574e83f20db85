//! Bucketgate - object-storage gateway with aliases and rate limiting

use bucketgate_cli::config::parse_name_list;
use bucketgate_cli::{run_server_with_shutdown, GatewayConfig};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "bucketgate")]
#[command(about = "Gateway exposing whitelisted object-storage buckets")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "PORT")]
    port: u16,

    /// S3 endpoint URL (empty for AWS)
    #[arg(long, default_value = "", env = "S3_ENDPOINT")]
    s3_endpoint: String,

    /// S3 region
    #[arg(long, default_value = "us-east-1", env = "S3_REGION")]
    s3_region: String,

    /// S3 access key ID
    #[arg(long, default_value = "", env = "S3_ACCESS_KEY_ID", hide_env_values = true)]
    s3_access_key_id: String,

    /// S3 secret access key
    #[arg(long, default_value = "", env = "S3_SECRET_ACCESS_KEY", hide_env_values = true)]
    s3_secret_access_key: String,

    /// Use path-style S3 addressing (MinIO and most self-hosted backends)
    #[arg(long, env = "S3_PATH_STYLE")]
    s3_path_style: bool,

    /// Comma-separated real bucket names
    #[arg(long, default_value = "", env = "BUCKET_NAMES")]
    bucket_names: String,

    /// Comma-separated aliases, one per bucket (optional)
    #[arg(long, default_value = "", env = "FRIENDLY_BUCKET_NAMES")]
    friendly_bucket_names: String,

    /// Management password
    #[arg(long, default_value = "", env = "AUTH_PASSWORD", hide_env_values = true)]
    auth_password: String,

    /// Session lifetime in seconds
    #[arg(long, default_value = "86400", env = "SESSION_TTL_SECS")]
    session_ttl_secs: u64,

    /// Mark the session cookie Secure
    #[arg(long, env = "SECURE_COOKIES")]
    secure_cookies: bool,

    /// Login limiter window in seconds
    #[arg(long, default_value = "300", env = "AUTH_RATE_LIMIT_WINDOW_SECS")]
    auth_rate_limit_window_secs: u64,

    /// Login attempts per window
    #[arg(long, default_value = "10", env = "AUTH_RATE_LIMIT_MAX")]
    auth_rate_limit_max: u32,

    /// API limiter window in seconds
    #[arg(long, default_value = "60", env = "API_RATE_LIMIT_WINDOW_SECS")]
    api_rate_limit_window_secs: u64,

    /// API requests per window
    #[arg(long, default_value = "100", env = "API_RATE_LIMIT_MAX")]
    api_rate_limit_max: u32,

    /// Redis URL for rate-limit counters shared between instances
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Key namespace for shared counters
    #[arg(long, default_value = bucketgate_core::ratelimit::DEFAULT_KEY_PREFIX, env = "RATE_LIMIT_PREFIX")]
    rate_limit_prefix: String,

    /// Identify clients by X-Forwarded-For (only behind a trusted proxy)
    #[arg(long, env = "TRUST_PROXY")]
    trust_proxy: bool,

    /// Bound on each storage call in seconds
    #[arg(long, default_value = "30", env = "STORAGE_TIMEOUT_SECS")]
    storage_timeout_secs: u64,

    /// Deployment environment (production hides internal error detail)
    #[arg(long, default_value = "development", env = "GATEWAY_ENV")]
    environment: String,

    /// Use in-memory storage (for testing, data will not persist)
    #[arg(long, env = "MEMORY_STORE")]
    memory_store: bool,

    /// Enable debug logging
    #[arg(short, long, env = "DEBUG")]
    debug: bool,

    /// Comma-separated CORS origins (`*` for any)
    #[arg(long, default_value = "*", env = "CORS_ORIGINS")]
    cors_origins: String,

    /// Maximum upload size in bytes
    #[arg(long, default_value = "5368709120", env = "MAX_UPLOAD_SIZE")]
    max_upload_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!(
                "bucketgate_cli={level},bucketgate_core={level},bucketgate_store={level},tower_http=debug",
                level = log_level
            )
            .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let production = args.environment.eq_ignore_ascii_case("production");

    tracing::info!("Starting Bucketgate on {}:{}", args.host, args.port);
    if args.memory_store {
        tracing::warn!("⚠️  Using in-memory storage - data will NOT persist!");
    }
    if args.trust_proxy {
        tracing::info!("Trusting X-Forwarded-For for client identity");
    }
    if !production {
        tracing::warn!("Running in development mode - internal error detail is exposed");
    }

    let config = GatewayConfig {
        host: args.host,
        port: args.port,
        s3_endpoint: args.s3_endpoint,
        s3_region: args.s3_region,
        s3_access_key_id: args.s3_access_key_id,
        s3_secret_access_key: args.s3_secret_access_key,
        s3_path_style: args.s3_path_style,
        bucket_names: parse_name_list(&args.bucket_names),
        bucket_aliases: parse_name_list(&args.friendly_bucket_names),
        auth_password: args.auth_password,
        session_ttl_secs: args.session_ttl_secs,
        secure_cookies: args.secure_cookies,
        auth_rate_limit_window_secs: args.auth_rate_limit_window_secs,
        auth_rate_limit_max: args.auth_rate_limit_max,
        api_rate_limit_window_secs: args.api_rate_limit_window_secs,
        api_rate_limit_max: args.api_rate_limit_max,
        redis_url: args.redis_url,
        rate_limit_prefix: args.rate_limit_prefix,
        trust_proxy: args.trust_proxy,
        storage_timeout_secs: args.storage_timeout_secs,
        production,
        use_memory_store: args.memory_store,
        max_upload_size: args.max_upload_size,
        cors_origins: parse_name_list(&args.cors_origins),
    };

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    run_server_with_shutdown(config, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

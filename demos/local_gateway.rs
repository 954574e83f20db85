//! Local gateway over in-memory buckets
//!
//! This example demonstrates:
//! - Aliased buckets (`docs`, `media`) over raw identifiers
//! - Seeding objects that the public proxy serves immediately
//! - Serving until Ctrl-C
//!
//! Run with: cargo run --example local_gateway

use bucketgate_cli::{serve, AppState, GatewayConfig};
use bucketgate_store::{FlexibleObjectStore, MemoryObjectStore};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("🚀 Bucketgate - Local Gateway Example\n");

    let config = GatewayConfig {
        host: "127.0.0.1".to_string(),
        port: 3000,
        bucket_names: vec!["3f9a-raw-docs".to_string(), "7c21-raw-media".to_string()],
        bucket_aliases: vec!["docs".to_string(), "media".to_string()],
        auth_password: "demo-password".to_string(),
        use_memory_store: true,
        ..Default::default()
    };

    let store = MemoryObjectStore::with_buckets(config.bucket_names.iter().cloned());
    store.insert("3f9a-raw-docs", "welcome.txt", "Hello from bucketgate!\n", "text/plain")?;
    store.insert("7c21-raw-media", "logos/mark.svg", "<svg xmlns=\"http://www.w3.org/2000/svg\"/>", "image/svg+xml")?;

    let listener = TcpListener::bind(config.bind_addr()).await?;
    let base = format!("http://{}", listener.local_addr()?);
    let state = Arc::new(AppState::with_store(config, FlexibleObjectStore::Memory(store)).await?);

    println!("📦 Buckets:        {}/api/buckets", base);
    println!("📄 Public object:  {}/docs/welcome.txt", base);
    println!("🖼️  Same, by raw id: {}/7c21-raw-media/logos/mark.svg", base);
    println!("🔑 Login with:     curl -X POST {}/api/login -H 'content-type: application/json' -d '{{\"password\":\"demo-password\"}}'\n", base);

    serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

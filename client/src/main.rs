//! Tablesync - local cache proxy for the restaurant reviews app.
//!
//! Serves the app's static assets cache-first and keeps the local
//! restaurant/review store warm.

use std::sync::Arc;
use tablesync_client::proxy::{self, DEFAULT_MANIFEST};
use tablesync_client::{CacheProxy, Config, HttpGateway, LocalStore, SyncEngine};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tablesync_client=debug,tablesync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        "Starting Tablesync proxy for {} (backend {})",
        config.origin_url,
        config.api_base_url
    );

    // Open local store and warm it in the background
    let store = LocalStore::open_file(&config.store_path).await;
    let engine = SyncEngine::new(store, Arc::new(HttpGateway::new(config.api_base_url.clone())));

    let warm = engine.clone();
    tokio::spawn(async move {
        match warm.get_restaurants().await {
            Ok(restaurants) => tracing::info!(count = restaurants.len(), "Local store ready"),
            Err(e) => tracing::warn!("Could not load restaurants: {}", e),
        }
    });

    // Pre-populate the asset cache; misses still go to the origin
    let cache_proxy = Arc::new(CacheProxy::new(config.origin_url.clone(), &config.cache_name));
    if let Err(e) = cache_proxy.install(DEFAULT_MANIFEST).await {
        tracing::warn!("Serving without pre-cached assets: {}", e);
    }

    // Build router
    let app = proxy::router(cache_proxy).layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Proxy listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

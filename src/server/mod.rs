//! Web server module - HTTP surface over the prediction and feedback core

pub mod http;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::app::App;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub app: Arc<App>,
}

/// Build the router; separated from `start` so tests can drive it directly
pub fn router(app: Arc<App>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(http::index_handler))
        .route("/health", get(http::health_handler))
        .route("/predict", post(http::predict_handler))
        .route("/feedback", post(http::feedback_handler))
        .route("/metrics", get(http::metrics_handler))
        .route("/model/version", get(http::model_version_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ServerState { app })
}

/// Start the web server
pub async fn start(app: Arc<App>, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let current = match app.registry.current_version() {
        Ok(current) => current,
        Err(e) => {
            warn!("Could not read current model version: {}", e);
            None
        }
    };
    let router = router(app);

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("     HumanLoop Server Starting");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    match current {
        Some(v) => println!("✓ Serving model v{}", v),
        None => {
            println!("⚠ No model loaded");
            println!("  Tip: run 'humanloop baseline' first");
        }
    }
    println!();
    println!("🚀 Listening on http://{}", addr);
    println!();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);
    axum::serve(listener, router).await.context("Server error")?;
    Ok(())
}

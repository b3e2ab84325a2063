//! Home assistant conversation server
//!
//! Axum-based host for the conversation agent. Device state comes from an
//! in-memory demo home; the LLM backend is chosen from the environment.

mod handlers;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assist_core::{provider::AgentOptions, Agent, ConversationStore, MemoryHome, ProviderConfig};
use assist_runtime::ProviderRegistry;

use crate::handlers::{conversation_handler, conversation_history, health_check, list_devices};
use crate::state::AppState;

/// How often idle conversations are swept
const EVICTION_INTERVAL: Duration = Duration::from_secs(300);

/// Conversations untouched for this long are dropped
const MAX_IDLE: Duration = Duration::from_secs(30 * 60);

/// Build the HTTP router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/devices", get(list_devices))
        .route("/api/conversation", post(conversation_handler))
        .route("/api/conversation/{id}", get(conversation_history))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn spawn_eviction(sessions: Arc<ConversationStore>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            ticker.tick().await;
            sessions.evict_idle(MAX_IDLE);
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Backend selection; unknown names and missing keys stop startup here
    let config = ProviderConfig::from_env()?;
    let options = AgentOptions::from_env()?;
    let provider = ProviderRegistry::with_defaults().build(&config)?;

    match provider.health_check().await {
        Ok(true) => tracing::info!(provider = provider.name(), "✓ Provider reachable"),
        Ok(false) | Err(_) => {
            tracing::warn!(provider = provider.name(), "⚠ Provider not available - turns will fail until it is");
        }
    }

    let home = Arc::new(MemoryHome::demo());

    let agent = Agent::builder()
        .provider(provider)
        .home(home)
        .model(config.model.clone())
        .options(options)
        .timeout(config.request_timeout)
        .build()?;

    spawn_eviction(agent.sessions().clone());

    let state = AppState::new(agent);
    let app = app(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("assist-server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                 - Health check");
    tracing::info!("  GET  /api/devices            - Device snapshot");
    tracing::info!("  POST /api/conversation       - Process an utterance");
    tracing::info!("  GET  /api/conversation/{{id}}  - Conversation history");

    axum::serve(listener, app).await?;

    Ok(())
}

mod config;
mod errors;
mod interview;
mod llm_client;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::interview::bundle::PromptBundle;
use crate::llm_client::OpenAiConnector;
use crate::routes::build_router;
use crate::state::{AppState, SessionStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rollplay API v{}", env!("CARGO_PKG_VERSION"));

    // Prompt bundle is validated here; a broken bundle never serves a session
    let bundle = PromptBundle::load(&config.prompt_bundle_path)?;
    info!(
        "Prompt bundle ready: {} questions, {} evaluation points",
        bundle.catalog.len(),
        bundle.evaluation_points.len()
    );

    // Sessions bring their own key; the connector probes it before use
    let settings = config.llm_settings();
    info!(
        "LLM connector initialized (model: {}, base: {})",
        settings.model, settings.api_base
    );
    let connector = Arc::new(OpenAiConnector::new(settings));

    // Build app state
    let state = AppState {
        bundle: Arc::new(bundle),
        connector,
        sessions: SessionStore::default(),
        config: config.clone(),
    };

    // Drop abandoned sessions (and the credentials they hold)
    let sessions = state.sessions.clone();
    let idle_ttl = config.session_idle_ttl;
    let mut sweep = tokio::time::interval(config.session_sweep_interval);
    tokio::spawn(async move {
        loop {
            sweep.tick().await;
            let dropped = sessions.sweep_idle(idle_ttl, chrono::Utc::now()).await;
            if dropped > 0 {
                info!("Expired {dropped} idle sessions");
            }
        }
    });
    info!(
        "Idle sessions expire after {}s",
        config.session_idle_ttl.num_seconds()
    );

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

mod config;
mod errors;
mod finder;
mod llm_client;
mod request_id;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::{CompletionService, LlmClient};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Pajama Finder v{}", env!("CARGO_PKG_VERSION"));

    // The server still starts without a key; the finder endpoint reports 500 until one is set.
    let llm: Option<Arc<dyn CompletionService>> = match &config.openai_api_key {
        Some(key) => {
            let client = LlmClient::new(
                key.clone(),
                config.openai_base_url.clone(),
                config.openai_model.clone(),
                config.upstream_timeout,
            )?;
            info!(
                "LLM client initialized (model: {}, timeout: {:?})",
                client.model(),
                config.upstream_timeout
            );
            Some(Arc::new(client) as Arc<dyn CompletionService>)
        }
        None => {
            warn!("OPENAI_API_KEY is not set; /pajama-finder will answer 500");
            None
        }
    };

    let state = AppState {
        llm,
        config: config.clone(),
    };

    let app = build_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Pajama Finder server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

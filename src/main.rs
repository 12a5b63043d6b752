//! eod-analyst - HTTP Server Entry Point
//!
//! Starts the HTTP server that runs analyses on request.

use eod_analyst::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eod_analyst=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, max_iterations={}",
        config.llm.model, config.max_iterations
    );
    if config.delivery_webhook_url.is_none() {
        info!("No delivery webhook configured; reports are only saved locally");
    }

    api::serve(config).await?;

    Ok(())
}

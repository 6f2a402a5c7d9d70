use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod infrastructure;
mod modules;
mod state;
mod workers;

use config::settings::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rendition_worker=info")))
        .init();

    info!("Starting rendition worker...");

    let config = AppConfig::new().context("Missing required environment variable")?;
    let state = app::bootstrap(config).await?;

    workers::transcoder::start_transcoder_worker(state).await
}

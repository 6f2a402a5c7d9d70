use anyhow::{Context, Result};
use tracing::info;

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::{connect_to_db, run_migrations};
use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::infrastructure::storage::s3::S3Device;
use crate::state::AppState;

/// Connects every backing service the worker needs.
pub async fn bootstrap(config: AppConfig) -> Result<AppState> {
    let db = connect_to_db(&config.database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    run_migrations(&db).await.context("Failed to run migrations")?;

    let queue = RabbitMqService::new(&config.rabbitmq_url).await?;

    let client = S3Device::connect(&config.minio_url, &config.minio_access_key, &config.minio_secret_key);
    let files = S3Device::new(client.clone(), &config.minio_bucket_files, "");
    let videos = S3Device::new(client, &config.minio_bucket_videos, &config.video_storage_root);

    info!(
        "📦 Storage: sources in '{}', renditions in '{}/{}'",
        config.minio_bucket_files, config.minio_bucket_videos, config.video_storage_root
    );
    Ok(AppState::new(config, db, queue, files, videos))
}

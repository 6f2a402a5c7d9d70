use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::crypto::KeyRing;
use crate::infrastructure::db::pool::DbPool;
use crate::infrastructure::media::ffmpeg::FfmpegEngine;
use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::infrastructure::storage::s3::S3Device;
use crate::modules::transcoding::service::JobController;
use crate::modules::video::repository::{PgFileRepository, PgRenditionRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub queue: RabbitMqService,
    /// Uploaded source files.
    pub files: S3Device,
    /// Published renditions, rooted at the video storage root.
    pub videos: S3Device,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        queue: RabbitMqService,
        files: S3Device,
        videos: S3Device,
    ) -> Self {
        Self {
            config,
            db,
            queue,
            files,
            videos,
        }
    }

    pub fn controller(&self) -> JobController {
        JobController::new(
            Arc::new(PgFileRepository::new(self.db.clone())),
            Arc::new(PgRenditionRepository::new(self.db.clone())),
            Arc::new(FfmpegEngine::new(&self.config.ffmpeg_path, &self.config.ffprobe_path)),
            Arc::new(self.files.clone()),
            Arc::new(self.videos.clone()),
            KeyRing::new(&self.config.openssl_keys),
            self.config.scratch_root.clone(),
        )
    }
}

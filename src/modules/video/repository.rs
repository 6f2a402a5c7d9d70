use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::model::{Bucket, FileRow, RenditionJob, RenditionRow, RenditionStatus, SourceFile};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },

    #[error("rendition record {0} not found")]
    Missing(Uuid),

    #[error("illegal rendition transition {from} -> {to}")]
    InvalidTransition {
        from: RenditionStatus,
        to: RenditionStatus,
    },
}

/// Persistence of rendition records.
#[async_trait]
pub trait RenditionRepository: Send + Sync {
    /// Records for one file ordered by start time, then rendition id.
    async fn find_for_file(&self, bucket_id: &str, file_id: &str) -> Result<Vec<RenditionJob>, StoreError>;

    async fn create(&self, job: &RenditionJob) -> Result<(), StoreError>;

    async fn update(&self, job: &RenditionJob) -> Result<(), StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

/// Read access to the upstream bucket and file catalog.
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn find_bucket(&self, bucket_id: &str) -> Result<Option<Bucket>, StoreError>;

    async fn find_file(&self, bucket_id: &str, file_id: &str) -> Result<Option<SourceFile>, StoreError>;
}

#[derive(Clone)]
pub struct PgRenditionRepository {
    pool: PgPool,
}

impl PgRenditionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RenditionRepository for PgRenditionRepository {
    async fn find_for_file(&self, bucket_id: &str, file_id: &str) -> Result<Vec<RenditionJob>, StoreError> {
        let rows = sqlx::query_as::<_, RenditionRow>(
            r#"
            SELECT id, bucket_id, file_id, rendition_id, rendition_name, status,
                   progress, metadata, time_started, time_ended
            FROM video_renditions
            WHERE bucket_id = $1 AND file_id = $2
            ORDER BY time_started ASC NULLS LAST, rendition_id ASC
            "#,
        )
        .bind(bucket_id)
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let id = row.id;
                RenditionJob::try_from(row).map_err(|reason| StoreError::Corrupt { id, reason })
            })
            .collect()
    }

    async fn create(&self, job: &RenditionJob) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO video_renditions
                (id, bucket_id, file_id, rendition_id, rendition_name, status,
                 progress, metadata, time_started, time_ended)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.id)
        .bind(&job.bucket_id)
        .bind(&job.file_id)
        .bind(&job.rendition_id)
        .bind(&job.rendition_name)
        .bind(job.status.as_str())
        .bind(job.progress as i16)
        .bind(&job.metadata)
        .bind(job.time_started)
        .bind(job.time_ended)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, job: &RenditionJob) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE video_renditions
            SET status = $2, progress = $3, metadata = $4, time_started = $5,
                time_ended = $6, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(job.progress as i16)
        .bind(&job.metadata)
        .bind(job.time_started)
        .bind(job.time_ended)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(job.id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM video_renditions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn find_bucket(&self, bucket_id: &str) -> Result<Option<Bucket>, StoreError> {
        let bucket = sqlx::query_as::<_, Bucket>("SELECT id, name, enabled FROM buckets WHERE id = $1")
            .bind(bucket_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(bucket)
    }

    async fn find_file(&self, bucket_id: &str, file_id: &str) -> Result<Option<SourceFile>, StoreError> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT id, bucket_id, path, mime_type, openssl_cipher, openssl_version,
                   openssl_iv, openssl_tag, algorithm
            FROM files
            WHERE bucket_id = $1 AND id = $2
            "#,
        )
        .bind(bucket_id)
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SourceFile::from))
    }
}

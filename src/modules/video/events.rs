use serde::{Deserialize, Serialize};

use super::model::{RenditionJob, RenditionStatus};
use crate::infrastructure::media::SourceInfo;

/// Queue payload asking for one file to be transcoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeJob {
    pub project_id: String,
    pub bucket_id: String,
    pub file_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenditionSummary {
    pub rendition_id: String,
    pub rendition_name: String,
    pub status: RenditionStatus,
    pub progress: u8,
    pub metadata: Option<serde_json::Value>,
}

impl From<&RenditionJob> for RenditionSummary {
    fn from(job: &RenditionJob) -> Self {
        Self {
            rendition_id: job.rendition_id.clone(),
            rendition_name: job.rendition_name.clone(),
            status: job.status,
            progress: job.progress,
            metadata: job.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    pub code: String,
    pub message: String,
}

/// Published on the result queue once a job has finished, however it ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeOutcome {
    pub project_id: String,
    pub bucket_id: String,
    pub file_id: String,
    pub status: OutcomeStatus,
    pub stream: Option<String>,
    pub source: Option<SourceInfo>,
    pub renditions: Vec<RenditionSummary>,
    pub error: Option<JobError>,
}

use crate::modules::transcoding::error::TranscodeError;
use crate::modules::transcoding::service::{JobController, JobReport};
use crate::modules::video::events::{JobError, OutcomeStatus, TranscodeJob, TranscodeOutcome};
use crate::modules::video::model::RenditionJob;
use crate::modules::video::status::stream_reference;
use crate::state::AppState;
use futures_util::StreamExt;
use lapin::options::BasicAckOptions;
use tracing::{error, info, warn};

/// Consumes transcode jobs one at a time until the consumer stream ends.
pub async fn start_transcoder_worker(state: AppState) -> anyhow::Result<()> {
    info!("🎥 Starting Transcoder Worker...");

    let queue_name = state.config.transcode_queue.clone();
    let mut consumer = state
        .queue
        .consume(&queue_name, "transcoder_worker", state.config.queue_prefetch)
        .await?;
    let controller = state.controller();

    info!("🎥 Transcoder Worker listening on '{}'", queue_name);

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                error!("❌ Consumer error: {}", e);
                continue;
            }
        };

        info!("📦 Received transcoding job");

        match serde_json::from_slice::<TranscodeJob>(&delivery.data) {
            Ok(job) => {
                let outcome = process_job(&state, &controller, &job).await;
                if let Err(e) = state
                    .queue
                    .publish_json(&state.config.transcode_result_queue, &outcome)
                    .await
                {
                    error!(file_id = %job.file_id, "❌ Failed to publish job outcome: {}", e);
                }
            }
            Err(e) => {
                error!("❌ Failed to parse job: {}", e);
            }
        }

        // failures are reported on the result queue; redelivery would only repeat them
        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            error!("Failed to ack message: {}", e);
        }
    }

    warn!("Transcoder consumer stream closed");
    Ok(())
}

async fn process_job(state: &AppState, controller: &JobController, job: &TranscodeJob) -> TranscodeOutcome {
    info!(
        project_id = %job.project_id,
        bucket_id = %job.bucket_id,
        file_id = %job.file_id,
        "🎬 Processing job"
    );

    let base_url = &state.config.stream_base_url;
    let video_root = &state.config.video_storage_root;

    match controller.run(job).await {
        Ok(report) => {
            info!(
                file_id = %job.file_id,
                "✅ Job finished: {} ready, {} failed",
                report.ready_count(),
                report.failed_count()
            );
            for rendition in &report.renditions {
                if let Err(e) = &rendition.result {
                    warn!(file_id = %job.file_id, rendition_id = %rendition.spec.id, "Rendition left in error: {}", e);
                }
            }
            completed(job, report, base_url, video_root)
        }
        Err(err) => {
            error!(
                bucket_id = %job.bucket_id,
                file_id = %job.file_id,
                code = err.code(),
                "❌ Job failed: {}", err
            );
            let records = match controller.renditions(&job.bucket_id, &job.file_id).await {
                Ok(records) => records,
                Err(e) => {
                    warn!(file_id = %job.file_id, "Could not list renditions after failure: {}", e);
                    Vec::new()
                }
            };
            failed(job, &err, records, base_url, video_root)
        }
    }
}

fn completed(job: &TranscodeJob, report: JobReport, base_url: &str, video_root: &str) -> TranscodeOutcome {
    TranscodeOutcome {
        project_id: job.project_id.clone(),
        bucket_id: job.bucket_id.clone(),
        file_id: job.file_id.clone(),
        status: OutcomeStatus::Completed,
        stream: stream_reference(base_url, video_root, &job.bucket_id, &job.file_id, &report.records),
        source: Some(report.source),
        renditions: report.records.iter().map(Into::into).collect(),
        error: None,
    }
}

fn failed(
    job: &TranscodeJob,
    err: &TranscodeError,
    records: Vec<RenditionJob>,
    base_url: &str,
    video_root: &str,
) -> TranscodeOutcome {
    TranscodeOutcome {
        project_id: job.project_id.clone(),
        bucket_id: job.bucket_id.clone(),
        file_id: job.file_id.clone(),
        status: OutcomeStatus::Failed,
        stream: stream_reference(base_url, video_root, &job.bucket_id, &job.file_id, &records),
        source: None,
        renditions: records.iter().map(Into::into).collect(),
        error: Some(JobError {
            code: err.code().to_string(),
            message: err.to_string(),
        }),
    }
}

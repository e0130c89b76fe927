//! API handlers: upload, status, download, health.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue, Request};
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{error, info};

use mreel_models::{FileId, ItemPatch, ItemStatus, Job, JobId, JobItem};
use mreel_queue::ProcessFileJob;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Response for upload endpoints.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub job_id: JobId,
    pub items: Vec<UploadedItem>,
}

#[derive(Debug, Serialize)]
pub struct UploadedItem {
    pub file_id: FileId,
    pub filename: String,
}

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Accept one or more uploads, create the batch job, and enqueue one
/// processing task per file.
pub async fn upload_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    // Batch uploads share a job_id so clients poll once for all files
    let job_id = JobId::new();
    let upload_dir = state.config.upload_dir.join(job_id.as_str());
    tokio::fs::create_dir_all(&upload_dir).await?;

    let mut items: Vec<JobItem> = Vec::new();
    let mut tasks: Vec<ProcessFileJob> = Vec::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue; // not a file part
        };

        let file_id = FileId::new();
        let destination = upload_dir.join(format!("{file_id}_{filename}"));

        // Stream the upload to disk chunk by chunk
        let mut out = tokio::fs::File::create(&destination).await?;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::bad_request(format!("Upload interrupted: {e}")))?
        {
            out.write_all(&chunk).await?;
        }
        out.flush().await?;

        tasks.push(ProcessFileJob::new(
            job_id.clone(),
            file_id.clone(),
            destination,
            filename.clone(),
        ));
        items.push(JobItem::new(file_id, filename));
    }

    if items.is_empty() {
        return Err(ApiError::bad_request("No files uploaded"));
    }

    let job = state.store.create(Job::new(job_id.clone(), items)).await?;

    // Hand one task per file to the worker fleet
    for task in tasks {
        let file_id = task.file_id.clone();
        if let Err(e) = state.queue.enqueue_process_file(task).await {
            error!(job_id = %job_id, file_id = %file_id, "Failed to enqueue task: {}", e);
            state
                .store
                .update_item(
                    &job_id,
                    &file_id,
                    ItemPatch::status(ItemStatus::Failed)
                        .with_message(format!("Failed to schedule processing: {e}")),
                )
                .await?;
        }
    }

    info!(job_id = %job_id, files = job.items.len(), "Created batch job");

    Ok(Json(UploadResponse {
        job_id,
        items: job
            .items
            .into_iter()
            .map(|i| UploadedItem {
                file_id: i.file_id,
                filename: i.filename,
            })
            .collect(),
    }))
}

/// Return the batch + item status for a job.
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = state.store.get(&JobId::from(job_id)).await?;
    Ok(Json(job))
}

/// Send the compiled highlight file for one item of a batch.
pub async fn download_file(
    State(state): State<AppState>,
    Path((job_id, file_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let job = state.store.get(&JobId::from(job_id)).await?;
    let item = job
        .item(&FileId::from(file_id))
        .ok_or_else(|| ApiError::not_found("File not found in job"))?;

    serve_completed_item(item).await
}

/// Backward-compatible download of the first completed item in a batch.
pub async fn download_first_completed(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job = state.store.get(&JobId::from(job_id)).await?;
    let item = job
        .items
        .iter()
        .find(|i| i.status == ItemStatus::Completed)
        .ok_or_else(|| ApiError::bad_request("No completed videos"))?;

    serve_completed_item(item).await
}

async fn serve_completed_item(item: &JobItem) -> ApiResult<Response> {
    if item.status != ItemStatus::Completed {
        return Err(ApiError::bad_request("Video not ready"));
    }
    let result_path = item
        .result_path
        .as_ref()
        .ok_or_else(|| ApiError::bad_request("Video not ready"))?;

    let request = Request::builder()
        .body(Body::empty())
        .map_err(|e| ApiError::internal(format!("Failed to build file request: {e}")))?;
    let response = ServeFile::new(result_path)
        .oneshot(request)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to serve file: {e}")))?;

    let mut response = response.map(Body::new);
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"highlight_{}\"",
        item.filename
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, disposition);

    Ok(response)
}

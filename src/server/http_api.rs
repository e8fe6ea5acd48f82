//! HTTP API for the image dispatch service.
//!
//! Five endpoints, matching the contract the broker exposes to requestors
//! and workers:
//!
//! - `POST /request` — submit (or upsert) a prompt, returns a `task_id`.
//! - `GET /task` — claim the oldest pending task.
//! - `POST /complete/{task_id}` — upload the generated image, multipart field `image`.
//! - `GET /reset/{task_id}` — return a task to `pending`.
//! - `GET /download/{task_id}` — fetch the stored artifact.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    app_state::AppState,
    artifact::MEDIA_TYPE,
    error::AppError,
    storage::{
        task::{validate_scalar_map, TASK_ID_KEY},
        ExtraArgs, TaskStatus,
    },
};

#[derive(Deserialize)]
pub struct SubmitRequest {
    prompt: String,
    #[serde(default)]
    extra_args: serde_json::Map<String, Value>,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    task_id: String,
}

#[derive(Serialize)]
pub struct TaskPayload {
    task_id: String,
    prompt: String,
    extra_args: serde_json::Map<String, Value>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    message: String,
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/request", post(submit))
        .route("/task", get(claim))
        .route("/complete/:task_id", post(complete))
        .route("/reset/:task_id", get(reset))
        .route("/download/:task_id", get(download))
        .with_state(app_state)
}

async fn root() -> &'static str {
    "image dispatch server"
}

/// Pull the reserved `task_id` key out of a caller-supplied `extra_args` map,
/// if present. Must be a string; any other scalar is rejected rather than
/// silently coerced, since it becomes a row's primary identity.
fn extract_task_id(extra_args: &mut serde_json::Map<String, Value>) -> Result<Option<String>, AppError> {
    match extra_args.remove(TASK_ID_KEY) {
        None => Ok(None),
        Some(Value::String(id)) => Ok(Some(id)),
        Some(other) => Err(AppError::BadRequest(format!(
            "extra_args.task_id must be a string, got {other}"
        ))),
    }
}

async fn submit(
    State(state): State<Arc<AppState>>,
    Json(mut request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    if request.prompt.trim().is_empty() {
        return Err(AppError::BadRequest("prompt must not be empty".to_string()));
    }
    validate_scalar_map(&request.extra_args)?;

    let task_id = extract_task_id(&mut request.extra_args)?;
    let extra_args: ExtraArgs = request.extra_args.into_iter().collect();

    let task_id = state.store.submit(task_id, request.prompt, extra_args)?;

    Ok(Json(SubmitResponse { task_id }))
}

async fn claim(State(state): State<Arc<AppState>>) -> Result<Json<TaskPayload>, AppError> {
    let task = state.store.claim_next()?.ok_or(AppError::NoWork)?;

    Ok(Json(TaskPayload {
        task_id: task.task_id,
        prompt: task.prompt,
        extra_args: task.extra_args.into_iter().collect(),
    }))
}

async fn complete(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>, AppError> {
    let task = state
        .store
        .fetch(&task_id)?
        .ok_or_else(|| AppError::NotFound(format!("no task with id {task_id}")))?;

    if task.status != TaskStatus::Processing {
        return Err(AppError::BadState(format!(
            "task {task_id} is not in the processing state"
        )));
    }

    let mut image_bytes: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart upload: {e}")))?
    {
        if field.name() == Some("image") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("could not read uploaded image: {e}")))?;
            image_bytes = Some(bytes.to_vec());
        }
    }
    let image_bytes = image_bytes
        .ok_or_else(|| AppError::BadRequest("missing multipart field 'image'".to_string()))?;

    let image_path = state.artifacts.put(&task_id, &image_bytes).await?;
    state.store.mark_completed(&task_id, image_path)?;

    Ok(Json(MessageResponse {
        message: "Task completed successfully".to_string(),
    }))
}

async fn reset(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.store.reset(&task_id)?;

    Ok(Json(MessageResponse {
        message: "Task reset to pending".to_string(),
    }))
}

async fn download(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Response, AppError> {
    let task = state
        .store
        .fetch(&task_id)?
        .ok_or_else(|| AppError::NotFound(format!("no task with id {task_id}")))?;

    if task.status != TaskStatus::Completed {
        return Err(AppError::NotFound(format!("task {task_id} is not completed")));
    }

    let bytes = state
        .artifacts
        .get(&task_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("artifact missing for task {task_id}")))?;

    Ok(([(header::CONTENT_TYPE, MEDIA_TYPE)], bytes).into_response())
}

//! Request handlers.
//!
//! `submit_task` only validates and enqueues; delivery happens on the worker
//! pool, so the response never waits on the remote worker.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use enact_core::app::{PoolCounts, SubmitError};
use enact_core::domain::{StatusRecord, Task, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::app::AppState;
use crate::errors::{
    ApiError, INVALID_JSON, INVALID_TASK, NOT_FOUND, QUEUE_FULL, SHUTTING_DOWN, STORE_UNAVAILABLE,
};

/// Incoming task body. Fields besides `id` travel to the worker untouched.
#[derive(Debug, Deserialize)]
pub struct SubmitTask {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Accepted {
    pub id: String,
    pub status: String,
}

pub async fn submit_task(
    State(state): State<AppState>,
    uri: Uri,
    body: Bytes,
) -> Result<(StatusCode, Json<Accepted>), ApiError> {
    let path = uri.path();
    let reject = |status, err, detail: String| {
        ApiError::new(status, err, detail, path, state.ids.generate_error_id())
    };

    let dto: SubmitTask = serde_json::from_slice(&body)
        .map_err(|e| reject(StatusCode::BAD_REQUEST, INVALID_JSON, e.to_string()))?;
    let id = TaskId::parse(dto.id)
        .map_err(|e| reject(StatusCode::BAD_REQUEST, INVALID_TASK, e.to_string()))?;

    let task = Task::new(id.clone(), dto.extra);
    state.submitter.submit(task).map_err(|e| {
        let err = match e {
            SubmitError::QueueFull { .. } => QUEUE_FULL,
            SubmitError::ShuttingDown => SHUTTING_DOWN,
        };
        reject(StatusCode::SERVICE_UNAVAILABLE, err, e.to_string())
    })?;

    debug!(task_id = %id, "task accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(Accepted {
            id: id.into_inner(),
            status: "accepted".to_string(),
        }),
    ))
}

pub async fn get_status(
    State(state): State<AppState>,
    uri: Uri,
    Path(raw_id): Path<String>,
) -> Result<Json<StatusRecord>, ApiError> {
    let path = uri.path();
    let not_found = |detail: String| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            NOT_FOUND,
            detail,
            path,
            state.ids.generate_error_id(),
        )
    };

    let id = TaskId::parse(raw_id).map_err(|e| not_found(e.to_string()))?;
    match state.store.get(&id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(not_found(format!("task {id}"))),
        Err(e) => Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            STORE_UNAVAILABLE,
            e,
            path,
            state.ids.generate_error_id(),
        )),
    }
}

pub async fn healthz(State(state): State<AppState>) -> Json<PoolCounts> {
    Json(state.submitter.counts())
}

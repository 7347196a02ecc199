//! Consistent error responses for the ingress API.
//!
//! Every error carries a correlation id, returned both in the body and in the
//! `X-Errid` header, and logged together with the request path.

use axum::Json;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use enact_core::domain::ErrorId;
use serde::Serialize;
use tracing::warn;

pub const ERRID_HEADER: HeaderName = HeaderName::from_static("x-errid");

pub const INVALID_JSON: &str = "bad request body, invalid json object";
pub const INVALID_TASK: &str = "bad request body, task is invalid";
pub const QUEUE_FULL: &str = "dispatch queue is full, retry later";
pub const SHUTTING_DOWN: &str = "service is shutting down";
pub const NOT_FOUND: &str = "no terminal status recorded for task";
pub const STORE_UNAVAILABLE: &str = "status store unavailable";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub err: &'static str,
    pub err_id: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    err: &'static str,
    err_id: ErrorId,
}

impl ApiError {
    /// Build the response and log it. `detail` stays in the log only.
    pub fn new(
        status: StatusCode,
        err: &'static str,
        detail: impl std::fmt::Display,
        path: &str,
        err_id: ErrorId,
    ) -> Self {
        warn!(
            path,
            code = status.as_u16(),
            err,
            detail = %detail,
            err_id = %err_id,
            "request rejected"
        );
        Self {
            status,
            err,
            err_id,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err_id = self.err_id.to_string();
        let mut response = (
            self.status,
            Json(ErrorBody {
                err: self.err,
                err_id: err_id.clone(),
            }),
        )
            .into_response();
        if let Ok(value) = HeaderValue::from_str(&err_id) {
            response.headers_mut().insert(ERRID_HEADER, value);
        }
        response
    }
}

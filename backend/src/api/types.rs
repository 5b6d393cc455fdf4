//! REST API types and error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{PipelineError, ServerError};
use crate::transform::pipeline::StatementPreview;

/// Response to `POST /api/inspect`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectResponse {
    pub job_id: String,

    /// "ready" when every required column resolved, "warning" otherwise
    pub status: String,

    pub preview: StatementPreview,
}

impl From<StatementPreview> for InspectResponse {
    fn from(preview: StatementPreview) -> Self {
        InspectResponse {
            job_id: Uuid::new_v4().to_string(),
            status: if preview.roles.is_some() { "ready" } else { "warning" }.to_string(),
            preview,
        }
    }
}

/// Create an error response body
pub fn error_response(error: &str, available_columns: &[String]) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "availableColumns": available_columns,
    })
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Pipeline(e) => match e {
                PipelineError::Format(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                PipelineError::Schema(_) | PipelineError::NoClaims { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PipelineError::Archive(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn available_columns(&self) -> &[String] {
        match self {
            ServerError::Pipeline(PipelineError::Schema(e)) => e.available_columns(),
            _ => &[],
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = error_response(&self.to_string(), self.available_columns());
        (self.status_code(), Json(body)).into_response()
    }
}

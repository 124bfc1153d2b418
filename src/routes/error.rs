use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::roster::{LifecycleError, PipelineError, ProvisionError};

/// Body of every non-2xx response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<Uuid>,
    pub retryable: bool,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

pub fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::FileNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::FileBusy(_) => StatusCode::CONFLICT,
        PipelineError::Lifecycle(e) => match e {
            LifecycleError::FileNotFound(_) => StatusCode::NOT_FOUND,
            LifecycleError::IllegalTransition { .. }
            | LifecycleError::FileBusy(_)
            | LifecycleError::StatusChanged { .. }
            | LifecycleError::LeaseLost(_) => StatusCode::CONFLICT,
            LifecycleError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
        },
        PipelineError::Decode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::Provision {
            source: ProvisionError::Lease(_),
            ..
        } => StatusCode::CONFLICT,
        PipelineError::Provision { .. }
        | PipelineError::Reconcile(_)
        | PipelineError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "bad_request".to_string(),
                    message,
                    file_id: None,
                    retryable: false,
                },
            ),
            ApiError::Pipeline(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    tracing::error!(error = %e, kind = e.kind(), "roster request failed");
                }
                (
                    status,
                    ErrorBody {
                        error: e.kind().to_string(),
                        message: e.to_string(),
                        file_id: e.file_id(),
                        retryable: e.is_retryable(),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        ApiError::Pipeline(self).into_response()
    }
}

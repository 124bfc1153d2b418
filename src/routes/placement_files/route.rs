use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::app::AppState;
use crate::roster::ProcessOutcome;
use crate::routes::error::{ApiError, ErrorBody};
use crate::routes::placement_files::dto::{
    FileReportResponse, FileStatusResponse, RejectFileRequest,
};

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/placement-files/{file_id}/approve",
            post(approve_file),
        )
        .route("/api/v1/placement-files/{file_id}/reject", post(reject_file))
        .route(
            "/api/v1/placement-files/{file_id}/process",
            post(process_file),
        )
        .route("/api/v1/placement-files/{file_id}/report", get(file_report))
}

#[utoipa::path(
    post,
    path = "/api/v1/placement-files/{file_id}/approve",
    params(
        ("file_id" = Uuid, Path, description = "Uploaded roster file ID")
    ),
    responses(
        (status = 200, description = "File approved", body = FileStatusResponse),
        (status = 404, description = "File not found", body = ErrorBody),
        (status = 409, description = "File is not pending or is being processed", body = ErrorBody),
    ),
    tag = "Placement Files"
)]
pub async fn approve_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> Result<(StatusCode, Json<FileStatusResponse>), ApiError> {
    let file = state.pipeline.approve(file_id).await?;
    Ok((StatusCode::OK, Json(file.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/placement-files/{file_id}/reject",
    params(
        ("file_id" = Uuid, Path, description = "Uploaded roster file ID")
    ),
    request_body = RejectFileRequest,
    responses(
        (status = 200, description = "File rejected", body = FileStatusResponse),
        (status = 400, description = "Missing rejection reason", body = ErrorBody),
        (status = 404, description = "File not found", body = ErrorBody),
        (status = 409, description = "File is not pending", body = ErrorBody),
    ),
    tag = "Placement Files"
)]
pub async fn reject_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    Json(payload): Json<RejectFileRequest>,
) -> Result<(StatusCode, Json<FileStatusResponse>), ApiError> {
    let reason = payload.reason.trim();
    if reason.is_empty() {
        return Err(ApiError::BadRequest("reason must not be empty".to_string()));
    }

    let file = state.pipeline.reject(file_id, reason).await?;
    Ok((StatusCode::OK, Json(file.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/placement-files/{file_id}/process",
    params(
        ("file_id" = Uuid, Path, description = "Uploaded roster file ID")
    ),
    responses(
        (status = 200, description = "Roster provisioned", body = ProcessOutcome),
        (status = 404, description = "File not found", body = ErrorBody),
        (status = 409, description = "File busy or not approved", body = ErrorBody),
        (status = 422, description = "File could not be decoded", body = ErrorBody),
        (status = 503, description = "Storage or hashing backend unavailable", body = ErrorBody),
    ),
    tag = "Placement Files"
)]
pub async fn process_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ProcessOutcome>), ApiError> {
    let outcome = state.pipeline.process_file(file_id).await?;
    Ok((StatusCode::OK, Json(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/v1/placement-files/{file_id}/report",
    params(
        ("file_id" = Uuid, Path, description = "Uploaded roster file ID")
    ),
    responses(
        (status = 200, description = "Report of the last processing pass", body = FileReportResponse),
        (status = 404, description = "File not found", body = ErrorBody),
    ),
    tag = "Placement Files"
)]
pub async fn file_report(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> Result<(StatusCode, Json<FileReportResponse>), ApiError> {
    let report = state.pipeline.last_report(file_id).await?;
    Ok((StatusCode::OK, Json(FileReportResponse { file_id, report })))
}

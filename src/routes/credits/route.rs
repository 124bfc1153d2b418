use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::app::AppState;
use crate::roster::ReconcileReport;
use crate::routes::credits::dto::ReconcileRequest;
use crate::routes::error::{ApiError, ErrorBody};

pub fn create_route() -> Router<AppState> {
    Router::new().route("/api/v1/credits/reconcile", post(reconcile_credits))
}

#[utoipa::path(
    post,
    path = "/api/v1/credits/reconcile",
    request_body = ReconcileRequest,
    responses(
        (status = 200, description = "Credits repaired", body = ReconcileReport),
        (status = 400, description = "Scope is missing its id", body = ErrorBody),
        (status = 404, description = "File not found", body = ErrorBody),
        (status = 409, description = "File is being processed", body = ErrorBody),
    ),
    tag = "Credits"
)]
pub async fn reconcile_credits(
    State(state): State<AppState>,
    Json(payload): Json<ReconcileRequest>,
) -> Result<(StatusCode, Json<ReconcileReport>), ApiError> {
    let scope = payload.into_scope().map_err(ApiError::BadRequest)?;
    let report = state.pipeline.reconcile_credits(scope).await?;
    Ok((StatusCode::OK, Json(report)))
}

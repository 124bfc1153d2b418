use utoipa::OpenApi;

use crate::entities::sea_orm_active_enums::FileStatus;
use crate::roster::normalizer::{RejectReason, Rejection};
use crate::roster::provisioner::{ProvisionReport, RowError, SkipReason, SkippedRow};
use crate::roster::{FileReport, IssuedPassword, ProcessOutcome, ReconcileReport};
use crate::routes::credits::dto::{ReconcileRequest, ScopeKind};
use crate::routes::error::ErrorBody;
use crate::routes::health::route::HealthResponse;
use crate::routes::placement_files::dto::{
    FileReportResponse, FileStatusResponse, RejectFileRequest,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::route::health,
        crate::routes::placement_files::route::approve_file,
        crate::routes::placement_files::route::reject_file,
        crate::routes::placement_files::route::process_file,
        crate::routes::placement_files::route::file_report,
        crate::routes::credits::route::reconcile_credits,
    ),
    components(schemas(
        ErrorBody,
        HealthResponse,
        FileStatus,
        RejectFileRequest,
        FileStatusResponse,
        FileReportResponse,
        FileReport,
        ProcessOutcome,
        IssuedPassword,
        ProvisionReport,
        SkipReason,
        SkippedRow,
        RowError,
        Rejection,
        RejectReason,
        ReconcileRequest,
        ScopeKind,
        ReconcileReport,
    )),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Placement Files", description = "Review and provisioning of uploaded placement rosters"),
        (name = "Credits", description = "Candidate credit repair"),
    ),
    info(
        title = "Placement Roster API",
        description = "Roster ingestion and candidate provisioning for placement officers",
    )
)]
pub struct ApiDoc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::sea_orm_active_enums::FileStatus;
use crate::entities::uploaded_file;
use crate::roster::FileReport;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RejectFileRequest {
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileStatusResponse {
    pub file_id: Uuid,
    pub placement_officer_id: Uuid,
    pub file_name: String,
    pub status: FileStatus,
    pub credit_allotment: i32,
    pub rejection_reason: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
    pub rejected_at: Option<NaiveDateTime>,
    pub processed_at: Option<NaiveDateTime>,
    pub candidates_created: i32,
}

impl From<uploaded_file::Model> for FileStatusResponse {
    fn from(file: uploaded_file::Model) -> Self {
        Self {
            file_id: file.uploaded_file_id,
            placement_officer_id: file.placement_officer_id,
            file_name: file.file_name,
            status: file.status,
            credit_allotment: file.credit_allotment,
            rejection_reason: file.rejection_reason,
            approved_at: file.approved_at,
            rejected_at: file.rejected_at,
            processed_at: file.processed_at,
            candidates_created: file.candidates_created,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileReportResponse {
    pub file_id: Uuid,
    /// Absent until the file has been processed once.
    pub report: Option<FileReport>,
}

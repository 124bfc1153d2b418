//! `SeaORM` Entity for uploaded_file table
//!
//! One roster spreadsheet submitted by a placement officer. Rows are owned by
//! their officer and removed with it. The `processing_*` columns hold the
//! per-file gate lease taken while a provisioning or repair pass runs.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::FileStatus;

#[derive(Copy, Clone, Default, Debug, DeriveEntity)]
pub struct Entity;

impl EntityName for Entity {
    fn table_name(&self) -> &str {
        "uploaded_file"
    }
}

#[derive(Clone, Debug, PartialEq, DeriveModel, DeriveActiveModel, Eq, Serialize, Deserialize)]
pub struct Model {
    #[serde(skip_deserializing)]
    pub uploaded_file_id: Uuid,
    pub placement_officer_id: Uuid,
    pub file_name: String,
    pub mime_type: Option<String>,
    #[serde(skip)]
    pub content: Vec<u8>,
    pub status: FileStatus,
    pub credit_allotment: i32,
    pub rejection_reason: Option<String>,
    pub approved_at: Option<DateTime>,
    pub rejected_at: Option<DateTime>,
    pub processed_at: Option<DateTime>,
    pub candidates_created: i32,
    pub structured_data: Option<Json>,
    pub last_report: Option<Json>,
    pub processing_token: Option<Uuid>,
    pub processing_expires_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveColumn)]
pub enum Column {
    UploadedFileId,
    PlacementOfficerId,
    FileName,
    MimeType,
    Content,
    Status,
    CreditAllotment,
    RejectionReason,
    ApprovedAt,
    RejectedAt,
    ProcessedAt,
    CandidatesCreated,
    StructuredData,
    LastReport,
    ProcessingToken,
    ProcessingExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Copy, Clone, Debug, EnumIter, DerivePrimaryKey)]
pub enum PrimaryKey {
    UploadedFileId,
}

impl PrimaryKeyTrait for PrimaryKey {
    type ValueType = Uuid;
    fn auto_increment() -> bool {
        false
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    PlacementOfficer,
}

impl ColumnTrait for Column {
    type EntityName = Entity;
    fn def(&self) -> ColumnDef {
        match self {
            Self::UploadedFileId => ColumnType::Uuid.def(),
            Self::PlacementOfficerId => ColumnType::Uuid.def(),
            Self::FileName => ColumnType::String(StringLen::None).def(),
            Self::MimeType => ColumnType::String(StringLen::None).def().null(),
            Self::Content => ColumnType::Blob.def(),
            Self::Status => ColumnType::String(StringLen::N(16u32)).def(),
            Self::CreditAllotment => ColumnType::Integer.def(),
            Self::RejectionReason => ColumnType::String(StringLen::None).def().null(),
            Self::ApprovedAt => ColumnType::DateTime.def().null(),
            Self::RejectedAt => ColumnType::DateTime.def().null(),
            Self::ProcessedAt => ColumnType::DateTime.def().null(),
            Self::CandidatesCreated => ColumnType::Integer.def(),
            Self::StructuredData => ColumnType::Json.def().null(),
            Self::LastReport => ColumnType::Json.def().null(),
            Self::ProcessingToken => ColumnType::Uuid.def().null(),
            Self::ProcessingExpiresAt => ColumnType::DateTime.def().null(),
            Self::CreatedAt => ColumnType::DateTime.def(),
            Self::UpdatedAt => ColumnType::DateTime.def(),
        }
    }
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::PlacementOfficer => Entity::belongs_to(super::placement_officer::Entity)
                .from(Column::PlacementOfficerId)
                .to(super::placement_officer::Column::PlacementOfficerId)
                .into(),
        }
    }
}

impl Related<super::placement_officer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlacementOfficer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! `SeaORM` Entity for candidate table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::RegistrationMethod;

#[derive(Copy, Clone, Default, Debug, DeriveEntity)]
pub struct Entity;

impl EntityName for Entity {
    fn table_name(&self) -> &str {
        "candidate"
    }
}

#[derive(Clone, Debug, PartialEq, DeriveModel, DeriveActiveModel, Eq, Serialize, Deserialize)]
pub struct Model {
    #[serde(skip_deserializing)]
    pub candidate_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub college_name: Option<String>,
    pub phone: Option<String>,
    pub course: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub credits: i32,
    pub registration_method: RegistrationMethod,
    /// Set iff `registration_method` is `Placement`.
    pub placement_id: Option<Uuid>,
    pub source_file_id: Option<Uuid>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveColumn)]
pub enum Column {
    CandidateId,
    Email,
    FullName,
    CollegeName,
    Phone,
    Course,
    PasswordHash,
    Credits,
    RegistrationMethod,
    PlacementId,
    SourceFileId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Copy, Clone, Debug, EnumIter, DerivePrimaryKey)]
pub enum PrimaryKey {
    CandidateId,
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
    UploadedFile,
}

impl ColumnTrait for Column {
    type EntityName = Entity;
    fn def(&self) -> ColumnDef {
        match self {
            Self::CandidateId => ColumnType::Uuid.def(),
            Self::Email => ColumnType::String(StringLen::None).def().unique(),
            Self::FullName => ColumnType::String(StringLen::None).def(),
            Self::CollegeName => ColumnType::String(StringLen::None).def().null(),
            Self::Phone => ColumnType::String(StringLen::N(32u32)).def().null(),
            Self::Course => ColumnType::String(StringLen::None).def().null(),
            Self::PasswordHash => ColumnType::String(StringLen::None).def(),
            Self::Credits => ColumnType::Integer.def(),
            Self::RegistrationMethod => ColumnType::String(StringLen::N(16u32)).def(),
            Self::PlacementId => ColumnType::Uuid.def().null(),
            Self::SourceFileId => ColumnType::Uuid.def().null(),
            Self::CreatedAt => ColumnType::DateTime.def(),
            Self::UpdatedAt => ColumnType::DateTime.def(),
        }
    }
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::PlacementOfficer => Entity::belongs_to(super::placement_officer::Entity)
                .from(Column::PlacementId)
                .to(super::placement_officer::Column::PlacementOfficerId)
                .into(),
            Self::UploadedFile => Entity::belongs_to(super::uploaded_file::Entity)
                .from(Column::SourceFileId)
                .to(super::uploaded_file::Column::UploadedFileId)
                .into(),
        }
    }
}

impl Related<super::placement_officer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlacementOfficer.def()
    }
}

impl Related<super::uploaded_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadedFile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use placement_roster::config::PipelineSettings;
use placement_roster::entities::sea_orm_active_enums::OfficerStatus;
use placement_roster::entities::{candidate, placement_officer, uploaded_file};
use placement_roster::repositories::{
    CandidateRepository, NewUploadedFile, PlacementOfficerRepository, UploadedFileRepository,
};
use placement_roster::roster::{CredentialError, CredentialHasher, RosterPipeline};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, QueryFilter};

pub const CSV: &str = "text/csv";

/// Lowest cost bcrypt accepts.
pub const TEST_BCRYPT_COST: u32 = 4;

pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("failed to open in-memory database");
    Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");
    db
}

pub fn test_settings() -> PipelineSettings {
    PipelineSettings {
        bcrypt_cost: TEST_BCRYPT_COST,
        generated_password_length: 12,
        processing_lease: Duration::from_secs(60),
        auto_approve_uploads: false,
    }
}

pub fn pipeline(db: &DatabaseConnection) -> RosterPipeline {
    RosterPipeline::new(db.clone(), test_settings())
}

pub async fn seed_officer(db: &DatabaseConnection, email: &str) -> placement_officer::Model {
    PlacementOfficerRepository::new(db.clone())
        .create(
            "Placement Cell",
            email,
            "Government Engineering College",
            "$2b$04$officerhashofficerhashofficerhashofficerhashoff",
            OfficerStatus::Active,
        )
        .await
        .expect("failed to seed officer")
}

pub async fn seed_file(
    db: &DatabaseConnection,
    officer_id: uuid::Uuid,
    csv: &str,
    credit_allotment: i32,
) -> uploaded_file::Model {
    UploadedFileRepository::new(db.clone())
        .create(NewUploadedFile {
            placement_officer_id: officer_id,
            file_name: "roster.csv".to_string(),
            mime_type: Some(CSV.to_string()),
            content: csv.as_bytes().to_vec(),
            credit_allotment,
        })
        .await
        .expect("failed to seed file")
}

/// Seed a file and move it to `approved`.
pub async fn seed_approved_file(
    db: &DatabaseConnection,
    officer_id: uuid::Uuid,
    csv: &str,
    credit_allotment: i32,
) -> uploaded_file::Model {
    let file = seed_file(db, officer_id, csv, credit_allotment).await;
    pipeline(db)
        .approve(file.uploaded_file_id)
        .await
        .expect("failed to approve file")
}

pub async fn seed_self_registered(
    db: &DatabaseConnection,
    email: &str,
    credits: i32,
) -> candidate::Model {
    CandidateRepository::new(db.clone())
        .create_self_registered(email, "Self Signed", "$2b$04$selfhash", credits)
        .await
        .expect("failed to seed self-registered candidate")
}

pub async fn candidate_by_email(db: &DatabaseConnection, email: &str) -> candidate::Model {
    CandidateRepository::new(db.clone())
        .find_by_email(email)
        .await
        .expect("query failed")
        .unwrap_or_else(|| panic!("no candidate for {email}"))
}

pub async fn candidate_by_id(db: &DatabaseConnection, candidate_id: uuid::Uuid) -> candidate::Model {
    candidate::Entity::find_by_id(candidate_id)
        .one(db)
        .await
        .expect("query failed")
        .expect("candidate missing")
}

/// Overwrite a candidate's balance behind the pipeline's back.
pub async fn force_credits(db: &DatabaseConnection, candidate_id: uuid::Uuid, credits: i32) {
    candidate::Entity::update_many()
        .col_expr(candidate::Column::Credits, Expr::value(credits))
        .filter(candidate::Column::CandidateId.eq(candidate_id))
        .exec(db)
        .await
        .expect("failed to force credits");
}

/// Drop the source-file link, as found on rows written before files were tracked.
pub async fn clear_source_file(db: &DatabaseConnection, candidate_id: uuid::Uuid) {
    candidate::Entity::update_many()
        .col_expr(
            candidate::Column::SourceFileId,
            Expr::value(Option::<uuid::Uuid>::None),
        )
        .filter(candidate::Column::CandidateId.eq(candidate_id))
        .exec(db)
        .await
        .expect("failed to clear source file");
}

pub async fn file_by_id(db: &DatabaseConnection, file_id: uuid::Uuid) -> uploaded_file::Model {
    UploadedFileRepository::new(db.clone())
        .find_by_id(file_id)
        .await
        .expect("query failed")
        .expect("file missing")
}

/// Hasher whose backend is always down.
pub struct FailingHasher;

#[async_trait]
impl CredentialHasher for FailingHasher {
    async fn hash(&self, _plaintext: &str) -> Result<String, CredentialError> {
        Err(CredentialError::Backend("hashing service unavailable".to_string()))
    }
}

pub fn failing_pipeline(db: &DatabaseConnection) -> RosterPipeline {
    RosterPipeline::with_hasher(db.clone(), test_settings(), Arc::new(FailingHasher))
}

/// Hasher that takes `delay` per password, standing in for a high bcrypt cost.
pub struct SlowHasher {
    pub delay: Duration,
}

#[async_trait]
impl CredentialHasher for SlowHasher {
    async fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        tokio::time::sleep(self.delay).await;
        Ok(format!("$slow${plaintext}"))
    }
}

pub fn slow_pipeline(
    db: &DatabaseConnection,
    lease: Duration,
    delay: Duration,
) -> RosterPipeline {
    RosterPipeline::with_hasher(
        db.clone(),
        PipelineSettings {
            processing_lease: lease,
            ..test_settings()
        },
        Arc::new(SlowHasher { delay }),
    )
}

/// Header plus `count` distinct students.
pub fn roster_of(count: usize) -> String {
    let mut lines = vec!["Name,Email".to_string()];
    lines.extend((0..count).map(|i| format!("Student {i},student{i}@college.edu")));
    lines.join("\n")
}

pub fn two_student_roster() -> String {
    [
        "Student Name,Email Address,Phone,Course",
        "Asha Rao,asha@college.edu,9876543210,B.Tech CSE",
        "Vikram Nair,Vikram@College.edu,9876500000,B.Tech ECE",
    ]
    .join("\n")
}

use chrono::{NaiveDateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::sea_orm_active_enums::FileStatus;
use crate::entities::uploaded_file;

/// A roster as handed over by the upload collaborator.
#[derive(Debug, Clone)]
pub struct NewUploadedFile {
    pub placement_officer_id: Uuid,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub content: Vec<u8>,
    pub credit_allotment: i32,
}

/// Columns written when a processing pass commits.
#[derive(Debug, Clone)]
pub struct ProcessedBookkeeping {
    pub processed_at: NaiveDateTime,
    pub approved_at: Option<NaiveDateTime>,
    pub candidates_created: i32,
    pub structured_data: serde_json::Value,
    pub last_report: serde_json::Value,
}

#[derive(Clone)]
pub struct UploadedFileRepository {
    db: DatabaseConnection,
}

impl UploadedFileRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewUploadedFile) -> Result<uploaded_file::Model, DbErr> {
        let now = Utc::now().naive_utc();
        let model = uploaded_file::ActiveModel {
            uploaded_file_id: Set(Uuid::new_v4()),
            placement_officer_id: Set(new.placement_officer_id),
            file_name: Set(new.file_name),
            mime_type: Set(new.mime_type),
            content: Set(new.content),
            status: Set(FileStatus::Pending),
            credit_allotment: Set(new.credit_allotment),
            rejection_reason: Set(None),
            approved_at: Set(None),
            rejected_at: Set(None),
            processed_at: Set(None),
            candidates_created: Set(0),
            structured_data: Set(None),
            last_report: Set(None),
            processing_token: Set(None),
            processing_expires_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        model.insert(&self.db).await
    }

    pub async fn find_by_id(&self, file_id: Uuid) -> Result<Option<uploaded_file::Model>, DbErr> {
        uploaded_file::Entity::find_by_id(file_id).one(&self.db).await
    }

    pub async fn find_by_ids(&self, file_ids: &[Uuid]) -> Result<Vec<uploaded_file::Model>, DbErr> {
        if file_ids.is_empty() {
            return Ok(Vec::new());
        }
        uploaded_file::Entity::find()
            .filter(uploaded_file::Column::UploadedFileId.is_in(file_ids.iter().copied()))
            .all(&self.db)
            .await
    }

    /// The officer's most recently processed file.
    pub async fn latest_processed_for_officer(
        &self,
        placement_officer_id: Uuid,
    ) -> Result<Option<uploaded_file::Model>, DbErr> {
        uploaded_file::Entity::find()
            .filter(uploaded_file::Column::PlacementOfficerId.eq(placement_officer_id))
            .filter(uploaded_file::Column::Status.eq(FileStatus::Processed))
            .filter(uploaded_file::Column::ProcessedAt.is_not_null())
            .order_by_desc(uploaded_file::Column::ProcessedAt)
            .order_by_desc(uploaded_file::Column::CreatedAt)
            .one(&self.db)
            .await
    }

    /// Processed files, optionally narrowed to one officer.
    pub async fn find_processed(
        &self,
        placement_officer_id: Option<Uuid>,
    ) -> Result<Vec<uploaded_file::Model>, DbErr> {
        let mut query = uploaded_file::Entity::find()
            .filter(uploaded_file::Column::Status.eq(FileStatus::Processed));

        if let Some(placement_officer_id) = placement_officer_id {
            query = query.filter(uploaded_file::Column::PlacementOfficerId.eq(placement_officer_id));
        }

        query
            .order_by_asc(uploaded_file::Column::CreatedAt)
            .all(&self.db)
            .await
    }

    /// Take the processing lease if it is free or expired and the file is in one of `statuses`.
    pub async fn try_acquire_lease(
        &self,
        file_id: Uuid,
        statuses: &[FileStatus],
        token: Uuid,
        now: NaiveDateTime,
        expires_at: NaiveDateTime,
    ) -> Result<bool, DbErr> {
        let result = uploaded_file::Entity::update_many()
            .col_expr(
                uploaded_file::Column::ProcessingToken,
                Expr::value(Some(token)),
            )
            .col_expr(
                uploaded_file::Column::ProcessingExpiresAt,
                Expr::value(Some(expires_at)),
            )
            .filter(uploaded_file::Column::UploadedFileId.eq(file_id))
            .filter(uploaded_file::Column::Status.is_in(statuses.iter().copied()))
            .filter(lease_is_free(now))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Push the lease deadline out. Only the current holder can extend it.
    pub async fn extend_lease(
        &self,
        file_id: Uuid,
        token: Uuid,
        expires_at: NaiveDateTime,
    ) -> Result<bool, DbErr> {
        let result = uploaded_file::Entity::update_many()
            .col_expr(
                uploaded_file::Column::ProcessingExpiresAt,
                Expr::value(Some(expires_at)),
            )
            .filter(uploaded_file::Column::UploadedFileId.eq(file_id))
            .filter(uploaded_file::Column::ProcessingToken.eq(token))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Give the lease back. A token that no longer holds the lease is a no-op.
    pub async fn release_lease(&self, file_id: Uuid, token: Uuid) -> Result<bool, DbErr> {
        let result = uploaded_file::Entity::update_many()
            .col_expr(
                uploaded_file::Column::ProcessingToken,
                Expr::value(Option::<Uuid>::None),
            )
            .col_expr(
                uploaded_file::Column::ProcessingExpiresAt,
                Expr::value(Option::<NaiveDateTime>::None),
            )
            .filter(uploaded_file::Column::UploadedFileId.eq(file_id))
            .filter(uploaded_file::Column::ProcessingToken.eq(token))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// `pending → approved`, compare-and-swap on the status column. Refused while a pass holds the lease.
    pub async fn mark_approved(&self, file_id: Uuid, now: NaiveDateTime) -> Result<bool, DbErr> {
        let result = uploaded_file::Entity::update_many()
            .col_expr(
                uploaded_file::Column::Status,
                Expr::value(FileStatus::Approved),
            )
            .col_expr(uploaded_file::Column::ApprovedAt, Expr::value(Some(now)))
            .col_expr(uploaded_file::Column::UpdatedAt, Expr::value(now))
            .filter(uploaded_file::Column::UploadedFileId.eq(file_id))
            .filter(uploaded_file::Column::Status.eq(FileStatus::Pending))
            .filter(lease_is_free(now))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// `pending → rejected`. Refused while a pass holds the lease.
    pub async fn mark_rejected(
        &self,
        file_id: Uuid,
        reason: &str,
        now: NaiveDateTime,
    ) -> Result<bool, DbErr> {
        let result = uploaded_file::Entity::update_many()
            .col_expr(
                uploaded_file::Column::Status,
                Expr::value(FileStatus::Rejected),
            )
            .col_expr(
                uploaded_file::Column::RejectionReason,
                Expr::value(Some(reason.to_string())),
            )
            .col_expr(uploaded_file::Column::RejectedAt, Expr::value(Some(now)))
            .col_expr(uploaded_file::Column::UpdatedAt, Expr::value(now))
            .filter(uploaded_file::Column::UploadedFileId.eq(file_id))
            .filter(uploaded_file::Column::Status.eq(FileStatus::Pending))
            .filter(lease_is_free(now))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Overwrite `candidates_created` while holding the lease.
    pub async fn set_candidates_created<C: ConnectionTrait>(
        conn: &C,
        file_id: Uuid,
        token: Uuid,
        candidates_created: i32,
    ) -> Result<bool, DbErr> {
        let result = uploaded_file::Entity::update_many()
            .col_expr(
                uploaded_file::Column::CandidatesCreated,
                Expr::value(candidates_created),
            )
            .col_expr(
                uploaded_file::Column::UpdatedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(uploaded_file::Column::UploadedFileId.eq(file_id))
            .filter(uploaded_file::Column::ProcessingToken.eq(token))
            .exec(conn)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Commit a processing pass: status, bookkeeping and lease release in one statement,
    /// guarded by the lease token and the status the pass was admitted from.
    pub async fn mark_processed<C: ConnectionTrait>(
        conn: &C,
        file_id: Uuid,
        token: Uuid,
        expected: FileStatus,
        bookkeeping: ProcessedBookkeeping,
    ) -> Result<bool, DbErr> {
        let mut update = uploaded_file::Entity::update_many()
            .col_expr(
                uploaded_file::Column::Status,
                Expr::value(FileStatus::Processed),
            )
            .col_expr(
                uploaded_file::Column::ProcessedAt,
                Expr::value(Some(bookkeeping.processed_at)),
            )
            .col_expr(
                uploaded_file::Column::CandidatesCreated,
                Expr::value(bookkeeping.candidates_created),
            )
            .col_expr(
                uploaded_file::Column::StructuredData,
                Expr::value(Some(bookkeeping.structured_data)),
            )
            .col_expr(
                uploaded_file::Column::LastReport,
                Expr::value(Some(bookkeeping.last_report)),
            )
            .col_expr(
                uploaded_file::Column::ProcessingToken,
                Expr::value(Option::<Uuid>::None),
            )
            .col_expr(
                uploaded_file::Column::ProcessingExpiresAt,
                Expr::value(Option::<NaiveDateTime>::None),
            )
            .col_expr(
                uploaded_file::Column::UpdatedAt,
                Expr::value(bookkeeping.processed_at),
            );

        if let Some(approved_at) = bookkeeping.approved_at {
            update = update.col_expr(
                uploaded_file::Column::ApprovedAt,
                Expr::value(Some(approved_at)),
            );
        }

        let result = update
            .filter(uploaded_file::Column::UploadedFileId.eq(file_id))
            .filter(uploaded_file::Column::ProcessingToken.eq(token))
            .filter(uploaded_file::Column::Status.eq(expected))
            .exec(conn)
            .await?;

        Ok(result.rows_affected == 1)
    }
}

fn lease_is_free(now: NaiveDateTime) -> Condition {
    Condition::any()
        .add(uploaded_file::Column::ProcessingToken.is_null())
        .add(uploaded_file::Column::ProcessingExpiresAt.is_null())
        .add(uploaded_file::Column::ProcessingExpiresAt.lt(now))
}

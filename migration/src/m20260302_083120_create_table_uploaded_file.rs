use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UploadedFile::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UploadedFile::UploadedFileId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UploadedFile::PlacementOfficerId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UploadedFile::FileName).string().not_null())
                    .col(ColumnDef::new(UploadedFile::MimeType).string().null())
                    .col(ColumnDef::new(UploadedFile::Content).blob().not_null())
                    .col(
                        ColumnDef::new(UploadedFile::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(UploadedFile::CreditAllotment)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(UploadedFile::RejectionReason).string().null())
                    .col(ColumnDef::new(UploadedFile::ApprovedAt).timestamp().null())
                    .col(ColumnDef::new(UploadedFile::RejectedAt).timestamp().null())
                    .col(ColumnDef::new(UploadedFile::ProcessedAt).timestamp().null())
                    .col(
                        ColumnDef::new(UploadedFile::CandidatesCreated)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(UploadedFile::StructuredData).json().null())
                    .col(ColumnDef::new(UploadedFile::LastReport).json().null())
                    .col(ColumnDef::new(UploadedFile::ProcessingToken).uuid().null())
                    .col(
                        ColumnDef::new(UploadedFile::ProcessingExpiresAt)
                            .timestamp()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UploadedFile::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UploadedFile::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_uploaded_file_placement_officer")
                            .from_tbl(UploadedFile::Table)
                            .from_col(UploadedFile::PlacementOfficerId)
                            .to_tbl(PlacementOfficer::Table)
                            .to_col(PlacementOfficer::PlacementOfficerId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_uploaded_file_placement_officer_id")
                    .table(UploadedFile::Table)
                    .col(UploadedFile::PlacementOfficerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_uploaded_file_placement_officer_id")
                    .table(UploadedFile::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(UploadedFile::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UploadedFile {
    Table,
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

#[derive(DeriveIden)]
enum PlacementOfficer {
    Table,
    PlacementOfficerId,
}

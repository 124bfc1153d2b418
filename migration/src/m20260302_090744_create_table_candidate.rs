use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Candidate::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Candidate::CandidateId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Candidate::Email).string().not_null())
                    .col(ColumnDef::new(Candidate::FullName).string().not_null())
                    .col(ColumnDef::new(Candidate::CollegeName).string().null())
                    .col(ColumnDef::new(Candidate::Phone).string_len(32).null())
                    .col(ColumnDef::new(Candidate::Course).string().null())
                    .col(ColumnDef::new(Candidate::PasswordHash).string().not_null())
                    .col(
                        ColumnDef::new(Candidate::Credits)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Candidate::RegistrationMethod)
                            .string_len(16)
                            .not_null()
                            .default("self_registered"),
                    )
                    .col(ColumnDef::new(Candidate::PlacementId).uuid().null())
                    .col(ColumnDef::new(Candidate::SourceFileId).uuid().null())
                    .col(ColumnDef::new(Candidate::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Candidate::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_candidate_placement_officer")
                            .from_tbl(Candidate::Table)
                            .from_col(Candidate::PlacementId)
                            .to_tbl(PlacementOfficer::Table)
                            .to_col(PlacementOfficer::PlacementOfficerId)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_candidate_uploaded_file")
                            .from_tbl(Candidate::Table)
                            .from_col(Candidate::SourceFileId)
                            .to_tbl(UploadedFile::Table)
                            .to_col(UploadedFile::UploadedFileId)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Upsert-by-email relies on this index for ON CONFLICT.
        manager
            .create_index(
                Index::create()
                    .name("idx_candidate_email")
                    .table(Candidate::Table)
                    .col(Candidate::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_candidate_placement_id")
                    .table(Candidate::Table)
                    .col(Candidate::PlacementId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_candidate_source_file_id")
                    .table(Candidate::Table)
                    .col(Candidate::SourceFileId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for index in [
            "idx_candidate_source_file_id",
            "idx_candidate_placement_id",
            "idx_candidate_email",
        ] {
            manager
                .drop_index(Index::drop().name(index).table(Candidate::Table).to_owned())
                .await?;
        }

        manager
            .drop_table(Table::drop().table(Candidate::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Candidate {
    Table,
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

#[derive(DeriveIden)]
enum PlacementOfficer {
    Table,
    PlacementOfficerId,
}

#[derive(DeriveIden)]
enum UploadedFile {
    Table,
    UploadedFileId,
}

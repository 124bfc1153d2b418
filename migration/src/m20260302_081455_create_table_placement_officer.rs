use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PlacementOfficer::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlacementOfficer::PlacementOfficerId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PlacementOfficer::Name).string().not_null())
                    .col(
                        ColumnDef::new(PlacementOfficer::Email)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(PlacementOfficer::CollegeName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlacementOfficer::PasswordHash)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlacementOfficer::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(PlacementOfficer::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlacementOfficer::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PlacementOfficer::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PlacementOfficer {
    Table,
    PlacementOfficerId,
    Name,
    Email,
    CollegeName,
    PasswordHash,
    Status,
    CreatedAt,
    UpdatedAt,
}

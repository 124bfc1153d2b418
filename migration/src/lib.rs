pub use sea_orm_migration::prelude::*;

mod m20260302_081455_create_table_placement_officer;
mod m20260302_083120_create_table_uploaded_file;
mod m20260302_090744_create_table_candidate;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260302_081455_create_table_placement_officer::Migration),
            Box::new(m20260302_083120_create_table_uploaded_file::Migration),
            Box::new(m20260302_090744_create_table_candidate::Migration),
        ]
    }
}

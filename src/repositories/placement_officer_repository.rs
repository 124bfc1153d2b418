use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use uuid::Uuid;

use crate::entities::placement_officer;
use crate::entities::sea_orm_active_enums::OfficerStatus;

#[derive(Clone)]
pub struct PlacementOfficerRepository {
    db: DatabaseConnection,
}

impl PlacementOfficerRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(
        &self,
        placement_officer_id: Uuid,
    ) -> Result<Option<placement_officer::Model>, DbErr> {
        placement_officer::Entity::find_by_id(placement_officer_id)
            .one(&self.db)
            .await
    }

    pub async fn create(
        &self,
        name: &str,
        email: &str,
        college_name: &str,
        password_hash: &str,
        status: OfficerStatus,
    ) -> Result<placement_officer::Model, DbErr> {
        let now = Utc::now().naive_utc();
        let model = placement_officer::ActiveModel {
            placement_officer_id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(email.to_lowercase()),
            college_name: Set(college_name.to_string()),
            password_hash: Set(password_hash.to_string()),
            status: Set(status),
            created_at: Set(now),
            updated_at: Set(now),
        };

        model.insert(&self.db).await
    }
}

use chrono::{NaiveDateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::candidate;
use crate::entities::sea_orm_active_enums::RegistrationMethod;

/// Placement link and credit balance written onto a candidate by a roster pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementLink {
    pub placement_id: Uuid,
    pub source_file_id: Uuid,
    pub credits: i32,
}

/// Profile fields for a candidate that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewPlacementCandidate {
    pub email: String,
    pub full_name: String,
    pub college_name: Option<String>,
    pub phone: Option<String>,
    pub course: Option<String>,
    pub password_hash: String,
    pub link: PlacementLink,
}

/// The link a credit correction expects to still find on a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CreditSource {
    /// Provisioned by this file.
    File(Uuid),
    /// Written before files were tracked; only the officer is known.
    Unsourced { placement_id: Uuid },
}

impl CreditSource {
    fn condition(&self) -> Condition {
        match self {
            CreditSource::File(file_id) => {
                Condition::all().add(candidate::Column::SourceFileId.eq(*file_id))
            }
            CreditSource::Unsourced { placement_id } => Condition::all()
                .add(candidate::Column::SourceFileId.is_null())
                .add(candidate::Column::PlacementId.eq(*placement_id)),
        }
    }
}

#[derive(Clone)]
pub struct CandidateRepository {
    db: DatabaseConnection,
}

impl CandidateRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn get_connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<candidate::Model>, DbErr> {
        candidate::Entity::find()
            .filter(candidate::Column::Email.eq(email))
            .one(&self.db)
            .await
    }

    /// Re-link an existing placement candidate in one statement.
    ///
    /// Self-registered rows never match. Returns the number of rows touched (0 or 1).
    pub async fn relink_placement_candidate(
        &self,
        email: &str,
        link: &PlacementLink,
    ) -> Result<u64, DbErr> {
        let result = candidate::Entity::update_many()
            .col_expr(
                candidate::Column::PlacementId,
                Expr::value(Some(link.placement_id)),
            )
            .col_expr(
                candidate::Column::SourceFileId,
                Expr::value(Some(link.source_file_id)),
            )
            .col_expr(candidate::Column::Credits, Expr::value(link.credits))
            .col_expr(candidate::Column::UpdatedAt, Expr::value(now()))
            .filter(candidate::Column::Email.eq(email))
            .filter(candidate::Column::RegistrationMethod.eq(RegistrationMethod::Placement))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }

    /// Insert a placement candidate unless the email is already taken.
    ///
    /// Returns `false` when another writer owns the email.
    pub async fn insert_if_absent(&self, new: NewPlacementCandidate) -> Result<bool, DbErr> {
        let now = now();
        let model = candidate::ActiveModel {
            candidate_id: Set(Uuid::new_v4()),
            email: Set(new.email),
            full_name: Set(new.full_name),
            college_name: Set(new.college_name),
            phone: Set(new.phone),
            course: Set(new.course),
            password_hash: Set(new.password_hash),
            credits: Set(new.link.credits),
            registration_method: Set(RegistrationMethod::Placement),
            placement_id: Set(Some(new.link.placement_id)),
            source_file_id: Set(Some(new.link.source_file_id)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = candidate::Entity::insert(model)
            .on_conflict(
                OnConflict::column(candidate::Column::Email)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(inserted == 1)
    }

    /// Self-registered account, as created by the public sign-up flow.
    pub async fn create_self_registered(
        &self,
        email: &str,
        full_name: &str,
        password_hash: &str,
        credits: i32,
    ) -> Result<candidate::Model, DbErr> {
        let now = now();
        let model = candidate::ActiveModel {
            candidate_id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            full_name: Set(full_name.to_string()),
            college_name: Set(None),
            phone: Set(None),
            course: Set(None),
            password_hash: Set(password_hash.to_string()),
            credits: Set(credits),
            registration_method: Set(RegistrationMethod::SelfRegistered),
            placement_id: Set(None),
            source_file_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        model.insert(&self.db).await
    }

    /// Placement-sourced candidates, optionally narrowed to one officer.
    pub async fn find_placement_candidates(
        &self,
        placement_id: Option<Uuid>,
    ) -> Result<Vec<candidate::Model>, DbErr> {
        let mut query = candidate::Entity::find()
            .filter(candidate::Column::RegistrationMethod.eq(RegistrationMethod::Placement));

        if let Some(placement_id) = placement_id {
            query = query.filter(candidate::Column::PlacementId.eq(placement_id));
        }

        query
            .order_by_asc(candidate::Column::Email)
            .all(&self.db)
            .await
    }

    /// Placement candidates produced by one file, plus legacy rows of its
    /// officer that carry no source file at all.
    pub async fn find_for_file_scope(
        &self,
        file_id: Uuid,
        placement_id: Uuid,
    ) -> Result<Vec<candidate::Model>, DbErr> {
        candidate::Entity::find()
            .filter(candidate::Column::RegistrationMethod.eq(RegistrationMethod::Placement))
            .filter(
                Condition::any()
                    .add(candidate::Column::SourceFileId.eq(file_id))
                    .add(
                        Condition::all()
                            .add(candidate::Column::SourceFileId.is_null())
                            .add(candidate::Column::PlacementId.eq(placement_id)),
                    ),
            )
            .order_by_asc(candidate::Column::Email)
            .all(&self.db)
            .await
    }

    /// Set `credits` on the given candidates, skipping the ones already correct.
    ///
    /// Only rows still linked as `source` match, so a candidate re-linked by
    /// another file since it was read keeps that file's balance.
    pub async fn set_credits<C: ConnectionTrait>(
        conn: &C,
        candidate_ids: &[Uuid],
        credits: i32,
        source: CreditSource,
    ) -> Result<u64, DbErr> {
        if candidate_ids.is_empty() {
            return Ok(0);
        }

        let result = candidate::Entity::update_many()
            .col_expr(candidate::Column::Credits, Expr::value(credits))
            .col_expr(candidate::Column::UpdatedAt, Expr::value(now()))
            .filter(candidate::Column::CandidateId.is_in(candidate_ids.iter().copied()))
            .filter(candidate::Column::RegistrationMethod.eq(RegistrationMethod::Placement))
            .filter(candidate::Column::Credits.ne(credits))
            .filter(source.condition())
            .exec(conn)
            .await?;

        Ok(result.rows_affected)
    }

    pub async fn count_by_source_file<C: ConnectionTrait>(
        conn: &C,
        file_id: Uuid,
    ) -> Result<u64, DbErr> {
        candidate::Entity::find()
            .filter(candidate::Column::SourceFileId.eq(file_id))
            .count(conn)
            .await
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

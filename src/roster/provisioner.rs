//! Idempotent create-or-update of candidate accounts from roster rows.
//!
//! Every decision for an email is made by single conditional statements, never
//! by a read followed by a dependent write:
//!
//! 1. re-link the email if it belongs to a placement candidate,
//! 2. otherwise insert it with `ON CONFLICT (email) DO NOTHING`,
//! 3. and if that insert lost a race, re-link once more.
//!
//! Self-registered accounts match neither the re-link nor the insert, so they
//! are never touched.

use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::credentials::{CredentialError, CredentialIssuer, IssuedPassword};
use super::lifecycle::{LeaseKeeper, LifecycleError};
use super::normalizer::RosterRow;
use crate::entities::sea_orm_active_enums::RegistrationMethod;
use crate::repositories::{CandidateRepository, NewPlacementCandidate, PlacementLink};

/// Hard failures. Any of these aborts the batch.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    /// The pass lost its gate part-way through the rows.
    #[error(transparent)]
    Lease(#[from] LifecycleError),
}

/// Owner and defaults applied to every row of one file.
#[derive(Debug, Clone)]
pub struct ProvisionContext {
    pub placement_id: Uuid,
    pub source_file_id: Uuid,
    pub default_credits: i32,
    /// Used for rows that leave the college column blank.
    pub default_college: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    OwnedBySelfRegistration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRow {
    pub row_index: usize,
    pub email: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row_index: usize,
    pub email: String,
    pub message: String,
}

/// Counts of one provisioning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionReport {
    pub created: u32,
    pub updated: u32,
    pub skipped: u32,
    pub errors: u32,
    pub skipped_rows: Vec<SkippedRow>,
    pub row_errors: Vec<RowError>,
}

/// Result of upserting one email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Skipped(SkipReason),
    /// The email disappeared between statements.
    Vanished,
}

/// A finished batch: the counts plus passwords generated for new accounts.
#[derive(Debug, Clone, Default)]
pub struct ProvisionResult {
    pub report: ProvisionReport,
    pub issued: Vec<IssuedPassword>,
}

#[derive(Clone)]
pub struct CandidateProvisioner {
    candidates: CandidateRepository,
    issuer: CredentialIssuer,
}

impl CandidateProvisioner {
    pub fn new(candidates: CandidateRepository, issuer: CredentialIssuer) -> Self {
        Self { candidates, issuer }
    }

    /// Apply every row, renewing the file's lease between rows. Returns at the first
    /// hard failure; rows already applied stay applied and a retry of the whole batch
    /// converges.
    pub async fn provision(
        &self,
        ctx: &ProvisionContext,
        rows: Vec<RosterRow>,
        keeper: &mut LeaseKeeper<'_>,
    ) -> Result<ProvisionResult, ProvisionError> {
        debug_assert_eq!(keeper.file_id(), ctx.source_file_id);
        let mut result = ProvisionResult::default();

        for row in rows {
            keeper.keep_alive().await?;

            let row_index = row.row_index;
            let email = row.email.clone();
            let (outcome, issued) = self.upsert_row(ctx, row).await?;

            match outcome {
                UpsertOutcome::Created => {
                    result.report.created += 1;
                    result.issued.extend(issued);
                }
                UpsertOutcome::Updated => result.report.updated += 1,
                UpsertOutcome::Skipped(reason) => {
                    tracing::debug!(
                        file_id = %ctx.source_file_id,
                        row_index,
                        ?reason,
                        "roster row skipped"
                    );
                    result.report.skipped += 1;
                    result.report.skipped_rows.push(SkippedRow {
                        row_index,
                        email,
                        reason,
                    });
                }
                UpsertOutcome::Vanished => {
                    tracing::warn!(
                        file_id = %ctx.source_file_id,
                        row_index,
                        "candidate vanished while provisioning"
                    );
                    result.report.errors += 1;
                    result.report.row_errors.push(RowError {
                        row_index,
                        email,
                        message: "candidate was removed while the row was being applied"
                            .to_string(),
                    });
                }
            }
        }

        Ok(result)
    }

    /// Create or update the candidate for one row.
    pub async fn upsert_row(
        &self,
        ctx: &ProvisionContext,
        row: RosterRow,
    ) -> Result<(UpsertOutcome, Option<IssuedPassword>), ProvisionError> {
        let link = PlacementLink {
            placement_id: ctx.placement_id,
            source_file_id: ctx.source_file_id,
            credits: row.credits_assigned.unwrap_or(ctx.default_credits),
        };

        if self
            .candidates
            .relink_placement_candidate(&row.email, &link)
            .await?
            > 0
        {
            return Ok((UpsertOutcome::Updated, None));
        }

        if let Some(existing) = self.candidates.find_by_email(&row.email).await? {
            return match existing.registration_method {
                RegistrationMethod::SelfRegistered => Ok((
                    UpsertOutcome::Skipped(SkipReason::OwnedBySelfRegistration),
                    None,
                )),
                // Inserted by a concurrent batch since the re-link above.
                RegistrationMethod::Placement => {
                    Ok((self.relink_again(&row.email, &link).await?, None))
                }
            };
        }

        let (row, issued) = self.issuer.issue_if_missing(row);
        let password = row.password.as_deref().unwrap_or_default();
        let password_hash = self.issuer.hash(password).await?;

        let inserted = self
            .candidates
            .insert_if_absent(NewPlacementCandidate {
                email: row.email.clone(),
                full_name: row.candidate_name,
                college_name: row.college_name.or_else(|| ctx.default_college.clone()),
                phone: row.phone,
                course: row.course,
                password_hash,
                link: link.clone(),
            })
            .await?;

        if inserted {
            return Ok((UpsertOutcome::Created, issued));
        }

        // Lost the insert race to another writer.
        if let Some(existing) = self.candidates.find_by_email(&row.email).await? {
            if existing.registration_method == RegistrationMethod::SelfRegistered {
                return Ok((
                    UpsertOutcome::Skipped(SkipReason::OwnedBySelfRegistration),
                    None,
                ));
            }
        }

        Ok((self.relink_again(&row.email, &link).await?, None))
    }

    async fn relink_again(
        &self,
        email: &str,
        link: &PlacementLink,
    ) -> Result<UpsertOutcome, ProvisionError> {
        if self
            .candidates
            .relink_placement_candidate(email, link)
            .await?
            > 0
        {
            Ok(UpsertOutcome::Updated)
        } else {
            Ok(UpsertOutcome::Vanished)
        }
    }
}

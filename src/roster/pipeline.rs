use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::credentials::{BcryptHasher, CredentialHasher, CredentialIssuer, IssuedPassword};
use super::decoder;
use super::error::PipelineError;
use super::lifecycle::{
    FileLease, FileLifecycle, LeaseKeeper, LifecycleError, PassRecord, admit_for_processing,
};
use super::normalizer::{self, Rejection};
use super::provisioner::{
    CandidateProvisioner, ProvisionContext, ProvisionError, ProvisionReport,
};
use super::reconciler::{CreditReconciler, FileAuthority, ReconcileReport, ReconcileScope};
use crate::config::PipelineSettings;
use crate::entities::sea_orm_active_enums::FileStatus;
use crate::entities::uploaded_file;
use crate::repositories::{CandidateRepository, PlacementOfficerRepository, UploadedFileRepository};

/// Admission/gate attempts before giving up on a file whose status keeps moving.
const MAX_ADMISSION_ATTEMPTS: usize = 3;

/// What one processing pass did, as kept on the file for later display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub total_rows: usize,
    pub provision: ProvisionReport,
    pub rejected: usize,
    pub rejections: Vec<Rejection>,
    pub credits_corrected: u64,
    pub reprocess: bool,
    pub processed_at: NaiveDateTime,
}

/// Returned to the caller of [`RosterPipeline::process_file`].
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub file_id: Uuid,
    pub status: FileStatus,
    pub candidates_created: i32,
    pub report: FileReport,
    /// Generated passwords of accounts created in this pass. Never persisted.
    pub issued_credentials: Vec<IssuedPassword>,
}

/// Decode → normalize → provision → reconcile for one uploaded roster.
#[derive(Clone)]
pub struct RosterPipeline {
    settings: PipelineSettings,
    files: UploadedFileRepository,
    officers: PlacementOfficerRepository,
    lifecycle: FileLifecycle,
    provisioner: CandidateProvisioner,
    reconciler: CreditReconciler,
}

impl RosterPipeline {
    pub fn new(db: DatabaseConnection, settings: PipelineSettings) -> Self {
        let hasher = Arc::new(BcryptHasher::new(settings.bcrypt_cost));
        Self::with_hasher(db, settings, hasher)
    }

    pub fn with_hasher(
        db: DatabaseConnection,
        settings: PipelineSettings,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        let files = UploadedFileRepository::new(db.clone());
        let candidates = CandidateRepository::new(db.clone());
        let lifecycle = FileLifecycle::new(db.clone(), settings.processing_lease);
        let issuer = CredentialIssuer::new(hasher, settings.generated_password_length);

        Self {
            provisioner: CandidateProvisioner::new(candidates.clone(), issuer),
            reconciler: CreditReconciler::new(candidates, files.clone(), lifecycle.clone()),
            officers: PlacementOfficerRepository::new(db),
            files,
            lifecycle,
            settings,
        }
    }

    pub async fn approve(&self, file_id: Uuid) -> Result<uploaded_file::Model, PipelineError> {
        Ok(self.lifecycle.approve(file_id).await?)
    }

    pub async fn reject(
        &self,
        file_id: Uuid,
        reason: &str,
    ) -> Result<uploaded_file::Model, PipelineError> {
        Ok(self.lifecycle.reject(file_id, reason).await?)
    }

    /// Run a full pass over one file under its gate.
    ///
    /// Any failure releases the gate and leaves the file's status and bookkeeping as
    /// they were. Candidate rows applied before the failure stay applied.
    pub async fn process_file(&self, file_id: Uuid) -> Result<ProcessOutcome, PipelineError> {
        let lease = self.take_gate(file_id).await?;
        let held = lease.clone();

        match self.run_pass(lease).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(
                    file_id = %file_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "roster processing failed"
                );
                if let Err(release_err) = self.lifecycle.release(held).await {
                    tracing::error!(
                        file_id = %file_id,
                        error = %release_err,
                        "failed to release processing lease"
                    );
                }
                Err(e)
            }
        }
    }

    pub async fn reconcile_credits(
        &self,
        scope: ReconcileScope,
    ) -> Result<ReconcileReport, PipelineError> {
        Ok(self.reconciler.reconcile(scope).await?)
    }

    /// Report of the last committed pass, if the file was ever processed.
    pub async fn last_report(&self, file_id: Uuid) -> Result<Option<FileReport>, PipelineError> {
        let file = self
            .files
            .find_by_id(file_id)
            .await?
            .ok_or(PipelineError::FileNotFound(file_id))?;

        file.last_report
            .map(serde_json::from_value::<FileReport>)
            .transpose()
            .map_err(PipelineError::from)
    }

    async fn take_gate(&self, file_id: Uuid) -> Result<FileLease, PipelineError> {
        let mut last_error = LifecycleError::FileBusy(file_id);

        for _ in 0..MAX_ADMISSION_ATTEMPTS {
            let file = self
                .files
                .find_by_id(file_id)
                .await?
                .ok_or(PipelineError::FileNotFound(file_id))?;
            let admission =
                admit_for_processing(file_id, file.status, self.settings.auto_approve_uploads)?;

            match self.lifecycle.acquire(file_id, admission).await {
                Ok(lease) => return Ok(lease),
                Err(e @ LifecycleError::StatusChanged { .. }) => {
                    tracing::debug!(file_id = %file_id, "status moved before gate, re-admitting");
                    last_error = e;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_error.into())
    }

    async fn run_pass(&self, mut lease: FileLease) -> Result<ProcessOutcome, PipelineError> {
        let file_id = lease.file_id;
        let file = self
            .files
            .find_by_id(file_id)
            .await?
            .ok_or(PipelineError::FileNotFound(file_id))?;

        tracing::info!(
            file_id = %file_id,
            file_name = %file.file_name,
            admission = ?lease.admission,
            "processing roster"
        );

        let raw_rows = decoder::decode(&file.content, file.mime_type.as_deref())
            .map_err(|source| PipelineError::Decode { file_id, source })?;
        let batch = normalizer::normalize_all(raw_rows);

        tracing::debug!(
            file_id = %file_id,
            total_rows = batch.total_rows,
            valid = batch.rows.len(),
            rejected = batch.rejections.len(),
            "roster normalized"
        );

        let officer = self.officers.find_by_id(file.placement_officer_id).await?;
        let ctx = ProvisionContext {
            placement_id: file.placement_officer_id,
            source_file_id: file_id,
            default_credits: file.credit_allotment,
            default_college: officer.map(|o| o.college_name),
        };

        let structured_data = serde_json::to_value(&batch.rows)?;
        let authority = FileAuthority {
            file_id,
            placement_id: file.placement_officer_id,
            allotment: file.credit_allotment,
            overrides: batch
                .rows
                .iter()
                .filter_map(|row| row.credits_assigned.map(|c| (row.email.clone(), c)))
                .collect::<HashMap<_, _>>(),
        };

        let provisioned = {
            let mut keeper = LeaseKeeper::new(&self.lifecycle, &mut lease);
            self.provisioner
                .provision(&ctx, batch.rows, &mut keeper)
                .await
                .map_err(|source| match source {
                    ProvisionError::Lease(e) => PipelineError::from(e),
                    source => PipelineError::Provision { file_id, source },
                })?
        };

        let repaired = self.reconciler.reconcile_held(&lease, &authority).await?;

        let reprocess = lease.admission.is_reprocess();
        let processed_at = chrono::Utc::now().naive_utc();
        let report = FileReport {
            total_rows: batch.total_rows,
            provision: provisioned.report,
            rejected: batch.rejections.len(),
            rejections: batch.rejections,
            credits_corrected: repaired.corrected,
            reprocess,
            processed_at,
        };

        let finalized = self
            .lifecycle
            .finalize(
                lease,
                PassRecord {
                    processed_at,
                    structured_data,
                    last_report: serde_json::to_value(&report)?,
                },
            )
            .await?;

        tracing::info!(
            file_id = %file_id,
            created = report.provision.created,
            updated = report.provision.updated,
            skipped = report.provision.skipped,
            errors = report.provision.errors,
            rejected = report.rejected,
            credits_corrected = report.credits_corrected,
            reprocess,
            "roster processed"
        );

        Ok(ProcessOutcome {
            file_id,
            status: FileStatus::Processed,
            candidates_created: finalized.candidates_created,
            report,
            issued_credentials: provisioned.issued,
        })
    }
}

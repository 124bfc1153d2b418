//! Status machine of an uploaded roster and its per-file processing gate.
//!
//! ```text
//! pending ──approve──▶ approved ──process──▶ processed ──reprocess──┐
//!    │                                          ▲                    │
//!    ├──reject──▶ rejected                      └────────────────────┘
//!    └──process (auto-approve policy)──▶ processed
//! ```
//!
//! A pass over a file holds a lease on its row (`processing_token`,
//! `processing_expires_at`). Only the lease holder can commit the move into
//! `processed`, and it does so in one guarded UPDATE together with all
//! bookkeeping columns. Long passes renew the lease between rows through a
//! [`LeaseKeeper`].

use std::time::{Duration, Instant};

use chrono::{NaiveDateTime, TimeDelta, Utc};
use sea_orm::{DatabaseConnection, DbErr, TransactionTrait};
use thiserror::Error;
use uuid::Uuid;

use crate::entities::sea_orm_active_enums::FileStatus;
use crate::entities::uploaded_file;
use crate::repositories::{CandidateRepository, ProcessedBookkeeping, UploadedFileRepository};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("uploaded file {0} not found")]
    FileNotFound(Uuid),

    #[error("uploaded file {file_id} cannot move from {from} to {to}")]
    IllegalTransition {
        file_id: Uuid,
        from: FileStatus,
        to: FileStatus,
    },

    /// Another pass holds the file's gate.
    #[error("uploaded file {0} is held by another processing pass")]
    FileBusy(Uuid),

    /// The status moved between admission and taking the gate.
    #[error("uploaded file {file_id} changed to {status} before processing started")]
    StatusChanged { file_id: Uuid, status: FileStatus },

    /// The lease expired and was taken over before this pass committed.
    #[error("processing lease on uploaded file {0} was lost")]
    LeaseLost(Uuid),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// How a file enters a processing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// `approved → processed`
    FirstPass,
    /// `processed → processed`, a fresh provisioning pass.
    Reprocess,
    /// `pending → processed` under the auto-approve policy; stamps `approved_at`.
    AutoApprove,
}

impl Admission {
    /// Status the file must still have when the pass commits.
    pub fn expected_status(&self) -> FileStatus {
        match self {
            Admission::FirstPass => FileStatus::Approved,
            Admission::Reprocess => FileStatus::Processed,
            Admission::AutoApprove => FileStatus::Pending,
        }
    }

    pub fn is_reprocess(&self) -> bool {
        matches!(self, Admission::Reprocess)
    }
}

/// Decide whether a file in `status` may be processed.
pub fn admit_for_processing(
    file_id: Uuid,
    status: FileStatus,
    auto_approve: bool,
) -> Result<Admission, LifecycleError> {
    match status {
        FileStatus::Approved => Ok(Admission::FirstPass),
        FileStatus::Processed => Ok(Admission::Reprocess),
        FileStatus::Pending if auto_approve => Ok(Admission::AutoApprove),
        from => Err(LifecycleError::IllegalTransition {
            file_id,
            from,
            to: FileStatus::Processed,
        }),
    }
}

/// Proof of holding a file's gate. Consumed by [`FileLifecycle::finalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLease {
    pub file_id: Uuid,
    pub token: Uuid,
    pub admission: Admission,
    pub expires_at: NaiveDateTime,
}

/// What a committed pass writes onto the file row.
#[derive(Debug, Clone)]
pub struct PassRecord {
    pub processed_at: NaiveDateTime,
    pub structured_data: serde_json::Value,
    pub last_report: serde_json::Value,
}

/// Bookkeeping as committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizedPass {
    pub processed_at: NaiveDateTime,
    pub candidates_created: i32,
}

#[derive(Clone)]
pub struct FileLifecycle {
    db: DatabaseConnection,
    files: UploadedFileRepository,
    lease_duration: Duration,
}

impl FileLifecycle {
    pub fn new(db: DatabaseConnection, lease_duration: Duration) -> Self {
        Self {
            files: UploadedFileRepository::new(db.clone()),
            db,
            lease_duration,
        }
    }

    async fn load(&self, file_id: Uuid) -> Result<uploaded_file::Model, LifecycleError> {
        self.files
            .find_by_id(file_id)
            .await?
            .ok_or(LifecycleError::FileNotFound(file_id))
    }

    /// `pending → approved`. Approving an approved file is a no-op.
    pub async fn approve(&self, file_id: Uuid) -> Result<uploaded_file::Model, LifecycleError> {
        let file = self.load(file_id).await?;

        match file.status {
            FileStatus::Approved => return Ok(file),
            FileStatus::Pending => {}
            from => {
                return Err(LifecycleError::IllegalTransition {
                    file_id,
                    from,
                    to: FileStatus::Approved,
                });
            }
        }

        if self.files.mark_approved(file_id, now()).await? {
            tracing::info!(file_id = %file_id, "uploaded file approved");
            return self.load(file_id).await;
        }

        // Lost the CAS: either a concurrent transition or an auto-approve pass holds the gate.
        let current = self.load(file_id).await?;
        match current.status {
            FileStatus::Approved => Ok(current),
            FileStatus::Pending => Err(LifecycleError::FileBusy(file_id)),
            from => Err(LifecycleError::IllegalTransition {
                file_id,
                from,
                to: FileStatus::Approved,
            }),
        }
    }

    /// `pending → rejected`. Rejecting a rejected file is a no-op.
    pub async fn reject(
        &self,
        file_id: Uuid,
        reason: &str,
    ) -> Result<uploaded_file::Model, LifecycleError> {
        let file = self.load(file_id).await?;

        match file.status {
            FileStatus::Rejected => return Ok(file),
            FileStatus::Pending => {}
            from => {
                return Err(LifecycleError::IllegalTransition {
                    file_id,
                    from,
                    to: FileStatus::Rejected,
                });
            }
        }

        if self.files.mark_rejected(file_id, reason, now()).await? {
            tracing::info!(file_id = %file_id, "uploaded file rejected");
            return self.load(file_id).await;
        }

        let current = self.load(file_id).await?;
        match current.status {
            FileStatus::Rejected => Ok(current),
            FileStatus::Pending => Err(LifecycleError::FileBusy(file_id)),
            from => Err(LifecycleError::IllegalTransition {
                file_id,
                from,
                to: FileStatus::Rejected,
            }),
        }
    }

    /// Take the gate for a pass admitted as `admission`.
    ///
    /// Fails with [`LifecycleError::FileBusy`] while another pass holds it, and with
    /// [`LifecycleError::StatusChanged`] when the file no longer has the admitted status.
    pub async fn acquire(
        &self,
        file_id: Uuid,
        admission: Admission,
    ) -> Result<FileLease, LifecycleError> {
        let token = Uuid::new_v4();
        let now = now();
        let expires_at = now + lease_delta(self.lease_duration);

        let acquired = self
            .files
            .try_acquire_lease(
                file_id,
                &[admission.expected_status()],
                token,
                now,
                expires_at,
            )
            .await?;

        if acquired {
            tracing::debug!(file_id = %file_id, ?admission, "processing lease acquired");
            return Ok(FileLease {
                file_id,
                token,
                admission,
                expires_at,
            });
        }

        let current = self.load(file_id).await?;
        if current.status == admission.expected_status() {
            Err(LifecycleError::FileBusy(file_id))
        } else {
            Err(LifecycleError::StatusChanged {
                file_id,
                status: current.status,
            })
        }
    }

    /// Take the gate of a file in any non-rejected status, for repair passes that do not
    /// move the status.
    pub async fn acquire_for_repair(&self, file_id: Uuid) -> Result<FileLease, LifecycleError> {
        let token = Uuid::new_v4();
        let now = now();
        let expires_at = now + lease_delta(self.lease_duration);

        let acquired = self
            .files
            .try_acquire_lease(
                file_id,
                &[
                    FileStatus::Pending,
                    FileStatus::Approved,
                    FileStatus::Processed,
                ],
                token,
                now,
                expires_at,
            )
            .await?;

        if !acquired {
            self.load(file_id).await?;
            return Err(LifecycleError::FileBusy(file_id));
        }

        Ok(FileLease {
            file_id,
            token,
            admission: Admission::Reprocess,
            expires_at,
        })
    }

    /// Push the lease deadline a full lease duration out from now.
    ///
    /// Fails with [`LifecycleError::LeaseLost`] once another caller has taken the gate.
    pub async fn renew(&self, lease: &mut FileLease) -> Result<(), LifecycleError> {
        let expires_at = now() + lease_delta(self.lease_duration);

        if !self
            .files
            .extend_lease(lease.file_id, lease.token, expires_at)
            .await?
        {
            return Err(LifecycleError::LeaseLost(lease.file_id));
        }

        lease.expires_at = expires_at;
        tracing::debug!(file_id = %lease.file_id, %expires_at, "processing lease renewed");
        Ok(())
    }

    /// How long a pass may run before it renews its lease.
    pub fn renew_interval(&self) -> Duration {
        self.lease_duration / 3
    }

    /// Set the file's `candidates_created` to the number of candidates it currently sources.
    pub async fn recount(&self, lease: &FileLease) -> Result<i32, LifecycleError> {
        let txn = self.db.begin().await?;

        let count = CandidateRepository::count_by_source_file(&txn, lease.file_id).await?;
        let candidates_created = i32::try_from(count).unwrap_or(i32::MAX);

        if !UploadedFileRepository::set_candidates_created(
            &txn,
            lease.file_id,
            lease.token,
            candidates_created,
        )
        .await?
        {
            txn.rollback().await?;
            return Err(LifecycleError::LeaseLost(lease.file_id));
        }

        txn.commit().await?;
        Ok(candidates_created)
    }

    /// Give the gate back without touching the status.
    pub async fn release(&self, lease: FileLease) -> Result<(), LifecycleError> {
        if !self.files.release_lease(lease.file_id, lease.token).await? {
            tracing::warn!(file_id = %lease.file_id, "processing lease already gone at release");
        }
        Ok(())
    }

    /// Commit a pass: recount the file's candidates and write status, counters,
    /// audit data and lease release in one guarded statement.
    pub async fn finalize(
        &self,
        lease: FileLease,
        record: PassRecord,
    ) -> Result<FinalizedPass, LifecycleError> {
        let txn = self.db.begin().await?;

        let count = CandidateRepository::count_by_source_file(&txn, lease.file_id).await?;
        let candidates_created = i32::try_from(count).unwrap_or(i32::MAX);
        let processed_at = record.processed_at;
        let approved_at =
            matches!(lease.admission, Admission::AutoApprove).then_some(processed_at);

        let committed = UploadedFileRepository::mark_processed(
            &txn,
            lease.file_id,
            lease.token,
            lease.admission.expected_status(),
            ProcessedBookkeeping {
                processed_at,
                approved_at,
                candidates_created,
                structured_data: record.structured_data,
                last_report: record.last_report,
            },
        )
        .await?;

        if !committed {
            txn.rollback().await?;
            return Err(LifecycleError::LeaseLost(lease.file_id));
        }

        txn.commit().await?;

        tracing::info!(
            file_id = %lease.file_id,
            candidates_created,
            "uploaded file processed"
        );

        Ok(FinalizedPass {
            processed_at,
            candidates_created,
        })
    }
}

/// Keeps a held lease alive while a long pass works through its rows.
pub struct LeaseKeeper<'a> {
    lifecycle: &'a FileLifecycle,
    lease: &'a mut FileLease,
    last_renewed: Instant,
}

impl<'a> LeaseKeeper<'a> {
    pub fn new(lifecycle: &'a FileLifecycle, lease: &'a mut FileLease) -> Self {
        Self {
            lifecycle,
            lease,
            last_renewed: Instant::now(),
        }
    }

    pub fn file_id(&self) -> Uuid {
        self.lease.file_id
    }

    /// Renew once the renew interval has passed since the last renewal.
    pub async fn keep_alive(&mut self) -> Result<(), LifecycleError> {
        if self.last_renewed.elapsed() < self.lifecycle.renew_interval() {
            return Ok(());
        }

        self.lifecycle.renew(&mut *self.lease).await?;
        self.last_renewed = Instant::now();
        Ok(())
    }
}

fn lease_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::seconds(300))
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

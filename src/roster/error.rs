use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use super::credentials::CredentialError;
use super::decoder::DecodeError;
use super::lifecycle::LifecycleError;
use super::provisioner::ProvisionError;
use super::reconciler::ReconcileError;

/// Failure of a pipeline entry point, with the file it concerned where there is one.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("uploaded file {0} not found")]
    FileNotFound(Uuid),

    #[error("uploaded file {0} is being processed by another caller")]
    FileBusy(Uuid),

    #[error("uploaded file {file_id} could not be decoded: {source}")]
    Decode {
        file_id: Uuid,
        #[source]
        source: DecodeError,
    },

    #[error("provisioning of uploaded file {file_id} aborted: {source}")]
    Provision {
        file_id: Uuid,
        #[source]
        source: ProvisionError,
    },

    #[error(transparent)]
    Lifecycle(LifecycleError),

    #[error(transparent)]
    Reconcile(ReconcileError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("could not encode processing report: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Whether the same call can succeed later without anyone fixing the input.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::FileBusy(_) | PipelineError::Database(_) => true,
            PipelineError::Provision { .. } => true,
            PipelineError::Lifecycle(e) => matches!(
                e,
                LifecycleError::LeaseLost(_)
                    | LifecycleError::StatusChanged { .. }
                    | LifecycleError::Database(_)
            ),
            PipelineError::Reconcile(e) => matches!(
                e,
                ReconcileError::Database(_)
                    | ReconcileError::Lifecycle(
                        LifecycleError::LeaseLost(_)
                            | LifecycleError::StatusChanged { .. }
                            | LifecycleError::Database(_)
                    )
            ),
            PipelineError::FileNotFound(_)
            | PipelineError::Decode { .. }
            | PipelineError::Serialization(_) => false,
        }
    }

    pub fn file_id(&self) -> Option<Uuid> {
        match self {
            PipelineError::FileNotFound(id) | PipelineError::FileBusy(id) => Some(*id),
            PipelineError::Decode { file_id, .. } | PipelineError::Provision { file_id, .. } => {
                Some(*file_id)
            }
            PipelineError::Lifecycle(e) => match e {
                LifecycleError::FileNotFound(id)
                | LifecycleError::FileBusy(id)
                | LifecycleError::LeaseLost(id) => Some(*id),
                LifecycleError::IllegalTransition { file_id, .. }
                | LifecycleError::StatusChanged { file_id, .. } => Some(*file_id),
                LifecycleError::Database(_) => None,
            },
            PipelineError::Reconcile(ReconcileError::FileNotFound(id)) => Some(*id),
            PipelineError::Reconcile(_)
            | PipelineError::Database(_)
            | PipelineError::Serialization(_) => None,
        }
    }

    /// Short machine-readable name of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::FileNotFound(_) => "file_not_found",
            PipelineError::FileBusy(_) => "file_busy",
            PipelineError::Decode { source, .. } => match source {
                DecodeError::Corrupt(_) => "corrupt_file",
                DecodeError::Empty => "empty_file",
                DecodeError::UnsupportedMimeType(_) => "unsupported_mime_type",
            },
            PipelineError::Provision { source, .. } => match source {
                ProvisionError::Credential(CredentialError::Backend(_)) => {
                    "credential_backend_unavailable"
                }
                ProvisionError::Database(_) => "database_unavailable",
                ProvisionError::Lease(_) => "lease_lost",
            },
            PipelineError::Lifecycle(e) => match e {
                LifecycleError::FileNotFound(_) => "file_not_found",
                LifecycleError::IllegalTransition { .. } => "illegal_transition",
                LifecycleError::FileBusy(_) => "file_busy",
                LifecycleError::StatusChanged { .. } => "status_changed",
                LifecycleError::LeaseLost(_) => "lease_lost",
                LifecycleError::Database(_) => "database_unavailable",
            },
            PipelineError::Reconcile(ReconcileError::Database(_)) | PipelineError::Database(_) => {
                "database_unavailable"
            }
            PipelineError::Reconcile(_) => "reconcile_failed",
            PipelineError::Serialization(_) => "internal",
        }
    }
}

impl From<LifecycleError> for PipelineError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::FileNotFound(id) => PipelineError::FileNotFound(id),
            LifecycleError::FileBusy(id) => PipelineError::FileBusy(id),
            other => PipelineError::Lifecycle(other),
        }
    }
}

impl From<ReconcileError> for PipelineError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::FileNotFound(id)
            | ReconcileError::Lifecycle(LifecycleError::FileNotFound(id)) => {
                PipelineError::FileNotFound(id)
            }
            ReconcileError::Lifecycle(LifecycleError::FileBusy(id)) => PipelineError::FileBusy(id),
            other => PipelineError::Reconcile(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::sea_orm_active_enums::FileStatus;

    #[test]
    fn test_lifecycle_errors_are_flattened() {
        let id = Uuid::new_v4();
        assert!(matches!(
            PipelineError::from(LifecycleError::FileBusy(id)),
            PipelineError::FileBusy(busy) if busy == id
        ));
        assert!(matches!(
            PipelineError::from(LifecycleError::FileNotFound(id)),
            PipelineError::FileNotFound(_)
        ));
    }

    #[test]
    fn test_retryable_classification() {
        let id = Uuid::new_v4();

        assert!(PipelineError::FileBusy(id).is_retryable());
        assert!(
            PipelineError::Provision {
                file_id: id,
                source: ProvisionError::Credential(CredentialError::Backend("down".into())),
            }
            .is_retryable()
        );
        assert!(
            !PipelineError::Decode {
                file_id: id,
                source: DecodeError::Empty,
            }
            .is_retryable()
        );
        assert!(
            !PipelineError::from(LifecycleError::IllegalTransition {
                file_id: id,
                from: FileStatus::Rejected,
                to: FileStatus::Processed,
            })
            .is_retryable()
        );
    }

    #[test]
    fn test_lost_lease_during_provisioning_is_named() {
        let id = Uuid::new_v4();
        let err = PipelineError::Provision {
            file_id: id,
            source: ProvisionError::Lease(LifecycleError::LeaseLost(id)),
        };
        assert_eq!(err.kind(), "lease_lost");
        assert!(err.is_retryable());
        assert_eq!(err.file_id(), Some(id));
    }

    #[test]
    fn test_kind_and_file_id() {
        let id = Uuid::new_v4();
        let err = PipelineError::Decode {
            file_id: id,
            source: DecodeError::Corrupt("bad zip".into()),
        };
        assert_eq!(err.kind(), "corrupt_file");
        assert_eq!(err.file_id(), Some(id));
        assert_eq!(PipelineError::Database(DbErr::Custom("x".into())).file_id(), None);
    }
}

//! Placement roster ingestion and candidate provisioning.

pub mod aliases;
pub mod credentials;
pub mod decoder;
pub mod error;
pub mod lifecycle;
pub mod normalizer;
pub mod pipeline;
pub mod provisioner;
pub mod reconciler;

pub use credentials::{BcryptHasher, CredentialError, CredentialHasher, IssuedPassword};
pub use decoder::{DecodeError, RawRow};
pub use error::PipelineError;
pub use lifecycle::{Admission, FileLease, FileLifecycle, LeaseKeeper, LifecycleError};
pub use normalizer::{RejectReason, Rejection, RosterRow};
pub use pipeline::{FileReport, ProcessOutcome, RosterPipeline};
pub use provisioner::{ProvisionError, ProvisionReport, SkipReason};
pub use reconciler::{ReconcileReport, ReconcileScope};

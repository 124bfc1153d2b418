//! Credit repair.
//!
//! The authoritative balance of a placement candidate is the allotment of the
//! file that last provisioned it (a per-row credits override recorded in that
//! file's structured data wins over the file-wide allotment). Rows written
//! before files were tracked, or whose file is gone, fall back to the latest
//! processed file of their placement officer.
//!
//! A run also recounts `candidates_created` on every file it visits, since a
//! later file re-linking a student leaves the earlier file's count stale.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::lifecycle::{FileLease, FileLifecycle, LifecycleError};
use crate::entities::sea_orm_active_enums::FileStatus;
use crate::entities::{candidate, uploaded_file};
use crate::repositories::{CandidateRepository, CreditSource, UploadedFileRepository};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("uploaded file {0} not found")]
    FileNotFound(Uuid),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconcileScope {
    AllCandidates,
    ByPlacement(Uuid),
    ByFile(Uuid),
}

impl std::fmt::Display for ReconcileScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileScope::AllCandidates => f.write_str("all"),
            ReconcileScope::ByPlacement(id) => write!(f, "placement:{id}"),
            ReconcileScope::ByFile(id) => write!(f, "file:{id}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Candidates compared against their authoritative file.
    pub inspected: u64,
    pub corrected: u64,
    /// Placement candidates with no file to take credits from.
    pub unresolved: u64,
    /// Files whose gate was busy; their candidates were left for a later run.
    pub deferred_files: Vec<Uuid>,
    /// Files whose `candidatesCreated` was brought back to their candidate count.
    pub recounted_files: u64,
}

impl ReconcileReport {
    fn absorb(&mut self, other: ReconcileReport) {
        self.inspected += other.inspected;
        self.corrected += other.corrected;
        self.unresolved += other.unresolved;
        self.deferred_files.extend(other.deferred_files);
        self.recounted_files += other.recounted_files;
    }
}

/// Credit values one file declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAuthority {
    pub file_id: Uuid,
    pub placement_id: Uuid,
    pub allotment: i32,
    /// Per-email overrides from the roster's credits column.
    pub overrides: HashMap<String, i32>,
}

impl FileAuthority {
    pub fn from_file(file: &uploaded_file::Model) -> Self {
        Self {
            file_id: file.uploaded_file_id,
            placement_id: file.placement_officer_id,
            allotment: file.credit_allotment,
            overrides: file
                .structured_data
                .as_ref()
                .map(overrides_from_structured_data)
                .unwrap_or_default(),
        }
    }

    pub fn credits_for(&self, email: &str) -> i32 {
        self.overrides.get(email).copied().unwrap_or(self.allotment)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRow {
    email: String,
    #[serde(default)]
    credits_assigned: Option<i32>,
}

fn overrides_from_structured_data(data: &serde_json::Value) -> HashMap<String, i32> {
    match serde_json::from_value::<Vec<StoredRow>>(data.clone()) {
        Ok(rows) => rows
            .into_iter()
            .filter_map(|row| row.credits_assigned.map(|credits| (row.email, credits)))
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "unreadable structured data, using file allotment only");
            HashMap::new()
        }
    }
}

#[derive(Clone)]
pub struct CreditReconciler {
    candidates: CandidateRepository,
    files: UploadedFileRepository,
    lifecycle: FileLifecycle,
}

impl CreditReconciler {
    pub fn new(
        candidates: CandidateRepository,
        files: UploadedFileRepository,
        lifecycle: FileLifecycle,
    ) -> Self {
        Self {
            candidates,
            files,
            lifecycle,
        }
    }

    /// Bring every placement candidate in `scope` to its authoritative balance and
    /// refresh `candidatesCreated` on each file in scope. Busy files are deferred.
    pub async fn reconcile(&self, scope: ReconcileScope) -> Result<ReconcileReport, ReconcileError> {
        let (candidates, scope_files) = match scope {
            ReconcileScope::AllCandidates => (
                self.candidates.find_placement_candidates(None).await?,
                self.files.find_processed(None).await?,
            ),
            ReconcileScope::ByPlacement(placement_id) => (
                self.candidates
                    .find_placement_candidates(Some(placement_id))
                    .await?,
                self.files.find_processed(Some(placement_id)).await?,
            ),
            ReconcileScope::ByFile(file_id) => {
                let file = self
                    .files
                    .find_by_id(file_id)
                    .await?
                    .ok_or(ReconcileError::FileNotFound(file_id))?;
                let candidates = self
                    .candidates
                    .find_for_file_scope(file_id, file.placement_officer_id)
                    .await?;
                let scope_files = if file.status == FileStatus::Rejected {
                    Vec::new()
                } else {
                    vec![file]
                };
                (candidates, scope_files)
            }
        };

        let (mut groups, unresolved) = self.group_by_authority(candidates).await?;
        if let ReconcileScope::ByFile(only) = scope {
            groups.retain(|file_id, _| *file_id == only);
        }

        let mut visit: BTreeSet<Uuid> = groups.keys().copied().collect();
        visit.extend(scope_files.iter().map(|file| file.uploaded_file_id));

        let mut report = ReconcileReport {
            unresolved,
            ..Default::default()
        };

        for file_id in visit {
            let lease = match self.lifecycle.acquire_for_repair(file_id).await {
                Ok(lease) => lease,
                Err(LifecycleError::FileBusy(_)) => {
                    tracing::info!(file_id = %file_id, "file busy, deferring credit repair");
                    report.deferred_files.push(file_id);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let repaired = self.repair_file(&lease, groups.remove(&file_id)).await;
            self.lifecycle.release(lease).await?;
            report.absorb(repaired?);
        }

        tracing::info!(
            %scope,
            inspected = report.inspected,
            corrected = report.corrected,
            unresolved = report.unresolved,
            deferred = report.deferred_files.len(),
            recounted = report.recounted_files,
            "credit reconciliation finished"
        );

        Ok(report)
    }

    async fn repair_file(
        &self,
        lease: &FileLease,
        group: Option<(FileAuthority, Vec<candidate::Model>)>,
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut report = match group {
            Some((authority, members)) => self.apply(&authority, &members).await?,
            None => ReconcileReport::default(),
        };

        let candidates_created = self.lifecycle.recount(lease).await?;
        tracing::debug!(file_id = %lease.file_id, candidates_created, "file candidates recounted");
        report.recounted_files = 1;

        Ok(report)
    }

    /// Correct the candidates sourced from a file whose gate the caller already holds.
    pub async fn reconcile_held(
        &self,
        lease: &FileLease,
        authority: &FileAuthority,
    ) -> Result<ReconcileReport, ReconcileError> {
        debug_assert_eq!(lease.file_id, authority.file_id);

        let members: Vec<candidate::Model> = self
            .candidates
            .find_placement_candidates(Some(authority.placement_id))
            .await?
            .into_iter()
            .filter(|c| c.source_file_id == Some(authority.file_id))
            .collect();

        self.apply(authority, &members).await
    }

    /// Split candidates by the file their credits come from.
    async fn group_by_authority(
        &self,
        candidates: Vec<candidate::Model>,
    ) -> Result<(BTreeMap<Uuid, (FileAuthority, Vec<candidate::Model>)>, u64), ReconcileError>
    {
        let source_ids: Vec<Uuid> = {
            let mut ids: Vec<Uuid> = candidates.iter().filter_map(|c| c.source_file_id).collect();
            ids.sort();
            ids.dedup();
            ids
        };
        let mut authorities: HashMap<Uuid, FileAuthority> = self
            .files
            .find_by_ids(&source_ids)
            .await?
            .iter()
            .map(|file| (file.uploaded_file_id, FileAuthority::from_file(file)))
            .collect();

        let mut latest_by_placement: HashMap<Uuid, Option<Uuid>> = HashMap::new();
        let mut groups: BTreeMap<Uuid, (FileAuthority, Vec<candidate::Model>)> = BTreeMap::new();
        let mut unresolved = 0;

        for candidate in candidates {
            let direct = candidate
                .source_file_id
                .filter(|id| authorities.contains_key(id));

            let authority_id = match (direct, candidate.placement_id) {
                (Some(id), _) => Some(id),
                (None, Some(placement_id)) => {
                    self.latest_for(placement_id, &mut latest_by_placement, &mut authorities)
                        .await?
                }
                (None, None) => None,
            };

            let Some(authority) = authority_id.and_then(|id| authorities.get(&id)) else {
                tracing::debug!(
                    candidate_id = %candidate.candidate_id,
                    "no authoritative file for candidate"
                );
                unresolved += 1;
                continue;
            };

            groups
                .entry(authority.file_id)
                .or_insert_with(|| (authority.clone(), Vec::new()))
                .1
                .push(candidate);
        }

        Ok((groups, unresolved))
    }

    async fn latest_for(
        &self,
        placement_id: Uuid,
        cache: &mut HashMap<Uuid, Option<Uuid>>,
        authorities: &mut HashMap<Uuid, FileAuthority>,
    ) -> Result<Option<Uuid>, ReconcileError> {
        if let Some(cached) = cache.get(&placement_id) {
            return Ok(*cached);
        }

        let latest = self.files.latest_processed_for_officer(placement_id).await?;
        let latest_id = latest.map(|file| {
            let id = file.uploaded_file_id;
            authorities
                .entry(id)
                .or_insert_with(|| FileAuthority::from_file(&file));
            id
        });

        cache.insert(placement_id, latest_id);
        Ok(latest_id)
    }

    /// Bring every member to its authoritative balance. One statement per distinct target.
    async fn apply(
        &self,
        authority: &FileAuthority,
        members: &[candidate::Model],
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut by_target: BTreeMap<(i32, CreditSource), Vec<Uuid>> = BTreeMap::new();
        for member in members {
            let target = authority.credits_for(&member.email);
            if member.credits != target {
                let source = match member.source_file_id {
                    Some(file_id) => CreditSource::File(file_id),
                    None => CreditSource::Unsourced {
                        placement_id: member.placement_id.unwrap_or(authority.placement_id),
                    },
                };
                by_target
                    .entry((target, source))
                    .or_default()
                    .push(member.candidate_id);
            }
        }

        let mut corrected = 0;
        for ((target, source), ids) in by_target {
            corrected += CandidateRepository::set_credits(
                self.candidates.get_connection(),
                &ids,
                target,
                source,
            )
            .await?;
        }

        if corrected > 0 {
            tracing::info!(
                file_id = %authority.file_id,
                corrected,
                "candidate credits corrected"
            );
        }

        Ok(ReconcileReport {
            inspected: members.len() as u64,
            corrected,
            unresolved: 0,
            deferred_files: Vec::new(),
            recounted_files: 0,
        })
    }
}

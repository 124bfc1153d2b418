use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::roster::ReconcileScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    All,
    Placement,
    File,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReconcileRequest {
    pub scope: ScopeKind,
    /// Placement officer ID for `placement`, uploaded file ID for `file`.
    pub id: Option<Uuid>,
}

impl ReconcileRequest {
    pub fn into_scope(self) -> Result<ReconcileScope, String> {
        match (self.scope, self.id) {
            (ScopeKind::All, _) => Ok(ReconcileScope::AllCandidates),
            (ScopeKind::Placement, Some(id)) => Ok(ReconcileScope::ByPlacement(id)),
            (ScopeKind::File, Some(id)) => Ok(ReconcileScope::ByFile(id)),
            (ScopeKind::Placement | ScopeKind::File, None) => {
                Err("id is required for placement and file scopes".to_string())
            }
        }
    }
}

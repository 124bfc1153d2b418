use std::sync::Arc;

use async_trait::async_trait;
use rand::{Rng, distr::Alphanumeric};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use super::normalizer::RosterRow;

/// Shortest password the account system accepts.
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// The hashing backend could not produce a hash
    #[error("credential backend unavailable: {0}")]
    Backend(String),
}

/// One-way transform from a plaintext password to a stored credential hash.
#[async_trait]
pub trait CredentialHasher: Send + Sync + 'static {
    async fn hash(&self, plaintext: &str) -> Result<String, CredentialError>;
}

#[async_trait]
impl<T: CredentialHasher + ?Sized> CredentialHasher for Arc<T> {
    async fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        (**self).hash(plaintext).await
    }
}

/// bcrypt with a fresh salt per call, run off the async executor.
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

#[async_trait]
impl CredentialHasher for BcryptHasher {
    async fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        let plaintext = plaintext.to_string();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(|e| CredentialError::Backend(format!("hashing task failed: {e}")))?
            .map_err(|e| CredentialError::Backend(e.to_string()))
    }
}

/// A password the pipeline generated for a row, to be handed to the placement officer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuedPassword {
    pub row_index: usize,
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct CredentialIssuer {
    hasher: Arc<dyn CredentialHasher>,
    password_length: usize,
}

impl CredentialIssuer {
    pub fn new(hasher: Arc<dyn CredentialHasher>, password_length: usize) -> Self {
        Self {
            hasher,
            password_length: password_length.max(MIN_PASSWORD_LENGTH),
        }
    }

    /// Fill in a password for rows whose roster did not supply one.
    ///
    /// The returned [`IssuedPassword`] is `Some` only when a password was generated.
    pub fn issue_if_missing(&self, mut row: RosterRow) -> (RosterRow, Option<IssuedPassword>) {
        if row.password.as_deref().is_some_and(|p| !p.trim().is_empty()) {
            return (row, None);
        }

        let password = generate_password(self.password_length);
        let issued = IssuedPassword {
            row_index: row.row_index,
            email: row.email.clone(),
            password: password.clone(),
        };
        row.password = Some(password);

        (row, Some(issued))
    }

    pub async fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        self.hasher.hash(plaintext).await
    }
}

fn generate_password(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

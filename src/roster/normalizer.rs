//! Raw row → [`RosterRow`] normalization.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::aliases::{ColumnIndex, RosterField};
use super::decoder::RawRow;

/// Maximum email length per RFC 5321.
const MAX_EMAIL_LENGTH: usize = 254;

const REDACTED: &str = "[REDACTED]";

/// A validated roster entry, ready for provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RosterRow {
    pub row_index: usize,
    pub candidate_name: String,
    pub college_name: Option<String>,
    /// Trimmed and lowercased.
    pub email: String,
    pub phone: Option<String>,
    pub course: Option<String>,
    /// Plaintext as authored; never persisted in audit data.
    #[serde(skip)]
    pub password: Option<String>,
    pub credits_assigned: Option<i32>,
    /// Cells as they appeared in the sheet, password columns redacted.
    pub raw: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RejectReason {
    MissingRequiredField { field: RosterField },
    InvalidEmail { value: String },
    InvalidCredits { value: String },
    /// A whole number too large to store as a balance.
    CreditsOutOfRange { value: String },
    /// The same email already appeared earlier in this file.
    DuplicateInFile {
        #[serde(rename = "firstRow")]
        first_row: usize,
    },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::MissingRequiredField { field } => {
                write!(f, "missing required field '{field}'")
            }
            RejectReason::InvalidEmail { value } => write!(f, "invalid email '{value}'"),
            RejectReason::InvalidCredits { value } => write!(f, "invalid credits '{value}'"),
            RejectReason::CreditsOutOfRange { value } => {
                write!(f, "credits value '{value}' is out of range")
            }
            RejectReason::DuplicateInFile { first_row } => {
                write!(f, "email already listed on row {first_row}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub row_index: usize,
    /// Whatever was in the email column, if anything.
    pub email: Option<String>,
    pub reason: RejectReason,
}

/// Every raw row of a file, split into rows to provision and rows to report.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub rows: Vec<RosterRow>,
    pub rejections: Vec<Rejection>,
    pub total_rows: usize,
}

/// Normalize a single row, resolving its headers on the spot.
pub fn normalize(raw: &RawRow, row_index: usize) -> Result<RosterRow, Rejection> {
    let index = ColumnIndex::resolve(raw.headers());
    normalize_with(&index, raw, row_index)
}

/// Normalize a single row against an already resolved header index.
pub fn normalize_with(
    index: &ColumnIndex,
    raw: &RawRow,
    row_index: usize,
) -> Result<RosterRow, Rejection> {
    let raw_email = lookup(index, raw, RosterField::Email);
    let reject = |reason| Rejection {
        row_index,
        email: raw_email.map(str::to_string),
        reason,
    };

    let candidate_name = lookup(index, raw, RosterField::CandidateName)
        .map(collapse_whitespace)
        .ok_or_else(|| {
            reject(RejectReason::MissingRequiredField {
                field: RosterField::CandidateName,
            })
        })?;

    let email = raw_email.ok_or_else(|| {
        reject(RejectReason::MissingRequiredField {
            field: RosterField::Email,
        })
    })?;
    let email = email.to_lowercase();
    if !is_valid_email(&email) {
        return Err(reject(RejectReason::InvalidEmail {
            value: raw_email.unwrap_or_default().to_string(),
        }));
    }

    let credits_assigned = match lookup(index, raw, RosterField::CreditsAssigned) {
        None => None,
        Some(value) => Some(parse_credits(value).map_err(reject)?),
    };

    // Passwords keep their exact characters; only surrounding blanks count as empty.
    let password = index
        .headers_for(RosterField::Password)
        .iter()
        .filter_map(|header| raw.get(header))
        .find(|value| !value.trim().is_empty())
        .map(str::to_string);

    Ok(RosterRow {
        row_index,
        candidate_name,
        college_name: lookup(index, raw, RosterField::CollegeName).map(collapse_whitespace),
        email,
        phone: lookup(index, raw, RosterField::Phone).map(str::to_string),
        course: lookup(index, raw, RosterField::Course).map(collapse_whitespace),
        password,
        credits_assigned,
        raw: redact(index, raw),
    })
}

/// Normalize every row of a decoded file.
///
/// Each raw row lands in exactly one of `rows` or `rejections`.
pub fn normalize_all(raw_rows: impl IntoIterator<Item = RawRow>) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    let mut index: Option<ColumnIndex> = None;
    let mut first_seen: HashMap<String, usize> = HashMap::new();

    for raw in raw_rows {
        batch.total_rows += 1;
        let index = index.get_or_insert_with(|| ColumnIndex::resolve(raw.headers()));
        let row_index = raw.line;

        match normalize_with(index, &raw, row_index) {
            Ok(row) => {
                if let Some(&first_row) = first_seen.get(&row.email) {
                    batch.rejections.push(Rejection {
                        row_index,
                        email: Some(row.email),
                        reason: RejectReason::DuplicateInFile { first_row },
                    });
                } else {
                    first_seen.insert(row.email.clone(), row_index);
                    batch.rows.push(row);
                }
            }
            Err(rejection) => batch.rejections.push(rejection),
        }
    }

    batch
}

/// Practical address check: one `@`, a dotted domain and an alphabetic TLD of two or more letters.
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH {
        return false;
    }
    if email.contains(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    if !labels_ok {
        return false;
    }

    labels
        .last()
        .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
}

/// Non-negative whole number, optionally written with a leading `+`.
fn parse_credits(value: &str) -> Result<i32, RejectReason> {
    let digits = value.strip_prefix('+').unwrap_or(value);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(RejectReason::InvalidCredits {
            value: value.to_string(),
        });
    }
    digits
        .parse::<i32>()
        .map_err(|_| RejectReason::CreditsOutOfRange {
            value: value.to_string(),
        })
}

/// First non-blank, trimmed value among the columns feeding `field`.
fn lookup<'a>(index: &ColumnIndex, raw: &'a RawRow, field: RosterField) -> Option<&'a str> {
    index
        .headers_for(field)
        .iter()
        .filter_map(|header| raw.get(header))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn redact(index: &ColumnIndex, raw: &RawRow) -> BTreeMap<String, String> {
    let password_headers = index.headers_for(RosterField::Password);
    raw.cells
        .iter()
        .map(|(header, value)| {
            if password_headers.contains(header) && !value.is_empty() {
                (header.clone(), REDACTED.to_string())
            } else {
                (header.clone(), value.clone())
            }
        })
        .collect()
}

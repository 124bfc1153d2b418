//! Header alias table for roster spreadsheets.
//!
//! Placement cells author rosters by hand, so the same column shows up as
//! "Name", "Student Name" or "candidate_name". Every canonical field lists the
//! spellings it accepts; anything else in the header row is ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RosterField {
    CandidateName,
    Email,
    Phone,
    CollegeName,
    Course,
    Password,
    CreditsAssigned,
}

impl RosterField {
    pub const ALL: [RosterField; 7] = [
        RosterField::CandidateName,
        RosterField::Email,
        RosterField::Phone,
        RosterField::CollegeName,
        RosterField::Course,
        RosterField::Password,
        RosterField::CreditsAssigned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RosterField::CandidateName => "candidate_name",
            RosterField::Email => "email",
            RosterField::Phone => "phone",
            RosterField::CollegeName => "college_name",
            RosterField::Course => "course",
            RosterField::Password => "password",
            RosterField::CreditsAssigned => "credits_assigned",
        }
    }

    /// Accepted header spellings, most specific first, already in normalized form.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            RosterField::CandidateName => &[
                "candidate name",
                "student name",
                "full name",
                "name",
            ],
            RosterField::Email => &[
                "email",
                "email address",
                "email id",
                "e-mail",
                "e-mail address",
                "mail",
            ],
            RosterField::Phone => &[
                "phone",
                "phone number",
                "mobile",
                "mobile number",
                "contact",
                "contact number",
            ],
            RosterField::CollegeName => &[
                "college name",
                "college",
                "institute",
                "institution",
                "university",
            ],
            RosterField::Course => &[
                "course",
                "branch",
                "program",
                "programme",
                "degree",
                "department",
            ],
            RosterField::Password => &["password", "pass", "pwd"],
            RosterField::CreditsAssigned => &[
                "credits assigned",
                "credits",
                "credit",
                "credits allotted",
            ],
        }
    }
}

impl std::fmt::Display for RosterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase, trim, and fold runs of whitespace or underscores into one space.
pub fn normalize_header(header: &str) -> String {
    header
        .split(|c: char| c.is_whitespace() || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Which literal headers of a sheet feed each canonical field.
///
/// A field may be fed by several columns (a sheet with both "Name" and
/// "Student Name"); they are kept in alias priority order and the first
/// non-empty one wins per row.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    columns: HashMap<RosterField, Vec<String>>,
}

impl ColumnIndex {
    pub fn resolve<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let normalized: Vec<(String, &str)> = headers
            .into_iter()
            .map(|h| (normalize_header(h), h))
            .collect();

        let mut columns = HashMap::new();
        for field in RosterField::ALL {
            let matches: Vec<String> = field
                .aliases()
                .iter()
                .flat_map(|alias| {
                    normalized
                        .iter()
                        .filter(move |(norm, _)| norm == alias)
                        .map(|(_, literal)| literal.to_string())
                })
                .collect();

            if !matches.is_empty() {
                columns.insert(field, matches);
            }
        }

        Self { columns }
    }

    pub fn headers_for(&self, field: RosterField) -> &[String] {
        self.columns.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: RosterField) -> bool {
        self.columns.contains_key(&field)
    }
}

//! `SeaORM` active enums shared by the roster tables

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum OfficerStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "processed")]
    Processed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Approved => "approved",
            FileStatus::Rejected => "rejected",
            FileStatus::Processed => "processed",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum RegistrationMethod {
    /// Account created by the student through the public sign-up flow.
    #[sea_orm(string_value = "self_registered")]
    #[serde(rename = "self")]
    SelfRegistered,
    /// Account provisioned from a placement roster.
    #[sea_orm(string_value = "placement")]
    #[serde(rename = "placement")]
    Placement,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::ActiveEnum;

    #[test]
    fn test_registration_method_stored_values() {
        assert_eq!(
            RegistrationMethod::SelfRegistered.to_value(),
            "self_registered"
        );
        assert_eq!(RegistrationMethod::Placement.to_value(), "placement");
        assert_eq!(
            RegistrationMethod::try_from_value(&"self_registered".to_string()).unwrap(),
            RegistrationMethod::SelfRegistered
        );
    }

    #[test]
    fn test_registration_method_api_names() {
        assert_eq!(
            serde_json::to_value(RegistrationMethod::SelfRegistered).unwrap(),
            "self"
        );
        assert_eq!(
            serde_json::to_value(RegistrationMethod::Placement).unwrap(),
            "placement"
        );
    }
}

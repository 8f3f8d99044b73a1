use crate::flag::{FlagType, FlagValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Query string for the per-package flag listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagQuery {
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    /// Phenotype user the values are read for; `""` is the device-wide user.
    #[serde(default)]
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagsResponse {
    pub package: String,
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    pub user: String,
    pub flags: BTreeMap<String, FlagValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub name: String,
    pub value: FlagValue,
    /// Users the override row is written for, one row per entry.
    pub users: Vec<String>,
    #[serde(default)]
    pub committed: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOverrideResult {
    pub user: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UserOverrideResult {
    pub fn success(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ok: true,
            error: None,
        }
    }

    pub fn failure(user: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Outcome of one override fanned out over several users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideReport {
    pub package: String,
    pub name: String,
    pub results: Vec<UserOverrideResult>,
}

impl OverrideReport {
    pub fn is_complete(&self) -> bool {
        self.results.iter().all(|r| r.ok)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.results.iter().filter(|r| r.ok).map(|r| r.user.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = &UserOverrideResult> {
        self.results.iter().filter(|r| !r.ok)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub deleted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCacheReport {
    pub package: String,
    pub android_package: String,
    /// Whether an on-disk phenotype cache directory existed and was removed.
    pub cache_removed: bool,
    pub force_stopped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndroidPackageResponse {
    pub package: String,
    pub android_package: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub pid: u32,
}

/// Error payload returned by the service for every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_report_lists_both_sides() {
        let report = OverrideReport {
            package: "com.google.android.gms.photos".to_string(),
            name: "45353596".to_string(),
            results: vec![
                UserOverrideResult::success(""),
                UserOverrideResult::failure("work@example.com", "database is locked"),
            ],
        };

        assert!(!report.is_complete());
        assert_eq!(report.succeeded().collect::<Vec<_>>(), vec![""]);
        assert_eq!(
            report.failed().map(|r| r.user.as_str()).collect::<Vec<_>>(),
            vec!["work@example.com"]
        );
    }

    #[test]
    fn flag_query_defaults_to_device_user() {
        let query: FlagQuery = serde_json::from_str(r#"{"type":"int"}"#).unwrap();
        assert_eq!(query.flag_type, FlagType::Int);
        assert_eq!(query.user, "");
    }
}

//! Export/import file format for sharing overrides between devices.

use crate::flag::{FlagType, FlagValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Overridden values of one package, grouped by type.
///
/// Extension flags are not representable here; they are skipped on export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverriddenFlags {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bool: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub int: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub float: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub string: BTreeMap<String, String>,
}

impl OverriddenFlags {
    /// Adds a value; returns `false` for types the container cannot hold.
    pub fn insert(&mut self, name: impl Into<String>, value: FlagValue) -> bool {
        let name = name.into();
        match value {
            FlagValue::Bool(v) => {
                self.bool.insert(name, v);
            }
            FlagValue::Int(v) => {
                self.int.insert(name, v);
            }
            FlagValue::Float(v) => {
                self.float.insert(name, v);
            }
            FlagValue::String(v) => {
                self.string.insert(name, v);
            }
            FlagValue::Extension(_) => return false,
        }
        true
    }

    pub fn len(&self) -> usize {
        self.bool.len() + self.int.len() + self.float.len() + self.string.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn types(&self) -> impl Iterator<Item = FlagType> + '_ {
        [
            (FlagType::Bool, self.bool.is_empty()),
            (FlagType::Int, self.int.is_empty()),
            (FlagType::Float, self.float.is_empty()),
            (FlagType::String, self.string.is_empty()),
        ]
        .into_iter()
        .filter(|(_, empty)| !empty)
        .map(|(t, _)| t)
    }

    /// All entries as typed values, bools first then ints, floats, strings.
    pub fn values(&self) -> Vec<(String, FlagValue)> {
        let bools = self
            .bool
            .iter()
            .map(|(k, v)| (k.clone(), FlagValue::Bool(*v)));
        let ints = self
            .int
            .iter()
            .map(|(k, v)| (k.clone(), FlagValue::Int(*v)));
        let floats = self
            .float
            .iter()
            .map(|(k, v)| (k.clone(), FlagValue::Float(*v)));
        let strings = self
            .string
            .iter()
            .map(|(k, v)| (k.clone(), FlagValue::String(v.clone())));
        bools.chain(ints).chain(floats).chain(strings).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedFlags {
    pub package_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    pub flags: OverriddenFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_file_written_by_older_exports() {
        let raw = r#"{
            "packageName": "com.google.android.apps.photos",
            "flags": { "bool": { "45389969": true, "photos_enable_x": false } }
        }"#;
        let loaded: LoadedFlags = serde_json::from_str(raw).unwrap();

        assert_eq!(loaded.package_name, "com.google.android.apps.photos");
        assert!(loaded.exported_at.is_none());
        assert_eq!(loaded.flags.len(), 2);
        assert_eq!(loaded.flags.types().collect::<Vec<_>>(), vec![FlagType::Bool]);
    }

    #[test]
    fn extension_values_are_rejected() {
        let mut flags = OverriddenFlags::default();
        assert!(!flags.insert("blob", FlagValue::Extension(vec![1, 2])));
        assert!(flags.insert("n", FlagValue::Int(7)));
        assert_eq!(flags.values(), vec![("n".to_string(), FlagValue::Int(7))]);
    }
}

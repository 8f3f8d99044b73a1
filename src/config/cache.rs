use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Root of per-app private data; the phenotype cache lives at
    /// `<data_root>/<android package>/files/phenotype`.
    /// TOML: `cache.data_root`. Default: `/data/data`.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    /// Command run with the Android package appended after the cache is removed.
    /// Empty skips the force-stop.
    /// TOML: `cache.force_stop_command`. Default: `["am", "force-stop"]`.
    #[serde(default = "default_force_stop_command")]
    pub force_stop_command: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            force_stop_command: default_force_stop_command(),
        }
    }
}

fn default_data_root() -> PathBuf {
    PathBuf::from("/data/data")
}

fn default_force_stop_command() -> Vec<String> {
    vec!["am".to_string(), "force-stop".to_string()]
}

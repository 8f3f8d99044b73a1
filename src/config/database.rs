use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Phenotype database of Google Play Services.
    /// TOML: `database.path`.
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Create the phenotype tables when missing. Only meant for scratch databases;
    /// the on-device file is never altered.
    /// TOML: `database.bootstrap_schema`. Default: `false`.
    #[serde(default)]
    pub bootstrap_schema: bool,

    /// SQLite busy timeout while GMS holds the write lock.
    /// TOML: `database.busy_timeout_secs`. Default: `5`.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            bootstrap_schema: false,
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

fn default_path() -> PathBuf {
    PathBuf::from("/data/data/com.google.android.gms/databases/phenotype.db")
}

fn default_busy_timeout_secs() -> u64 {
    5
}

mod basic;
mod cache;
mod database;
mod root;

pub use basic::BasicConfig;
pub use cache::CacheConfig;
pub use database::DatabaseConfig;
pub use root::RootConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Logging and listener settings (see `basic` table in gmsflags.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Location and open options of the phenotype database.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// How the privileged service is launched.
    #[serde(default)]
    pub root: RootConfig,

    /// Phenotype cache invalidation settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

const DEFAULT_CONFIG_FILE: &str = "gmsflags.toml";
const ENV_PREFIX: &str = "GMSFLAGS_";

impl Config {
    /// Builds a Figment that merges defaults, a TOML file and `GMSFLAGS_*` env vars.
    ///
    /// An explicit `path` is always merged (and must exist at extraction time);
    /// otherwise `gmsflags.toml` in the working directory is used when present.
    /// Nested keys use `__`, e.g. `GMSFLAGS_ROOT__TIMEOUT_SECS=30`.
    pub fn figment(path: Option<&Path>) -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = match path {
            Some(path) => figment.merge(Toml::file_exact(path)),
            None if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() => {
                figment.merge(Toml::file(DEFAULT_CONFIG_FILE))
            }
            None => figment,
        };
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_the_gms_phenotype_database() {
        let cfg: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .extract()
            .unwrap();

        assert_eq!(
            cfg.database.path,
            PathBuf::from("/data/data/com.google.android.gms/databases/phenotype.db")
        );
        assert!(!cfg.database.bootstrap_schema);
        assert_eq!(cfg.root.elevate_command, vec!["su", "-c"]);
        assert_eq!(cfg.root.timeout_secs, 15);
        assert_eq!(cfg.cache.force_stop_command, vec!["am", "force-stop"]);
        assert!(cfg.basic.listen_addr.is_loopback());
    }

    #[test]
    fn toml_tables_override_defaults() {
        let toml = r#"
            [database]
            path = "/tmp/phenotype.db"
            bootstrap_schema = true

            [root]
            elevate_command = []
            timeout_secs = 3
        "#;
        let cfg: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap();

        assert_eq!(cfg.database.path, PathBuf::from("/tmp/phenotype.db"));
        assert!(cfg.database.bootstrap_schema);
        assert!(cfg.root.elevate_command.is_empty());
        assert_eq!(cfg.root.timeout_secs, 3);
        assert_eq!(cfg.basic.loglevel, "info");
    }

    #[test]
    fn shipped_example_file_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("gmsflags.example.toml");
        let cfg: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file_exact(path))
            .extract()
            .unwrap();
        let defaults = Config::default();

        assert_eq!(cfg.database.path, defaults.database.path);
        assert_eq!(cfg.root.elevate_command, defaults.root.elevate_command);
        assert_eq!(cfg.cache.data_root, defaults.cache.data_root);
        assert!(cfg.root.service_binary.is_none());
    }
}

use crate::config::CacheConfig;
use crate::error::FlagsError;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOutcome {
    pub cache_removed: bool,
    pub force_stopped: bool,
}

/// Invalidates the Phenotype config an app keeps in its private data.
///
/// Only files under `data_root` are touched; database rows are not.
#[derive(Debug, Clone)]
pub struct PhenotypeCache {
    data_root: PathBuf,
    force_stop_command: Vec<String>,
}

impl PhenotypeCache {
    pub fn new(cfg: &CacheConfig) -> Self {
        Self {
            data_root: cfg.data_root.clone(),
            force_stop_command: cfg.force_stop_command.clone(),
        }
    }

    pub fn cache_dir(&self, android_package: &str) -> Result<PathBuf, FlagsError> {
        if !is_android_package_name(android_package) {
            return Err(FlagsError::InvalidValue(format!(
                "`{android_package}` is not an Android package name"
            )));
        }
        Ok(self
            .data_root
            .join(android_package)
            .join("files")
            .join("phenotype"))
    }

    pub async fn clear(&self, android_package: &str) -> Result<CacheOutcome, FlagsError> {
        let dir = self.cache_dir(android_package)?;

        let cache_removed = match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        debug!(dir = %dir.display(), cache_removed, "Phenotype cache directory processed");

        let force_stopped = self.force_stop(android_package).await;

        info!(android_package, cache_removed, force_stopped, "Phenotype cache cleared");
        Ok(CacheOutcome {
            cache_removed,
            force_stopped,
        })
    }

    /// A failed force-stop is logged, not fatal: the cache is already gone
    /// and the app picks it up on its next start.
    async fn force_stop(&self, android_package: &str) -> bool {
        let Some((program, args)) = self.force_stop_command.split_first() else {
            return false;
        };

        let status = Command::new(program)
            .args(args)
            .arg(android_package)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                warn!(android_package, %status, "Force-stop command failed");
                false
            }
            Err(e) => {
                warn!(android_package, error = %e, program, "Force-stop command could not run");
                false
            }
        }
    }
}

fn is_android_package_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(root: &str) -> PhenotypeCache {
        PhenotypeCache::new(&CacheConfig {
            data_root: PathBuf::from(root),
            force_stop_command: Vec::new(),
        })
    }

    #[test]
    fn cache_dir_lives_under_app_files() {
        let dir = cache("/data/data")
            .cache_dir("com.google.android.apps.photos")
            .unwrap();
        assert_eq!(
            dir,
            PathBuf::from("/data/data/com.google.android.apps.photos/files/phenotype")
        );
    }

    #[test]
    fn traversal_is_rejected() {
        let cache = cache("/data/data");
        assert!(cache.cache_dir("../system").is_err());
        assert!(cache.cache_dir("com/evil").is_err());
        assert!(cache.cache_dir("").is_err());
        assert!(cache.cache_dir("com..x").is_err());
    }

    #[tokio::test]
    async fn missing_cache_is_not_an_error() {
        let root = std::env::temp_dir().join(format!("gmsflags-cache-{}", std::process::id()));
        let outcome = cache(root.to_str().unwrap())
            .clear("com.example.none")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CacheOutcome {
                cache_removed: false,
                force_stopped: false,
            }
        );
    }
}

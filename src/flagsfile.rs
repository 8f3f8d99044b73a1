use crate::error::FlagsError;
use gmsflags_schema::LoadedFlags;
use std::path::Path;
use tracing::debug;

/// Reads an exported flags file.
pub async fn read(path: &Path) -> Result<LoadedFlags, FlagsError> {
    let raw = tokio::fs::read(path).await?;
    let loaded: LoadedFlags = serde_json::from_slice(&raw)?;
    debug!(
        path = %path.display(),
        package = %loaded.package_name,
        flags = loaded.flags.len(),
        "Loaded flags file"
    );
    Ok(loaded)
}

/// Writes `flags` as pretty JSON, replacing any existing file.
pub async fn write(path: &Path, flags: &LoadedFlags) -> Result<(), FlagsError> {
    let mut raw = serde_json::to_vec_pretty(flags)?;
    raw.push(b'\n');
    tokio::fs::write(path, raw).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmsflags_schema::{FlagValue, OverriddenFlags};

    #[tokio::test]
    async fn written_file_reads_back() {
        let path = std::env::temp_dir().join(format!("gmsflags-file-{}.json", std::process::id()));
        let mut flags = OverriddenFlags::default();
        flags.insert("45389969", FlagValue::Bool(true));
        flags.insert("sync_period", FlagValue::Float(2.5));
        let loaded = LoadedFlags {
            package_name: "com.google.android.apps.photos".to_string(),
            exported_at: None,
            flags,
        };

        write(&path, &loaded).await.unwrap();
        let back = read(&path).await.unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(back, loaded);
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = read(Path::new("/nonexistent/gmsflags.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlagsError::IoError(_)));
    }
}

use crate::client::connector::RootConnector;
use crate::error::FlagsError;
use chrono::Utc;
use gmsflags_schema::{
    ClearCacheReport, DeleteReport, FlagType, FlagValue, LoadedFlags, OverriddenFlags,
    OverrideReport, OverrideRequest,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Flag operations as the front end sees them.
///
/// Every call goes through the connector's current handle, so nothing here
/// blocks or retries when the privileged connection is not ready.
#[derive(Clone)]
pub struct GmsRepository {
    connector: Arc<RootConnector>,
}

impl GmsRepository {
    pub fn new(connector: Arc<RootConnector>) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &Arc<RootConnector> {
        &self.connector
    }

    pub async fn users(&self) -> Result<Vec<String>, FlagsError> {
        self.connector.database()?.list_users().await
    }

    pub async fn flags(
        &self,
        package: &str,
        flag_type: FlagType,
        user: &str,
    ) -> Result<BTreeMap<String, FlagValue>, FlagsError> {
        self.connector
            .database()?
            .query_flags(package, flag_type, user)
            .await
    }

    pub async fn overridden(
        &self,
        package: &str,
        flag_type: FlagType,
        user: &str,
    ) -> Result<BTreeMap<String, FlagValue>, FlagsError> {
        self.connector
            .database()?
            .query_overrides(package, flag_type, user)
            .await
    }

    /// Overrides `name` for every user known to the database.
    pub async fn override_flag(
        &self,
        package: &str,
        name: &str,
        value: FlagValue,
    ) -> Result<OverrideReport, FlagsError> {
        let users = self.target_users().await?;
        self.override_flag_for(package, name, value, users).await
    }

    /// Overrides `name` once per entry of `users`; per-user failures land in the report.
    pub async fn override_flag_for(
        &self,
        package: &str,
        name: &str,
        value: FlagValue,
        users: Vec<String>,
    ) -> Result<OverrideReport, FlagsError> {
        let request = OverrideRequest {
            name: name.to_string(),
            value,
            users,
            committed: 0,
        };
        let report = self
            .connector
            .database()?
            .override_flag(package, &request)
            .await?;

        if report.is_complete() {
            info!(package, name, users = report.results.len(), "Flag overridden");
        } else {
            warn!(
                package,
                name,
                failed = report.failed().count(),
                users = report.results.len(),
                "Flag override partially failed"
            );
        }
        Ok(report)
    }

    /// Applies a whole set of overrides, one report per flag.
    ///
    /// Users are enumerated once. A failed flag does not stop the remaining
    /// ones; only a lost connection does.
    pub async fn override_flags(
        &self,
        package: &str,
        flags: &OverriddenFlags,
        clear_cache: bool,
    ) -> Result<Vec<OverrideReport>, FlagsError> {
        if flags.is_empty() {
            return Ok(Vec::new());
        }

        let users = self.target_users().await?;
        let mut reports = Vec::with_capacity(flags.len());
        for (name, value) in flags.values() {
            let report = self
                .override_flag_for(package, &name, value, users.clone())
                .await?;
            reports.push(report);
        }

        if clear_cache {
            self.clear_cache(package).await?;
        }
        Ok(reports)
    }

    pub async fn delete_overrides(&self, package: &str) -> Result<DeleteReport, FlagsError> {
        self.connector.database()?.delete_overrides(package).await
    }

    pub async fn delete_override(
        &self,
        package: &str,
        name: &str,
    ) -> Result<DeleteReport, FlagsError> {
        self.connector
            .database()?
            .delete_override(package, name)
            .await
    }

    pub async fn clear_cache(&self, package: &str) -> Result<ClearCacheReport, FlagsError> {
        self.connector.database()?.clear_cache(package).await
    }

    /// Snapshot of the overrides `user` has for `package`.
    pub async fn export(&self, package: &str, user: &str) -> Result<LoadedFlags, FlagsError> {
        let db = self.connector.database()?;
        let mut flags = OverriddenFlags::default();
        for flag_type in FlagType::ALL {
            if flag_type == FlagType::Extension {
                continue;
            }
            for (name, value) in db.query_overrides(package, flag_type, user).await? {
                flags.insert(name, value);
            }
        }

        Ok(LoadedFlags {
            package_name: package.to_string(),
            exported_at: Some(Utc::now()),
            flags,
        })
    }

    pub async fn import(
        &self,
        loaded: &LoadedFlags,
        clear_cache: bool,
    ) -> Result<Vec<OverrideReport>, FlagsError> {
        if loaded.package_name.is_empty() {
            return Err(FlagsError::InvalidValue(
                "flags file has no package name".to_string(),
            ));
        }
        self.override_flags(&loaded.package_name, &loaded.flags, clear_cache)
            .await
    }

    async fn target_users(&self) -> Result<Vec<String>, FlagsError> {
        let users = self.users().await?;
        if users.is_empty() {
            // A database with no default rows yet still has the device-wide user.
            Ok(vec![String::new()])
        } else {
            Ok(users)
        }
    }
}

pub trait OverrideReportExt {
    /// Collapses a report into an error when any user failed.
    fn into_result(self) -> Result<OverrideReport, FlagsError>;
}

impl OverrideReportExt for OverrideReport {
    fn into_result(self) -> Result<OverrideReport, FlagsError> {
        if self.is_complete() {
            return Ok(self);
        }
        let succeeded = self.succeeded().map(str::to_string).collect();
        let (_, failed): (Vec<_>, Vec<_>) = self.results.into_iter().partition(|r| r.ok);
        Err(FlagsError::PartialOverrideFailure {
            package: self.package,
            name: self.name,
            succeeded,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmsflags_schema::UserOverrideResult;

    fn report(results: Vec<UserOverrideResult>) -> OverrideReport {
        OverrideReport {
            package: "com.google.android.gms".to_string(),
            name: "45352228".to_string(),
            results,
        }
    }

    #[test]
    fn complete_report_stays_ok() {
        let r = report(vec![
            UserOverrideResult::success(""),
            UserOverrideResult::success("0"),
        ]);
        assert!(r.into_result().is_ok());
    }

    #[test]
    fn partial_report_lists_both_sides() {
        let r = report(vec![
            UserOverrideResult::success("0"),
            UserOverrideResult::failure("10", "database is locked"),
            UserOverrideResult::success("11"),
        ]);

        match r.into_result() {
            Err(FlagsError::PartialOverrideFailure {
                succeeded, failed, ..
            }) => {
                assert_eq!(succeeded, vec!["0".to_string(), "11".to_string()]);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].user, "10");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}

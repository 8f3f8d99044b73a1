use crate::config::DatabaseConfig;
use crate::db::models::{OVERRIDE_FLAG_KIND, ValueColumns, decode_named_value};
use crate::db::schema::{PHENOTYPE_INIT, REQUIRED_TABLES};
use crate::error::{FlagsError, IsRetryable};
use crate::utils::logging::with_pretty_json_debug;
use backon::{ExponentialBuilder, Retryable};
use gmsflags_schema::{FlagType, FlagValue, OverrideReport, OverrideRequest, UserOverrideResult};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retries one user's override row while Play Services holds the write lock.
static BUSY_RETRY_POLICY: LazyLock<ExponentialBuilder> = LazyLock::new(|| {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_millis(500))
        .with_max_times(3)
        .with_jitter()
});

/// Key of a per-package, per-type, per-user flag listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagLookup {
    pub package: String,
    pub flag_type: FlagType,
    pub user: String,
}

#[derive(Debug)]
pub enum DbActorMessage {
    /// Effective values (override if present, else newest default).
    QueryFlags(
        FlagLookup,
        RpcReplyPort<Result<BTreeMap<String, FlagValue>, FlagsError>>,
    ),

    /// Overridden values only.
    QueryOverrides(
        FlagLookup,
        RpcReplyPort<Result<BTreeMap<String, FlagValue>, FlagsError>>,
    ),

    /// Upsert one override row per requested user.
    OverrideFlag(
        String,
        OverrideRequest,
        RpcReplyPort<Result<OverrideReport, FlagsError>>,
    ),

    /// Remove every override of a package, all users.
    DeleteOverrides(String, RpcReplyPort<Result<u64, FlagsError>>),

    /// Remove the overrides of one flag, all users.
    DeleteOverride(String, String, RpcReplyPort<Result<u64, FlagsError>>),

    /// Distinct users present in `Flags`.
    ListUsers(RpcReplyPort<Result<Vec<String>, FlagsError>>),

    /// Android package owning a Phenotype package.
    AndroidPackage(String, RpcReplyPort<Result<String, FlagsError>>),
}

#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

impl DbActorHandle {
    pub async fn query_flags(
        &self,
        lookup: FlagLookup,
    ) -> Result<BTreeMap<String, FlagValue>, FlagsError> {
        ractor::call!(self.actor, DbActorMessage::QueryFlags, lookup)
            .map_err(|e| FlagsError::RactorError(format!("DbActor QueryFlags RPC failed: {e}")))?
    }

    pub async fn query_overrides(
        &self,
        lookup: FlagLookup,
    ) -> Result<BTreeMap<String, FlagValue>, FlagsError> {
        ractor::call!(self.actor, DbActorMessage::QueryOverrides, lookup).map_err(|e| {
            FlagsError::RactorError(format!("DbActor QueryOverrides RPC failed: {e}"))
        })?
    }

    pub async fn override_flag(
        &self,
        package: String,
        request: OverrideRequest,
    ) -> Result<OverrideReport, FlagsError> {
        ractor::call!(self.actor, DbActorMessage::OverrideFlag, package, request).map_err(|e| {
            FlagsError::RactorError(format!("DbActor OverrideFlag RPC failed: {e}"))
        })?
    }

    pub async fn delete_overrides(&self, package: String) -> Result<u64, FlagsError> {
        ractor::call!(self.actor, DbActorMessage::DeleteOverrides, package).map_err(|e| {
            FlagsError::RactorError(format!("DbActor DeleteOverrides RPC failed: {e}"))
        })?
    }

    pub async fn delete_override(&self, package: String, name: String) -> Result<u64, FlagsError> {
        ractor::call!(self.actor, DbActorMessage::DeleteOverride, package, name).map_err(|e| {
            FlagsError::RactorError(format!("DbActor DeleteOverride RPC failed: {e}"))
        })?
    }

    pub async fn list_users(&self) -> Result<Vec<String>, FlagsError> {
        ractor::call!(self.actor, DbActorMessage::ListUsers)
            .map_err(|e| FlagsError::RactorError(format!("DbActor ListUsers RPC failed: {e}")))?
    }

    pub async fn android_package(&self, package: String) -> Result<String, FlagsError> {
        ractor::call!(self.actor, DbActorMessage::AndroidPackage, package).map_err(|e| {
            FlagsError::RactorError(format!("DbActor AndroidPackage RPC failed: {e}"))
        })?
    }

    /// Stops the actor; the pool is closed in `post_stop`.
    pub fn stop(&self) {
        self.actor.stop(None);
    }
}

struct DbActorState {
    pool: SqlitePool,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = DatabaseConfig;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        cfg: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        // Journal mode is left as Play Services configured it.
        let connect_opts = SqliteConnectOptions::new()
            .filename(&cfg.path)
            .create_if_missing(cfg.bootstrap_schema)
            .busy_timeout(Duration::from_secs(cfg.busy_timeout_secs));

        // A single connection keeps this process a single writer.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_opts)
            .await
            .map_err(|e| {
                ActorProcessingErr::from(format!(
                    "db open failed for {}: {e}",
                    cfg.path.display()
                ))
            })?;

        if cfg.bootstrap_schema {
            apply_schema(&pool)
                .await
                .map_err(|e| ActorProcessingErr::from(format!("db schema init failed: {e}")))?;
        }

        verify_schema(&pool)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("not a phenotype database: {e}")))?;

        info!(path = %cfg.path.display(), "DbActor initialized");
        Ok(DbActorState { pool })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.pool.close().await;
        Ok(())
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DbActorMessage::QueryFlags(lookup, reply) => {
                let res = self.query_flags(&state.pool, &lookup).await;
                let _ = reply.send(res);
            }
            DbActorMessage::QueryOverrides(lookup, reply) => {
                let res = self.query_overrides(&state.pool, &lookup).await;
                let _ = reply.send(res);
            }
            DbActorMessage::OverrideFlag(package, request, reply) => {
                let res = self.override_flag(&state.pool, &package, &request).await;
                let _ = reply.send(res);
            }
            DbActorMessage::DeleteOverrides(package, reply) => {
                let res = self.delete_overrides(&state.pool, &package).await;
                let _ = reply.send(res);
            }
            DbActorMessage::DeleteOverride(package, name, reply) => {
                let res = self.delete_override(&state.pool, &package, &name).await;
                let _ = reply.send(res);
            }
            DbActorMessage::ListUsers(reply) => {
                let res = self.list_users(&state.pool).await;
                let _ = reply.send(res);
            }
            DbActorMessage::AndroidPackage(package, reply) => {
                let res = self.android_package(&state.pool, &package).await;
                let _ = reply.send(res);
            }
        }
        Ok(())
    }
}

impl DbActor {
    async fn query_flags(
        &self,
        pool: &SqlitePool,
        lookup: &FlagLookup,
    ) -> Result<BTreeMap<String, FlagValue>, FlagsError> {
        let column = lookup.flag_type.column();
        // Bare `value` comes from the row holding MAX(version).
        let sql = format!(
            r#"
        SELECT name, {column} AS value, MAX(version) AS version
        FROM Flags
        WHERE packageName = ? AND user = ? AND {column} IS NOT NULL
        GROUP BY name
        "#
        );
        let rows = sqlx::query(&sql)
            .bind(lookup.package.as_str())
            .bind(lookup.user.as_str())
            .fetch_all(pool)
            .await?;

        let mut flags = rows
            .iter()
            .map(|row| decode_named_value(row, lookup.flag_type))
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        flags.extend(self.query_overrides(pool, lookup).await?);
        Ok(flags)
    }

    async fn query_overrides(
        &self,
        pool: &SqlitePool,
        lookup: &FlagLookup,
    ) -> Result<BTreeMap<String, FlagValue>, FlagsError> {
        let column = lookup.flag_type.column();
        let sql = format!(
            r#"
        SELECT name, {column} AS value
        FROM FlagOverrides
        WHERE packageName = ? AND user = ? AND {column} IS NOT NULL
        ORDER BY committed
        "#
        );
        let rows = sqlx::query(&sql)
            .bind(lookup.package.as_str())
            .bind(lookup.user.as_str())
            .fetch_all(pool)
            .await?;

        let flags = rows
            .iter()
            .map(|row| decode_named_value(row, lookup.flag_type))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(flags)
    }

    async fn override_flag(
        &self,
        pool: &SqlitePool,
        package: &str,
        request: &OverrideRequest,
    ) -> Result<OverrideReport, FlagsError> {
        if request.name.trim().is_empty() {
            return Err(FlagsError::InvalidValue("flag name is empty".to_string()));
        }
        if request.users.is_empty() {
            return Err(FlagsError::InvalidValue(
                "override needs at least one user".to_string(),
            ));
        }

        with_pretty_json_debug(request, |json| {
            debug!(package, "Override request:\n{json}");
        });

        let mut results = Vec::with_capacity(request.users.len());
        for user in &request.users {
            let attempt = (|| upsert_override(pool, package, request, user))
                .retry(*BUSY_RETRY_POLICY)
                .when(|e: &FlagsError| e.is_retryable())
                .notify(|e: &FlagsError, delay: Duration| {
                    debug!(
                        package,
                        name = %request.name,
                        user = %user,
                        error = %e,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Database busy, retrying override row"
                    );
                })
                .await;

            match attempt {
                Ok(()) => results.push(UserOverrideResult::success(user.as_str())),
                Err(e) => {
                    warn!(
                        package,
                        name = %request.name,
                        user = %user,
                        error = %e,
                        "Override row failed"
                    );
                    results.push(UserOverrideResult::failure(user.as_str(), e.to_string()));
                }
            }
        }

        let report = OverrideReport {
            package: package.to_string(),
            name: request.name.clone(),
            results,
        };
        info!(
            package,
            name = %report.name,
            users = report.results.len(),
            failed = report.failed().count(),
            "Override applied"
        );
        Ok(report)
    }

    async fn delete_overrides(&self, pool: &SqlitePool, package: &str) -> Result<u64, FlagsError> {
        let res = sqlx::query("DELETE FROM FlagOverrides WHERE packageName = ?")
            .bind(package)
            .execute(pool)
            .await?;
        info!(package, deleted = res.rows_affected(), "Overrides deleted");
        Ok(res.rows_affected())
    }

    async fn delete_override(
        &self,
        pool: &SqlitePool,
        package: &str,
        name: &str,
    ) -> Result<u64, FlagsError> {
        let res = sqlx::query("DELETE FROM FlagOverrides WHERE packageName = ? AND name = ?")
            .bind(package)
            .bind(name)
            .execute(pool)
            .await?;
        info!(package, name, deleted = res.rows_affected(), "Override deleted");
        Ok(res.rows_affected())
    }

    async fn list_users(&self, pool: &SqlitePool) -> Result<Vec<String>, FlagsError> {
        let users: Vec<String> = sqlx::query_scalar("SELECT DISTINCT user FROM Flags ORDER BY user")
            .fetch_all(pool)
            .await?;
        Ok(users)
    }

    async fn android_package(&self, pool: &SqlitePool, package: &str) -> Result<String, FlagsError> {
        let android: Option<String> =
            sqlx::query_scalar("SELECT androidPackageName FROM Packages WHERE packageName = ?")
                .bind(package)
                .fetch_optional(pool)
                .await?;

        android
            .filter(|name| !name.is_empty())
            .ok_or_else(|| FlagsError::NotFound(format!("no Android package for {package}")))
    }
}

/// Replaces the override row of one user inside a single transaction.
///
/// Rows of every `committed` state are removed so a key never has two overrides.
async fn upsert_override(
    pool: &SqlitePool,
    package: &str,
    request: &OverrideRequest,
    user: &str,
) -> Result<(), FlagsError> {
    let cols = ValueColumns::from(&request.value);
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        DELETE FROM FlagOverrides
        WHERE packageName = ? AND user = ? AND name = ?
        "#,
    )
    .bind(package)
    .bind(user)
    .bind(request.name.as_str())
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO FlagOverrides (
            packageName, user, name, flagType, intVal, boolVal, floatVal, stringVal, extensionVal, committed
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(package)
    .bind(user)
    .bind(request.name.as_str())
    .bind(OVERRIDE_FLAG_KIND)
    .bind(cols.int_val)
    .bind(cols.bool_val)
    .bind(cols.float_val)
    .bind(cols.string_val.as_deref())
    .bind(cols.extension_val.as_deref())
    .bind(request.committed)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Spawn the database actor and return a cloneable handle.
pub async fn spawn(cfg: DatabaseConfig) -> Result<DbActorHandle, FlagsError> {
    let (actor, _jh) = ractor::Actor::spawn(None, DbActor, cfg)
        .await
        .map_err(|e| FlagsError::RactorError(format!("failed to spawn DbActor: {e}")))?;

    Ok(DbActorHandle { actor })
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), FlagsError> {
    for stmt in PHENOTYPE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}

async fn verify_schema(pool: &SqlitePool) -> Result<(), FlagsError> {
    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(pool)
            .await?;

    let missing: Vec<&str> = REQUIRED_TABLES
        .iter()
        .copied()
        .filter(|required| !tables.iter().any(|t| t == required))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(FlagsError::QueryFailed(format!(
            "missing tables: {}",
            missing.join(", ")
        )))
    }
}

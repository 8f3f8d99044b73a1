#![allow(dead_code)]

use gmsflags::config::DatabaseConfig;
use gmsflags::db::PHENOTYPE_INIT;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const GMS: &str = "com.google.android.gms";
pub const PHOTOS: &str = "com.google.android.apps.photos";
pub const PHOTOS_ANDROID: &str = "com.google.android.apps.photos";

/// Unique path under the temp dir; nothing is created.
pub fn temp_path(prefix: &str, ext: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "gmsflags-{prefix}-{}-{nanos}.{ext}",
        std::process::id()
    ))
}

/// Opens (creating if needed) a phenotype database for seeding.
pub async fn open_seed_pool(path: &Path) -> SqlitePool {
    let opts = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .expect("open seed database");

    for stmt in PHENOTYPE_INIT.split(';') {
        let s = stmt.trim();
        if !s.is_empty() {
            sqlx::query(s).execute(&pool).await.expect("apply schema");
        }
    }
    pool
}

/// A small device: two users, a few versioned defaults and one package mapping.
pub async fn seed_device(pool: &SqlitePool) {
    sqlx::query("INSERT INTO Packages (packageName, version, androidPackageName) VALUES (?, 1, ?)")
        .bind(PHOTOS)
        .bind(PHOTOS_ANDROID)
        .execute(pool)
        .await
        .expect("seed package");
    sqlx::query("INSERT INTO Packages (packageName, version, androidPackageName) VALUES (?, 1, '')")
        .bind(GMS)
        .execute(pool)
        .await
        .expect("seed package");

    for user in ["", "0"] {
        // Older version first; the newer row is the default.
        insert_default(pool, PHOTOS, 1, user, "45389969", "boolVal", "0").await;
        insert_default(pool, PHOTOS, 2, user, "45389969", "boolVal", "1").await;
        insert_default(pool, PHOTOS, 2, user, "photos_max_items", "intVal", "250").await;
        insert_default(pool, PHOTOS, 2, user, "sync_ratio", "floatVal", "0.5").await;
        insert_default(pool, PHOTOS, 2, user, "server_host", "stringVal", "'photos.example'").await;
    }
}

pub async fn insert_default(
    pool: &SqlitePool,
    package: &str,
    version: i64,
    user: &str,
    name: &str,
    column: &str,
    literal: &str,
) {
    let sql = format!(
        "INSERT INTO Flags (packageName, version, user, name, {column}) VALUES (?, ?, ?, ?, {literal})"
    );
    sqlx::query(&sql)
        .bind(package)
        .bind(version)
        .bind(user)
        .bind(name)
        .execute(pool)
        .await
        .expect("seed flag");
}

/// Seeds a database file and returns the config the actor should open it with.
pub async fn seeded_database(prefix: &str) -> (DatabaseConfig, PathBuf) {
    let path = temp_path(prefix, "sqlite");
    let pool = open_seed_pool(&path).await;
    seed_device(&pool).await;
    pool.close().await;

    let cfg = DatabaseConfig {
        path: path.clone(),
        bootstrap_schema: false,
        busy_timeout_secs: 1,
    };
    (cfg, path)
}

pub async fn remove_database(path: &Path) {
    for suffix in ["", "-wal", "-shm", "-journal"] {
        let mut p = path.as_os_str().to_owned();
        p.push(suffix);
        let _ = tokio::fs::remove_file(PathBuf::from(p)).await;
    }
}

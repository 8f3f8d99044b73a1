//! Subset of the Play Services phenotype schema this tool reads and writes.
//! Only applied when `database.bootstrap_schema` is enabled.

/// SQLite schema includes:
/// - `Packages` (Phenotype package -> owning Android package)
/// - `Flags` (shipped defaults, several versions per name)
/// - `FlagOverrides` (local overrides, one row per (package, user, name, committed))
pub const PHENOTYPE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS Packages (
    packageName TEXT NOT NULL PRIMARY KEY,
    version INTEGER NOT NULL DEFAULT 0,
    params BLOB NULL,
    dynamic INTEGER NOT NULL DEFAULT 0,
    weak INTEGER NOT NULL DEFAULT 0,
    androidPackageName TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS Flags (
    packageName TEXT NOT NULL,
    version INTEGER NOT NULL,
    flagType INTEGER NOT NULL DEFAULT 0,
    partitionId INTEGER NOT NULL DEFAULT 0,
    user TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL,
    intVal INTEGER NULL,
    boolVal INTEGER NULL,
    floatVal REAL NULL,
    stringVal TEXT NULL,
    extensionVal BLOB NULL,
    committed INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY(packageName, version, flagType, partitionId, user, name, committed)
);

CREATE INDEX IF NOT EXISTS flags_by_package_user ON Flags(packageName, user);

CREATE TABLE IF NOT EXISTS FlagOverrides (
    packageName TEXT NOT NULL,
    user TEXT NOT NULL,
    name TEXT NOT NULL,
    flagType INTEGER NOT NULL,
    intVal INTEGER NULL,
    boolVal INTEGER NULL,
    floatVal REAL NULL,
    stringVal TEXT NULL,
    extensionVal BLOB NULL,
    committed INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY(packageName, user, name, committed)
);
"#;

/// Tables that must exist before the service accepts requests.
pub const REQUIRED_TABLES: [&str; 3] = ["Packages", "Flags", "FlagOverrides"];

use gmsflags::client::{GmsRepository, OverrideReportExt, RootConnector};
use gmsflags::config::Config;
use gmsflags::error::FlagsError;
use gmsflags::flagsfile;
use gmsflags_schema::{FlagType, FlagValue, OverrideReport};
use std::path::Path;
use std::sync::Arc;

pub async fn connect(cfg: Config) -> Result<GmsRepository, FlagsError> {
    let connector = Arc::new(RootConnector::new(cfg));
    connector.connect().await?;
    Ok(GmsRepository::new(connector))
}

pub async fn users(repo: &GmsRepository) -> Result<(), FlagsError> {
    for user in repo.users().await? {
        if user.is_empty() {
            println!("\"\" (device)");
        } else {
            println!("{user}");
        }
    }
    Ok(())
}

pub async fn flags(
    repo: &GmsRepository,
    package: &str,
    flag_type: FlagType,
    user: &str,
    changed: bool,
) -> Result<(), FlagsError> {
    let values = if changed {
        repo.overridden(package, flag_type, user).await?
    } else {
        repo.flags(package, flag_type, user).await?
    };
    for (name, value) in values {
        println!("{name} = {value}");
    }
    Ok(())
}

pub async fn set(
    repo: &GmsRepository,
    package: &str,
    name: &str,
    flag_type: FlagType,
    raw: &str,
    users: Vec<String>,
    clear_cache: bool,
) -> Result<(), FlagsError> {
    let value =
        FlagValue::parse(flag_type, raw).map_err(|e| FlagsError::InvalidValue(e.to_string()))?;
    let report = if users.is_empty() {
        repo.override_flag(package, name, value).await?
    } else {
        repo.override_flag_for(package, name, value, users).await?
    };
    print_report(&report);

    if clear_cache && report.succeeded().next().is_some() {
        clear_cache_and_print(repo, package).await?;
    }
    report.into_result().map(|_| ())
}

pub async fn reset(
    repo: &GmsRepository,
    package: &str,
    name: Option<&str>,
) -> Result<(), FlagsError> {
    let report = match name {
        Some(name) => repo.delete_override(package, name).await?,
        None => repo.delete_overrides(package).await?,
    };
    println!("deleted {} override row(s)", report.deleted);
    Ok(())
}

pub async fn clear_cache(repo: &GmsRepository, package: &str) -> Result<(), FlagsError> {
    clear_cache_and_print(repo, package).await
}

pub async fn export(
    repo: &GmsRepository,
    package: &str,
    user: &str,
    file: &Path,
) -> Result<(), FlagsError> {
    let loaded = repo.export(package, user).await?;
    flagsfile::write(file, &loaded).await?;
    println!(
        "exported {} override(s) of {package} to {}",
        loaded.flags.len(),
        file.display()
    );
    Ok(())
}

pub async fn import(repo: &GmsRepository, file: &Path, clear_cache: bool) -> Result<(), FlagsError> {
    let loaded = flagsfile::read(file).await?;
    let reports = repo.import(&loaded, false).await?;
    for report in &reports {
        print_report(report);
    }

    if clear_cache && !reports.is_empty() {
        clear_cache_and_print(repo, &loaded.package_name).await?;
    }

    let failed = reports.iter().filter(|r| !r.is_complete()).count();
    if failed > 0 {
        return Err(FlagsError::QueryFailed(format!(
            "{failed} of {} flag(s) were not applied for every user",
            reports.len()
        )));
    }
    Ok(())
}

async fn clear_cache_and_print(repo: &GmsRepository, package: &str) -> Result<(), FlagsError> {
    let report = repo.clear_cache(package).await?;
    println!(
        "{}: cache {}, force-stop {}",
        report.android_package,
        if report.cache_removed { "removed" } else { "absent" },
        if report.force_stopped { "ok" } else { "failed" },
    );
    Ok(())
}

fn print_report(report: &OverrideReport) {
    for result in &report.results {
        let user = if result.user.is_empty() {
            "\"\""
        } else {
            result.user.as_str()
        };
        match &result.error {
            None if result.ok => println!("{} [{user}]: ok", report.name),
            Some(error) => println!("{} [{user}]: FAILED ({error})", report.name),
            None => println!("{} [{user}]: FAILED", report.name),
        }
    }
}

//! Database provisioning
//!
//! Runs once, before any `SpotGraph` connects: makes sure each named database
//! exists as `<data_dir>/<name>.db`. Existing databases are left untouched and
//! an empty name list is a no-op (the data directory is not even created).

use crate::db::error::DatabaseError;
use crate::db::pool::execute_pragma;
use libsql::Builder;
use std::path::{Path, PathBuf};

/// Outcome of a provisioning run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}

/// Path of the database file for `name` under `data_dir`
pub fn database_path(data_dir: &Path, name: &str) -> Result<PathBuf, DatabaseError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0');
    if !valid {
        return Err(DatabaseError::InvalidDatabaseName {
            name: name.to_string(),
        });
    }
    Ok(data_dir.join(format!("{name}.db")))
}

/// Create every database in `names` that does not exist yet
///
/// # Errors
///
/// Returns `InvalidDatabaseName` before touching the filesystem if any name is
/// unusable, `InvalidPath` if `data_dir` exists but is not a directory, and
/// `ConnectionFailed` if a new database file cannot be created.
pub async fn provision_databases(
    data_dir: &Path,
    names: &[String],
) -> Result<ProvisionReport, DatabaseError> {
    let mut report = ProvisionReport::default();
    if names.is_empty() {
        tracing::info!("No databases configured, nothing to provision");
        return Ok(report);
    }

    let targets = names
        .iter()
        .map(|name| database_path(data_dir, name).map(|path| (name, path)))
        .collect::<Result<Vec<_>, _>>()?;

    if data_dir.exists() && !data_dir.is_dir() {
        return Err(DatabaseError::InvalidPath {
            path: data_dir.to_path_buf(),
        });
    }
    std::fs::create_dir_all(data_dir)?;

    for (name, path) in targets {
        if path.exists() || report.created.contains(name) {
            tracing::info!("Database '{}' already exists, skipping", name);
            report.skipped.push(name.clone());
            continue;
        }

        let db = Builder::new_local(&path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(path.display().to_string(), e))?;
        let conn = db.connect()?;
        // Writing the journal mode forces the file onto disk
        execute_pragma(&conn, "PRAGMA journal_mode = WAL").await?;

        tracing::info!("Created database '{}' at {}", name, path.display());
        report.created.push(name.clone());
    }

    Ok(report)
}

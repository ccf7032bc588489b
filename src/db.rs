use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::error::QaError;

/// Open the index database at `db_path`.
///
/// With `create` the file (and its parent directory) is created when
/// missing; without it a missing file is [`QaError::IndexUnavailable`].
pub async fn connect(db_path: &Path, create: bool) -> Result<SqlitePool> {
    if create {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    } else if !db_path.exists() {
        return Err(QaError::index_unavailable(format!(
            "no index at {}; run `docqa init` or `docqa rebuild` first",
            db_path.display()
        ))
        .into());
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(create)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

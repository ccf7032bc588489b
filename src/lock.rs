//! Cross-process writer lock.
//!
//! The CLI and a running server can each open the same SQLite index. An
//! exclusive advisory lock on a sibling file (`<db>.lock`) keeps their
//! add/delete/rebuild operations from interleaving. The lock is released
//! when the [`WriterLock`] is dropped and its file handle closed.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Lock file path for the index database at `db_path`.
pub fn lock_path_for(db_path: &Path) -> PathBuf {
    let mut name = db_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "index".into());
    name.push(".lock");
    db_path.with_file_name(name)
}

/// Held exclusive lock on a lock file.
#[derive(Debug)]
pub struct WriterLock {
    _file: File,
    path: PathBuf,
}

impl WriterLock {
    /// Wait until no other writer holds `path`, then take the lock.
    ///
    /// Waits on a blocking thread so the runtime keeps serving queries.
    pub async fn acquire(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::acquire_blocking(path))
            .await
            .context("writer lock task panicked")?
    }

    fn acquire_blocking(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;
        tracing::debug!(lock = %path.display(), "waiting for writer lock");
        FileExt::lock_exclusive(&file)
            .with_context(|| format!("Failed to lock {}", path.display()))?;
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_sits_next_to_db() {
        assert_eq!(
            lock_path_for(Path::new("/data/index.sqlite")),
            PathBuf::from("/data/index.sqlite.lock")
        );
    }

    #[tokio::test]
    async fn test_second_writer_waits_for_first() {
        let tmp = TempDir::new().unwrap();
        let path = lock_path_for(&tmp.path().join("index.sqlite"));

        let first = WriterLock::acquire(&path).await.unwrap();
        let waiting = tokio::spawn({
            let path = path.clone();
            async move { WriterLock::acquire(&path).await }
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!waiting.is_finished());

        drop(first);
        let second = tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .expect("second writer never got the lock")
            .unwrap()
            .unwrap();
        assert_eq!(second.path(), path.as_path());
    }
}

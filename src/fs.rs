//! Staging and destination directories on disk.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Extension the web application gives to saved documents.
pub const SAVED_FILE_EXTENSION: &str = "fig";

/// The file operations needed to move saved documents out of staging.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Whether `path` is a regular file.
    async fn file_exists(&self, path: &Path) -> bool;

    /// Size of the file at `path`, `None` if it cannot be read.
    async fn file_size(&self, path: &Path) -> Option<u64>;

    /// Creates `path` and any missing parents.
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Renames a file. Both paths must be on the same volume.
    async fn rename_file(&self, from: &Path, to: &Path) -> std::io::Result<()>;
}

/// [`FileSystem`] on the local disk via `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn file_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
    }

    async fn file_size(&self, path: &Path) -> Option<u64> {
        tokio::fs::metadata(path).await.ok().map(|m| m.len())
    }

    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn rename_file(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        tokio::fs::rename(from, to).await
    }
}

/// Path of a saved document named `title` inside `dir`.
#[must_use]
pub fn saved_file_path(dir: &Path, title: &str) -> PathBuf {
    dir.join(format!("{title}.{SAVED_FILE_EXTENSION}"))
}

/// Joins `parts` below `base`, replacing path separators inside each part so
/// that a team or project called `a/b` stays one directory.
#[must_use]
pub fn folder_path(base: &Path, parts: &[&str]) -> PathBuf {
    parts.iter().fold(base.to_path_buf(), |path, part| {
        path.join(part.replace(['/', '\\'], "_"))
    })
}

//! Disposable local copy of a remote profile tree

use crate::diff::content_hash;
use crate::error::SyncResult;
use crate::util::{read_optional, remove_path, write_file};
use std::path::{Path, PathBuf};
use tracing::info;

const REPOSITORY_DIR: &str = "repository";

/// `<storage>/repository`, invalidated whenever the backend settings change
///
/// The hash of the settings is kept next to it in `repository.hash`.
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    path: PathBuf,
    hash_path: PathBuf,
}

impl WorkingCopy {
    #[must_use]
    pub fn new(storage_dir: &Path) -> Self {
        Self {
            path: storage_dir.join(REPOSITORY_DIR),
            hash_path: storage_dir.join(format!("{REPOSITORY_DIR}.hash")),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop the copy if it was made with other settings
    ///
    /// # Errors
    /// Returns an error if the copy cannot be removed or the hash written
    pub async fn prepare(&self, settings: &[&str]) -> SyncResult<()> {
        let hash = content_hash(settings.join(",").as_bytes());
        if read_optional(&self.hash_path).await?.as_deref() == Some(hash.as_str()) {
            return Ok(());
        }

        info!(path = %self.path.display(), "settings changed, working copy reset");
        remove_path(&self.path).await?;
        write_file(&self.hash_path, hash).await
    }

    /// Remove the copy and its hash
    ///
    /// # Errors
    /// Returns an error if either cannot be removed
    pub async fn terminate(&self) -> SyncResult<()> {
        remove_path(&self.path).await?;
        remove_path(&self.hash_path).await
    }
}

//! Remote directory mirrored with rsync

use super::file::FileBackend;
use super::working_copy::WorkingCopy;
use super::{BackendState, RepositoryBackend};
use crate::editor::Editor;
use crate::engine::SyncOptions;
use crate::error::{SyncError, SyncResult};
use crate::profile::FileStore;
use crate::transport::rsync::{local_operand, mirror};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

pub struct RsyncBackend {
    file: FileBackend,
    url: String,
    shell: String,
    working: WorkingCopy,
}

impl RsyncBackend {
    #[must_use]
    pub fn new(
        storage_dir: &Path,
        url: impl Into<String>,
        shell: impl Into<String>,
        profile: impl Into<String>,
    ) -> Self {
        let working = WorkingCopy::new(storage_dir);
        Self {
            file: FileBackend::new(working.path(), profile),
            url: url.into(),
            shell: shell.into(),
            working,
        }
    }

    async fn pull(&self) -> SyncResult<()> {
        let root = self.working.path();
        fs::create_dir_all(root)
            .await
            .map_err(|e| SyncError::io(root, &e))?;

        info!("pull from remote");
        mirror(&self.url, &local_operand(root), &self.shell).await?;
        info!("pull done");
        Ok(())
    }

    async fn push(&self) -> SyncResult<()> {
        info!("push to remote");
        mirror(&local_operand(self.working.path()), &self.url, &self.shell).await?;
        info!("push done");
        Ok(())
    }
}

#[async_trait]
impl RepositoryBackend for RsyncBackend {
    fn kind(&self) -> &'static str {
        "rsync"
    }

    fn state(&self) -> BackendState {
        self.file.state()
    }

    fn profile(&self) -> &str {
        self.file.profile()
    }

    fn store(&self) -> Option<&FileStore> {
        Some(self.file.file_store())
    }

    async fn initialize(&mut self) -> SyncResult<()> {
        self.file.set_state(BackendState::Initializing);
        if let Err(err) = self.working.prepare(&["rsync", &self.url, &self.shell]).await {
            warn!(error = %err, "the working copy can not be prepared");
            self.file.set_state(BackendState::Uninitialized);
            return Err(err);
        }
        self.file.initialize().await
    }

    async fn terminate(&mut self) -> SyncResult<()> {
        self.file.terminate().await?;
        self.working.terminate().await
    }

    async fn download(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool> {
        self.file.check_initialized()?;

        if let Err(err) = self.pull().await {
            warn!(error = %err, "can not pull from remote");
            return Ok(false);
        }

        self.file.download(editor, options).await
    }

    async fn upload(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool> {
        if !self.file.upload(editor, options).await? {
            return Ok(false);
        }

        match self.push().await {
            Ok(()) => Ok(true),
            Err(err) => {
                warn!(error = %err, "can not push to remote");
                Ok(false)
            }
        }
    }

    async fn restore_profile(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool> {
        self.file.restore_profile(editor, options).await
    }

    async fn serialize_profile(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<()> {
        self.file.serialize_profile(editor, options).await
    }

    async fn list_profiles(&self) -> SyncResult<Vec<String>> {
        self.file.list_profiles().await
    }

    async fn duplicate_profile_to(&mut self, original: &str, new_profile: &str) -> SyncResult<()> {
        self.file.duplicate_profile_to(original, new_profile).await?;
        self.push().await
    }

    async fn extend_profile_to(&mut self, original: &str, new_profile: &str) -> SyncResult<()> {
        self.file.extend_profile_to(original, new_profile).await?;
        self.push().await
    }

    async fn delete_profile(&mut self, profile: &str) -> SyncResult<()> {
        self.file.delete_profile(profile).await?;
        self.push().await
    }
}

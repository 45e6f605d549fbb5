//! Plain directory backend, the layout every other backend builds on

use super::{BackendState, RepositoryBackend};
use crate::editor::Editor;
use crate::engine::{self, SyncOptions};
use crate::error::{SyncError, SyncResult};
use crate::profile::FileStore;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Profiles kept directly in a local directory
pub struct FileBackend {
    store: FileStore,
    profile: String,
    state: BackendState,
}

impl FileBackend {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            store: FileStore::new(root),
            profile: profile.into(),
            state: BackendState::Uninitialized,
        }
    }

    #[must_use]
    pub fn file_store(&self) -> &FileStore {
        &self.store
    }

    /// Fail unless the backend is initialized
    ///
    /// # Errors
    /// Returns `NotInitialized` in any other state
    pub fn check_initialized(&self) -> SyncResult<()> {
        if self.state == BackendState::Initialized {
            Ok(())
        } else {
            Err(SyncError::NotInitialized)
        }
    }

    pub(crate) fn set_state(&mut self, state: BackendState) {
        self.state = state;
    }

    async fn restore(&self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool> {
        if !self.store.exists(&self.profile).await {
            info!(profile = %self.profile, "profile not in the repository, nothing to restore");
            return Ok(true);
        }
        engine::restore_profile(&self.store, editor, &self.profile, options).await
    }
}

#[async_trait]
impl RepositoryBackend for FileBackend {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn profile(&self) -> &str {
        &self.profile
    }

    fn store(&self) -> Option<&FileStore> {
        Some(&self.store)
    }

    async fn initialize(&mut self) -> SyncResult<()> {
        self.state = BackendState::Initializing;
        match self.store.ensure_profile(&self.profile).await {
            Ok(()) => {
                self.state = BackendState::Initialized;
                Ok(())
            }
            Err(err) => {
                self.state = BackendState::Uninitialized;
                Err(err)
            }
        }
    }

    async fn terminate(&mut self) -> SyncResult<()> {
        self.state = BackendState::Terminated;
        Ok(())
    }

    async fn download(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool> {
        self.check_initialized()?;
        info!(from = %self.store.root().display(), "download");
        self.restore(editor, options).await
    }

    async fn upload(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool> {
        self.check_initialized()?;
        info!(to = %self.store.root().display(), "upload");
        engine::serialize_profile(&self.store, editor, &self.profile, options).await?;
        Ok(true)
    }

    async fn restore_profile(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool> {
        self.check_initialized()?;
        self.restore(editor, options).await
    }

    async fn serialize_profile(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<()> {
        self.check_initialized()?;
        engine::serialize_profile(&self.store, editor, &self.profile, options).await
    }

    async fn list_profiles(&self) -> SyncResult<Vec<String>> {
        self.check_initialized()?;
        self.store.list_profiles().await
    }

    async fn duplicate_profile_to(&mut self, original: &str, new_profile: &str) -> SyncResult<()> {
        self.check_initialized()?;
        self.store.duplicate(original, new_profile).await
    }

    async fn extend_profile_to(&mut self, original: &str, new_profile: &str) -> SyncResult<()> {
        self.check_initialized()?;
        self.store.extend(original, new_profile).await
    }

    async fn delete_profile(&mut self, profile: &str) -> SyncResult<()> {
        self.check_initialized()?;
        self.store.delete(profile).await
    }
}

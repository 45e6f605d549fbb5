//! Inert backend used when nothing valid is configured

use super::{BackendState, RepositoryBackend};
use crate::editor::Editor;
use crate::engine::SyncOptions;
use crate::error::{SyncError, SyncResult};
use crate::profile::FileStore;
use async_trait::async_trait;
use tracing::info;

pub struct DummyBackend {
    profile: String,
    state: BackendState,
}

impl DummyBackend {
    #[must_use]
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            state: BackendState::Uninitialized,
        }
    }

    fn check_initialized(&self) -> SyncResult<()> {
        if self.state == BackendState::Initialized {
            Ok(())
        } else {
            Err(SyncError::NotInitialized)
        }
    }
}

#[async_trait]
impl RepositoryBackend for DummyBackend {
    fn kind(&self) -> &'static str {
        "dummy"
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn profile(&self) -> &str {
        &self.profile
    }

    fn store(&self) -> Option<&FileStore> {
        None
    }

    async fn initialize(&mut self) -> SyncResult<()> {
        self.state = BackendState::Initialized;
        Ok(())
    }

    async fn terminate(&mut self) -> SyncResult<()> {
        self.state = BackendState::Terminated;
        Ok(())
    }

    async fn download(&mut self, _editor: &dyn Editor, _options: &SyncOptions) -> SyncResult<bool> {
        self.check_initialized()?;
        info!("no repository configured, nothing downloaded");
        Ok(true)
    }

    async fn upload(&mut self, _editor: &dyn Editor, _options: &SyncOptions) -> SyncResult<bool> {
        self.check_initialized()?;
        info!("no repository configured, nothing uploaded");
        Ok(true)
    }

    async fn restore_profile(&mut self, _editor: &dyn Editor, _options: &SyncOptions) -> SyncResult<bool> {
        self.check_initialized()?;
        Ok(true)
    }

    async fn serialize_profile(&mut self, _editor: &dyn Editor, _options: &SyncOptions) -> SyncResult<()> {
        self.check_initialized()
    }

    async fn list_profiles(&self) -> SyncResult<Vec<String>> {
        self.check_initialized()?;
        Ok(Vec::new())
    }

    async fn duplicate_profile_to(&mut self, _original: &str, _new_profile: &str) -> SyncResult<()> {
        self.check_initialized()
    }

    async fn extend_profile_to(&mut self, _original: &str, _new_profile: &str) -> SyncResult<()> {
        self.check_initialized()
    }

    async fn delete_profile(&mut self, _profile: &str) -> SyncResult<()> {
        self.check_initialized()
    }
}

//! Git repository on the local disk, one commit per change

use super::file::FileBackend;
use super::{BackendState, RepositoryBackend};
use crate::config::GitMessages;
use crate::editor::Editor;
use crate::engine::SyncOptions;
use crate::error::{SyncError, SyncResult};
use crate::format::{format, FormatValue, FormatVars};
use crate::profile::FileStore;
use crate::transport::Git;
use crate::util::write_file;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

const GITKEEP: &str = ".gitkeep";

/// Which commit message template to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommitKind {
    Init,
    Update,
}

pub struct LocalGitBackend {
    file: FileBackend,
    git: Git,
    branch: String,
    messages: GitMessages,
    hostname: String,
}

impl LocalGitBackend {
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        profile: impl Into<String>,
        branch: impl Into<String>,
        messages: GitMessages,
        hostname: impl Into<String>,
    ) -> Self {
        let root = root.into();
        Self {
            git: Git::new(&root),
            file: FileBackend::new(root, profile),
            branch: branch.into(),
            messages,
            hostname: hostname.into(),
        }
    }

    #[must_use]
    pub fn git(&self) -> &Git {
        &self.git
    }

    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub(crate) fn root(&self) -> &Path {
        self.file.file_store().root()
    }

    pub(crate) fn set_state(&mut self, state: BackendState) {
        self.file.set_state(state);
    }

    /// Create the repository when the directory is not one yet
    pub(crate) async fn ensure_repository(&self) -> SyncResult<()> {
        let root = self.root();
        fs::create_dir_all(root)
            .await
            .map_err(|e| SyncError::io(root, &e))?;

        if !self.git.is_repo().await {
            info!(path = %root.display(), "creating git");
            self.git.init(&self.branch).await?;
        }
        Ok(())
    }

    /// Mark the active profile and commit it when it is new
    pub(crate) async fn finish_initialize(&mut self) -> SyncResult<()> {
        self.file.initialize().await?;

        let profile = self.file.profile().to_string();
        if self.mark_profile(&profile).await? {
            if let Err(err) = self.commit(CommitKind::Init, &profile).await {
                self.file.set_state(BackendState::Uninitialized);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Write `.gitkeep` so an empty profile is committed; `true` when it was missing
    async fn mark_profile(&self, profile: &str) -> SyncResult<bool> {
        let path = self.file.file_store().profile_dir(profile).join(GITKEEP);
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(false);
        }
        write_file(&path, "").await?;
        Ok(true)
    }

    /// Stage everything and commit when something is staged
    pub(crate) async fn commit(&self, kind: CommitKind, profile: &str) -> SyncResult<()> {
        self.git.add_all().await?;

        if !self.git.has_staged().await? {
            info!("no changes, no commit");
            return Ok(());
        }

        let template = match kind {
            CommitKind::Init => &self.messages.init,
            CommitKind::Update => &self.messages.update,
        };
        let vars: FormatVars = [
            ("profile".to_string(), FormatValue::from(profile)),
            ("now".to_string(), FormatValue::from(Utc::now())),
            ("hostname".to_string(), FormatValue::from(self.hostname.as_str())),
        ]
        .into_iter()
        .collect();
        let message = format(template, &vars);

        info!(%message, "commit");
        self.git.commit(&message).await
    }

    /// Commit after an upload; transport failures become `false`
    pub(crate) async fn commit_upload(&self) -> bool {
        match self.commit(CommitKind::Update, self.file.profile()).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "commit failed");
                false
            }
        }
    }
}

#[async_trait]
impl RepositoryBackend for LocalGitBackend {
    fn kind(&self) -> &'static str {
        "git"
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
        if let Err(err) = self.ensure_repository().await {
            warn!(error = %err, "the git repository can not be prepared");
            self.file.set_state(BackendState::Uninitialized);
            return Err(err);
        }
        self.finish_initialize().await
    }

    async fn terminate(&mut self) -> SyncResult<()> {
        self.file.terminate().await
    }

    async fn download(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool> {
        self.file.download(editor, options).await
    }

    async fn upload(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool> {
        if !self.file.upload(editor, options).await? {
            return Ok(false);
        }
        Ok(self.commit_upload().await)
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
        self.mark_profile(new_profile).await?;
        self.commit(CommitKind::Init, new_profile).await
    }

    async fn extend_profile_to(&mut self, original: &str, new_profile: &str) -> SyncResult<()> {
        self.file.extend_profile_to(original, new_profile).await?;
        self.mark_profile(new_profile).await?;
        self.commit(CommitKind::Init, new_profile).await
    }

    async fn delete_profile(&mut self, profile: &str) -> SyncResult<()> {
        self.file.delete_profile(profile).await?;
        self.commit(CommitKind::Update, profile).await
    }
}

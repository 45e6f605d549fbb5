//! Remote git repository mirrored through a disposable local clone

use super::local_git::LocalGitBackend;
use super::working_copy::WorkingCopy;
use super::{BackendState, RepositoryBackend};
use crate::config::GitMessages;
use crate::editor::Editor;
use crate::engine::SyncOptions;
use crate::error::{SyncError, SyncResult};
use crate::profile::FileStore;
use crate::transport::git::fetch_url;
use crate::util::remove_path;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

pub struct RemoteGitBackend {
    local: LocalGitBackend,
    url: String,
    working: WorkingCopy,
}

impl RemoteGitBackend {
    #[must_use]
    pub fn new(
        storage_dir: &Path,
        url: impl Into<String>,
        profile: impl Into<String>,
        branch: impl Into<String>,
        messages: GitMessages,
        hostname: impl Into<String>,
    ) -> Self {
        let working = WorkingCopy::new(storage_dir);
        Self {
            local: LocalGitBackend::new(working.path(), profile, branch, messages, hostname),
            url: url.into(),
            working,
        }
    }

    /// Bring the clone up to date, recreating it when it does not match
    /// the configured remote and branch
    async fn pull(&self) -> SyncResult<()> {
        let root = self.local.root();
        let git = self.local.git();
        let branch = self.local.branch();

        if !fs::try_exists(root).await.unwrap_or(false) {
            return self.create_clone(false).await;
        }
        if !git.is_repo().await {
            return self.create_clone(true).await;
        }

        let Some(status) = git.remote_show_origin().await else {
            return self.create_clone(true).await;
        };
        if fetch_url(&status).is_some_and(|url| url != self.url) {
            info!(url = %self.url, "remote changed, recreating the clone");
            return self.create_clone(true).await;
        }

        git.fetch().await?;

        if git.current_branch().await.ok().as_deref() != Some(branch) {
            info!(branch, "branch changed, recreating the clone");
            return self.create_clone(true).await;
        }

        if status.contains("(local out of date)") {
            git.add_all().await?;
            git.reset_hard().await?;

            info!("pull from remote");
            git.pull(branch).await?;
            info!("pull done");
        }

        Ok(())
    }

    async fn create_clone(&self, remove: bool) -> SyncResult<()> {
        let root = self.local.root();
        let git = self.local.git();
        let branch = self.local.branch();

        if remove {
            remove_path(root).await?;
        }
        fs::create_dir_all(root)
            .await
            .map_err(|e| SyncError::io(root, &e))?;

        info!(path = %root.display(), "creating git");
        git.init(branch).await?;

        info!(url = %self.url, "adding new remote");
        git.add_remote(&self.url).await?;

        info!("fetch from remote");
        git.fetch().await?;

        let remote_branch = format!("remotes/origin/{branch}");
        if git.branches().await?.contains(&remote_branch) {
            info!("pull from remote");
            git.pull(branch).await?;
            info!("pull done");
        }

        Ok(())
    }

    /// Force-push unless the remote already has our branch
    async fn push(&self) -> SyncResult<()> {
        let git = self.local.git();
        let branch = self.local.branch();
        let up_to_date = format!("{branch} pushes to {branch} (up to date)");

        let current = git
            .remote_show_origin()
            .await
            .is_some_and(|status| status.contains(&up_to_date));
        if current {
            return Ok(());
        }

        info!("push to remote");
        git.push_force(branch).await?;
        info!("push done");
        Ok(())
    }
}

#[async_trait]
impl RepositoryBackend for RemoteGitBackend {
    fn kind(&self) -> &'static str {
        "git"
    }

    fn state(&self) -> BackendState {
        self.local.state()
    }

    fn profile(&self) -> &str {
        self.local.profile()
    }

    fn store(&self) -> Option<&FileStore> {
        self.local.store()
    }

    async fn initialize(&mut self) -> SyncResult<()> {
        self.local.set_state(BackendState::Initializing);

        let branch = self.local.branch().to_string();
        let prepared = match self.working.prepare(&["git", &self.url, &branch]).await {
            Ok(()) => self.pull().await,
            Err(err) => Err(err),
        };
        if let Err(err) = prepared {
            warn!(error = %err, "the git repository can not be pulled");
            self.local.set_state(BackendState::Uninitialized);
            return Err(err);
        }

        self.local.finish_initialize().await?;
        if let Err(err) = self.push().await {
            warn!(error = %err, "the git repository can not be pushed");
        }
        Ok(())
    }

    async fn terminate(&mut self) -> SyncResult<()> {
        self.local.terminate().await?;
        self.working.terminate().await
    }

    async fn download(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool> {
        if self.local.state() != BackendState::Initialized {
            return Err(SyncError::NotInitialized);
        }

        if let Err(err) = self.pull().await {
            warn!(error = %err, "can not pull git repository");
            return Ok(false);
        }

        self.local.download(editor, options).await
    }

    async fn upload(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool> {
        if !self.local.upload(editor, options).await? {
            return Ok(false);
        }

        match self.push().await {
            Ok(()) => Ok(true),
            Err(err) => {
                warn!(error = %err, "can not push git repository");
                Ok(false)
            }
        }
    }

    async fn restore_profile(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool> {
        self.local.restore_profile(editor, options).await
    }

    async fn serialize_profile(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<()> {
        self.local.serialize_profile(editor, options).await
    }

    async fn list_profiles(&self) -> SyncResult<Vec<String>> {
        self.local.list_profiles().await
    }

    async fn duplicate_profile_to(&mut self, original: &str, new_profile: &str) -> SyncResult<()> {
        self.local.duplicate_profile_to(original, new_profile).await?;
        self.push().await
    }

    async fn extend_profile_to(&mut self, original: &str, new_profile: &str) -> SyncResult<()> {
        self.local.extend_profile_to(original, new_profile).await?;
        self.push().await
    }

    async fn delete_profile(&mut self, profile: &str) -> SyncResult<()> {
        self.local.delete_profile(profile).await?;
        self.push().await
    }
}

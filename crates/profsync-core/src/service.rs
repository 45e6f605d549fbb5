//! The active backend and the operations run against it
//!
//! [`SyncService`] owns exactly one backend at a time behind an async mutex,
//! so passes never overlap. [`SyncService::reconfigure`] tears the backend
//! down and builds the one the configuration file now describes.

use crate::config::SyncConfig;
use crate::differences::{differences, FileDifference};
use crate::editor::Editor;
use crate::engine::SyncOptions;
use crate::error::{SyncError, SyncResult};
use crate::maintenance::{missing_extensions, reset, MissingExtensions, ResetReport};
use crate::profile::{dependents, resolve_sync_settings, Resource};
use crate::repository::{create_backend, BackendState, DummyBackend, RepositoryBackend};
use crate::transport::process::run_shell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

struct Active {
    config: SyncConfig,
    backend: Box<dyn RepositoryBackend>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Upload,
    Download,
}

impl Transfer {
    fn name(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }
}

/// Outcome of [`SyncService::review`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Review {
    /// The stored profile matches the live state
    Unchanged,
    /// Differences were found and uploaded
    Uploaded,
    /// Differences were found but the upload failed
    UploadFailed,
}

/// Single owner of the active repository backend
pub struct SyncService {
    config_path: PathBuf,
    storage_dir: PathBuf,
    editor: Arc<dyn Editor>,
    active: Mutex<Active>,
}

impl SyncService {
    /// Load the configuration and initialize its backend
    ///
    /// Configuration and initialization failures are reported, not
    /// returned: the service then runs on the dummy backend or an
    /// uninitialized one.
    pub async fn start(
        config_path: impl Into<PathBuf>,
        storage_dir: impl Into<PathBuf>,
        editor: Arc<dyn Editor>,
    ) -> Self {
        let config_path = config_path.into();
        let storage_dir = storage_dir.into();
        let active = activate(&config_path, &storage_dir, editor.as_ref(), None).await;

        Self {
            config_path,
            storage_dir,
            editor,
            active: Mutex::new(active),
        }
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub async fn config(&self) -> SyncConfig {
        self.active.lock().await.config.clone()
    }

    pub async fn current_profile(&self) -> String {
        self.active.lock().await.backend.profile().to_string()
    }

    pub async fn backend_kind(&self) -> &'static str {
        self.active.lock().await.backend.kind()
    }

    pub async fn state(&self) -> BackendState {
        self.active.lock().await.backend.state()
    }

    /// Replace the backend with the one the configuration file describes
    pub async fn reconfigure(&self) {
        let mut active = self.active.lock().await;
        info!(path = %self.config_path.display(), "reconfiguring");

        if let Err(err) = active.backend.terminate().await {
            warn!(error = %err, "the previous repository can not be terminated");
        }

        let previous = active.config.clone();
        *active = activate(
            &self.config_path,
            &self.storage_dir,
            self.editor.as_ref(),
            Some(&previous),
        )
        .await;
    }

    /// Serialize the active profile and publish it
    ///
    /// # Errors
    /// Returns an error for failures that are not transport failures
    pub async fn upload(&self) -> SyncResult<bool> {
        self.transfer(Transfer::Upload, None).await
    }

    /// Fetch the repository and restore the active profile
    ///
    /// # Errors
    /// Returns an error for failures that are not transport failures
    pub async fn download(&self) -> SyncResult<bool> {
        self.transfer(Transfer::Download, None).await
    }

    /// Like [`SyncService::upload`] with an explicit resource selection
    ///
    /// # Errors
    /// Returns an error for failures that are not transport failures
    pub async fn upload_resources(&self, resources: Vec<Resource>) -> SyncResult<bool> {
        self.transfer(Transfer::Upload, Some(resources)).await
    }

    /// Like [`SyncService::download`] with an explicit resource selection
    ///
    /// # Errors
    /// Returns an error for failures that are not transport failures
    pub async fn download_resources(&self, resources: Vec<Resource>) -> SyncResult<bool> {
        self.transfer(Transfer::Download, Some(resources)).await
    }

    async fn transfer(&self, transfer: Transfer, resources: Option<Vec<Resource>>) -> SyncResult<bool> {
        let mut guard = self.active.lock().await;
        let active = &mut *guard;
        let options = options(&active.config, resources);
        let hooks = active.config.hooks.clone();
        let (pre, post) = match transfer {
            Transfer::Upload => (hooks.pre_upload, hooks.post_upload),
            Transfer::Download => (hooks.pre_download, hooks.post_download),
        };

        if let Err(err) = run_hook(active.backend.as_ref(), pre.as_deref()).await {
            self.report(&active.config, &err);
            return Ok(false);
        }

        let editor = self.editor.as_ref();
        let result = match transfer {
            Transfer::Upload => active.backend.upload(editor, &options).await,
            Transfer::Download => active.backend.download(editor, &options).await,
        };

        match result {
            Ok(true) => {
                if let Err(err) = run_hook(active.backend.as_ref(), post.as_deref()).await {
                    warn!(error = %err, operation = transfer.name(), "post hook failed");
                }
                Ok(true)
            }
            Ok(false) => {
                warn!(operation = transfer.name(), "failed");
                let err = SyncError::transport(active.backend.kind(), format!("{} failed", transfer.name()));
                self.report(&active.config, &err);
                Ok(false)
            }
            Err(err) => {
                self.report(&active.config, &err);
                Err(err)
            }
        }
    }

    /// Capture the live state into the local profile tree, without publishing
    ///
    /// # Errors
    /// Returns an error if the backend is not initialized or serialization fails
    pub async fn serialize(&self) -> SyncResult<()> {
        let mut guard = self.active.lock().await;
        let active = &mut *guard;
        let options = options(&active.config, None);

        let result = active.backend.serialize_profile(self.editor.as_ref(), &options).await;
        if let Err(err) = &result {
            self.report(&active.config, err);
        }
        result
    }

    /// Apply the local profile tree, without fetching
    ///
    /// # Errors
    /// Returns an error if the backend is not initialized or a stored file is unusable
    pub async fn restore(&self) -> SyncResult<bool> {
        let mut guard = self.active.lock().await;
        let active = &mut *guard;
        let options = options(&active.config, None);

        let result = active.backend.restore_profile(self.editor.as_ref(), &options).await;
        if let Err(err) = &result {
            self.report(&active.config, err);
        }
        result
    }

    /// # Errors
    /// Returns `NotInitialized` until the backend is initialized
    pub async fn list_profiles(&self) -> SyncResult<Vec<String>> {
        self.active.lock().await.backend.list_profiles().await
    }

    /// Copy `from` (the active profile by default) to a new profile
    ///
    /// # Errors
    /// Returns an error if the source is missing or the name is taken or invalid
    pub async fn create_profile(&self, name: &str, from: Option<&str>) -> SyncResult<()> {
        let mut active = self.active.lock().await;
        let from = from.map_or_else(|| active.backend.profile().to_string(), ToString::to_string);

        info!(profile = name, from = %from, "creating profile");
        active.backend.duplicate_profile_to(&from, name).await
    }

    /// Create an empty profile inheriting from `from`
    ///
    /// # Errors
    /// Returns an error if the parent is missing or the name is taken or invalid
    pub async fn extend_profile(&self, name: &str, from: &str) -> SyncResult<()> {
        let mut active = self.active.lock().await;

        info!(profile = name, from, "extending profile");
        active.backend.extend_profile_to(from, name).await
    }

    /// Delete a profile that is neither active nor extended by another
    ///
    /// # Errors
    /// Returns `ProfileInUse` for the active profile or a parent profile
    pub async fn delete_profile(&self, name: &str) -> SyncResult<()> {
        let mut active = self.active.lock().await;

        if active.backend.profile() == name {
            return Err(SyncError::ProfileInUse {
                name: name.to_string(),
                reason: "it is the active profile".to_string(),
            });
        }

        if let Some(store) = active.backend.store() {
            let children = dependents(store, name).await?;
            if !children.is_empty() {
                return Err(SyncError::ProfileInUse {
                    name: name.to_string(),
                    reason: format!("extended by {}", children.join(", ")),
                });
            }
        }

        info!(profile = name, "deleting profile");
        active.backend.delete_profile(name).await
    }

    /// Make `name` the active profile, optionally restoring it
    ///
    /// The choice is saved to the configuration file and the backend is
    /// rebuilt. Returns the result of the restore, `true` without one.
    ///
    /// # Errors
    /// Returns `ProfileNotFound` for an unknown profile, or an error if the
    /// configuration cannot be saved
    pub async fn switch_profile(&self, name: &str, restore: bool) -> SyncResult<bool> {
        let mut guard = self.active.lock().await;

        if !guard.backend.list_profiles().await?.iter().any(|p| p == name) {
            return Err(SyncError::ProfileNotFound(name.to_string()));
        }

        info!(profile = name, "switching profile");
        let mut config = guard.config.clone();
        config.profile = name.to_string();
        config.save(&self.config_path).await?;

        if let Err(err) = guard.backend.terminate().await {
            warn!(error = %err, "the previous repository can not be terminated");
        }
        *guard = activate(
            &self.config_path,
            &self.storage_dir,
            self.editor.as_ref(),
            Some(&config),
        )
        .await;

        if !restore {
            return Ok(true);
        }

        let active = &mut *guard;
        let options = options(&active.config, None);
        let result = active.backend.restore_profile(self.editor.as_ref(), &options).await;
        if let Err(err) = &result {
            self.report(&active.config, err);
        }
        result
    }

    /// Per-file diffs between the stored active profile and the live state
    ///
    /// # Errors
    /// Returns an error if the scratch copy cannot be made or serialized
    pub async fn differences(&self) -> SyncResult<Vec<FileDifference>> {
        let active = self.active.lock().await;
        if active.backend.state() != BackendState::Initialized {
            return Err(SyncError::NotInitialized);
        }

        let Some(store) = active.backend.store() else {
            return Ok(Vec::new());
        };
        let options = options(&active.config, None);
        differences(store, self.editor.as_ref(), active.backend.profile(), &options).await
    }

    /// Upload the active profile only when the live state differs from it
    ///
    /// # Errors
    /// Returns an error if the comparison or the upload fails
    pub async fn review(&self) -> SyncResult<Review> {
        let found = self.differences().await?;
        if found.is_empty() {
            info!("no differences since the last save");
            return Ok(Review::Unchanged);
        }

        info!(files = found.len(), "settings modified since the last save");
        if self.upload().await? {
            Ok(Review::Uploaded)
        } else {
            Ok(Review::UploadFailed)
        }
    }

    /// Extensions of the active profile the editor lacks
    ///
    /// # Errors
    /// Returns `NotInitialized` until the backend is initialized, or an
    /// error if either list cannot be read
    pub async fn missing_extensions(&self) -> SyncResult<MissingExtensions> {
        let active = self.active.lock().await;
        if active.backend.state() != BackendState::Initialized {
            return Err(SyncError::NotInitialized);
        }

        let Some(store) = active.backend.store() else {
            return Ok(MissingExtensions::default());
        };
        let profile = active.backend.profile();
        let settings = match &active.config.sync {
            Some(machine) => machine.clone(),
            None => resolve_sync_settings(store, profile).await?,
        };
        missing_extensions(store, self.editor.as_ref(), profile, &settings).await
    }

    /// Remove the local settings and extensions
    ///
    /// # Errors
    /// Returns an error if the installed extensions cannot be listed
    pub async fn reset(&self) -> SyncResult<ResetReport> {
        let _active = self.active.lock().await;
        reset(self.editor.as_ref()).await
    }

    fn report(&self, config: &SyncConfig, err: &SyncError) {
        report(self.editor.as_ref(), config, err);
    }
}

/// Log an error and forward it to the editor when its kind is selected
fn report(editor: &dyn Editor, config: &SyncConfig, err: &SyncError) {
    error!(code = err.code(), error = %err, "operation failed");
    if config.notifies(err.kind()) {
        editor.notify_error(&err.to_string());
    }
}

fn options(config: &SyncConfig, resources: Option<Vec<Resource>>) -> SyncOptions {
    SyncOptions {
        machine: config.sync.clone(),
        resources,
        hostname: config.rendered_hostname(),
    }
}

/// Load the configuration, build its backend and initialize it
///
/// `previous` decides how a broken configuration file is reported.
async fn activate(
    config_path: &Path,
    storage_dir: &Path,
    editor: &dyn Editor,
    previous: Option<&SyncConfig>,
) -> Active {
    let fallback = SyncConfig::default();
    let config = match SyncConfig::load(config_path).await {
        Ok(config) => config,
        Err(err) => {
            report(editor, previous.unwrap_or(&fallback), &err);
            SyncConfig {
                profile: previous.map_or_else(|| fallback.profile.clone(), |c| c.profile.clone()),
                ..SyncConfig::default()
            }
        }
    };

    let mut backend = match create_backend(&config, storage_dir, &editor.home_dir()) {
        Ok(backend) => backend,
        Err(err) => {
            report(editor, &config, &err);
            Box::new(DummyBackend::new(config.profile.clone()))
        }
    };

    info!(backend = backend.kind(), profile = backend.profile(), "initializing repository");
    if let Err(err) = backend.initialize().await {
        report(editor, &config, &err);
    }

    Active { config, backend }
}

async fn run_hook(backend: &dyn RepositoryBackend, command: Option<&str>) -> SyncResult<()> {
    let Some(command) = command.filter(|c| !c.trim().is_empty()) else {
        return Ok(());
    };

    let cwd = backend
        .store()
        .map(|store| store.root().to_path_buf())
        .filter(|root| root.is_dir());

    info!(command, "running hook");
    run_shell(command, cwd.as_deref()).await.map(|_| ())
}

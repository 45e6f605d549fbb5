//! WebDAV share holding the profile tree

use super::file::FileBackend;
use super::working_copy::WorkingCopy;
use super::{BackendState, RepositoryBackend};
use crate::editor::Editor;
use crate::engine::SyncOptions;
use crate::error::{SyncError, SyncResult};
use crate::profile::FileStore;
use crate::transport::WebDavClient;
use crate::util::{list_files, read_bytes, remove_path, safe_join, write_file};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, warn};

/// File marking a remote directory as owned by this tool
pub const MARKER_FILE: &str = ".profsync";
pub const MARKER_CONTENT: &str = "profsync";

/// Remote directory the tree is staged in before it replaces `/profiles`
const STAGING_DIR: &str = ".profiles";
const PROFILES_DIR: &str = "profiles";

pub struct WebDavBackend {
    file: FileBackend,
    client: WebDavClient,
    settings_hash: Vec<String>,
    working: WorkingCopy,
}

impl WebDavBackend {
    /// # Errors
    /// Returns a configuration error for an invalid URL
    pub fn new(
        storage_dir: &Path,
        url: &str,
        username: Option<String>,
        password: Option<String>,
        ignore_tls_errors: bool,
        profile: impl Into<String>,
    ) -> SyncResult<Self> {
        let working = WorkingCopy::new(storage_dir);
        let settings_hash = vec![
            "webdav".to_string(),
            url.to_string(),
            username.clone().unwrap_or_default(),
            ignore_tls_errors.to_string(),
        ];

        Ok(Self {
            file: FileBackend::new(working.path(), profile),
            client: WebDavClient::new(url, username, password, ignore_tls_errors)?,
            settings_hash,
            working,
        })
    }

    /// Accept an empty remote root (claiming it) or one carrying the marker
    async fn validate(&self) -> SyncResult<()> {
        let entries = self.client.list("/").await?;
        if entries.is_empty() {
            self.client
                .put(&format!("/{MARKER_FILE}"), MARKER_CONTENT.as_bytes().to_vec())
                .await?;
            info!("the working directory is empty, continue");
            return Ok(());
        }

        if entries.iter().any(|entry| !entry.is_dir && entry.path == MARKER_FILE) {
            let content = self.client.get(&format!("/{MARKER_FILE}")).await?;
            if content == MARKER_CONTENT.as_bytes() {
                info!("the working directory is valid, continue");
                return Ok(());
            }
        }

        Err(SyncError::transport(
            "webdav",
            "The working directory is not valid. Please use an empty directory.",
        ))
    }

    /// Prepare the working copy and check the remote root
    async fn connect(&self) -> SyncResult<()> {
        let settings: Vec<&str> = self.settings_hash.iter().map(String::as_str).collect();
        self.working.prepare(&settings).await?;

        match self.client.stat("/").await? {
            Some(_) => {
                info!("the connection to WebDAV is successful");
                self.validate().await
            }
            None => Err(SyncError::transport(
                "webdav",
                format!("The url \"{}\" can't be found.", self.client.base_url()),
            )),
        }
    }

    /// Download the remote tree into a sibling directory, then swap it in
    async fn pull(&self) -> SyncResult<()> {
        info!("pull from webdav");

        let root = self.working.path();
        let incoming = sibling(root, "incoming");
        remove_path(&incoming).await?;
        fs::create_dir_all(&incoming)
            .await
            .map_err(|e| SyncError::io(&incoming, &e))?;

        if let Err(err) = self.pull_dir("", &incoming).await {
            remove_path(&incoming).await?;
            return Err(err);
        }

        remove_path(root).await?;
        fs::rename(&incoming, root)
            .await
            .map_err(|e| SyncError::io(root, &e))?;

        info!("pull done");
        Ok(())
    }

    async fn pull_dir(&self, remote: &str, local: &Path) -> SyncResult<()> {
        let mut pending: Vec<String> = vec![remote.to_string()];

        while let Some(dir) = pending.pop() {
            for entry in self.client.list(&format!("/{dir}")).await? {
                if dir.is_empty() && (entry.path == STAGING_DIR || entry.path == MARKER_FILE) {
                    continue;
                }

                if !is_child_of(&dir, &entry.path) {
                    warn!(entry = %entry.path, parent = %dir, "skipping entry outside its collection");
                    continue;
                }

                let target = safe_join(local, Path::new(&entry.path))?;
                if entry.is_dir {
                    fs::create_dir_all(&target)
                        .await
                        .map_err(|e| SyncError::io(&target, &e))?;
                    pending.push(entry.path);
                } else {
                    let content = self.client.get(&format!("/{}", entry.path)).await?;
                    write_file(&target, content).await?;
                }
            }
        }

        Ok(())
    }

    /// Upload the tree to the staging directory, then replace `/profiles`
    async fn push(&self) -> SyncResult<()> {
        info!("push to webdav");

        let profiles = self.working.path().join(PROFILES_DIR);
        let staging = format!("/{STAGING_DIR}");

        if self.client.stat(&staging).await?.is_some() {
            self.client.delete(&format!("{staging}/")).await?;
        }
        self.client.mkcol(&staging).await?;

        let mut created: HashSet<String> = HashSet::from([staging.clone()]);
        for file in list_files(&profiles)? {
            let remote = format!("{staging}/{file}");
            self.ensure_parent(&remote, &mut created).await?;

            let Some(content) = read_bytes(&profiles.join(&file)).await? else {
                continue;
            };
            info!(file = %remote, "push file");
            self.client.put(&remote, content).await?;
        }

        let target = format!("/{PROFILES_DIR}");
        if self.client.stat(&target).await?.is_some() {
            self.client.delete(&format!("{target}/")).await?;
        }
        info!(from = %staging, to = %target, "move");
        self.client.rename(&format!("{staging}/"), &format!("{target}/")).await?;

        info!("push done");
        Ok(())
    }

    async fn ensure_parent(&self, remote_file: &str, created: &mut HashSet<String>) -> SyncResult<()> {
        let Some((parent, _)) = remote_file.rsplit_once('/') else {
            return Ok(());
        };

        let mut current = String::new();
        for segment in parent.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            if created.contains(&current) {
                continue;
            }
            if self.client.stat(&current).await?.is_none() {
                self.client.mkcol(&current).await?;
            }
            created.insert(current.clone());
        }
        Ok(())
    }
}

/// Whether `path` names a direct child of the collection `dir`
fn is_child_of(dir: &str, path: &str) -> bool {
    let name = if dir.is_empty() {
        Some(path)
    } else {
        path.strip_prefix(dir).and_then(|rest| rest.strip_prefix('/'))
    };
    name.is_some_and(|name| !name.is_empty() && !name.contains('/'))
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "repository".to_string(), |n| n.to_string_lossy().to_string());
    path.with_file_name(format!("{name}.{suffix}"))
}

#[async_trait]
impl RepositoryBackend for WebDavBackend {
    fn kind(&self) -> &'static str {
        "webdav"
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
        if let Err(err) = self.connect().await {
            error!(error = %err, "webdav initialization failed");
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
            warn!(error = %err, "can not pull from webdav");
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
                warn!(error = %err, "can not push to webdav");
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

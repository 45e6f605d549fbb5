//! In-memory editor over a real user data directory

use super::{Editor, InstalledExtension};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Editor double holding the extension registry and state store in memory
///
/// Files (`settings.json`, snippets, ...) live on disk under the given user
/// data directory so the file-based resources behave as with a real editor.
pub struct MemoryEditor {
    user_data_dir: PathBuf,
    extension_storage_dir: PathBuf,
    home_dir: PathBuf,
    own_id: String,
    commands: bool,
    extensions: Mutex<BTreeMap<String, InstalledExtension>>,
    state: Mutex<BTreeMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    notifications: Mutex<Vec<String>>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryEditor {
    #[must_use]
    pub fn new(user_data_dir: impl Into<PathBuf>, extension_storage_dir: impl Into<PathBuf>, home_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_data_dir: user_data_dir.into(),
            extension_storage_dir: extension_storage_dir.into(),
            home_dir: home_dir.into(),
            own_id: "profsync.profsync".to_string(),
            commands: true,
            extensions: Mutex::new(BTreeMap::new()),
            state: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(HashSet::new()),
            notifications: Mutex::new(Vec::new()),
        }
    }

    /// Disable the enable/disable commands to exercise the degraded policy
    #[must_use]
    pub fn without_commands(mut self) -> Self {
        self.commands = false;
        self
    }

    #[must_use]
    pub fn with_extension(self, extension: InstalledExtension) -> Self {
        self.add_extension(extension);
        self
    }

    pub fn add_extension(&self, extension: InstalledExtension) {
        guard(&self.extensions).insert(extension.id.clone(), extension);
    }

    /// Make every operation on `id` fail
    pub fn fail_on(&self, id: &str) {
        guard(&self.failing).insert(id.to_lowercase());
    }

    pub fn set_state(&self, key: &str, value: &str) {
        guard(&self.state).insert(key.to_string(), value.to_string());
    }

    /// Snapshot of the registry
    #[must_use]
    pub fn extensions(&self) -> Vec<InstalledExtension> {
        guard(&self.extensions).values().cloned().collect()
    }

    /// Snapshot of the state store
    #[must_use]
    pub fn state(&self) -> BTreeMap<String, String> {
        guard(&self.state).clone()
    }

    /// Messages passed to [`Editor::notify_error`]
    #[must_use]
    pub fn notifications(&self) -> Vec<String> {
        guard(&self.notifications).clone()
    }

    fn check(&self, id: &str) -> SyncResult<()> {
        if guard(&self.failing).contains(id) {
            return Err(SyncError::Extension {
                id: id.to_string(),
                message: "operation rejected".to_string(),
            });
        }
        Ok(())
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> SyncResult<()> {
        self.check(id)?;
        if !self.commands {
            return Err(SyncError::Editor("extension commands are unavailable".to_string()));
        }

        match guard(&self.extensions).get_mut(id) {
            Some(extension) => {
                extension.enabled = enabled;
                Ok(())
            }
            None => Err(SyncError::Extension {
                id: id.to_string(),
                message: "not installed".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Editor for MemoryEditor {
    async fn list_extensions(&self) -> SyncResult<Vec<InstalledExtension>> {
        Ok(self.extensions())
    }

    fn extension_storage_dir(&self) -> PathBuf {
        self.extension_storage_dir.clone()
    }

    fn user_data_dir(&self) -> PathBuf {
        self.user_data_dir.clone()
    }

    fn home_dir(&self) -> PathBuf {
        self.home_dir.clone()
    }

    fn own_extension_id(&self) -> &str {
        &self.own_id
    }

    fn app_name(&self) -> String {
        "Visual Studio Code".to_string()
    }

    fn app_version(&self) -> String {
        "1.85.0".to_string()
    }

    async fn can_manage_extensions(&self) -> bool {
        self.commands
    }

    async fn install_extension(&self, id: &str) -> SyncResult<()> {
        self.check(id)?;
        info!(extension = %id, "install");
        guard(&self.extensions)
            .entry(id.to_string())
            .or_insert_with(|| InstalledExtension::new(id));
        Ok(())
    }

    async fn enable_extension(&self, id: &str) -> SyncResult<()> {
        info!(extension = %id, "enable");
        self.set_enabled(id, true)
    }

    async fn disable_extension(&self, id: &str) -> SyncResult<()> {
        info!(extension = %id, "disable");
        self.set_enabled(id, false)
    }

    async fn uninstall_extension(&self, id: &str) -> SyncResult<()> {
        self.check(id)?;
        info!(extension = %id, "uninstall");
        guard(&self.extensions).remove(id);
        Ok(())
    }

    async fn read_state(&self) -> SyncResult<BTreeMap<String, String>> {
        Ok(self.state())
    }

    async fn write_state(&self, entries: BTreeMap<String, Option<String>>) -> SyncResult<()> {
        let mut state = guard(&self.state);
        for (key, value) in entries {
            match value {
                Some(value) => state.insert(key, value),
                None => state.remove(&key),
            };
        }
        Ok(())
    }

    fn notify_error(&self, message: &str) {
        guard(&self.notifications).push(message.to_string());
    }
}

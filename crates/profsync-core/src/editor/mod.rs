//! Host editor collaborator
//!
//! Everything the sync engine needs from the running editor goes through
//! [`Editor`]: the installed extension registry, extension management
//! commands, the key-value state store and the user data directory.

mod code;
mod memory;

pub use code::CodeEditor;
pub use memory::MemoryEditor;

use crate::error::SyncResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// State store key holding extensions disabled without command support
pub const DISABLED_EXTENSIONS_KEY: &str = "extensionsIdentifiers/disabled";

/// Extension known to the editor's registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledExtension {
    /// Lowercase `publisher.name`
    pub id: String,
    pub uuid: Option<String>,
    pub version: Option<String>,
    pub builtin: bool,
    pub under_development: bool,
    pub enabled: bool,
}

impl InstalledExtension {
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_lowercase(),
            uuid: None,
            version: None,
            builtin: false,
            under_development: false,
            enabled: true,
        }
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    #[must_use]
    pub fn builtin(mut self) -> Self {
        self.builtin = true;
        self
    }
}

/// Operations the host editor exposes to the sync engine
///
/// All methods may fail independently of the repository state.
#[async_trait]
pub trait Editor: Send + Sync {
    /// Every extension in the live registry, built-ins included
    async fn list_extensions(&self) -> SyncResult<Vec<InstalledExtension>>;

    /// Directory holding one `<id>-<version>` folder per installed extension
    fn extension_storage_dir(&self) -> PathBuf;

    /// Directory holding `settings.json`, `keybindings.json` and `snippets/`
    fn user_data_dir(&self) -> PathBuf;

    fn home_dir(&self) -> PathBuf;

    /// Id of this tool's own extension, never synced
    fn own_extension_id(&self) -> &str;

    fn app_name(&self) -> String;

    fn app_version(&self) -> String;

    /// Whether enable/disable commands are available
    async fn can_manage_extensions(&self) -> bool;

    async fn install_extension(&self, id: &str) -> SyncResult<()>;

    async fn enable_extension(&self, id: &str) -> SyncResult<()>;

    async fn disable_extension(&self, id: &str) -> SyncResult<()>;

    async fn uninstall_extension(&self, id: &str) -> SyncResult<()>;

    /// Every entry of the key-value state store
    async fn read_state(&self) -> SyncResult<BTreeMap<String, String>>;

    /// Apply a batch of writes; `None` deletes the key
    async fn write_state(&self, entries: BTreeMap<String, Option<String>>) -> SyncResult<()>;

    /// Surface an error to the user; fire-and-forget
    fn notify_error(&self, message: &str);
}

//! Repository backends
//!
//! Every backend keeps profiles in the layout of [`FileStore`]; the
//! transport variants stage that tree in a local working copy and move it
//! to or from their remote.

mod dummy;
mod factory;
mod file;
mod local_git;
mod remote_git;
mod rsync;
mod webdav;
mod working_copy;

pub use dummy::DummyBackend;
pub use factory::create_backend;
pub use file::FileBackend;
pub use local_git::LocalGitBackend;
pub use remote_git::RemoteGitBackend;
pub use rsync::RsyncBackend;
pub use webdav::{WebDavBackend, MARKER_CONTENT, MARKER_FILE};
pub use working_copy::WorkingCopy;

use crate::editor::Editor;
use crate::engine::SyncOptions;
use crate::error::SyncResult;
use crate::profile::FileStore;
use async_trait::async_trait;

/// Lifecycle of a backend instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Uninitialized,
    Initializing,
    Initialized,
    Terminated,
}

/// Operations every backend supports
///
/// `download`, `upload` and `restore_profile` report transport failures as
/// `Ok(false)`. Every mutating operation fails with `NotInitialized` until
/// [`RepositoryBackend::initialize`] has succeeded.
#[async_trait]
pub trait RepositoryBackend: Send + Sync {
    /// Backend name used in logs
    fn kind(&self) -> &'static str;

    fn state(&self) -> BackendState;

    /// Active profile
    fn profile(&self) -> &str;

    /// Local profile tree, `None` for the dummy backend
    fn store(&self) -> Option<&FileStore>;

    async fn initialize(&mut self) -> SyncResult<()>;

    async fn terminate(&mut self) -> SyncResult<()>;

    /// Fetch the remote tree, then restore the active profile
    async fn download(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool>;

    /// Serialize the active profile, then publish the tree
    async fn upload(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool>;

    /// Restore the active profile from the local tree
    async fn restore_profile(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<bool>;

    /// Serialize the active profile into the local tree
    async fn serialize_profile(&mut self, editor: &dyn Editor, options: &SyncOptions) -> SyncResult<()>;

    async fn list_profiles(&self) -> SyncResult<Vec<String>>;

    async fn duplicate_profile_to(&mut self, original: &str, new_profile: &str) -> SyncResult<()>;

    async fn extend_profile_to(&mut self, original: &str, new_profile: &str) -> SyncResult<()>;

    async fn delete_profile(&mut self, profile: &str) -> SyncResult<()>;
}

//! profsync core - Profile inheritance and sync backends for editor settings
//!
//! This crate serializes a code editor's extensions, settings, keybindings,
//! snippets and UI state into named profiles that may extend one another,
//! restores them, and moves the profile tree through a file, git, rsync or
//! WebDAV repository.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod diff;
pub mod differences;
pub mod editor;
pub mod engine;
pub mod error;
pub mod format;
pub mod jsonc;
pub mod maintenance;
pub mod profile;
pub mod repository;
pub mod resources;
pub mod scheduler;
pub mod service;
pub mod transport;
pub mod util;
pub mod watcher;

pub use config::SyncConfig;
pub use differences::FileDifference;
pub use editor::{CodeEditor, Editor, MemoryEditor};
pub use engine::SyncOptions;
pub use error::{SyncError, SyncResult};
pub use profile::{FileStore, Resource};
pub use repository::{BackendState, RepositoryBackend};
pub use scheduler::Debouncer;
pub use service::{Review, SyncService};

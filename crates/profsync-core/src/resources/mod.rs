//! Resource serializers
//!
//! One serializer per resource kind moves state between the live editor and
//! a profile's `data/` directory. Diff profiles store only what differs from
//! the resolution of their parent chain.

mod additionals;
mod extensions;
mod json_file;
mod snippets;
mod state_entry;
mod ui_state;

pub use additionals::AdditionalFiles;
pub use extensions::{diff_extensions, local_extensions, resolve_extensions, stored_extension_ids, Extensions};
pub use json_file::JsonFile;
pub use snippets::{resolve_snippets, ResolvedSnippet, Snippets};
pub use state_entry::StateEntry;
pub use ui_state::{diff_ui_state, local_ui_state, resolve_ui_state, UiState, EXTENSION_STORAGE_PLACEHOLDER};

use crate::editor::Editor;
use crate::error::SyncResult;
use crate::jsonc::TemplateVars;
use crate::profile::{ChainLink, FileStore, Resource, SyncSettings};
use async_trait::async_trait;

/// Everything a serializer needs for one pass over one profile
pub struct SyncContext<'a> {
    pub store: &'a FileStore,
    pub editor: &'a dyn Editor,
    /// The profile first, its root last
    pub chain: Vec<ChainLink>,
    pub settings: SyncSettings,
    pub vars: TemplateVars,
}

impl SyncContext<'_> {
    /// Profile being serialized or restored
    #[must_use]
    pub fn profile(&self) -> &str {
        self.chain.first().map_or("", |link| link.name.as_str())
    }

    /// Root of the chain; the profile itself when it has no usable parent
    #[must_use]
    pub fn root(&self) -> &str {
        self.chain.last().map_or("", |link| link.name.as_str())
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.chain.len() <= 1
    }

    /// Chain of the parent profile, empty for a root profile
    #[must_use]
    pub fn parent_chain(&self) -> &[ChainLink] {
        self.chain.get(1..).unwrap_or_default()
    }
}

/// Capture and apply one resource kind
#[async_trait]
pub trait ResourceSerializer: Send + Sync {
    fn resource(&self) -> Resource;

    /// Editor state into the profile store
    async fn serialize(&self, ctx: &SyncContext<'_>) -> SyncResult<()>;

    /// Profile store into the editor; `false` reports a partial failure
    async fn restore(&self, ctx: &SyncContext<'_>) -> SyncResult<bool>;
}

/// Serializer for a resource kind
#[must_use]
pub fn serializer(resource: Resource) -> Box<dyn ResourceSerializer> {
    match resource {
        Resource::Extensions => Box::new(Extensions),
        Resource::Snippets => Box::new(Snippets),
        Resource::UiState => Box::new(UiState),
        Resource::Settings => Box::new(JsonFile::settings()),
        Resource::Keybindings => Box::new(JsonFile::keybindings()),
        Resource::Mcp => Box::new(JsonFile::mcp()),
        Resource::Tasks => Box::new(JsonFile::tasks()),
        Resource::Profiles => Box::new(StateEntry::profiles()),
        Resource::ProfileAssociations => Box::new(StateEntry::profile_associations()),
    }
}

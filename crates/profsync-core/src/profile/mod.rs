//! Profile tree, `extends` chains and stored resource shapes

pub mod resolver;
mod store;
mod types;

pub use resolver::{ancestor_profile, chain, dependents, resolve_sync_settings, ChainLink, MAX_CHAIN_DEPTH};
pub use store::FileStore;
pub use types::{
    BuiltinOverrides, ExtensionList, ExtensionRecord, ProfileConfig, Resource, SnippetsDiff, SyncSettings,
    UiStateDiff,
};

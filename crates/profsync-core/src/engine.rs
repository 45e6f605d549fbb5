//! Serialize and restore passes over one profile

use crate::editor::Editor;
use crate::error::SyncResult;
use crate::jsonc::TemplateVars;
use crate::profile::{chain, resolve_sync_settings, ChainLink, FileStore, Resource, SyncSettings};
use crate::resources::{serializer, AdditionalFiles, SyncContext};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Per-invocation choices of a pass
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Sync settings of this machine; written to `.sync.yml` on serialize
    /// when they differ from what the profile would inherit
    pub machine: Option<SyncSettings>,
    /// Resources of this pass instead of the profile's selection; an
    /// explicit selection leaves the additional files alone
    pub resources: Option<Vec<Resource>>,
    /// Rendered host name
    pub hostname: String,
}

/// Template variables for restoring `profile` into `editor`
#[must_use]
pub fn template_vars(editor: &dyn Editor, profile: &str, hostname: &str) -> TemplateVars {
    let user_data = editor.user_data_dir();
    let path = |p: &std::path::Path| p.to_string_lossy().to_string();

    TemplateVars {
        host: hostname.to_string(),
        profile: profile.to_string(),
        os: TemplateVars::current_os().to_string(),
        editor: editor.app_name().to_lowercase(),
        version: editor.app_version(),
        editor_storage: user_data.parent().map(path).unwrap_or_default(),
        global_storage: path(&user_data.join("globalStorage")),
        user_storage: path(&editor.home_dir()),
        env: std::env::vars().collect::<BTreeMap<_, _>>(),
    }
}

fn selected(settings: &SyncSettings, options: &SyncOptions) -> Vec<Resource> {
    match &options.resources {
        Some(resources) => Resource::ordered(resources),
        None => settings.resources(),
    }
}

fn context<'a>(
    store: &'a FileStore,
    editor: &'a dyn Editor,
    chain: Vec<ChainLink>,
    settings: SyncSettings,
    options: &SyncOptions,
) -> SyncContext<'a> {
    let profile = chain.first().map(|link| link.name.clone()).unwrap_or_default();
    SyncContext {
        store,
        editor,
        vars: template_vars(editor, &profile, &options.hostname),
        chain,
        settings,
    }
}

/// Capture the live editor state into `profile`
///
/// The profile is created when missing. Resources run in pass order, then
/// the additional files unless the options select the resources.
///
/// # Errors
/// Returns an error if the chain cannot be resolved or a serializer fails
pub async fn serialize_profile(
    store: &FileStore,
    editor: &dyn Editor,
    profile: &str,
    options: &SyncOptions,
) -> SyncResult<()> {
    store.ensure_profile(profile).await?;
    let links = chain(store, profile).await?;

    let settings = match &options.machine {
        Some(machine) => {
            let inherited = match links.get(1) {
                Some(parent) => resolve_sync_settings(store, &parent.name).await?,
                None => SyncSettings::default(),
            };
            let own = (*machine != inherited).then_some(machine);
            store.save_sync_settings(profile, own).await?;
            machine.clone()
        }
        None => resolve_sync_settings(store, profile).await?,
    };

    let resources = selected(&settings, options);
    let ctx = context(store, editor, links, settings, options);

    for resource in resources {
        serializer(resource).serialize(&ctx).await?;
    }
    if options.resources.is_none() {
        AdditionalFiles.serialize(&ctx).await?;
    }

    info!(profile, "serialize done");
    Ok(())
}

/// Apply `profile` onto the live editor state
///
/// Returns `false` when some operation failed without aborting the pass.
///
/// # Errors
/// Returns an error if the chain cannot be resolved or a stored file is unusable
pub async fn restore_profile(
    store: &FileStore,
    editor: &dyn Editor,
    profile: &str,
    options: &SyncOptions,
) -> SyncResult<bool> {
    let links = chain(store, profile).await?;
    let settings = resolve_sync_settings(store, profile).await?;
    let resources = selected(&settings, options);
    let ctx = context(store, editor, links, settings, options);

    let mut ok = true;
    for resource in resources {
        ok &= serializer(resource).restore(&ctx).await?;
    }
    if options.resources.is_none() {
        ok &= AdditionalFiles.restore(&ctx).await?;
    }

    if ok {
        info!(profile, "restore done");
    } else {
        warn!(profile, "restore done with failures");
    }
    Ok(ok)
}

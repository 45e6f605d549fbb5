//! Editor-side maintenance: missing extensions and reset

use crate::diff::array_diff;
use crate::editor::Editor;
use crate::error::{SyncError, SyncResult};
use crate::profile::{chain, ExtensionRecord, FileStore, SyncSettings};
use crate::resources::{local_extensions, resolve_extensions, stored_extension_ids};
use std::collections::BTreeSet;
use tracing::{info, warn};
use walkdir::WalkDir;

/// User data directories a reset keeps
const KEPT_DIRS: [&str; 2] = ["workspaceStorage", "globalStorage"];

/// Extensions a profile lists that the editor does not have in that state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingExtensions {
    /// Enabled in the profile, not enabled in the editor
    pub enabled: Vec<String>,
    /// Disabled in the profile, not disabled in the editor
    pub disabled: Vec<String>,
}

impl MissingExtensions {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty() && self.disabled.is_empty()
    }
}

/// Compare the resolved extension list of `profile` with the editor
///
/// # Errors
/// Returns an error if the chain cannot be resolved or the editor's
/// extensions cannot be listed
pub async fn missing_extensions(
    store: &FileStore,
    editor: &dyn Editor,
    profile: &str,
    settings: &SyncSettings,
) -> SyncResult<MissingExtensions> {
    let links = chain(store, profile).await?;
    let Some(stored) = resolve_extensions(store, &links).await? else {
        return Ok(MissingExtensions::default());
    };
    let live = local_extensions(editor, &settings.ignored_extensions()).await?;

    Ok(MissingExtensions {
        enabled: array_diff(&ids(&stored.enabled), &ids(&live.enabled)),
        disabled: array_diff(&ids(&stored.disabled), &ids(&live.disabled)),
    })
}

fn ids(records: &[ExtensionRecord]) -> Vec<String> {
    records.iter().map(|record| record.id.clone()).collect()
}

/// Outcome of [`reset`]
#[derive(Debug, Clone, Default)]
pub struct ResetReport {
    /// Extensions uninstalled
    pub uninstalled: Vec<String>,
    /// Number of user data files deleted
    pub deleted_count: usize,
    /// Operations that failed, one message each
    pub errors: Vec<String>,
}

/// Uninstall every extension but this tool's own and delete the user data
/// files outside `workspaceStorage` and `globalStorage`
///
/// Individual failures are collected in the report.
///
/// # Errors
/// Returns an error if the installed extensions cannot be listed
pub async fn reset(editor: &dyn Editor) -> SyncResult<ResetReport> {
    info!("removing all settings and extensions");

    let own = editor.own_extension_id().to_lowercase();
    let mut ids: BTreeSet<String> = editor
        .list_extensions()
        .await?
        .into_iter()
        .filter(|extension| !extension.builtin)
        .map(|extension| extension.id.to_lowercase())
        .collect();
    ids.extend(stored_extension_ids(&editor.extension_storage_dir()).await?);
    ids.remove(&own);

    let mut report = ResetReport::default();
    for id in ids {
        match editor.uninstall_extension(&id).await {
            Ok(()) => report.uninstalled.push(id),
            Err(err) => {
                warn!(extension = %id, error = %err, "can not uninstall");
                report.errors.push(err.to_string());
            }
        }
    }

    let user_data = editor.user_data_dir();
    let files = WalkDir::new(&user_data)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() != 1
                || !entry.file_type().is_dir()
                || !KEPT_DIRS.iter().any(|kept| entry.file_name() == *kept)
        })
        .filter_map(Result::ok)
        .filter(|entry| !entry.file_type().is_dir());

    for entry in files {
        info!(file = %entry.path().display(), "delete");
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => report.deleted_count += 1,
            Err(err) => report.errors.push(SyncError::io(entry.path(), &err).to_string()),
        }
    }

    Ok(report)
}

//! UI state serializer

use super::{ResourceSerializer, SyncContext};
use crate::editor::Editor;
use crate::error::SyncResult;
use crate::profile::{ChainLink, FileStore, Resource, UiStateDiff};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

const STATE_FILE: &str = "ui-state.yml";
const DIFF_FILE: &str = "ui-state.diff.yml";
const WORKBENCH_PREFIX: &str = "workbench.";

/// Stands for the extension storage directory inside stored values
pub const EXTENSION_STORAGE_PLACEHOLDER: &str = "${extensionStorage}";

pub struct UiState;

/// Path as it appears inside a JSON string literal
fn json_escaped(path: &str) -> String {
    let quoted = serde_json::to_string(path).unwrap_or_else(|_| format!("\"{path}\""));
    quoted[1..quoted.len() - 1].to_string()
}

/// Synced entries of the editor's state store
///
/// Values have the extension storage path replaced by the placeholder;
/// values still naming the home directory afterwards are left out.
///
/// # Errors
/// Returns an error if the state store or extension registry cannot be read
pub async fn local_ui_state(editor: &dyn Editor) -> SyncResult<BTreeMap<String, String>> {
    let extension_ids: HashSet<String> = editor
        .list_extensions()
        .await?
        .into_iter()
        .map(|extension| extension.id)
        .collect();

    let storage = editor.extension_storage_dir().to_string_lossy().to_string();
    let storage_escaped = json_escaped(&storage);
    let home = editor.home_dir().to_string_lossy().to_string();
    let home_escaped = json_escaped(&home);

    let mut entries = BTreeMap::new();
    for (key, value) in editor.read_state().await? {
        if !key.starts_with(WORKBENCH_PREFIX) && !extension_ids.contains(&key.to_lowercase()) {
            continue;
        }

        let value = if storage.is_empty() {
            value
        } else {
            value
                .replace(&storage_escaped, EXTENSION_STORAGE_PLACEHOLDER)
                .replace(&storage, EXTENSION_STORAGE_PLACEHOLDER)
        };
        if !home.is_empty() && (value.contains(&home) || value.contains(&home_escaped)) {
            debug!(key = %key, "value names the home directory, skipped");
            continue;
        }

        entries.insert(key, value);
    }

    Ok(entries)
}

/// UI state of the first profile of `chain`
///
/// `None` when no profile of the chain stores UI state.
///
/// # Errors
/// Returns an error if a stored file cannot be read or parsed
pub async fn resolve_ui_state(
    store: &FileStore,
    chain: &[ChainLink],
) -> SyncResult<Option<BTreeMap<String, String>>> {
    let Some((root, descendants)) = chain.split_last() else {
        return Ok(None);
    };

    let stored: Option<BTreeMap<String, String>> = store.read_yaml(&root.name, STATE_FILE).await?;
    let mut found = stored.is_some();
    let mut state = stored.unwrap_or_default();

    for link in descendants.iter().rev() {
        if let Some(diff) = store.read_yaml::<UiStateDiff>(&link.name, DIFF_FILE).await? {
            for key in &diff.removed {
                state.remove(key);
            }
            state.extend(diff.modified);
            found = true;
        }
    }

    Ok(found.then_some(state))
}

/// Differences of `local` against the resolved state of the parent
#[must_use]
pub fn diff_ui_state(ancestor: &BTreeMap<String, String>, local: &BTreeMap<String, String>) -> UiStateDiff {
    UiStateDiff {
        modified: local
            .iter()
            .filter(|(key, value)| ancestor.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        removed: ancestor
            .keys()
            .filter(|key| !local.contains_key(*key))
            .cloned()
            .collect(),
    }
}

/// Replace the placeholder with this machine's extension storage path
fn rehydrate(value: &str, storage: &str) -> String {
    if !value.contains(EXTENSION_STORAGE_PLACEHOLDER) {
        return value.to_string();
    }
    if serde_json::from_str::<serde_json::Value>(value).is_ok() {
        value.replace(EXTENSION_STORAGE_PLACEHOLDER, &json_escaped(storage))
    } else {
        value.replace(EXTENSION_STORAGE_PLACEHOLDER, storage)
    }
}

#[async_trait]
impl ResourceSerializer for UiState {
    fn resource(&self) -> Resource {
        Resource::UiState
    }

    async fn serialize(&self, ctx: &SyncContext<'_>) -> SyncResult<()> {
        info!(profile = %ctx.profile(), "serialize ui state");

        let local = local_ui_state(ctx.editor).await?;

        if ctx.is_root() {
            ctx.store.remove_data(ctx.profile(), DIFF_FILE).await?;
            return ctx.store.write_yaml(ctx.profile(), STATE_FILE, &local).await;
        }

        let ancestor = resolve_ui_state(ctx.store, ctx.parent_chain())
            .await?
            .unwrap_or_default();
        let diff = diff_ui_state(&ancestor, &local);

        ctx.store.remove_data(ctx.profile(), STATE_FILE).await?;
        if diff.is_empty() {
            ctx.store.remove_data(ctx.profile(), DIFF_FILE).await
        } else {
            ctx.store.write_yaml(ctx.profile(), DIFF_FILE, &diff).await
        }
    }

    async fn restore(&self, ctx: &SyncContext<'_>) -> SyncResult<bool> {
        info!(profile = %ctx.profile(), "restore ui state");

        let Some(resolved) = resolve_ui_state(ctx.store, &ctx.chain).await? else {
            info!(profile = %ctx.profile(), "no ui state stored, skipped");
            return Ok(true);
        };

        let storage = ctx.editor.extension_storage_dir().to_string_lossy().to_string();
        let entries: BTreeMap<String, Option<String>> = resolved
            .into_iter()
            .map(|(key, value)| {
                let value = rehydrate(&value, &storage);
                (key, Some(value))
            })
            .collect();

        if !entries.is_empty() {
            ctx.editor.write_state(entries).await?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_diff_modified_and_removed() {
        let ancestor = map(&[("workbench.a", "1"), ("workbench.b", "2")]);
        let local = map(&[("workbench.a", "1"), ("workbench.c", "3")]);

        let diff = diff_ui_state(&ancestor, &local);
        assert_eq!(diff.modified, map(&[("workbench.c", "3")]));
        assert_eq!(diff.removed, vec!["workbench.b".to_string()]);
    }

    #[test]
    fn test_diff_of_equal_state_is_empty() {
        let state = map(&[("workbench.a", "1")]);
        assert!(diff_ui_state(&state, &state).is_empty());
    }

    #[test]
    fn test_rehydrate() {
        let storage = "/home/me/.editor/extensions";
        assert_eq!(
            rehydrate("${extensionStorage}/x", storage),
            "/home/me/.editor/extensions/x"
        );
        assert_eq!(
            rehydrate(r#"{"p":"${extensionStorage}/y"}"#, storage),
            r#"{"p":"/home/me/.editor/extensions/y"}"#
        );
        assert_eq!(rehydrate("plain", storage), "plain");
    }

    #[test]
    fn test_json_escaped() {
        assert_eq!(json_escaped(r"C:\Users\me"), r"C:\\Users\\me");
        assert_eq!(json_escaped("/home/me"), "/home/me");
    }
}

//! Extension list serializer

use super::{ResourceSerializer, SyncContext};
use crate::diff::{array_diff, array_diff_by};
use crate::editor::{Editor, DISABLED_EXTENSIONS_KEY};
use crate::error::SyncResult;
use crate::profile::{BuiltinOverrides, ChainLink, ExtensionList, ExtensionRecord, FileStore, Resource};
use crate::util::{list_dirs, read_optional};
use async_trait::async_trait;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

const LIST_FILE: &str = "extensions.yml";

pub struct Extensions;

fn folder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+?)-(\d+\.\d+\.\d+)(?:-[\w-]+)?$").expect("valid regex"))
}

/// Extension folder found in the storage directory
struct StoredExtension {
    id: String,
    version: String,
    uuid: Option<String>,
}

/// Installed extension folders not marked obsolete
async fn scan_storage(dir: &Path) -> SyncResult<Vec<StoredExtension>> {
    let obsolete: HashMap<String, bool> = match read_optional(&dir.join(".obsolete")).await? {
        Some(text) => serde_json::from_str(&text).unwrap_or_default(),
        None => HashMap::new(),
    };

    let mut found = Vec::new();
    for name in list_dirs(dir).await? {
        if obsolete.get(&name).copied().unwrap_or(false) {
            continue;
        }
        let Some(caps) = folder_re().captures(&name) else {
            continue;
        };

        let uuid = read_optional(&dir.join(&name).join("package.json"))
            .await?
            .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
            .and_then(|pkg| {
                pkg.pointer("/__metadata/id")
                    .and_then(serde_json::Value::as_str)
                    .map(ToString::to_string)
            });

        found.push(StoredExtension {
            id: caps[1].to_lowercase(),
            version: caps[2].to_string(),
            uuid,
        });
    }

    Ok(found)
}

/// Ids of the extension folders in the storage directory, obsolete ones excluded
///
/// # Errors
/// Returns an error if the storage directory cannot be read
pub async fn stored_extension_ids(dir: &Path) -> SyncResult<Vec<String>> {
    Ok(scan_storage(dir).await?.into_iter().map(|stored| stored.id).collect())
}

/// Live extension list of the editor
///
/// Built-ins, extensions under development, this tool's own extension and
/// ignored ids are left out; built-ins that are disabled are reported in
/// `builtin.disabled`. Folders in the storage directory missing from the
/// registry are reported as disabled.
///
/// # Errors
/// Returns an error if the registry or the storage directory cannot be read
pub async fn local_extensions(editor: &dyn Editor, ignored: &[String]) -> SyncResult<ExtensionList> {
    let own = editor.own_extension_id().to_lowercase();
    let mut seen: HashSet<String> = HashSet::new();
    let mut list = ExtensionList::default();
    let mut builtin_disabled = Vec::new();

    for extension in editor.list_extensions().await? {
        let id = extension.id.to_lowercase();
        seen.insert(id.clone());

        if extension.builtin {
            if !extension.enabled {
                builtin_disabled.push(id);
            }
            continue;
        }
        if extension.under_development || id == own || ignored.contains(&id) {
            continue;
        }

        let record = ExtensionRecord {
            id,
            uuid: extension.uuid,
            version: extension.version,
        };
        if extension.enabled {
            list.enabled.push(record);
        } else {
            list.disabled.push(record);
        }
    }

    for stored in scan_storage(&editor.extension_storage_dir()).await? {
        if stored.id == own || ignored.contains(&stored.id) || !seen.insert(stored.id.clone()) {
            continue;
        }
        list.disabled.push(ExtensionRecord {
            id: stored.id,
            uuid: stored.uuid,
            version: Some(stored.version),
        });
    }

    list.enabled.sort_by(|a, b| a.id.cmp(&b.id));
    list.disabled.sort_by(|a, b| a.id.cmp(&b.id));
    builtin_disabled.sort();
    if !builtin_disabled.is_empty() {
        list.builtin = Some(BuiltinOverrides {
            disabled: Some(builtin_disabled),
            enabled: None,
        });
    }

    Ok(list)
}

/// Differences of `local` against the resolved list of its parent
#[must_use]
pub fn diff_extensions(ancestor: &ExtensionList, local: &ExtensionList) -> ExtensionList {
    let by_id = |record: &ExtensionRecord| record.id.clone();

    let ancestor_all: Vec<ExtensionRecord> = ancestor.all().cloned().collect();
    let local_all: Vec<ExtensionRecord> = local.all().cloned().collect();

    let local_builtin = local.builtin_disabled();
    let ancestor_builtin = ancestor.builtin_disabled();
    let builtin_disabled = array_diff(&local_builtin, &ancestor_builtin);
    let builtin_enabled = array_diff(&ancestor_builtin, &local_builtin);

    let builtin = BuiltinOverrides {
        disabled: (!builtin_disabled.is_empty()).then_some(builtin_disabled),
        enabled: (!builtin_enabled.is_empty()).then_some(builtin_enabled),
    };

    ExtensionList {
        enabled: array_diff_by(&local.enabled, &ancestor.enabled, by_id),
        disabled: array_diff_by(&local.disabled, &ancestor.disabled, by_id),
        uninstall: Some(array_diff_by(&ancestor_all, &local_all, by_id)),
        builtin: (!builtin.is_empty()).then_some(builtin),
    }
}

/// Apply one diff on a resolved list
///
/// Removals go first, then disables, enables and built-in overrides, so a
/// later rule never brings back what an earlier one removed.
fn apply_diff(base: ExtensionList, diff: &ExtensionList) -> ExtensionList {
    let mut builtin_disabled = base.builtin_disabled();
    let ExtensionList {
        mut enabled,
        mut disabled,
        ..
    } = base;

    let removed: HashSet<&str> = diff
        .uninstall
        .iter()
        .flatten()
        .map(|record| record.id.as_str())
        .collect();
    enabled.retain(|record| !removed.contains(record.id.as_str()));
    disabled.retain(|record| !removed.contains(record.id.as_str()));

    for record in &diff.disabled {
        enabled.retain(|r| r.id != record.id);
        if !disabled.iter().any(|r| r.id == record.id) {
            disabled.push(record.clone());
        }
    }

    for record in &diff.enabled {
        disabled.retain(|r| r.id != record.id);
        if !enabled.iter().any(|r| r.id == record.id) {
            enabled.push(record.clone());
        }
    }

    if let Some(builtin) = &diff.builtin {
        for id in builtin.disabled.iter().flatten() {
            if !builtin_disabled.contains(id) {
                builtin_disabled.push(id.clone());
            }
        }
        for id in builtin.enabled.iter().flatten() {
            builtin_disabled.retain(|d| d != id);
        }
    }

    ExtensionList {
        enabled,
        disabled,
        uninstall: None,
        builtin: (!builtin_disabled.is_empty()).then(|| BuiltinOverrides {
            disabled: Some(builtin_disabled),
            enabled: None,
        }),
    }
}

fn normalize(mut list: ExtensionList) -> ExtensionList {
    for record in list.enabled.iter_mut().chain(list.disabled.iter_mut()) {
        record.id = record.id.to_lowercase();
    }
    for record in list.uninstall.iter_mut().flatten() {
        record.id = record.id.to_lowercase();
    }
    list
}

/// Full extension list of the first profile of `chain`
///
/// `None` when no profile of the chain stores an extension list.
///
/// # Errors
/// Returns an error if a stored list cannot be read or parsed
pub async fn resolve_extensions(store: &FileStore, chain: &[ChainLink]) -> SyncResult<Option<ExtensionList>> {
    let Some((root, descendants)) = chain.split_last() else {
        return Ok(None);
    };

    let stored: Option<ExtensionList> = store.read_yaml(&root.name, LIST_FILE).await?;
    let mut found = stored.is_some();
    let mut list = ExtensionList {
        uninstall: None,
        ..normalize(stored.unwrap_or_default())
    };

    for link in descendants.iter().rev() {
        if let Some(diff) = store.read_yaml::<ExtensionList>(&link.name, LIST_FILE).await? {
            list = apply_diff(list, &normalize(diff));
            found = true;
        }
    }

    Ok(found.then_some(list))
}

fn record_failure(id: &str, operation: &str, result: SyncResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            warn!(extension = %id, operation, error = %err, "extension operation failed");
            false
        }
    }
}

#[async_trait]
impl ResourceSerializer for Extensions {
    fn resource(&self) -> Resource {
        Resource::Extensions
    }

    async fn serialize(&self, ctx: &SyncContext<'_>) -> SyncResult<()> {
        info!(profile = %ctx.profile(), "serialize extensions");

        let local = local_extensions(ctx.editor, &ctx.settings.ignored_extensions()).await?;

        let stored = if ctx.is_root() {
            local
        } else {
            let ancestor = resolve_extensions(ctx.store, ctx.parent_chain())
                .await?
                .unwrap_or_default();
            diff_extensions(&ancestor, &local)
        };

        ctx.store.write_yaml(ctx.profile(), LIST_FILE, &stored).await
    }

    async fn restore(&self, ctx: &SyncContext<'_>) -> SyncResult<bool> {
        info!(profile = %ctx.profile(), "restore extensions");

        let Some(resolved) = resolve_extensions(ctx.store, &ctx.chain).await? else {
            info!(profile = %ctx.profile(), "no extension list stored, skipped");
            return Ok(true);
        };

        let editor = ctx.editor;
        let ignored = ctx.settings.ignored_extensions();
        let own = editor.own_extension_id().to_lowercase();
        let wanted = |record: &&ExtensionRecord| record.id != own && !ignored.contains(&record.id);

        let live = local_extensions(editor, &ignored).await?;
        let mut installed: BTreeMap<String, bool> = live
            .enabled
            .iter()
            .map(|r| (r.id.clone(), true))
            .chain(live.disabled.iter().map(|r| (r.id.clone(), false)))
            .collect();

        let mut ok = true;

        if editor.can_manage_extensions().await {
            for record in resolved.disabled.iter().filter(wanted) {
                let id = record.id.as_str();
                match installed.remove(id) {
                    None => {
                        ok &= record_failure(id, "install", editor.install_extension(id).await)
                            && record_failure(id, "disable", editor.disable_extension(id).await);
                    }
                    Some(true) => ok &= record_failure(id, "disable", editor.disable_extension(id).await),
                    Some(false) => {}
                }
            }

            for record in resolved.enabled.iter().filter(wanted) {
                let id = record.id.as_str();
                match installed.remove(id) {
                    None => ok &= record_failure(id, "install", editor.install_extension(id).await),
                    Some(false) => ok &= record_failure(id, "enable", editor.enable_extension(id).await),
                    Some(true) => {}
                }
            }

            for id in installed.keys() {
                ok &= record_failure(id, "uninstall", editor.uninstall_extension(id).await);
            }

            let forced: HashSet<String> = resolved.builtin_disabled().into_iter().collect();
            for extension in editor.list_extensions().await?.into_iter().filter(|e| e.builtin) {
                let id = extension.id.to_lowercase();
                if extension.enabled && forced.contains(&id) {
                    ok &= record_failure(&id, "disable", editor.disable_extension(&id).await);
                } else if !extension.enabled && !forced.contains(&id) {
                    ok &= record_failure(&id, "enable", editor.enable_extension(&id).await);
                }
            }
        } else {
            info!("extension commands unavailable, only install and uninstall");

            for record in resolved.disabled.iter().chain(resolved.enabled.iter()).filter(wanted) {
                if installed.remove(&record.id).is_none() {
                    ok &= record_failure(&record.id, "install", editor.install_extension(&record.id).await);
                }
            }

            for id in installed.keys() {
                ok &= record_failure(id, "uninstall", editor.uninstall_extension(id).await);
            }

            let mut identifiers: Vec<serde_json::Value> = resolved
                .disabled
                .iter()
                .filter(wanted)
                .map(|record| match &record.uuid {
                    Some(uuid) => serde_json::json!({ "id": record.id, "uuid": uuid }),
                    None => serde_json::json!({ "id": record.id }),
                })
                .collect();
            identifiers.extend(
                resolved
                    .builtin_disabled()
                    .into_iter()
                    .map(|id| serde_json::json!({ "id": id })),
            );

            let value = serde_json::to_string(&identifiers)?;
            editor
                .write_state(BTreeMap::from([(DISABLED_EXTENSIONS_KEY.to_string(), Some(value))]))
                .await?;
        }

        if !ok {
            warn!(profile = %ctx.profile(), "some extension operations failed");
        }
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(enabled: &[&str], disabled: &[&str]) -> ExtensionList {
        ExtensionList {
            enabled: enabled.iter().map(|id| ExtensionRecord::new(id)).collect(),
            disabled: disabled.iter().map(|id| ExtensionRecord::new(id)).collect(),
            ..ExtensionList::default()
        }
    }

    fn ids(records: &[ExtensionRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_diff_addition() {
        let ancestor = list(&["a", "b"], &["c"]);
        let local = list(&["a", "b", "d"], &["c"]);

        let diff = diff_extensions(&ancestor, &local);
        assert_eq!(ids(&diff.enabled), vec!["d"]);
        assert!(diff.disabled.is_empty());
        assert_eq!(diff.uninstall, Some(vec![]));
        assert_eq!(diff.builtin, None);

        let restored = apply_diff(ancestor, &diff);
        assert_eq!(ids(&restored.enabled), vec!["a", "b", "d"]);
        assert_eq!(ids(&restored.disabled), vec!["c"]);
    }

    #[test]
    fn test_diff_removal() {
        let ancestor = list(&["a", "b"], &[]);
        let local = list(&["a"], &[]);

        let diff = diff_extensions(&ancestor, &local);
        assert!(diff.enabled.is_empty());
        assert_eq!(ids(diff.uninstall.as_deref().unwrap()), vec!["b"]);

        let restored = apply_diff(ancestor, &diff);
        assert_eq!(ids(&restored.enabled), vec!["a"]);
    }

    #[test]
    fn test_diff_state_flip() {
        let ancestor = list(&["a"], &["b"]);
        let local = list(&["b"], &["a"]);

        let diff = diff_extensions(&ancestor, &local);
        let restored = apply_diff(ancestor, &diff);
        assert_eq!(ids(&restored.enabled), vec!["b"]);
        assert_eq!(ids(&restored.disabled), vec!["a"]);
    }

    #[test]
    fn test_builtin_overrides_are_asymmetric() {
        let mut ancestor = list(&[], &[]);
        ancestor.builtin = Some(BuiltinOverrides {
            disabled: Some(vec!["vscode.git".to_string()]),
            enabled: None,
        });
        let mut local = list(&[], &[]);
        local.builtin = Some(BuiltinOverrides {
            disabled: Some(vec!["vscode.npm".to_string()]),
            enabled: None,
        });

        let diff = diff_extensions(&ancestor, &local);
        let builtin = diff.builtin.clone().unwrap();
        assert_eq!(builtin.disabled, Some(vec!["vscode.npm".to_string()]));
        assert_eq!(builtin.enabled, Some(vec!["vscode.git".to_string()]));

        let restored = apply_diff(ancestor, &diff);
        assert_eq!(restored.builtin_disabled(), vec!["vscode.npm".to_string()]);
    }

    #[test]
    fn test_removal_wins_over_earlier_addition() {
        let base = list(&["a"], &[]);
        let diff = ExtensionList {
            enabled: vec![ExtensionRecord::new("b")],
            uninstall: Some(vec![ExtensionRecord::new("a")]),
            ..ExtensionList::default()
        };
        let restored = apply_diff(base, &diff);
        assert_eq!(ids(&restored.enabled), vec!["b"]);
    }

    #[test]
    fn test_folder_pattern() {
        let caps = folder_re().captures("ms-python.python-2024.2.1-linux-x64").unwrap();
        assert_eq!(&caps[1], "ms-python.python");
        assert_eq!(&caps[2], "2024.2.1");
        assert!(folder_re().captures(".obsolete").is_none());
    }
}

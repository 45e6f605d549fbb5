//! Serialize/restore integration tests over inheriting profiles
//!
//! Every test drives the engine with an in-memory editor over real
//! temporary directories.

use profsync_core::editor::InstalledExtension;
use profsync_core::engine::{restore_profile, serialize_profile, SyncOptions};
use profsync_core::profile::{ExtensionList, Resource, SnippetsDiff, SyncSettings, UiStateDiff};
use profsync_core::resources::EXTENSION_STORAGE_PLACEHOLDER;
use profsync_core::{FileStore, MemoryEditor};
use std::fs;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use tempfile::TempDir;

struct Machine {
    _temp: TempDir,
    root: PathBuf,
}

impl Machine {
    fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let root = temp.path().to_path_buf();
        fs::create_dir_all(root.join("user")).unwrap();
        fs::create_dir_all(root.join("home")).unwrap();
        Self { _temp: temp, root }
    }

    fn editor(&self) -> MemoryEditor {
        MemoryEditor::new(self.user(), self.root.join("extensions"), self.root.join("home"))
    }

    fn user(&self) -> PathBuf {
        self.root.join("user")
    }

    fn write(&self, relative: &str, content: &str) {
        let path = self.user().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read(&self, relative: &str) -> Option<String> {
        fs::read_to_string(self.user().join(relative)).ok()
    }

    fn home(&self) -> PathBuf {
        self.root.join("home")
    }
}

fn extension(id: &str) -> InstalledExtension {
    InstalledExtension::new(id)
}

fn ids(records: &[profsync_core::profile::ExtensionRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

fn installed(editor: &MemoryEditor) -> Vec<(String, bool)> {
    editor
        .extensions()
        .into_iter()
        .map(|e| (e.id, e.enabled))
        .collect()
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    serde_yml::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

async fn extend(store: &FileStore, parent: &str, child: &str) {
    store.extend(parent, child).await.expect("Failed to extend profile");
}

#[tokio::test]
async fn test_extension_added_in_child() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("repo"));
    let options = SyncOptions::default();

    let base = Machine::new();
    let editor = base
        .editor()
        .with_extension(extension("pub.a"))
        .with_extension(extension("pub.b"))
        .with_extension(extension("pub.c").disabled());
    serialize_profile(&store, &editor, "main", &options).await.unwrap();

    extend(&store, "main", "work").await;
    editor.add_extension(extension("pub.d"));
    serialize_profile(&store, &editor, "work", &options).await.unwrap();

    let diff: ExtensionList = read_yaml(&store.data_dir("work").join("extensions.yml"));
    assert_eq!(ids(&diff.enabled), vec!["pub.d"]);
    assert!(diff.disabled.is_empty());
    assert_eq!(diff.uninstall.as_deref().map(<[_]>::len), Some(0));

    let other = Machine::new();
    let fresh = other
        .editor()
        .with_extension(extension("pub.a"))
        .with_extension(extension("pub.b"))
        .with_extension(extension("pub.c").disabled());
    assert!(restore_profile(&store, &fresh, "work", &options).await.unwrap());

    assert_eq!(
        installed(&fresh),
        vec![
            ("pub.a".to_string(), true),
            ("pub.b".to_string(), true),
            ("pub.c".to_string(), false),
            ("pub.d".to_string(), true),
        ]
    );
}

#[tokio::test]
async fn test_extension_removed_in_child() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("repo"));
    let options = SyncOptions::default();

    let base = Machine::new();
    let editor = base
        .editor()
        .with_extension(extension("pub.a"))
        .with_extension(extension("pub.b"));
    serialize_profile(&store, &editor, "main", &options).await.unwrap();

    extend(&store, "main", "work").await;
    let local = Machine::new();
    let trimmed = local.editor().with_extension(extension("pub.a"));
    serialize_profile(&store, &trimmed, "work", &options).await.unwrap();

    let diff: ExtensionList = read_yaml(&store.data_dir("work").join("extensions.yml"));
    assert!(diff.enabled.is_empty());
    assert_eq!(ids(diff.uninstall.as_deref().unwrap()), vec!["pub.b"]);

    assert!(restore_profile(&store, &editor, "work", &options).await.unwrap());
    assert_eq!(installed(&editor), vec![("pub.a".to_string(), true)]);
}

#[tokio::test]
async fn test_degraded_policy_records_disabled_ids() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("repo"));
    let options = SyncOptions::default();

    let base = Machine::new();
    let editor = base
        .editor()
        .with_extension(extension("pub.a"))
        .with_extension(extension("pub.c").disabled());
    serialize_profile(&store, &editor, "main", &options).await.unwrap();

    let other = Machine::new();
    let limited = other.editor().without_commands();
    assert!(restore_profile(&store, &limited, "main", &options).await.unwrap());

    let ids: Vec<String> = limited.extensions().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["pub.a".to_string(), "pub.c".to_string()]);

    let state = limited.state();
    let disabled = &state["extensionsIdentifiers/disabled"];
    assert!(disabled.contains("\"pub.c\""));
    assert!(!disabled.contains("\"pub.a\""));
}

#[tokio::test]
async fn test_failing_extension_does_not_abort_restore() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("repo"));
    let options = SyncOptions::default();

    let base = Machine::new();
    let editor = base
        .editor()
        .with_extension(extension("pub.a"))
        .with_extension(extension("pub.b"));
    serialize_profile(&store, &editor, "main", &options).await.unwrap();

    let other = Machine::new();
    let fresh = other.editor();
    fresh.fail_on("pub.a");

    assert!(!restore_profile(&store, &fresh, "main", &options).await.unwrap());
    let ids: Vec<String> = fresh.extensions().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["pub.b".to_string()]);
}

#[tokio::test]
async fn test_ignored_setting_survives_restore() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("repo"));
    let options = SyncOptions {
        machine: Some(SyncSettings {
            ignored_settings: Some(vec!["b".to_string()]),
            ..SyncSettings::default()
        }),
        ..SyncOptions::default()
    };

    let base = Machine::new();
    base.write("settings.json", "{\n  \"a\": 1,\n  \"b\": 2\n}\n");
    serialize_profile(&store, &base.editor(), "main", &options).await.unwrap();

    let stored = store.read_data("main", "settings.json").await.unwrap().unwrap();
    assert!(stored.contains("\"a\": 1"));
    assert!(!stored.contains("\"b\""));

    let other = Machine::new();
    other.write("settings.json", "{\n  \"b\": 9\n}\n");
    assert!(restore_profile(&store, &other.editor(), "main", &SyncOptions::default())
        .await
        .unwrap());

    let restored = other.read("settings.json").unwrap();
    let value: serde_json::Value = serde_json::from_str(&restored).unwrap();
    assert_eq!(value, serde_json::json!({ "a": 1, "b": 9 }));
}

#[tokio::test]
async fn test_snippet_removal_in_child() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("repo"));
    let options = SyncOptions::default();

    let base = Machine::new();
    base.write("snippets/x.json", "{\"x\": {}}");
    base.write("snippets/z.json", "{\"z\": {}}");
    serialize_profile(&store, &base.editor(), "main", &options).await.unwrap();

    extend(&store, "main", "work").await;
    let local = Machine::new();
    local.write("snippets/y.json", "{\"z\": {}}");
    local.write("snippets/z.json", "{\"z\": {}}");
    serialize_profile(&store, &local.editor(), "work", &options).await.unwrap();

    let diff: SnippetsDiff = read_yaml(&store.data_dir("work").join("snippets.diff.yml"));
    assert_eq!(diff.removed, vec!["x.json".to_string()]);
    assert_eq!(store.list_data("work", "snippets").unwrap(), vec!["y.json".to_string()]);

    let target = Machine::new();
    target.write("snippets/stale.json", "{}");
    assert!(restore_profile(&store, &target.editor(), "work", &options).await.unwrap());

    assert!(target.read("snippets/x.json").is_none());
    assert!(target.read("snippets/stale.json").is_none());
    assert_eq!(target.read("snippets/y.json").unwrap(), "{\"z\": {}}");
    assert_eq!(target.read("snippets/z.json").unwrap(), "{\"z\": {}}");
}

#[tokio::test]
async fn test_ui_state_extension_path_placeholder() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("repo"));
    let options = SyncOptions::default();

    let base = Machine::new();
    let editor = base.editor();
    let storage = base.root.join("extensions").to_string_lossy().to_string();
    editor.set_state("workbench.explorer", &format!("{{\"icon\":\"{storage}/pub.a-1.0.0/icon.png\"}}"));
    editor.set_state("unrelated.key", "1");
    serialize_profile(&store, &editor, "main", &options).await.unwrap();

    let stored = store.read_data("main", "ui-state.yml").await.unwrap().unwrap();
    assert!(stored.contains(EXTENSION_STORAGE_PLACEHOLDER));
    assert!(!stored.contains(&storage));
    assert!(!stored.contains("unrelated.key"));

    extend(&store, "main", "work").await;
    let other = Machine::new();
    let target = other.editor();
    assert!(restore_profile(&store, &target, "work", &options).await.unwrap());

    let target_storage = other.root.join("extensions").to_string_lossy().to_string();
    assert_eq!(
        target.state()["workbench.explorer"],
        format!("{{\"icon\":\"{target_storage}/pub.a-1.0.0/icon.png\"}}")
    );

    serialize_profile(&store, &target, "work", &options).await.unwrap();
    assert!(store.read_data("work", "ui-state.diff.yml").await.unwrap().is_none());

    target.set_state("workbench.panel", "closed");
    serialize_profile(&store, &target, "work", &options).await.unwrap();
    let diff: UiStateDiff = read_yaml(&store.data_dir("work").join("ui-state.diff.yml"));
    assert_eq!(diff.modified.get("workbench.panel").map(String::as_str), Some("closed"));
    assert!(diff.removed.is_empty());
}

#[tokio::test]
async fn test_sync_settings_only_stored_when_they_differ() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("repo"));
    let machine = SyncSettings {
        ignored_settings: Some(vec!["window.zoomLevel".to_string()]),
        ..SyncSettings::default()
    };
    let options = SyncOptions {
        machine: Some(machine.clone()),
        ..SyncOptions::default()
    };

    let base = Machine::new();
    serialize_profile(&store, &base.editor(), "main", &options).await.unwrap();
    assert_eq!(store.load_sync_settings("main").await.unwrap(), Some(machine));

    extend(&store, "main", "work").await;
    serialize_profile(&store, &base.editor(), "work", &options).await.unwrap();
    assert_eq!(store.load_sync_settings("work").await.unwrap(), None);
}

#[tokio::test]
async fn test_cyclic_chain_is_a_data_error() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("repo"));

    store.ensure_profile("a").await.unwrap();
    extend(&store, "a", "b").await;
    fs::write(store.profile_dir("a").join("profile.yml"), "extends: b\n").unwrap();

    let base = Machine::new();
    let err = restore_profile(&store, &base.editor(), "a", &SyncOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DATA_ERROR");
}

/// Every file of the tree with its content
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .map(Result::unwrap)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap().to_path_buf();
            (relative, fs::read(entry.path()).unwrap())
        })
        .collect()
}

#[tokio::test]
async fn test_three_level_chain_round_trip() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("repo"));
    let options = SyncOptions::default();

    let root = Machine::new();
    let root_editor = root
        .editor()
        .with_extension(extension("pub.a"))
        .with_extension(extension("pub.b"))
        .with_extension(extension("pub.c"));
    root.write("snippets/a.json", "{\"a\": {}}");
    root.write("snippets/b.json", "{\"b\": {}}");
    root_editor.set_state("workbench.a", "1");
    root_editor.set_state("workbench.b", "1");
    serialize_profile(&store, &root_editor, "main", &options).await.unwrap();

    extend(&store, "main", "mid").await;
    let mid = Machine::new();
    let mid_editor = mid
        .editor()
        .with_extension(extension("pub.a"))
        .with_extension(extension("pub.b"))
        .with_extension(extension("pub.c").disabled())
        .with_extension(extension("pub.d"));
    mid.write("snippets/a.json", "{\"a\": {}}");
    mid.write("snippets/b.json", "{\"b\": {\"mid\": true}}");
    mid_editor.set_state("workbench.a", "1");
    mid_editor.set_state("workbench.b", "2");
    serialize_profile(&store, &mid_editor, "mid", &options).await.unwrap();

    extend(&store, "mid", "leaf").await;
    let leaf = Machine::new();
    let leaf_editor = leaf
        .editor()
        .with_extension(extension("pub.b"))
        .with_extension(extension("pub.c").disabled())
        .with_extension(extension("pub.e"));
    leaf.write("snippets/b.json", "{\"b\": {\"mid\": true}}");
    leaf.write("snippets/c.json", "{\"c\": {}}");
    leaf_editor.set_state("workbench.b", "2");
    serialize_profile(&store, &leaf_editor, "leaf", &options).await.unwrap();

    let diff: ExtensionList = read_yaml(&store.data_dir("leaf").join("extensions.yml"));
    assert_eq!(ids(&diff.enabled), vec!["pub.e"]);
    assert_eq!(ids(diff.uninstall.as_deref().unwrap()), vec!["pub.a", "pub.d"]);
    let snippets: SnippetsDiff = read_yaml(&store.data_dir("leaf").join("snippets.diff.yml"));
    assert_eq!(snippets.removed, vec!["a.json".to_string()]);
    assert_eq!(store.list_data("leaf", "snippets").unwrap(), vec!["c.json".to_string()]);

    let target = Machine::new();
    target.write("snippets/stale.json", "{}");
    let target_editor = target
        .editor()
        .with_extension(extension("pub.a"))
        .with_extension(extension("pub.z"));
    assert!(restore_profile(&store, &target_editor, "leaf", &options).await.unwrap());

    assert_eq!(
        installed(&target_editor),
        vec![
            ("pub.b".to_string(), true),
            ("pub.c".to_string(), false),
            ("pub.e".to_string(), true),
        ]
    );
    assert!(target.read("snippets/a.json").is_none());
    assert!(target.read("snippets/stale.json").is_none());
    assert_eq!(target.read("snippets/b.json").unwrap(), "{\"b\": {\"mid\": true}}");
    assert_eq!(target.read("snippets/c.json").unwrap(), "{\"c\": {}}");

    let state = target_editor.state();
    assert_eq!(state.get("workbench.b").map(String::as_str), Some("2"));
    assert!(!state.contains_key("workbench.a"));
}

#[tokio::test]
async fn test_serialize_twice_leaves_tree_unchanged() {
    let temp = TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    let store = FileStore::new(&repo);
    let options = SyncOptions::default();

    let base = Machine::new();
    let editor = base
        .editor()
        .with_extension(extension("pub.a"))
        .with_extension(extension("pub.b").disabled());
    base.write("settings.json", "{\n  // mine\n  \"a\": 1\n}\n");
    base.write("keybindings.json", "[]\n");
    base.write("snippets/x.json", "{\"x\": {}}");
    editor.set_state("workbench.panel", "open");
    serialize_profile(&store, &editor, "main", &options).await.unwrap();

    extend(&store, "main", "work").await;
    editor.add_extension(extension("pub.c"));
    base.write("snippets/y.json", "{\"y\": {}}");
    editor.set_state("workbench.panel", "closed");

    serialize_profile(&store, &editor, "work", &options).await.unwrap();
    let first = snapshot(&repo);
    serialize_profile(&store, &editor, "work", &options).await.unwrap();
    assert_eq!(snapshot(&repo), first);

    serialize_profile(&store, &editor, "main", &options).await.unwrap();
    let first = snapshot(&repo);
    serialize_profile(&store, &editor, "main", &options).await.unwrap();
    assert_eq!(snapshot(&repo), first);
}

#[tokio::test]
async fn test_selected_resources_leave_additional_files_alone() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("repo"));
    let machine = SyncSettings {
        additional_files: Some(vec!["~/.tool/config.json".to_string()]),
        ..SyncSettings::default()
    };
    let full = SyncOptions {
        machine: Some(machine.clone()),
        ..SyncOptions::default()
    };
    let settings_only = SyncOptions {
        machine: Some(machine),
        resources: Some(vec![Resource::Settings]),
        ..SyncOptions::default()
    };

    let base = Machine::new();
    let tool = base.home().join(".tool/config.json");
    fs::create_dir_all(tool.parent().unwrap()).unwrap();
    fs::write(&tool, "v1").unwrap();
    base.write("settings.json", "{}");
    serialize_profile(&store, &base.editor(), "main", &full).await.unwrap();
    let stored = store.list_data("main", "additionals").unwrap();
    assert_eq!(stored.len(), 1);
    let stored = store.data_dir("main").join("additionals").join(&stored[0]);

    fs::write(&tool, "v2").unwrap();
    serialize_profile(&store, &base.editor(), "main", &settings_only).await.unwrap();
    assert_eq!(fs::read_to_string(&stored).unwrap(), "v1");

    let other = Machine::new();
    let restored = other.home().join(".tool/config.json");
    assert!(restore_profile(&store, &other.editor(), "main", &settings_only).await.unwrap());
    assert!(!restored.exists());
    assert!(other.read("settings.json").is_some());

    assert!(restore_profile(&store, &other.editor(), "main", &SyncOptions::default()).await.unwrap());
    assert_eq!(fs::read_to_string(&restored).unwrap(), "v1");
}

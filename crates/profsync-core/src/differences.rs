//! What an upload would change in the stored profile

use crate::editor::Editor;
use crate::engine::{serialize_profile, SyncOptions};
use crate::error::{SyncError, SyncResult};
use crate::profile::FileStore;
use crate::util::{copy_dir, list_files, read_bytes};
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::TempDir;

/// How a stored file would change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One stored file that differs from the live state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDifference {
    /// Path inside the profile directory, `/`-separated
    pub path: String,
    pub change: ChangeKind,
    /// Line diff, `-` for stored lines and `+` for live ones
    pub diff: String,
}

/// Serialize the live state into a scratch copy of the profile tree and
/// compare it with the stored profile
///
/// # Errors
/// Returns an error if the scratch copy cannot be made or serialized
pub async fn differences(
    store: &FileStore,
    editor: &dyn Editor,
    profile: &str,
    options: &SyncOptions,
) -> SyncResult<Vec<FileDifference>> {
    let scratch_dir = TempDir::new().map_err(|e| SyncError::io(std::env::temp_dir(), &e))?;
    let scratch = FileStore::new(scratch_dir.path());
    copy_dir(&store.profiles_dir(), &scratch.profiles_dir()).await?;

    serialize_profile(&scratch, editor, profile, options).await?;

    let stored_dir = store.profile_dir(profile);
    let live_dir = scratch.profile_dir(profile);
    let stored = list_files(&stored_dir)?;
    let live = list_files(&live_dir)?;
    let paths: BTreeSet<&String> = stored.iter().chain(live.iter()).collect();

    let mut found = Vec::new();
    for path in paths {
        let before = read_text(&stored_dir, path).await?;
        let after = read_text(&live_dir, path).await?;

        let change = match (&before, &after) {
            (None, Some(_)) => ChangeKind::Added,
            (Some(_), None) => ChangeKind::Removed,
            (Some(a), Some(b)) if a != b => ChangeKind::Modified,
            _ => continue,
        };

        found.push(FileDifference {
            path: path.clone(),
            change,
            diff: text_diff(
                before.as_deref().unwrap_or_default(),
                after.as_deref().unwrap_or_default(),
            ),
        });
    }

    Ok(found)
}

async fn read_text(dir: &Path, relative: &str) -> SyncResult<Option<String>> {
    Ok(read_bytes(&dir.join(relative))
        .await?
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
}

/// Signed line diff of two texts
#[must_use]
pub fn text_diff(old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = String::new();

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        output.push_str(sign);
        output.push_str(change.value());
        if !change.value().ends_with('\n') {
            output.push('\n');
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::MemoryEditor;

    #[test]
    fn test_text_diff() {
        let diff = text_diff("a\nb\n", "a\nc");
        assert_eq!(diff, " a\n-b\n+c\n");
    }

    #[tokio::test]
    async fn test_live_settings_show_as_modified() {
        let temp = TempDir::new().unwrap();
        let user = temp.path().join("user");
        std::fs::create_dir_all(&user).unwrap();
        std::fs::write(user.join("settings.json"), "{\n  \"a\": 1\n}\n").unwrap();
        let editor = MemoryEditor::new(&user, temp.path().join("ext"), temp.path());

        let store = FileStore::new(temp.path().join("repo"));
        let options = SyncOptions::default();
        serialize_profile(&store, &editor, "main", &options).await.unwrap();

        assert!(differences(&store, &editor, "main", &options).await.unwrap().is_empty());

        std::fs::write(user.join("settings.json"), "{\n  \"a\": 2\n}\n").unwrap();
        let found = differences(&store, &editor, "main", &options).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "data/settings.json");
        assert_eq!(found[0].change, ChangeKind::Modified);
        assert!(found[0].diff.contains("+  \"a\": 2"));

        // the stored profile is untouched
        let stored = store.read_data("main", "settings.json").await.unwrap().unwrap();
        assert!(stored.contains("\"a\": 1"));
    }
}

//! Snippet files serializer

use super::{ResourceSerializer, SyncContext};
use crate::diff::content_hash;
use crate::error::SyncResult;
use crate::profile::{ChainLink, FileStore, Resource, SnippetsDiff};
use crate::util::{list_files, read_bytes, remove_path, write_file};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, info};

const SNIPPETS_DIR: &str = "snippets";
const DIFF_FILE: &str = "snippets.diff.yml";

pub struct Snippets;

/// Where the resolved content of one snippet file lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSnippet {
    pub hash: String,
    /// Profile whose `data/snippets` holds the file
    pub profile: String,
}

fn stored_path(file: &str) -> String {
    format!("{SNIPPETS_DIR}/{file}")
}

/// Snippet files of the first profile of `chain`, by relative path
///
/// Starting from the root, every descendant first drops its recorded
/// removals, then overlays its own files. `None` when no profile of the chain
/// stores snippets.
///
/// # Errors
/// Returns an error if a stored file or diff cannot be read
pub async fn resolve_snippets(
    store: &FileStore,
    chain: &[ChainLink],
) -> SyncResult<Option<BTreeMap<String, ResolvedSnippet>>> {
    let mut resolved: BTreeMap<String, ResolvedSnippet> = BTreeMap::new();
    let mut found = false;

    for (index, link) in chain.iter().enumerate().rev() {
        let is_root = index + 1 == chain.len();
        if !is_root {
            if let Some(diff) = store.read_yaml::<SnippetsDiff>(&link.name, DIFF_FILE).await? {
                for file in &diff.removed {
                    resolved.remove(file);
                }
                found = true;
            }
        }

        for file in store.list_data(&link.name, SNIPPETS_DIR)? {
            let path = store.data_path(&link.name, &stored_path(&file))?;
            let Some(content) = read_bytes(&path).await? else {
                continue;
            };
            resolved.insert(
                file,
                ResolvedSnippet {
                    hash: content_hash(&content),
                    profile: link.name.clone(),
                },
            );
            found = true;
        }
    }

    Ok(found.then_some(resolved))
}

fn live_dir(ctx: &SyncContext<'_>) -> PathBuf {
    ctx.editor.user_data_dir().join(SNIPPETS_DIR)
}

#[async_trait]
impl ResourceSerializer for Snippets {
    fn resource(&self) -> Resource {
        Resource::Snippets
    }

    async fn serialize(&self, ctx: &SyncContext<'_>) -> SyncResult<()> {
        info!(profile = %ctx.profile(), "serialize snippets");

        let dir = live_dir(ctx);
        let ancestor = if ctx.is_root() {
            BTreeMap::new()
        } else {
            resolve_snippets(ctx.store, ctx.parent_chain())
                .await?
                .unwrap_or_default()
        };

        ctx.store.remove_data(ctx.profile(), SNIPPETS_DIR).await?;

        let mut local: HashSet<String> = HashSet::new();
        for file in list_files(&dir)? {
            let Some(content) = read_bytes(&dir.join(&file)).await? else {
                continue;
            };

            let unchanged = ancestor
                .get(&file)
                .is_some_and(|entry| entry.hash == content_hash(&content));
            if unchanged {
                debug!(file = %file, "same as ancestor, skipped");
            } else {
                ctx.store
                    .write_data(ctx.profile(), &stored_path(&file), content)
                    .await?;
            }
            local.insert(file);
        }

        let diff = SnippetsDiff {
            removed: ancestor
                .keys()
                .filter(|file| !local.contains(*file))
                .cloned()
                .collect(),
        };
        if diff.removed.is_empty() {
            ctx.store.remove_data(ctx.profile(), DIFF_FILE).await
        } else {
            ctx.store.write_yaml(ctx.profile(), DIFF_FILE, &diff).await
        }
    }

    async fn restore(&self, ctx: &SyncContext<'_>) -> SyncResult<bool> {
        info!(profile = %ctx.profile(), "restore snippets");

        let Some(resolved) = resolve_snippets(ctx.store, &ctx.chain).await? else {
            info!(profile = %ctx.profile(), "no snippets stored, skipped");
            return Ok(true);
        };

        let dir = live_dir(ctx);
        for (file, entry) in &resolved {
            let source = ctx.store.data_path(&entry.profile, &stored_path(file))?;
            if let Some(content) = read_bytes(&source).await? {
                write_file(&dir.join(file), content).await?;
            }
        }

        for file in list_files(&dir)? {
            if !resolved.contains_key(&file) {
                debug!(file = %file, "not in profile, removed");
                remove_path(&dir.join(&file)).await?;
            }
        }

        Ok(true)
    }
}

//! `extends` chain resolution

use super::store::FileStore;
use super::types::{ProfileConfig, SyncSettings};
use crate::error::{SyncError, SyncResult};
use std::collections::HashSet;
use tracing::warn;

/// Longest accepted `extends` chain, the profile itself included
pub const MAX_CHAIN_DEPTH: usize = 32;

/// Profile with its loaded `profile.yml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    pub name: String,
    pub config: ProfileConfig,
}

/// Walk from `name` up to its root profile
///
/// The first element is `name` itself, the last is the effective root. A
/// parent that fails to load ends the chain with a warning.
///
/// # Errors
/// Returns `ProfileNotFound` if `name` itself cannot be loaded, and
/// `CyclicProfile` if the chain revisits a profile or exceeds
/// [`MAX_CHAIN_DEPTH`]
pub async fn chain(store: &FileStore, name: &str) -> SyncResult<Vec<ChainLink>> {
    let config = store.load_profile(name).await?;
    let mut links = vec![ChainLink {
        name: name.to_string(),
        config,
    }];
    let mut visited: HashSet<String> = HashSet::from([name.to_string()]);

    while let Some(parent) = links.last().and_then(|link| link.config.extends.clone()) {
        if !visited.insert(parent.clone()) || links.len() >= MAX_CHAIN_DEPTH {
            let mut names: Vec<String> = links.into_iter().map(|link| link.name).collect();
            names.push(parent);
            return Err(SyncError::CyclicProfile { chain: names });
        }

        match store.load_profile(&parent).await {
            Ok(config) => links.push(ChainLink { name: parent, config }),
            Err(err) => {
                warn!(profile = %parent, error = %err, "parent profile can not be loaded, chain ends here");
                break;
            }
        }
    }

    Ok(links)
}

/// Name of the root profile at the end of `name`'s chain
///
/// # Errors
/// Same as [`chain`]
pub async fn ancestor_profile(store: &FileStore, name: &str) -> SyncResult<String> {
    let links = chain(store, name).await?;
    Ok(links
        .last()
        .map_or_else(|| name.to_string(), |link| link.name.clone()))
}

/// First `.sync.yml` found from `name` toward its root, or the defaults
///
/// # Errors
/// Same as [`chain`], plus parse errors of a `.sync.yml`
pub async fn resolve_sync_settings(store: &FileStore, name: &str) -> SyncResult<SyncSettings> {
    for link in chain(store, name).await? {
        if let Some(settings) = store.load_sync_settings(&link.name).await? {
            return Ok(settings);
        }
    }
    Ok(SyncSettings::default())
}

/// Profiles whose `extends` names `name`
///
/// # Errors
/// Returns an error if the profile list cannot be read
pub async fn dependents(store: &FileStore, name: &str) -> SyncResult<Vec<String>> {
    let mut found = Vec::new();
    for profile in store.list_profiles().await? {
        if let Ok(config) = store.load_profile(&profile).await {
            if config.extends.as_deref() == Some(name) {
                found.push(profile);
            }
        }
    }
    Ok(found)
}

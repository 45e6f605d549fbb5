//! On-disk profile tree
//!
//! ```text
//! profiles/<name>/profile.yml
//! profiles/<name>/.sync.yml
//! profiles/<name>/data/...
//! ```

use super::types::{ProfileConfig, SyncSettings};
use crate::error::{SyncError, SyncResult};
use crate::util::{copy_dir, list_dirs, list_files, read_optional, remove_path, safe_join, validate_name, write_file};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

const PROFILES_DIR: &str = "profiles";
const PROFILE_FILE: &str = "profile.yml";
const SYNC_FILE: &str = ".sync.yml";
const DATA_DIR: &str = "data";

/// Profile tree rooted at a repository directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn profiles_dir(&self) -> PathBuf {
        self.root.join(PROFILES_DIR)
    }

    #[must_use]
    pub fn profile_dir(&self, name: &str) -> PathBuf {
        self.profiles_dir().join(name)
    }

    #[must_use]
    pub fn data_dir(&self, name: &str) -> PathBuf {
        self.profile_dir(name).join(DATA_DIR)
    }

    /// Path of a data file, refusing paths that leave the data directory
    ///
    /// # Errors
    /// Returns an error if `relative` is absolute or climbs out
    pub fn data_path(&self, name: &str, relative: &str) -> SyncResult<PathBuf> {
        safe_join(&self.data_dir(name), Path::new(relative))
    }

    pub async fn exists(&self, name: &str) -> bool {
        fs::try_exists(self.profile_dir(name)).await.unwrap_or(false)
    }

    /// Names of every profile, sorted
    ///
    /// # Errors
    /// Returns an error if the profiles directory cannot be read
    pub async fn list_profiles(&self) -> SyncResult<Vec<String>> {
        list_dirs(&self.profiles_dir()).await
    }

    /// Create the profile directory if it is missing
    ///
    /// # Errors
    /// Returns an error for an invalid name or if the directory cannot be created
    pub async fn ensure_profile(&self, name: &str) -> SyncResult<()> {
        validate_name(name)?;
        let dir = self.profile_dir(name);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| SyncError::io(&dir, &e))
    }

    /// Load `profile.yml`; a profile without one is a root profile
    ///
    /// # Errors
    /// Returns `ProfileNotFound` if the profile directory does not exist,
    /// or a parse error
    pub async fn load_profile(&self, name: &str) -> SyncResult<ProfileConfig> {
        if !self.exists(name).await {
            return Err(SyncError::ProfileNotFound(name.to_string()));
        }

        match read_optional(&self.profile_dir(name).join(PROFILE_FILE)).await? {
            Some(text) if !text.trim().is_empty() => Ok(serde_yml::from_str(&text)?),
            _ => Ok(ProfileConfig::default()),
        }
    }

    /// Write `profile.yml`
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub async fn save_profile(&self, name: &str, config: &ProfileConfig) -> SyncResult<()> {
        let text = serde_yml::to_string(config)?;
        write_file(&self.profile_dir(name).join(PROFILE_FILE), text).await
    }

    /// Load the profile's own `.sync.yml`, if any
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub async fn load_sync_settings(&self, name: &str) -> SyncResult<Option<SyncSettings>> {
        match read_optional(&self.profile_dir(name).join(SYNC_FILE)).await? {
            Some(text) if !text.trim().is_empty() => Ok(Some(serde_yml::from_str(&text)?)),
            _ => Ok(None),
        }
    }

    /// Write `.sync.yml`, or remove it when `settings` is `None`
    ///
    /// # Errors
    /// Returns an error if the file cannot be written or removed
    pub async fn save_sync_settings(&self, name: &str, settings: Option<&SyncSettings>) -> SyncResult<()> {
        let path = self.profile_dir(name).join(SYNC_FILE);
        match settings {
            Some(settings) => write_file(&path, serde_yml::to_string(settings)?).await,
            None => remove_path(&path).await,
        }
    }

    /// Read a data file as text
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read
    pub async fn read_data(&self, name: &str, relative: &str) -> SyncResult<Option<String>> {
        read_optional(&self.data_path(name, relative)?).await
    }

    /// Write a data file, creating its directories
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub async fn write_data(&self, name: &str, relative: &str, content: impl AsRef<[u8]>) -> SyncResult<()> {
        write_file(&self.data_path(name, relative)?, content).await
    }

    /// Remove a data file or directory if present
    ///
    /// # Errors
    /// Returns an error if it exists but cannot be removed
    pub async fn remove_data(&self, name: &str, relative: &str) -> SyncResult<()> {
        remove_path(&self.data_path(name, relative)?).await
    }

    /// Read and parse a YAML data file
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub async fn read_yaml<T: DeserializeOwned>(&self, name: &str, relative: &str) -> SyncResult<Option<T>> {
        match self.read_data(name, relative).await? {
            Some(text) if !text.trim().is_empty() => Ok(Some(serde_yml::from_str(&text)?)),
            _ => Ok(None),
        }
    }

    /// Serialize a value to a YAML data file
    ///
    /// # Errors
    /// Returns an error if the value cannot be serialized or written
    pub async fn write_yaml<T: Serialize + Sync>(&self, name: &str, relative: &str, value: &T) -> SyncResult<()> {
        let text = serde_yml::to_string(value)?;
        self.write_data(name, relative, text).await
    }

    /// Every file below a data subdirectory, as sorted relative paths
    ///
    /// # Errors
    /// Returns an error if the directory cannot be walked
    pub fn list_data(&self, name: &str, relative: &str) -> SyncResult<Vec<String>> {
        list_files(&self.data_path(name, relative)?)
    }

    /// Deep copy of a profile under a new name
    ///
    /// # Errors
    /// Returns an error if the source is missing, the target exists, or a copy fails
    pub async fn duplicate(&self, from: &str, to: &str) -> SyncResult<()> {
        validate_name(to)?;
        if !self.exists(from).await {
            return Err(SyncError::ProfileNotFound(from.to_string()));
        }
        if self.exists(to).await {
            return Err(SyncError::ProfileExists(to.to_string()));
        }

        copy_dir(&self.profile_dir(from), &self.profile_dir(to)).await
    }

    /// New empty profile extending `from`
    ///
    /// # Errors
    /// Returns an error if the source is missing, the target exists, or a write fails
    pub async fn extend(&self, from: &str, to: &str) -> SyncResult<()> {
        validate_name(to)?;
        if !self.exists(from).await {
            return Err(SyncError::ProfileNotFound(from.to_string()));
        }
        if self.exists(to).await {
            return Err(SyncError::ProfileExists(to.to_string()));
        }

        self.ensure_profile(to).await?;
        self.save_profile(
            to,
            &ProfileConfig {
                extends: Some(from.to_string()),
            },
        )
        .await
    }

    /// Remove a profile directory
    ///
    /// # Errors
    /// Returns an error if the profile is missing or cannot be removed
    pub async fn delete(&self, name: &str) -> SyncResult<()> {
        if !self.exists(name).await {
            return Err(SyncError::ProfileNotFound(name.to_string()));
        }
        remove_path(&self.profile_dir(name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_profile_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());

        store.ensure_profile("base").await.unwrap();
        store.extend("base", "work").await.unwrap();

        assert_eq!(store.list_profiles().await.unwrap(), vec!["base", "work"]);
        assert_eq!(store.load_profile("base").await.unwrap().extends, None);
        assert_eq!(
            store.load_profile("work").await.unwrap().extends.as_deref(),
            Some("base")
        );
    }

    #[tokio::test]
    async fn test_missing_profile() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());

        assert!(matches!(
            store.load_profile("nope").await,
            Err(SyncError::ProfileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_refuses_existing_target() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());
        store.ensure_profile("a").await.unwrap();
        store.write_data("a", "settings.json", "{}").await.unwrap();
        store.ensure_profile("b").await.unwrap();

        assert!(matches!(
            store.duplicate("a", "b").await,
            Err(SyncError::ProfileExists(_))
        ));

        store.duplicate("a", "c").await.unwrap();
        assert_eq!(
            store.read_data("c", "settings.json").await.unwrap().as_deref(),
            Some("{}")
        );
    }

    #[tokio::test]
    async fn test_data_path_stays_inside_profile() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());
        assert!(store.data_path("a", "../../escape").is_err());
    }
}

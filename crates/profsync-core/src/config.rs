//! Tool configuration stored in `settings.yml`

use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::format::render_hostname;
use crate::profile::SyncSettings;
use crate::util::{read_optional, write_file};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// Defaults
// ============================================================================

/// File name of the configuration inside the storage directory
pub const CONFIG_FILE: &str = "settings.yml";

pub const DEFAULT_PROFILE: &str = "main";
pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_SHELL: &str = "ssh";
pub const DEFAULT_INIT_MESSAGE: &str = "profile({{profile}}): init -- {{now|date:iso}}";
pub const DEFAULT_UPDATE_MESSAGE: &str = "profile({{profile}}): update -- {{now|date:iso}}";

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

fn default_hostname() -> String {
    "{{hostname}}".to_string()
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

/// Default storage directory: `<config dir>/profsync`
#[must_use]
pub fn default_storage_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("profsync")
}

// ============================================================================
// Types
// ============================================================================

/// Commit message templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitMessages {
    #[serde(default = "default_init_message")]
    pub init: String,
    #[serde(default = "default_update_message")]
    pub update: String,
}

fn default_init_message() -> String {
    DEFAULT_INIT_MESSAGE.to_string()
}

fn default_update_message() -> String {
    DEFAULT_UPDATE_MESSAGE.to_string()
}

impl Default for GitMessages {
    fn default() -> Self {
        Self {
            init: default_init_message(),
            update: default_update_message(),
        }
    }
}

/// Where profiles are kept and how they travel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RepositoryConfig {
    /// Inert backend used when nothing valid is configured
    #[default]
    Dummy,
    File {
        path: Option<String>,
    },
    Git {
        /// Local repository; takes precedence over `url`
        path: Option<String>,
        /// Remote repository cloned into the storage directory
        url: Option<String>,
        #[serde(default = "default_branch")]
        branch: String,
        #[serde(default)]
        messages: GitMessages,
    },
    Rsync {
        url: Option<String>,
        #[serde(default = "default_shell")]
        shell: String,
    },
    Webdav {
        url: Option<String>,
        username: Option<String>,
        password: Option<String>,
        #[serde(default, rename = "ignoreTlsErrors")]
        ignore_tls_errors: bool,
    },
}

impl RepositoryConfig {
    /// Backend name used in logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dummy => "dummy",
            Self::File { .. } => "file",
            Self::Git { .. } => "git",
            Self::Rsync { .. } => "rsync",
            Self::Webdav { .. } => "webdav",
        }
    }
}

/// Shell commands run around transfers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hooks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_upload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_upload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_download: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_download: Option<String>,
}

/// Contents of `settings.yml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Formatter template; `hostname` and `username` are available
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default)]
    pub repository: RepositoryConfig,
    /// Sync settings of this machine, written to the profile on upload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncSettings>,
    #[serde(default)]
    pub hooks: Hooks,
    /// Error kinds also reported to the editor
    #[serde(default = "default_notifications")]
    pub notifications: Vec<ErrorKind>,
}

fn default_notifications() -> Vec<ErrorKind> {
    vec![ErrorKind::Config, ErrorKind::Transport, ErrorKind::Extension]
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            profile: default_profile(),
            repository: RepositoryConfig::default(),
            sync: None,
            hooks: Hooks::default(),
            notifications: default_notifications(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl SyncConfig {
    /// Load the configuration, writing the defaults when the file is missing
    ///
    /// # Errors
    /// Returns a configuration error if the file cannot be parsed, or an I/O
    /// error if it cannot be read or the defaults cannot be written
    pub async fn load(path: &Path) -> SyncResult<Self> {
        match read_optional(path).await? {
            Some(text) if !text.trim().is_empty() => serde_yml::from_str(&text)
                .map_err(|e| SyncError::Config(format!("{}: {e}", path.display()))),
            _ => {
                info!(path = %path.display(), "no configuration, writing defaults");
                let config = Self::default();
                config.save(path).await?;
                Ok(config)
            }
        }
    }

    /// Like [`SyncConfig::load`], but a broken file yields the defaults
    /// without overwriting it
    pub async fn load_or_default(path: &Path) -> Self {
        match Self::load(path).await {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "configuration unusable, using defaults");
                Self::default()
            }
        }
    }

    /// # Errors
    /// Returns an error if the file cannot be written
    pub async fn save(&self, path: &Path) -> SyncResult<()> {
        write_file(path, serde_yml::to_string(self)?).await
    }

    /// Rendered host name, empty when the template is empty
    #[must_use]
    pub fn rendered_hostname(&self) -> String {
        render_hostname(&self.hostname)
    }

    #[must_use]
    pub fn notifies(&self, kind: ErrorKind) -> bool {
        self.notifications.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_writes_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);

        let config = SyncConfig::load(&path).await.unwrap();
        assert_eq!(config, SyncConfig::default());
        assert!(path.exists());
        assert_eq!(SyncConfig::load(&path).await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_parse_git_repository() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "profile: work\nrepository:\n  type: git\n  url: git@host:me/sync.git\nsync:\n  ignoredSettings: [window.zoomLevel]\n",
        )
        .unwrap();

        let config = SyncConfig::load(&path).await.unwrap();
        assert_eq!(config.profile, "work");
        match &config.repository {
            RepositoryConfig::Git {
                path,
                url,
                branch,
                messages,
            } => {
                assert!(path.is_none());
                assert_eq!(url.as_deref(), Some("git@host:me/sync.git"));
                assert_eq!(branch, DEFAULT_BRANCH);
                assert_eq!(messages, &GitMessages::default());
            }
            other => panic!("unexpected repository {other:?}"),
        }
        assert_eq!(
            config.sync.unwrap().ignored_settings(),
            ["window.zoomLevel".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unknown_type_is_a_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        std::fs::write(&path, "repository:\n  type: ftp\n").unwrap();

        let err = SyncConfig::load(&path).await.unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");

        let fallback = SyncConfig::load_or_default(&path).await;
        assert_eq!(fallback.repository, RepositoryConfig::Dummy);
        assert!(std::fs::read_to_string(&path).unwrap().contains("ftp"));
    }

    #[test]
    fn test_webdav_tls_flag() {
        let config: SyncConfig =
            serde_yml::from_str("repository:\n  type: webdav\n  url: https://dav\n  ignoreTlsErrors: true\n").unwrap();
        assert!(matches!(
            config.repository,
            RepositoryConfig::Webdav {
                ignore_tls_errors: true,
                ..
            }
        ));
    }
}

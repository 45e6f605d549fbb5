//! Backend selection from the `repository` section of the configuration

use super::{
    DummyBackend, FileBackend, LocalGitBackend, RemoteGitBackend, RepositoryBackend, RsyncBackend,
    WebDavBackend,
};
use crate::config::{RepositoryConfig, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::util::expand_tilde;
use std::path::Path;
use tracing::debug;

/// Build the backend the configuration names
///
/// # Errors
/// Returns a configuration error when a required field is missing
pub fn create_backend(
    config: &SyncConfig,
    storage_dir: &Path,
    home: &Path,
) -> SyncResult<Box<dyn RepositoryBackend>> {
    let profile = config.profile.clone();
    debug!(kind = config.repository.kind(), %profile, "creating backend");

    let backend: Box<dyn RepositoryBackend> = match &config.repository {
        RepositoryConfig::Dummy => Box::new(DummyBackend::new(profile)),
        RepositoryConfig::File { path } => {
            let path = require(path.as_deref(), "file", "path")?;
            Box::new(FileBackend::new(expand_tilde(path, home), profile))
        }
        RepositoryConfig::Git {
            path,
            url,
            branch,
            messages,
        } => match (path.as_deref(), url.as_deref()) {
            (Some(path), _) if !path.is_empty() => Box::new(LocalGitBackend::new(
                expand_tilde(path, home),
                profile,
                branch.clone(),
                messages.clone(),
                config.rendered_hostname(),
            )),
            (_, Some(url)) if !url.is_empty() => Box::new(RemoteGitBackend::new(
                storage_dir,
                url,
                profile,
                branch.clone(),
                messages.clone(),
                config.rendered_hostname(),
            )),
            _ => {
                return Err(SyncError::Config(
                    "the git repository needs a `path` or a `url`".to_string(),
                ))
            }
        },
        RepositoryConfig::Rsync { url, shell } => {
            let url = require(url.as_deref(), "rsync", "url")?;
            Box::new(RsyncBackend::new(storage_dir, url, shell.clone(), profile))
        }
        RepositoryConfig::Webdav {
            url,
            username,
            password,
            ignore_tls_errors,
        } => {
            let url = require(url.as_deref(), "webdav", "url")?;
            Box::new(WebDavBackend::new(
                storage_dir,
                url,
                username.clone(),
                password.clone(),
                *ignore_tls_errors,
                profile,
            )?)
        }
    };

    Ok(backend)
}

fn require<'a>(value: Option<&'a str>, kind: &str, field: &str) -> SyncResult<&'a str> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(SyncError::Config(format!(
            "the {kind} repository needs a `{field}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitMessages;
    use tempfile::TempDir;

    fn config(repository: RepositoryConfig) -> SyncConfig {
        SyncConfig {
            repository,
            ..SyncConfig::default()
        }
    }

    #[test]
    fn test_backend_kinds() {
        let temp = TempDir::new().unwrap();
        let home = temp.path();

        let backend = create_backend(&config(RepositoryConfig::Dummy), home, home).unwrap();
        assert_eq!(backend.kind(), "dummy");

        let file = RepositoryConfig::File {
            path: Some("~/profiles".to_string()),
        };
        let backend = create_backend(&config(file), home, home).unwrap();
        assert_eq!(backend.kind(), "file");
        assert_eq!(backend.store().unwrap().root(), home.join("profiles"));

        let git = RepositoryConfig::Git {
            path: None,
            url: Some("git@example.com:me/profiles.git".to_string()),
            branch: "main".to_string(),
            messages: GitMessages::default(),
        };
        let backend = create_backend(&config(git), home, home).unwrap();
        assert_eq!(backend.kind(), "git");
        assert_eq!(backend.store().unwrap().root(), home.join("repository"));

        let webdav = RepositoryConfig::Webdav {
            url: Some("https://dav.example.com/profiles".to_string()),
            username: None,
            password: None,
            ignore_tls_errors: false,
        };
        assert_eq!(create_backend(&config(webdav), home, home).unwrap().kind(), "webdav");
    }

    #[test]
    fn test_missing_fields_are_config_errors() {
        let temp = TempDir::new().unwrap();
        let home = temp.path();

        let rsync = RepositoryConfig::Rsync {
            url: None,
            shell: "ssh".to_string(),
        };
        let err = create_backend(&config(rsync), home, home).err().unwrap();
        assert_eq!(err.code(), "CONFIG_ERROR");

        let git = RepositoryConfig::Git {
            path: Some(String::new()),
            url: None,
            branch: "master".to_string(),
            messages: GitMessages::default(),
        };
        assert!(create_backend(&config(git), home, home).is_err());
    }
}

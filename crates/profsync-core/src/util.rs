//! Path validation and filesystem helpers

use crate::error::{SyncError, SyncResult};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// Maximum directory depth for recursive listings
const MAX_DEPTH: usize = 50;

/// Validate that a relative path does not escape `root` and join it
///
/// # Errors
/// Returns an error if the path is absolute or climbs above the root
pub fn safe_join(root: &Path, untrusted_path: &Path) -> SyncResult<PathBuf> {
    let mut normalized = PathBuf::new();
    let mut depth: usize = 0;

    for component in untrusted_path.components() {
        match component {
            Component::Normal(c) => {
                if c.to_string_lossy().contains('\0') {
                    return Err(SyncError::InvalidName("Null byte in path".to_string()));
                }
                normalized.push(c);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(SyncError::InvalidName(format!(
                        "Path traversal attempt detected: {}",
                        untrusted_path.display()
                    )));
                }
                normalized.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(SyncError::InvalidName(
                    "Absolute path not allowed".to_string(),
                ));
            }
        }
    }

    Ok(root.join(normalized))
}

/// Validate a profile name for use as a directory name
///
/// Names are limited to word characters, `-` and `.`, and must not be `.`/`..`.
///
/// # Errors
/// Returns an error if the name is invalid
pub fn validate_name(name: &str) -> SyncResult<()> {
    if name.is_empty() {
        return Err(SyncError::InvalidName("Empty name".to_string()));
    }

    if name == "." || name.contains("..") {
        return Err(SyncError::InvalidName(format!(
            "Name contains parent directory reference: {name}"
        )));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_alphanumeric() || *c == '_' || *c == '-' || *c == '.'))
    {
        return Err(SyncError::InvalidName(format!(
            "Name contains invalid character {c:?}: {name}"
        )));
    }

    Ok(())
}

/// Expand a leading `~` to the given home directory
#[must_use]
pub fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        home.to_path_buf()
    } else if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// Turn an absolute path into a flat file name (`~/.config/a.json` -> `~%.config%a.json`)
#[must_use]
pub fn mangle_path(path: &Path, home: &Path) -> String {
    let text = match path.strip_prefix(home) {
        Ok(rest) => format!("~/{}", rest.to_string_lossy()),
        Err(_) => path.to_string_lossy().to_string(),
    };

    text.chars()
        .map(|c| match c {
            '/' | '\\' => '%',
            ':' => '=',
            other => other,
        })
        .collect()
}

/// List every regular file under `dir` as sorted `/`-separated relative paths
///
/// Symlinks are skipped. A missing directory yields an empty list.
///
/// # Errors
/// Returns an error if the directory cannot be walked
pub fn list_files(dir: &Path) -> SyncResult<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).max_depth(MAX_DEPTH).follow_links(false) {
        let entry = entry.map_err(|e| SyncError::Io {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(dir) {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            files.push(parts.join("/"));
        }
    }

    files.sort();
    Ok(files)
}

/// List the names of the direct subdirectories of `dir`, sorted
///
/// # Errors
/// Returns an error if the directory cannot be read
pub async fn list_dirs(dir: &Path) -> SyncResult<Vec<String>> {
    let mut names = Vec::new();
    if !fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(names);
    }

    let mut entries = fs::read_dir(dir).await.map_err(|e| SyncError::io(dir, &e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| SyncError::io(dir, &e))? {
        let file_type = entry.file_type().await.map_err(|e| SyncError::io(dir, &e))?;
        if file_type.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }

    names.sort();
    Ok(names)
}

/// Read a file to a string, returning `None` if it does not exist
///
/// # Errors
/// Returns an error if the file exists but cannot be read
pub async fn read_optional(path: &Path) -> SyncResult<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SyncError::io(path, &e)),
    }
}

/// Read a file's raw bytes, returning `None` if it does not exist
///
/// # Errors
/// Returns an error if the file exists but cannot be read
pub async fn read_bytes(path: &Path) -> SyncResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SyncError::io(path, &e)),
    }
}

/// Write a file, creating its parent directories first
///
/// # Errors
/// Returns an error if the directories or the file cannot be written
pub async fn write_file(path: &Path, content: impl AsRef<[u8]>) -> SyncResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::io(parent, &e))?;
    }
    fs::write(path, content)
        .await
        .map_err(|e| SyncError::io(path, &e))
}

/// Remove a file or directory tree if present
///
/// # Errors
/// Returns an error if the path exists but cannot be removed
pub async fn remove_path(path: &Path) -> SyncResult<()> {
    let metadata = match fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(SyncError::io(path, &e)),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    result.map_err(|e| SyncError::io(path, &e))
}

/// Copy a directory tree, replacing the destination
///
/// # Errors
/// Returns an error if any file cannot be copied
pub async fn copy_dir(source: &Path, dest: &Path) -> SyncResult<()> {
    remove_path(dest).await?;
    fs::create_dir_all(dest)
        .await
        .map_err(|e| SyncError::io(dest, &e))?;

    for file in list_files(source)? {
        let from = source.join(&file);
        let to = dest.join(&file);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::io(parent, &e))?;
        }
        fs::copy(&from, &to)
            .await
            .map_err(|e| SyncError::io(&from, &e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_join_nested() {
        let root = PathBuf::from("/tmp/profile");
        let result = safe_join(&root, Path::new("dir/sub/file.json")).unwrap();
        assert_eq!(result, PathBuf::from("/tmp/profile/dir/sub/file.json"));
    }

    #[test]
    fn test_safe_join_rejects_traversal() {
        let root = PathBuf::from("/tmp/profile");
        assert!(safe_join(&root, Path::new("../etc/passwd")).is_err());
        assert!(safe_join(&root, Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("main").is_ok());
        assert!(validate_name("work-laptop.v2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("with space").is_err());
    }

    #[test]
    fn test_expand_tilde() {
        let home = PathBuf::from("/home/me");
        assert_eq!(expand_tilde("~/.gitconfig", &home), home.join(".gitconfig"));
        assert_eq!(expand_tilde("/etc/hosts", &home), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_mangle_path() {
        let home = PathBuf::from("/home/me");
        assert_eq!(
            mangle_path(Path::new("/home/me/.config/app.json"), &home),
            "~%.config%app.json"
        );
        assert_eq!(mangle_path(Path::new("/etc/hosts"), &home), "%etc%hosts");
    }
}

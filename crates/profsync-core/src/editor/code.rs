//! Editor adapter for a local VS Code style installation

use super::{Editor, InstalledExtension, DISABLED_EXTENSIONS_KEY};
use crate::error::{SyncError, SyncResult};
use crate::transport::process;
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Editor driven through its command-line interface and state database
///
/// The CLI can install and uninstall but not enable or disable, so restores
/// against this adapter use the degraded extension policy.
pub struct CodeEditor {
    bin: String,
    user_data_dir: PathBuf,
    extension_storage_dir: PathBuf,
    home_dir: PathBuf,
    version: String,
}

#[derive(Deserialize)]
struct DisabledIdentifier {
    id: String,
}

impl CodeEditor {
    /// Create the adapter, asking the CLI for its version
    pub async fn detect(
        bin: impl Into<String>,
        user_data_dir: impl Into<PathBuf>,
        extension_storage_dir: impl Into<PathBuf>,
        home_dir: impl Into<PathBuf>,
    ) -> Self {
        let bin = bin.into();
        let version = match process::run(&bin, &["--version"], None).await {
            Ok(output) => output.lines().next().unwrap_or("0.0.0").trim().to_string(),
            Err(err) => {
                info!(error = %err, "editor version unknown");
                "0.0.0".to_string()
            }
        };

        Self {
            bin,
            user_data_dir: user_data_dir.into(),
            extension_storage_dir: extension_storage_dir.into(),
            home_dir: home_dir.into(),
            version,
        }
    }

    fn state_db(&self) -> PathBuf {
        self.user_data_dir.join("globalStorage").join("state.vscdb")
    }

    async fn cli(&self, id: &str, args: &[&str]) -> SyncResult<String> {
        let extensions_dir = self.extension_storage_dir.to_string_lossy().to_string();
        let mut full: Vec<&str> = args.to_vec();
        full.extend(["--extensions-dir", extensions_dir.as_str()]);

        process::run(&self.bin, &full, None)
            .await
            .map_err(|err| SyncError::Extension {
                id: id.to_string(),
                message: err.to_string(),
            })
    }

    async fn with_db<T, F>(&self, work: F) -> SyncResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> SyncResult<T> + Send + 'static,
    {
        let path = self.state_db();
        tokio::task::spawn_blocking(move || work(&path))
            .await
            .map_err(|e| SyncError::Editor(format!("state store task failed: {e}")))?
    }
}

fn read_items(path: &Path) -> SyncResult<BTreeMap<String, String>> {
    let mut items = BTreeMap::new();
    if !path.exists() {
        return Ok(items);
    }

    let conn = Connection::open(path)?;
    let mut stmt = conn.prepare("SELECT key, value FROM ItemTable")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let key: String = row.get(0)?;
        let value = match row.get_ref(1)? {
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).to_string(),
            ValueRef::Integer(n) => n.to_string(),
            ValueRef::Real(n) => n.to_string(),
            ValueRef::Null => continue,
        };
        items.insert(key, value);
    }

    Ok(items)
}

fn write_items(path: &Path, entries: BTreeMap<String, Option<String>>) -> SyncResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, &e))?;
    }

    let mut conn = Connection::open(path)?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)",
        [],
    )?;

    let tx = conn.transaction()?;
    for (key, value) in entries {
        match value {
            Some(value) => tx.execute(
                "INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?,
            None => tx.execute("DELETE FROM ItemTable WHERE key = ?1", params![key])?,
        };
    }
    tx.commit()?;

    Ok(())
}

#[async_trait]
impl Editor for CodeEditor {
    async fn list_extensions(&self) -> SyncResult<Vec<InstalledExtension>> {
        let output = self.cli("*", &["--list-extensions", "--show-versions"]).await?;

        let state = self.read_state().await?;
        let disabled: HashSet<String> = state
            .get(DISABLED_EXTENSIONS_KEY)
            .and_then(|raw| serde_json::from_str::<Vec<DisabledIdentifier>>(raw).ok())
            .unwrap_or_default()
            .into_iter()
            .map(|d| d.id.to_lowercase())
            .collect();

        Ok(output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let (id, version) = line.trim().split_once('@').unwrap_or((line.trim(), ""));
                let mut extension = InstalledExtension::new(id);
                if !version.is_empty() {
                    extension.version = Some(version.to_string());
                }
                extension.enabled = !disabled.contains(&extension.id);
                extension
            })
            .collect())
    }

    fn extension_storage_dir(&self) -> PathBuf {
        self.extension_storage_dir.clone()
    }

    fn user_data_dir(&self) -> PathBuf {
        self.user_data_dir.clone()
    }

    fn home_dir(&self) -> PathBuf {
        self.home_dir.clone()
    }

    fn own_extension_id(&self) -> &str {
        "profsync.profsync"
    }

    fn app_name(&self) -> String {
        "Visual Studio Code".to_string()
    }

    fn app_version(&self) -> String {
        self.version.clone()
    }

    async fn can_manage_extensions(&self) -> bool {
        false
    }

    async fn install_extension(&self, id: &str) -> SyncResult<()> {
        info!(extension = %id, "install");
        self.cli(id, &["--install-extension", id]).await.map(|_| ())
    }

    async fn enable_extension(&self, id: &str) -> SyncResult<()> {
        Err(SyncError::Extension {
            id: id.to_string(),
            message: "enabling is not supported by the command line".to_string(),
        })
    }

    async fn disable_extension(&self, id: &str) -> SyncResult<()> {
        Err(SyncError::Extension {
            id: id.to_string(),
            message: "disabling is not supported by the command line".to_string(),
        })
    }

    async fn uninstall_extension(&self, id: &str) -> SyncResult<()> {
        info!(extension = %id, "uninstall");
        self.cli(id, &["--uninstall-extension", id]).await.map(|_| ())
    }

    async fn read_state(&self) -> SyncResult<BTreeMap<String, String>> {
        self.with_db(read_items).await
    }

    async fn write_state(&self, entries: BTreeMap<String, Option<String>>) -> SyncResult<()> {
        self.with_db(move |path| write_items(path, entries)).await
    }

    fn notify_error(&self, message: &str) {
        error!(target: "profsync::notification", "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_state_db_round_trip() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("globalStorage").join("state.vscdb");

        assert!(read_items(&db).unwrap().is_empty());

        write_items(
            &db,
            BTreeMap::from([
                ("workbench.panel".to_string(), Some("{\"a\":1}".to_string())),
                ("other".to_string(), Some("x".to_string())),
            ]),
        )
        .unwrap();
        write_items(&db, BTreeMap::from([("other".to_string(), None)])).unwrap();

        let items = read_items(&db).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items["workbench.panel"], "{\"a\":1}");
    }
}

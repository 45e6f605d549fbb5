//! Mirror a directory with `rsync` over a remote shell

use super::process;
use crate::error::{SyncError, SyncResult};
use std::path::Path;
use tracing::info;

/// Copy the contents of `source` into `destination`
///
/// Both sides may be local paths or `host:path` remotes reached through
/// `shell`. Files missing from the source are left in place.
///
/// # Errors
/// Returns a transport error if rsync cannot be run or fails
pub async fn mirror(source: &str, destination: &str, shell: &str) -> SyncResult<()> {
    let source = with_trailing_slash(source);
    let destination = with_trailing_slash(destination);
    info!(%source, %destination, "rsync");

    process::run("rsync", &["-az", "-e", shell, &source, &destination], None)
        .await
        .map(|_| ())
        .map_err(|err| match err {
            SyncError::Transport { message, .. } => SyncError::transport("rsync", message),
            other => other,
        })
}

/// Local directory as an rsync operand
#[must_use]
pub fn local_operand(dir: &Path) -> String {
    dir.to_string_lossy().to_string()
}

/// `dir/` copies the directory's contents rather than the directory itself
fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

//! Arbitrary extra files listed in `additionalFiles`

use super::SyncContext;
use crate::error::SyncResult;
use crate::util::{expand_tilde, mangle_path, read_bytes, write_file};
use tracing::{debug, info};

const ADDITIONALS_DIR: &str = "additionals";

/// Copies listed files to `data/additionals/<mangled path>` and back
pub struct AdditionalFiles;

impl AdditionalFiles {
    /// Replace the profile's stored copies with the current files
    ///
    /// # Errors
    /// Returns an error if a file exists but cannot be read or stored
    pub async fn serialize(&self, ctx: &SyncContext<'_>) -> SyncResult<()> {
        let files = ctx.settings.additional_files();
        ctx.store.remove_data(ctx.profile(), ADDITIONALS_DIR).await?;
        if files.is_empty() {
            return Ok(());
        }

        info!(profile = %ctx.profile(), count = files.len(), "serialize additional files");

        let home = ctx.editor.home_dir();
        for file in files {
            let path = expand_tilde(file, &home);
            let Some(content) = read_bytes(&path).await? else {
                debug!(file = %path.display(), "missing, skipped");
                continue;
            };
            let stored = format!("{ADDITIONALS_DIR}/{}", mangle_path(&path, &home));
            ctx.store.write_data(ctx.profile(), &stored, content).await?;
        }

        Ok(())
    }

    /// Write every listed file from the nearest profile of the chain storing it
    ///
    /// # Errors
    /// Returns an error if a stored copy cannot be read or the file written
    pub async fn restore(&self, ctx: &SyncContext<'_>) -> SyncResult<bool> {
        let files = ctx.settings.additional_files();
        if files.is_empty() {
            return Ok(true);
        }

        info!(profile = %ctx.profile(), count = files.len(), "restore additional files");

        let home = ctx.editor.home_dir();
        for file in files {
            let path = expand_tilde(file, &home);
            let stored = format!("{ADDITIONALS_DIR}/{}", mangle_path(&path, &home));

            let mut content = None;
            for link in &ctx.chain {
                content = read_bytes(&ctx.store.data_path(&link.name, &stored)?).await?;
                if content.is_some() {
                    break;
                }
            }

            match content {
                Some(content) => write_file(&path, content).await?,
                None => debug!(file = %path.display(), "not stored in any profile, skipped"),
            }
        }

        Ok(true)
    }
}

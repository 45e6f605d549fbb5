//! Whole-file JSONC resources: settings, keybindings, mcp and tasks

use super::{ResourceSerializer, SyncContext};
use crate::error::SyncResult;
use crate::jsonc::{extract_properties, insert_properties, preprocess, remove_properties, strip_comments, TemplateVars};
use crate::profile::Resource;
use crate::util::{read_optional, write_file};
use async_trait::async_trait;
use tracing::{debug, info};

/// JSONC file copied between the user data directory and root profiles
pub struct JsonFile {
    resource: Resource,
    file: &'static str,
    /// Store one file per platform when the profile asks for it
    per_platform: bool,
    /// Honour `ignoredSettings` and `// #ignore`
    keeps_local: bool,
}

impl JsonFile {
    #[must_use]
    pub fn settings() -> Self {
        Self {
            resource: Resource::Settings,
            file: "settings.json",
            per_platform: false,
            keeps_local: true,
        }
    }

    #[must_use]
    pub fn keybindings() -> Self {
        Self {
            resource: Resource::Keybindings,
            file: "keybindings.json",
            per_platform: true,
            keeps_local: false,
        }
    }

    #[must_use]
    pub fn mcp() -> Self {
        Self {
            resource: Resource::Mcp,
            file: "mcp.json",
            per_platform: false,
            keeps_local: false,
        }
    }

    #[must_use]
    pub fn tasks() -> Self {
        Self {
            resource: Resource::Tasks,
            file: "tasks.json",
            per_platform: false,
            keeps_local: false,
        }
    }

    /// Name of the file inside the profile's data directory
    #[must_use]
    pub fn stored_name(&self, ctx: &SyncContext<'_>) -> String {
        if self.per_platform && ctx.settings.keybindings_per_platform() {
            platform_name(self.file, &ctx.vars)
        } else {
            self.file.to_string()
        }
    }
}

/// `keybindings.json` to `keybindings-linux.json`
fn platform_name(file: &str, vars: &TemplateVars) -> String {
    let suffix = match vars.os.as_str() {
        "mac" => "macos",
        other => other,
    };
    match file.strip_suffix(".json") {
        Some(stem) => format!("{stem}-{suffix}.json"),
        None => format!("{file}-{suffix}"),
    }
}

#[async_trait]
impl ResourceSerializer for JsonFile {
    fn resource(&self) -> Resource {
        self.resource
    }

    async fn serialize(&self, ctx: &SyncContext<'_>) -> SyncResult<()> {
        if !ctx.is_root() {
            debug!(profile = %ctx.profile(), resource = %self.resource, "stored in root profile only, skipped");
            return Ok(());
        }

        info!(profile = %ctx.profile(), resource = %self.resource, "serialize");

        let stored = self.stored_name(ctx);
        let live = ctx.editor.user_data_dir().join(self.file);

        match read_optional(&live).await? {
            Some(text) => {
                let text = if self.keeps_local {
                    remove_properties(&text, ctx.settings.ignored_settings())
                } else {
                    text
                };
                ctx.store
                    .write_data(ctx.profile(), &stored, strip_comments(&text))
                    .await
            }
            None => ctx.store.remove_data(ctx.profile(), &stored).await,
        }
    }

    async fn restore(&self, ctx: &SyncContext<'_>) -> SyncResult<bool> {
        info!(profile = %ctx.profile(), resource = %self.resource, "restore");

        let stored = self.stored_name(ctx);
        let Some(text) = ctx.store.read_data(ctx.root(), &stored).await? else {
            debug!(profile = %ctx.root(), file = %stored, "nothing stored, skipped");
            return Ok(true);
        };

        let mut text = preprocess(&text, &ctx.vars)?;

        let live = ctx.editor.user_data_dir().join(self.file);
        if self.keeps_local {
            if let Some(current) = read_optional(&live).await? {
                let kept = extract_properties(&current, ctx.settings.ignored_settings());
                if !kept.is_empty() {
                    text = insert_properties(&text, &kept);
                }
            }
        }

        write_file(&live, text).await?;
        Ok(true)
    }
}

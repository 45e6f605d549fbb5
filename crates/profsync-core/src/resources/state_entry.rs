//! Single state-store entries kept as YAML: editor profiles and their associations

use super::{ResourceSerializer, SyncContext};
use crate::error::SyncResult;
use crate::profile::Resource;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One key of the editor's state store, stored in the root profile
pub struct StateEntry {
    resource: Resource,
    key: &'static str,
    file: &'static str,
}

impl StateEntry {
    #[must_use]
    pub fn profiles() -> Self {
        Self {
            resource: Resource::Profiles,
            key: "userDataProfiles",
            file: "profiles.yml",
        }
    }

    #[must_use]
    pub fn profile_associations() -> Self {
        Self {
            resource: Resource::ProfileAssociations,
            key: "profileAssociations",
            file: "profile-associations.yml",
        }
    }
}

#[async_trait]
impl ResourceSerializer for StateEntry {
    fn resource(&self) -> Resource {
        self.resource
    }

    async fn serialize(&self, ctx: &SyncContext<'_>) -> SyncResult<()> {
        if !ctx.is_root() {
            debug!(profile = %ctx.profile(), resource = %self.resource, "stored in root profile only, skipped");
            return Ok(());
        }

        info!(profile = %ctx.profile(), resource = %self.resource, "serialize");

        let state = ctx.editor.read_state().await?;
        match state.get(self.key) {
            Some(raw) => {
                let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.clone()));
                ctx.store.write_yaml(ctx.profile(), self.file, &value).await
            }
            None => ctx.store.remove_data(ctx.profile(), self.file).await,
        }
    }

    async fn restore(&self, ctx: &SyncContext<'_>) -> SyncResult<bool> {
        info!(profile = %ctx.profile(), resource = %self.resource, "restore");

        let Some(value) = ctx.store.read_yaml::<Value>(ctx.root(), self.file).await? else {
            debug!(profile = %ctx.root(), file = %self.file, "nothing stored, skipped");
            return Ok(true);
        };

        let raw = match value {
            Value::String(text) => text,
            other => serde_json::to_string(&other)?,
        };
        ctx.editor
            .write_state(BTreeMap::from([(self.key.to_string(), Some(raw))]))
            .await?;
        Ok(true)
    }
}

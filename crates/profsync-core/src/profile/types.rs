//! Profile data types persisted in the repository

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Contents of `profiles/<name>/profile.yml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Parent profile this one stores differences against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
}

/// Syncable resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    Extensions,
    Keybindings,
    Settings,
    Snippets,
    UiState,
    Mcp,
    Tasks,
    Profiles,
    ProfileAssociations,
}

impl Resource {
    /// Resources synced when a profile does not choose its own set
    pub const DEFAULTS: [Resource; 5] = [
        Resource::Extensions,
        Resource::Keybindings,
        Resource::Settings,
        Resource::Snippets,
        Resource::UiState,
    ];

    /// Position in a sync pass
    ///
    /// Extensions run first; whole-file resources stored only in root
    /// profiles run after the diffed ones.
    #[must_use]
    pub fn pass_order(self) -> u8 {
        match self {
            Self::Extensions => 0,
            Self::Snippets => 1,
            Self::UiState => 2,
            Self::Keybindings => 3,
            Self::Settings => 4,
            Self::Mcp => 5,
            Self::Tasks => 6,
            Self::Profiles => 7,
            Self::ProfileAssociations => 8,
        }
    }

    /// Sort and deduplicate a resource selection into pass order
    #[must_use]
    pub fn ordered(resources: &[Resource]) -> Vec<Resource> {
        let mut ordered = resources.to_vec();
        ordered.sort_by_key(|r| r.pass_order());
        ordered.dedup();
        ordered
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Extensions => "extensions",
            Self::Keybindings => "keybindings",
            Self::Settings => "settings",
            Self::Snippets => "snippets",
            Self::UiState => "uiState",
            Self::Mcp => "mcp",
            Self::Tasks => "tasks",
            Self::Profiles => "profiles",
            Self::ProfileAssociations => "profileAssociations",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let all = Resource::ordered(&[
            Self::Extensions,
            Self::Keybindings,
            Self::Settings,
            Self::Snippets,
            Self::UiState,
            Self::Mcp,
            Self::Tasks,
            Self::Profiles,
            Self::ProfileAssociations,
        ]);
        all.iter()
            .find(|r| r.to_string().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| {
                let names: Vec<String> = all.iter().map(ToString::to_string).collect();
                format!("unknown resource '{s}', expected one of: {}", names.join(", "))
            })
    }
}

/// Per-profile sync options, stored in `.sync.yml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keybindings_per_platform: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored_extensions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored_settings: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<Resource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_files: Option<Vec<String>>,
}

impl SyncSettings {
    #[must_use]
    pub fn keybindings_per_platform(&self) -> bool {
        self.keybindings_per_platform.unwrap_or(true)
    }

    /// Ignored extension ids, lowercased
    #[must_use]
    pub fn ignored_extensions(&self) -> Vec<String> {
        self.ignored_extensions
            .iter()
            .flatten()
            .map(|id| id.to_lowercase())
            .collect()
    }

    #[must_use]
    pub fn ignored_settings(&self) -> &[String] {
        self.ignored_settings.as_deref().unwrap_or_default()
    }

    /// Selected resources in pass order
    #[must_use]
    pub fn resources(&self) -> Vec<Resource> {
        match &self.resources {
            Some(resources) => Resource::ordered(resources),
            None => Resource::ordered(&Resource::DEFAULTS),
        }
    }

    #[must_use]
    pub fn additional_files(&self) -> &[String] {
        self.additional_files.as_deref().unwrap_or_default()
    }
}

/// Extension reference in an extension list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRecord {
    /// Lowercase `publisher.name`
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ExtensionRecord {
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_lowercase(),
            uuid: None,
            version: None,
        }
    }
}

/// Built-in extensions whose enablement differs from the default
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<Vec<String>>,
}

impl BuiltinOverrides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.disabled.as_ref().map_or(true, Vec::is_empty)
            && self.enabled.as_ref().map_or(true, Vec::is_empty)
    }
}

/// Contents of `data/extensions.yml`
///
/// A root profile stores the complete list; a diff profile stores the
/// additions in `enabled`/`disabled` and the removals in `uninstall`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionList {
    #[serde(default)]
    pub enabled: Vec<ExtensionRecord>,
    #[serde(default)]
    pub disabled: Vec<ExtensionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninstall: Option<Vec<ExtensionRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builtin: Option<BuiltinOverrides>,
}

impl ExtensionList {
    /// Ids of the built-in extensions forced disabled
    #[must_use]
    pub fn builtin_disabled(&self) -> Vec<String> {
        self.builtin
            .as_ref()
            .and_then(|b| b.disabled.clone())
            .unwrap_or_default()
    }

    /// Enabled and disabled records together
    pub fn all(&self) -> impl Iterator<Item = &ExtensionRecord> {
        self.enabled.iter().chain(self.disabled.iter())
    }
}

/// Contents of `data/snippets.diff.yml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetsDiff {
    #[serde(default)]
    pub removed: Vec<String>,
}

/// Contents of `data/ui-state.diff.yml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiStateDiff {
    #[serde(default)]
    pub modified: BTreeMap<String, String>,
    #[serde(default)]
    pub removed: Vec<String>,
}

impl UiStateDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resources_default_and_order() {
        let settings = SyncSettings::default();
        assert_eq!(
            settings.resources(),
            vec![
                Resource::Extensions,
                Resource::Snippets,
                Resource::UiState,
                Resource::Keybindings,
                Resource::Settings,
            ]
        );
    }

    #[test]
    fn test_sync_settings_yaml_names() {
        let yaml = "keybindingsPerPlatform: false\nignoredSettings: [a]\nresources: [settings, uiState, profileAssociations]\n";
        let settings: SyncSettings = serde_yml::from_str(yaml).unwrap();
        assert!(!settings.keybindings_per_platform());
        assert_eq!(settings.ignored_settings(), ["a".to_string()]);
        assert_eq!(
            settings.resources(),
            vec![Resource::UiState, Resource::Settings, Resource::ProfileAssociations]
        );
    }

    #[test]
    fn test_resource_from_str() {
        assert_eq!("uiState".parse::<Resource>(), Ok(Resource::UiState));
        assert_eq!("SETTINGS".parse::<Resource>(), Ok(Resource::Settings));
        let err = "themes".parse::<Resource>().unwrap_err();
        assert!(err.contains("profileAssociations"));
    }

    #[test]
    fn test_extension_list_omits_empty_optionals() {
        let list = ExtensionList {
            enabled: vec![ExtensionRecord::new("Pub.Name")],
            ..ExtensionList::default()
        };
        let yaml = serde_yml::to_string(&list).unwrap();
        assert!(yaml.contains("pub.name"));
        assert!(!yaml.contains("uninstall"));
        assert!(!yaml.contains("builtin"));
    }
}

//! Plugin manifest - store metadata published next to a plugin module

use serde::{Deserialize, Serialize};

use crate::application::errors::PluginError;

pub const DEFAULT_DESCRIPTION: &str = "No description available";
pub const DEFAULT_AUTHOR: &str = "Unknown";
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Plugin metadata, read from `<id>.json` in the store directory
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PluginManifest {
    pub description: String,
    pub author: String,
    pub version: String,
    pub tags: Vec<String>,
}

impl Default for PluginManifest {
    fn default() -> Self {
        Self {
            description: DEFAULT_DESCRIPTION.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            version: DEFAULT_VERSION.to_string(),
            tags: Vec::new(),
        }
    }
}

impl PluginManifest {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PluginError> {
        let mut manifest: Self = serde_json::from_slice(bytes)
            .map_err(|e| PluginError::Load(format!("Failed to parse manifest: {}", e)))?;
        manifest.tags = manifest
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Ok(manifest)
    }

    /// File name of the manifest for plugin `id`
    pub fn file_name(id: &str) -> String {
        format!("{}.json", id)
    }

    /// Case-insensitive match on description or tags; `query` must be lowercase
    pub fn matches(&self, query: &str) -> bool {
        self.description.to_lowercase().contains(query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_manifest_uses_defaults() {
        let manifest = PluginManifest::from_slice(br#"{"author": "Ale", "tags": [" music ", ""]}"#).unwrap();
        assert_eq!(manifest.author, "Ale");
        assert_eq!(manifest.version, DEFAULT_VERSION);
        assert_eq!(manifest.description, DEFAULT_DESCRIPTION);
        assert_eq!(manifest.tags, vec!["music".to_string()]);
    }

    #[test]
    fn test_invalid_manifest_is_a_load_error() {
        assert!(matches!(PluginManifest::from_slice(b"not json"), Err(PluginError::Load(_))));
    }
}

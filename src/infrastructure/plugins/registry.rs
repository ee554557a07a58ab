//! Plugin registry - persisted identifier -> enabled map

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::application::errors::StorageError;
use crate::infrastructure::storage::{read_json, write_json};

/// Enabled flags of every known plugin, stored in `config/plugins.json`
#[derive(Debug)]
pub struct PluginRegistry {
    path: PathBuf,
    entries: BTreeMap<String, bool>,
}

impl PluginRegistry {
    /// Load the registry. A missing or corrupt file starts empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match read_json::<BTreeMap<String, bool>>(&path) {
            Ok(Some(entries)) => entries,
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Plugin registry unreadable, starting empty");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), StorageError> {
        write_json(&self.path, &self.entries)
    }

    /// Add newly discovered plugins as enabled and drop vanished ones.
    ///
    /// Persists only when something changed; returns whether it did.
    pub fn reconcile(&mut self, discovered: &BTreeSet<String>) -> Result<bool, StorageError> {
        let mut changed = false;

        for id in discovered {
            if !self.entries.contains_key(id) {
                tracing::info!(plugin = %id, "New plugin discovered, enabling");
                self.entries.insert(id.clone(), true);
                changed = true;
            }
        }

        let before = self.entries.len();
        self.entries.retain(|id, _| {
            let keep = discovered.contains(id);
            if !keep {
                tracing::info!(plugin = %id, "Plugin module gone, removing from registry");
            }
            keep
        });
        changed |= self.entries.len() != before;

        if changed {
            self.save()?;
        }
        Ok(changed)
    }

    /// Flip the enabled flag of a known plugin. Returns false if unknown.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<bool, StorageError> {
        match self.entries.get_mut(id) {
            Some(flag) => {
                *flag = enabled;
                self.save()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Register an installed plugin as enabled
    pub fn register(&mut self, id: &str) -> Result<(), StorageError> {
        self.entries.insert(id.to_string(), true);
        self.save()
    }

    /// Remove a plugin. Returns false if it was not registered.
    pub fn unregister(&mut self, id: &str) -> Result<bool, StorageError> {
        if self.entries.remove(id).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.entries.get(id).copied().unwrap_or(false)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn entries(&self) -> &BTreeMap<String, bool> {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reconcile_defaults_to_enabled_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config/plugins.json");
        let mut registry = PluginRegistry::load(&path);

        assert!(registry.reconcile(&ids(&["moderation", "tickets"])).unwrap());
        assert!(registry.is_enabled("moderation"));
        assert!(registry.is_enabled("tickets"));

        let snapshot = std::fs::read_to_string(&path).unwrap();
        assert!(!registry.reconcile(&ids(&["moderation", "tickets"])).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_reconcile_keeps_disabled_and_drops_vanished() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plugins.json");
        std::fs::write(&path, r#"{"moderation": false, "old": true}"#).unwrap();

        let mut registry = PluginRegistry::load(&path);
        assert!(registry.reconcile(&ids(&["moderation", "tickets"])).unwrap());
        assert!(!registry.is_enabled("moderation"));
        assert!(registry.is_enabled("tickets"));
        assert!(!registry.contains("old"));

        let reloaded = PluginRegistry::load(&path);
        assert_eq!(reloaded.entries(), registry.entries());
    }

    #[test]
    fn test_set_enabled_and_unregister() {
        let dir = TempDir::new().unwrap();
        let mut registry = PluginRegistry::load(dir.path().join("plugins.json"));
        registry.register("music").unwrap();

        assert!(registry.set_enabled("music", false).unwrap());
        assert!(!registry.is_enabled("music"));
        assert!(!registry.set_enabled("ghost", true).unwrap());

        assert!(registry.unregister("music").unwrap());
        assert!(!registry.unregister("music").unwrap());
    }
}

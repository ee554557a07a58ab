//! Plugin store - browse and install plugins from a remote catalog

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::application::errors::{PluginError, PluginResult, StorageError};
use crate::domain::traits::{PluginCatalog, RemotePluginFile};
use crate::infrastructure::plugins::{
    is_valid_identifier, plugin_identifier, PluginDiscoverer, PluginManifest, PluginRegistry,
};
use crate::infrastructure::storage::write_atomic;

/// A plugin offered by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub id: String,
    pub display_name: String,
    pub manifest: PluginManifest,
    pub file: RemotePluginFile,
}

fn display_name(id: &str) -> String {
    id.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct PluginStore<C: PluginCatalog> {
    catalog: C,
    discoverer: PluginDiscoverer,
}

impl<C: PluginCatalog> PluginStore<C> {
    pub fn new(catalog: C, discoverer: PluginDiscoverer) -> Self {
        Self { catalog, discoverer }
    }

    /// Plugin modules for this platform offered by the catalog, with the
    /// metadata of their `<id>.json` manifests where published
    pub fn available(&self) -> PluginResult<Vec<StoreEntry>> {
        let files = self.catalog.list_plugins()?;

        let mut manifests: BTreeMap<String, RemotePluginFile> = BTreeMap::new();
        let mut modules: BTreeMap<String, RemotePluginFile> = BTreeMap::new();
        for file in files {
            if let Some(id) = plugin_identifier(&file.name) {
                modules.entry(id).or_insert(file);
            } else if let Some(id) = file.name.strip_suffix(".json").filter(|id| is_valid_identifier(id)) {
                manifests.insert(id.to_string(), file);
            }
        }

        Ok(modules
            .into_iter()
            .map(|(id, file)| StoreEntry {
                display_name: display_name(&id),
                manifest: self.manifest(&id, manifests.get(&id)),
                id,
                file,
            })
            .collect())
    }

    fn manifest(&self, id: &str, file: Option<&RemotePluginFile>) -> PluginManifest {
        let Some(file) = file else {
            return PluginManifest::default();
        };
        let parsed = self
            .catalog
            .download(file)
            .map_err(PluginError::from)
            .and_then(|bytes| PluginManifest::from_slice(&bytes));
        parsed.unwrap_or_else(|e| {
            tracing::warn!(plugin = %id, error = %e, "Ignoring unreadable plugin manifest");
            PluginManifest::default()
        })
    }

    /// Entries whose name, description or tags contain `query`, case-insensitively
    pub fn search(&self, query: &str) -> PluginResult<Vec<StoreEntry>> {
        let query = query.trim().to_lowercase();
        Ok(self
            .available()?
            .into_iter()
            .filter(|e| {
                e.display_name.to_lowercase().contains(&query)
                    || e.id.contains(&query)
                    || e.manifest.matches(&query)
            })
            .collect())
    }

    pub fn find(&self, id: &str) -> PluginResult<StoreEntry> {
        self.available()?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| PluginError::NotFound(id.to_string()))
    }

    pub fn is_installed(&self, id: &str) -> bool {
        self.installed_path(id).is_some()
    }

    /// Download the module into the plugin directory and register it enabled
    pub fn install(&self, entry: &StoreEntry, registry: &mut PluginRegistry) -> PluginResult<PathBuf> {
        let bytes = self.catalog.download(&entry.file)?;
        let target = self.discoverer.module_path(&entry.id);
        write_atomic(&target, &bytes).map_err(StorageError::from)?;
        registry.register(&entry.id)?;

        tracing::info!(plugin = %entry.id, path = %target.display(), bytes = bytes.len(), "Installed plugin");
        Ok(target)
    }

    /// Delete the module file and its registry entry
    pub fn uninstall(&self, id: &str, registry: &mut PluginRegistry) -> PluginResult<()> {
        let removed_file = match self.installed_path(id) {
            Some(path) => {
                std::fs::remove_file(&path).map_err(StorageError::from)?;
                true
            }
            None => false,
        };
        let removed_entry = registry.unregister(id)?;

        if !removed_file && !removed_entry {
            return Err(PluginError::NotFound(id.to_string()));
        }
        tracing::info!(plugin = %id, "Uninstalled plugin");
        Ok(())
    }

    fn installed_path(&self, id: &str) -> Option<PathBuf> {
        let plain = self.discoverer.module_path(id);
        if plain.is_file() {
            return Some(plain);
        }
        let prefixed = self.discoverer.dir().join(format!(
            "{}{}{}",
            std::env::consts::DLL_PREFIX,
            id,
            std::env::consts::DLL_SUFFIX
        ));
        prefixed.is_file().then_some(prefixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::RemoteError;
    use std::env::consts::DLL_SUFFIX;
    use tempfile::TempDir;

    struct FakeCatalog {
        files: Vec<RemotePluginFile>,
    }

    impl FakeCatalog {
        fn new(names: &[&str]) -> Self {
            Self {
                files: names
                    .iter()
                    .map(|n| RemotePluginFile {
                        name: n.to_string(),
                        size: 4,
                        sha: "deadbeef".into(),
                        download_url: format!("https://example.invalid/{}", n),
                    })
                    .collect(),
            }
        }
    }

    impl PluginCatalog for FakeCatalog {
        fn list_plugins(&self) -> Result<Vec<RemotePluginFile>, RemoteError> {
            Ok(self.files.clone())
        }

        fn download(&self, file: &RemotePluginFile) -> Result<Vec<u8>, RemoteError> {
            match file.name.as_str() {
                "music_player.json" => Ok(br#"{
                    "description": "Plays audio from links",
                    "author": "Ale",
                    "version": "2.1.0",
                    "tags": ["audio", "fun"]
                }"#
                .to_vec()),
                "tickets.json" => Ok(b"{ broken".to_vec()),
                name => Ok(name.as_bytes().to_vec()),
            }
        }
    }

    fn store(dir: &TempDir) -> PluginStore<FakeCatalog> {
        let music = format!("music_player{}", DLL_SUFFIX);
        let tickets = format!("tickets{}", DLL_SUFFIX);
        let catalog = FakeCatalog::new(&[
            music.as_str(),
            "music_player.json",
            tickets.as_str(),
            "tickets.json",
            "README.md",
        ]);
        PluginStore::new(catalog, PluginDiscoverer::new(dir.path().join("plugins")))
    }

    #[test]
    fn test_available_and_search() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let all = store.available().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].display_name, "Music Player");

        let hits = store.search("PLAYER").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "music_player");
    }

    #[test]
    fn test_manifest_metadata_and_search_by_description_and_tags() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let music = store.find("music_player").unwrap();
        assert_eq!(music.manifest.author, "Ale");
        assert_eq!(music.manifest.version, "2.1.0");
        assert_eq!(music.manifest.tags, vec!["audio".to_string(), "fun".to_string()]);

        // An unreadable manifest falls back to defaults
        let tickets = store.find("tickets").unwrap();
        assert_eq!(tickets.manifest, PluginManifest::default());

        assert_eq!(store.search("audio from").unwrap()[0].id, "music_player");
        assert_eq!(store.search("FUN").unwrap().len(), 1);
        assert!(store.search("karaoke").unwrap().is_empty());
    }

    #[test]
    fn test_install_then_uninstall() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut registry = PluginRegistry::load(dir.path().join("config/plugins.json"));

        let entry = store.find("tickets").unwrap();
        let path = store.install(&entry, &mut registry).unwrap();
        assert!(path.is_file());
        assert!(store.is_installed("tickets"));
        assert!(registry.is_enabled("tickets"));

        store.uninstall("tickets", &mut registry).unwrap();
        assert!(!store.is_installed("tickets"));
        assert!(!registry.contains("tickets"));
        assert!(matches!(
            store.uninstall("tickets", &mut registry),
            Err(PluginError::NotFound(_))
        ));
    }
}

//! Plugin discovery - scans the plugin directory for native modules

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

static IDENTIFIER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").ok());

/// Package init marker, never a plugin
const INIT_MARKER: &str = "init";

pub fn is_valid_identifier(id: &str) -> bool {
    IDENTIFIER.as_ref().map(|re| re.is_match(id)).unwrap_or(false)
}

/// Plugin identifier for a module file name on this platform.
///
/// `libmoderation.so` and `moderation.so` both map to `moderation`.
pub fn plugin_identifier(file_name: &str) -> Option<String> {
    if file_name.starts_with('.') || file_name.starts_with('_') {
        return None;
    }
    let stem = file_name.strip_suffix(std::env::consts::DLL_SUFFIX)?;
    let stem = stem.strip_prefix(std::env::consts::DLL_PREFIX).unwrap_or(stem);

    if stem == INIT_MARKER || !is_valid_identifier(stem) {
        return None;
    }
    Some(stem.to_string())
}

/// Finds plugin modules in a directory
#[derive(Debug, Clone)]
pub struct PluginDiscoverer {
    dir: PathBuf,
}

impl PluginDiscoverer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Identifiers of every module present. A missing directory yields nothing.
    pub fn discover(&self) -> BTreeSet<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %self.dir.display(), error = %e, "Plugin directory not readable");
                return BTreeSet::new();
            }
        };

        entries
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    tracing::warn!("Failed to read directory entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                let id = plugin_identifier(name);
                if id.is_none() {
                    tracing::trace!(file = %name, "Skipping non-plugin file");
                }
                id
            })
            .collect()
    }

    /// Path where the module for `id` lives
    pub fn module_path(&self, id: &str) -> PathBuf {
        self.dir.join(module_file_name(id))
    }
}

/// Platform file name for a plugin module
pub fn module_file_name(id: &str) -> String {
    format!("{}{}", id, std::env::consts::DLL_SUFFIX)
}

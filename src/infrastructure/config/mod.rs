//! Configuration management

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::application::errors::ConfigError;

/// Keys that must be present in `config/config.json`
pub const REQUIRED_CORE: &[&str] = &["token", "prefix", "owner_id"];

/// Bot configuration (`config/config.json`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub token: String,
    pub prefix: String,
    #[serde(deserialize_with = "string_or_number")]
    pub owner_id: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub auto_update: bool,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// `owner/name` on GitHub
    pub repository: String,
    pub branch: String,
    /// Extra protected-path rules, appended to the built-in ones
    pub protected: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub repository: String,
    pub branch: String,
    /// Directory of the store repository holding plugin modules
    pub directory: String,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            repository: "Aledallas01/FlexCore-Discord-Bot".to_string(),
            branch: "main".to_string(),
            protected: Vec::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            repository: "Aledallas01/FlexCore-Plugins".to_string(),
            branch: "main".to_string(),
            directory: "plugins".to_string(),
        }
    }
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_cleanup_interval() -> u64 {
    60
}

/// Discord IDs show up both as JSON strings and as numbers
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        UInt(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::UInt(u) => u.to_string(),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: "YOUR_BOT_TOKEN_HERE".to_string(),
            prefix: "!".to_string(),
            owner_id: "YOUR_DISCORD_ID".to_string(),
            language: default_language(),
            auto_update: false,
            update: UpdateConfig::default(),
            store: StoreConfig::default(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

impl Config {
    /// Load and check the core config. A missing file or required key is fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(ConfigError::Parse(format!("Failed to read config: {}", e))),
        };

        let raw: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;

        let missing: Vec<&str> = REQUIRED_CORE
            .iter()
            .copied()
            .filter(|key| raw.get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingField(missing.join(", ")));
        }

        serde_json::from_value(raw).map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }

    /// Environment overrides for secrets and quick tweaks
    pub fn apply_env(mut self) -> Self {
        if let Ok(token) = std::env::var("BOT_TOKEN") {
            self.token = token;
        }

        if let Ok(prefix) = std::env::var("BOT_PREFIX") {
            self.prefix = prefix;
        }

        self
    }

    /// The token is still the placeholder written by `init-config`
    pub fn has_placeholder_token(&self) -> bool {
        self.token.is_empty() || self.token == "YOUR_BOT_TOKEN_HERE"
    }

    pub fn owner_id(&self) -> Option<i64> {
        self.owner_id.trim().parse().ok()
    }
}

/// Well-known locations below the installation root
#[derive(Debug, Clone)]
pub struct AppPaths {
    root: PathBuf,
    plugin_dir: String,
}

impl AppPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            plugin_dir: "plugins".to_string(),
        }
    }

    pub fn with_plugin_dir(mut self, dir: impl Into<String>) -> Self {
        self.plugin_dir = dir.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn core_config(&self) -> PathBuf {
        self.config_dir().join("config.json")
    }

    pub fn plugin_registry(&self) -> PathBuf {
        self.config_dir().join("plugins.json")
    }

    pub fn plugin_config(&self, plugin: &str) -> PathBuf {
        self.config_dir().join(format!("{}.json", plugin))
    }

    pub fn plugin_dir(&self) -> PathBuf {
        self.root.join(&self.plugin_dir)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn moderation_db(&self) -> PathBuf {
        self.data_dir().join("moderation.db")
    }

    pub fn marker_file(&self) -> PathBuf {
        self.root.join(".last_update_check")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(".update_backups")
    }

    pub fn lang_dir(&self) -> PathBuf {
        self.root.join("lang")
    }
}

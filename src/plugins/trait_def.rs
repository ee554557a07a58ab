//! Plugin trait definitions

use serde_json::Value;
use std::fmt;

use crate::application::errors::PluginResult;
use crate::domain::entities::Command;
use crate::infrastructure::config::AppPaths;
use crate::infrastructure::i18n::Catalog;

/// Core plugin trait that all plugins must implement
pub trait Plugin: Send + Sync {
    /// Unique identifier for the plugin
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    fn version(&self) -> &str {
        "0.1.0"
    }

    /// Called once after the module is opened, before commands are collected
    fn init(&mut self, ctx: &PluginContext) -> PluginResult<()>;

    /// Commands this plugin contributes to the dispatcher
    fn commands(&self) -> Vec<Command>;

    /// Periodic housekeeping, driven by the host
    fn maintenance(&self) -> PluginResult<()> {
        Ok(())
    }

    /// Release resources before the plugin is dropped
    fn shutdown(&self) -> PluginResult<()> {
        Ok(())
    }
}

/// Everything a plugin gets from the host at init
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub id: String,
    pub paths: AppPaths,
    /// Contents of `config/<id>.json`, if present
    pub config: Option<Value>,
    pub owner_id: Option<i64>,
    pub catalog: Catalog,
}

/// Host-wide values shared by every plugin context
#[derive(Debug, Clone)]
pub struct HostContext {
    pub paths: AppPaths,
    pub owner_id: Option<i64>,
    pub catalog: Catalog,
}

impl HostContext {
    pub fn new(paths: AppPaths, owner_id: Option<i64>, catalog: Catalog) -> Self {
        Self { paths, owner_id, catalog }
    }

    pub fn for_plugin(&self, id: &str, config: Option<Value>) -> PluginContext {
        PluginContext {
            id: id.to_string(),
            paths: self.paths.clone(),
            config,
            owner_id: self.owner_id,
            catalog: self.catalog.clone(),
        }
    }
}

/// Runtime state of a plugin after a load cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginStatus {
    Active,
    Disabled,
    Error(String),
}

impl PluginStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, PluginStatus::Active)
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginStatus::Active => f.write_str("active"),
            PluginStatus::Disabled => f.write_str("disabled"),
            PluginStatus::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

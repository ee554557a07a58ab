//! Application layer errors

use std::path::PathBuf;
use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Update error: {0}")]
    Update(#[from] UpdateError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Permission denied")]
    PermissionDenied,
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Lock poisoned")]
    Poisoned,
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Plugin lifecycle errors
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin module not found: {0}")]
    ModuleNotFound(String),

    #[error("Plugin '{plugin}' does not export entry point `{symbol}`")]
    EntryPointMissing { plugin: String, symbol: String },

    #[error("Failed to load plugin: {0}")]
    Load(String),

    #[error("Plugin init failed: {0}")]
    Init(String),

    #[error("Plugin maintenance failed: {0}")]
    Maintenance(String),

    #[error("Invalid configuration: {}: {}", .0.title, .0.message)]
    Validation(#[from] ValidationError),

    #[error("Invalid plugin identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Plugin not found: {0}")]
    NotFound(String),

    #[error("Registry error: {0}")]
    Registry(#[from] StorageError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

/// Remote content API errors
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Request failed: {0}")]
    Http(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Update engine errors
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Could not check remote: {0}")]
    CouldNotCheck(#[source] RemoteError),

    #[error("Could not determine changed files: {0}")]
    Resolve(#[source] RemoteError),

    #[error("Failed to download {path}: {source}")]
    Download {
        path: String,
        #[source]
        source: RemoteError,
    },

    #[error("Invalid JSON in {path}: {reason}")]
    InvalidJson { path: String, reason: String },

    #[error("Refusing to write outside the installation root: {0}")]
    UnsafePath(String),

    #[error("Refusing to overwrite the running executable: {0}")]
    SelfOverwrite(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Marker store error: {0}")]
    Marker(#[from] StorageError),
}

impl UpdateError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        UpdateError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Human-readable validation failure: a short title and a remediation body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{title}")]
pub struct ValidationError {
    pub title: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

pub type PluginResult<T> = Result<T, PluginError>;

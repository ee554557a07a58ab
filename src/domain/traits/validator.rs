use crate::application::errors::ValidationError;

/// Configuration checks run before the bot starts and before each plugin loads.
pub trait PluginValidator: Send + Sync {
    /// Core configuration: file present, required keys set
    fn validate_core(&self) -> Result<(), ValidationError>;

    /// A plugin's own configuration file, if it has a schema
    fn validate_plugin(&self, plugin: &str) -> Result<(), ValidationError>;
}

//! Plugin infrastructure
//!
//! Plugins are shared libraries in the plugin directory, one file per plugin,
//! exporting `flexcore_plugin_create`. Their enabled flags live in
//! `config/plugins.json`.

pub mod discovery;
pub mod loader;
pub mod manifest;
pub mod registry;

pub use discovery::{is_valid_identifier, module_file_name, plugin_identifier, PluginDiscoverer};
pub use loader::DynamicLibraryModules;
pub use manifest::PluginManifest;
pub use registry::PluginRegistry;

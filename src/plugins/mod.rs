//! Plugin system
//!
//! Plugins contribute commands to the dispatcher. They come either from native
//! libraries in the plugin directory or from factories compiled into the host.

pub mod manager;
pub mod moderation;
pub mod module;
pub mod store;
pub mod trait_def;

pub use manager::{LoadSummary, PluginManager};
pub use module::{BuiltinModules, ChainedModules, ModuleSource, PluginModule, ENTRY_POINT};
pub use store::{PluginStore, StoreEntry};
pub use trait_def::{HostContext, Plugin, PluginContext, PluginStatus};

/// Plugins shipped with the host
pub fn builtin_modules() -> BuiltinModules {
    BuiltinModules::new().register(moderation::PLUGIN_ID, moderation::ModerationPlugin::factory)
}

//! Plugin manager - handles the plugin load cycle and lifecycle

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use super::module::{ModuleSource, PluginModule};
use super::trait_def::{HostContext, Plugin, PluginStatus};
use crate::application::errors::{PluginError, PluginResult};
use crate::application::services::CommandService;
use crate::domain::traits::PluginValidator;
use crate::infrastructure::plugins::PluginRegistry;
use crate::infrastructure::storage::read_json;

/// Counts from one load cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub disabled: usize,
    pub errors: usize,
}

struct LoadedPlugin {
    id: String,
    plugin: Box<dyn Plugin>,
    // Dropped after the instance it created
    _module: Box<dyn PluginModule>,
}

/// Discovers, validates and loads plugins, and owns the loaded instances
pub struct PluginManager {
    registry: PluginRegistry,
    source: Box<dyn ModuleSource>,
    validator: Arc<dyn PluginValidator>,
    host: HostContext,
    loaded: Mutex<Vec<LoadedPlugin>>,
    statuses: BTreeMap<String, PluginStatus>,
}

impl PluginManager {
    pub fn new(
        registry: PluginRegistry,
        source: impl ModuleSource + 'static,
        validator: Arc<dyn PluginValidator>,
        host: HostContext,
    ) -> Self {
        Self {
            registry,
            source: Box::new(source),
            validator,
            host,
            loaded: Mutex::new(Vec::new()),
            statuses: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Reconcile the registry with what is on disk, then validate and load
    /// every enabled plugin. One plugin failing never stops the batch.
    pub fn load_all(&mut self, commands: &mut CommandService) -> LoadSummary {
        self.unload_all(commands);
        self.statuses.clear();

        let discovered = self.source.available();
        if let Err(e) = self.registry.reconcile(&discovered) {
            warn!(error = %e, "Failed to persist plugin registry");
        }

        let mut summary = LoadSummary::default();
        let entries: Vec<(String, bool)> = self
            .registry
            .entries()
            .iter()
            .map(|(id, enabled)| (id.clone(), *enabled))
            .collect();

        for (id, enabled) in entries {
            if !enabled {
                info!(plugin = %id, "Plugin disabled, skipping");
                self.statuses.insert(id, PluginStatus::Disabled);
                summary.disabled += 1;
                continue;
            }

            match self.load_one(&id, commands) {
                Ok(loaded) => {
                    info!(
                        plugin = %id,
                        version = %loaded.plugin.version(),
                        "Loaded plugin: {}",
                        loaded.plugin.name()
                    );
                    self.loaded_mut().push(loaded);
                    self.statuses.insert(id, PluginStatus::Active);
                    summary.loaded += 1;
                }
                Err(e) => {
                    error!(plugin = %id, error = %e, "Failed to load plugin");
                    self.statuses.insert(id, PluginStatus::Error(e.to_string()));
                    summary.errors += 1;
                }
            }
        }

        info!(
            loaded = summary.loaded,
            disabled = summary.disabled,
            errors = summary.errors,
            "Plugin load cycle finished"
        );
        summary
    }

    fn load_one(&self, id: &str, commands: &mut CommandService) -> PluginResult<LoadedPlugin> {
        self.validator.validate_plugin(id)?;

        let module = self.source.open(id)?;
        let mut plugin = module.create()?;

        let config_path = self.host.paths.plugin_config(id);
        let config = read_json::<Value>(&config_path).unwrap_or_else(|e| {
            warn!(plugin = %id, error = %e, "Plugin config unreadable, using defaults");
            None
        });
        plugin.init(&self.host.for_plugin(id, config))?;

        if let Err(e) = commands.register_plugin(id, plugin.commands()) {
            if let Err(shutdown) = plugin.shutdown() {
                warn!(plugin = %id, error = %shutdown, "Plugin shutdown failed");
            }
            return Err(PluginError::Init(e.to_string()));
        }

        Ok(LoadedPlugin {
            id: id.to_string(),
            plugin,
            _module: module,
        })
    }

    /// Status of every registry entry after the last load cycle
    pub fn statuses(&self) -> BTreeMap<String, PluginStatus> {
        self.statuses.clone()
    }

    pub fn status(&self, id: &str) -> Option<&PluginStatus> {
        self.statuses.get(id)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded().len()
    }

    /// Run periodic housekeeping on every loaded plugin
    pub fn maintenance(&self) {
        for loaded in self.loaded().iter() {
            if let Err(e) = loaded.plugin.maintenance() {
                warn!(plugin = %loaded.id, error = %e, "Plugin maintenance failed");
            }
        }
    }

    /// Drop every plugin's commands, then shut the plugins down
    pub fn unload_all(&self, commands: &mut CommandService) {
        let drained: Vec<LoadedPlugin> = self.loaded().drain(..).collect();
        for loaded in drained {
            commands.unregister_plugin(&loaded.id);
            if let Err(e) = loaded.plugin.shutdown() {
                warn!(plugin = %loaded.id, error = %e, "Plugin shutdown failed");
            }
            info!(plugin = %loaded.id, "Unloaded plugin");
        }
    }

    fn loaded(&self) -> std::sync::MutexGuard<'_, Vec<LoadedPlugin>> {
        self.loaded.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn loaded_mut(&mut self) -> &mut Vec<LoadedPlugin> {
        self.loaded.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::ValidationError;
    use crate::domain::entities::Command;
    use crate::infrastructure::config::AppPaths;
    use crate::infrastructure::i18n::Catalog;
    use crate::plugins::module::BuiltinModules;
    use crate::plugins::PluginContext;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    static SHUTDOWNS: AtomicUsize = AtomicUsize::new(0);

    struct Echo;

    impl Plugin for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        fn description(&self) -> &str {
            "Repeats its arguments"
        }

        fn init(&mut self, _ctx: &PluginContext) -> PluginResult<()> {
            Ok(())
        }

        fn commands(&self) -> Vec<Command> {
            vec![Command::new("echo").with_handler(|m| Ok(m.args().join(" ")))]
        }

        fn shutdown(&self) -> PluginResult<()> {
            SHUTDOWNS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailsInit;

    impl Plugin for FailsInit {
        fn name(&self) -> &str {
            "FailsInit"
        }

        fn description(&self) -> &str {
            ""
        }

        fn init(&mut self, _ctx: &PluginContext) -> PluginResult<()> {
            Err(PluginError::Init("database unavailable".into()))
        }

        fn commands(&self) -> Vec<Command> {
            Vec::new()
        }
    }

    /// Lists a module that cannot be opened, like a library without the entry point
    struct NoEntryPoint;

    impl ModuleSource for NoEntryPoint {
        fn available(&self) -> BTreeSet<String> {
            BTreeSet::from(["broken".to_string()])
        }

        fn open(&self, id: &str) -> PluginResult<Box<dyn PluginModule>> {
            if id != "broken" {
                return Err(PluginError::ModuleNotFound(id.to_string()));
            }
            Err(PluginError::EntryPointMissing {
                plugin: id.to_string(),
                symbol: crate::plugins::module::ENTRY_POINT.to_string(),
            })
        }
    }

    struct RejectTickets;

    impl PluginValidator for RejectTickets {
        fn validate_core(&self) -> Result<(), ValidationError> {
            Ok(())
        }

        fn validate_plugin(&self, plugin: &str) -> Result<(), ValidationError> {
            if plugin == "tickets" {
                return Err(ValidationError::new("tickets", "category_id missing"));
            }
            Ok(())
        }
    }

    fn manager(dir: &TempDir, source: impl ModuleSource + 'static) -> PluginManager {
        let paths = AppPaths::new(dir.path());
        PluginManager::new(
            PluginRegistry::load(paths.plugin_registry()),
            source,
            Arc::new(RejectTickets),
            HostContext::new(paths, Some(1), Catalog::builtin()),
        )
    }

    #[test]
    fn test_active_and_broken_plugin() {
        let dir = TempDir::new().unwrap();
        let source = crate::plugins::module::ChainedModules::new()
            .with(BuiltinModules::new().register("echo", || Box::new(Echo)))
            .with(NoEntryPoint);
        let mut manager = manager(&dir, source);
        let mut commands = CommandService::new("!");

        let summary = manager.load_all(&mut commands);
        assert_eq!(summary, LoadSummary { loaded: 1, disabled: 0, errors: 1 });
        assert_eq!(manager.status("echo"), Some(&PluginStatus::Active));
        assert!(matches!(manager.status("broken"), Some(PluginStatus::Error(_))));

        let reply = commands.handle_text("c", "!echo hi", None, None).unwrap();
        assert_eq!(reply.as_deref(), Some("hi"));
    }

    #[test]
    fn test_disabled_invalid_and_failing_init() {
        let dir = TempDir::new().unwrap();
        let source = BuiltinModules::new()
            .register("echo", || Box::new(Echo))
            .register("tickets", || Box::new(Echo))
            .register("flaky", || Box::new(FailsInit));
        let mut manager = manager(&dir, source);
        let mut commands = CommandService::new("!");

        manager.load_all(&mut commands);
        manager.registry.set_enabled("echo", false).unwrap();
        let summary = manager.load_all(&mut commands);

        assert_eq!(summary, LoadSummary { loaded: 0, disabled: 1, errors: 2 });
        assert_eq!(manager.status("echo"), Some(&PluginStatus::Disabled));
        assert!(matches!(manager.status("tickets"), Some(PluginStatus::Error(msg)) if msg.contains("category_id")));
        assert_eq!(commands.command_count(), 0);
    }

    #[test]
    fn test_unload_removes_commands_and_shuts_down() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir, BuiltinModules::new().register("echo", || Box::new(Echo)));
        let mut commands = CommandService::new("!");

        manager.load_all(&mut commands);
        assert_eq!(commands.command_count(), 1);

        let before = SHUTDOWNS.load(Ordering::SeqCst);
        manager.unload_all(&mut commands);
        assert_eq!(commands.command_count(), 0);
        assert_eq!(manager.loaded_count(), 0);
        assert!(SHUTDOWNS.load(Ordering::SeqCst) > before);
    }
}

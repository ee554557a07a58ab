//! Where plugin instances come from
//!
//! A [`ModuleSource`] knows which plugin identifiers it can provide and opens a
//! [`PluginModule`] for one of them. Native libraries export
//! [`ENTRY_POINT`]; plugins compiled into the host register a factory.

use std::collections::{BTreeMap, BTreeSet};

use super::trait_def::Plugin;
use crate::application::errors::{PluginError, PluginResult};

/// Symbol every native plugin library must export
pub const ENTRY_POINT: &str = "flexcore_plugin_create";

/// Signature of [`ENTRY_POINT`]; ownership of the returned box passes to the host
pub type PluginCreateFn = unsafe extern "C" fn() -> *mut Box<dyn Plugin>;

/// Constructor for a plugin compiled into the host
pub type PluginFactory = fn() -> Box<dyn Plugin>;

/// An opened module able to produce plugin instances.
///
/// The module must outlive every instance it created.
pub trait PluginModule: Send + Sync {
    fn create(&self) -> PluginResult<Box<dyn Plugin>>;
}

pub trait ModuleSource: Send + Sync {
    /// Identifiers this source can open
    fn available(&self) -> BTreeSet<String>;

    /// Open the module for `id`; `ModuleNotFound` if this source has none
    fn open(&self, id: &str) -> PluginResult<Box<dyn PluginModule>>;
}

/// Export a plugin constructor under the fixed entry point.
///
/// ```ignore
/// flexcore::declare_plugin!(MyPlugin::default);
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($ctor:path) => {
        #[no_mangle]
        pub extern "C" fn flexcore_plugin_create() -> *mut Box<dyn $crate::plugins::Plugin> {
            let plugin: Box<dyn $crate::plugins::Plugin> = Box::new($ctor());
            Box::into_raw(Box::new(plugin))
        }
    };
}

/// Plugins compiled into the binary, keyed by identifier
#[derive(Default)]
pub struct BuiltinModules {
    factories: BTreeMap<String, PluginFactory>,
}

impl BuiltinModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, id: impl Into<String>, factory: PluginFactory) -> Self {
        self.factories.insert(id.into(), factory);
        self
    }
}

struct BuiltinModule(PluginFactory);

impl PluginModule for BuiltinModule {
    fn create(&self) -> PluginResult<Box<dyn Plugin>> {
        Ok((self.0)())
    }
}

impl ModuleSource for BuiltinModules {
    fn available(&self) -> BTreeSet<String> {
        self.factories.keys().cloned().collect()
    }

    fn open(&self, id: &str) -> PluginResult<Box<dyn PluginModule>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| PluginError::ModuleNotFound(id.to_string()))?;
        Ok(Box::new(BuiltinModule(*factory)))
    }
}

/// Tries each source in order; the first one that has the module wins
#[derive(Default)]
pub struct ChainedModules {
    sources: Vec<Box<dyn ModuleSource>>,
}

impl ChainedModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl ModuleSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl ModuleSource for ChainedModules {
    fn available(&self) -> BTreeSet<String> {
        self.sources.iter().flat_map(|s| s.available()).collect()
    }

    fn open(&self, id: &str) -> PluginResult<Box<dyn PluginModule>> {
        for source in &self.sources {
            match source.open(id) {
                Err(PluginError::ModuleNotFound(_)) => continue,
                other => return other,
            }
        }
        Err(PluginError::ModuleNotFound(id.to_string()))
    }
}

//! Native plugin modules - shared libraries loaded with libloading

use libloading::{Library, Symbol};
use std::collections::BTreeSet;
use std::path::PathBuf;

use super::discovery::PluginDiscoverer;
use crate::application::errors::{PluginError, PluginResult};
use crate::plugins::module::{ModuleSource, PluginCreateFn, PluginModule, ENTRY_POINT};
use crate::plugins::Plugin;

/// An opened shared library and its entry point
pub struct DynamicModule {
    id: String,
    create: PluginCreateFn,
    // Declared last so it is dropped after everything that may point into it
    _library: Library,
}

impl PluginModule for DynamicModule {
    fn create(&self) -> PluginResult<Box<dyn Plugin>> {
        // The symbol was resolved from `_library`, which is still loaded
        unsafe { instantiate(&self.id, self.create) }
    }
}

/// Call an entry point and take ownership of the instance it hands back.
///
/// # Safety
///
/// `create` must follow the [`ENTRY_POINT`] contract: return null or a pointer
/// obtained from `Box::into_raw`, built against this same host version.
unsafe fn instantiate(id: &str, create: PluginCreateFn) -> PluginResult<Box<dyn Plugin>> {
    let raw = create();
    if raw.is_null() {
        return Err(PluginError::Init(format!("{} returned no instance", id)));
    }
    Ok(*Box::from_raw(raw))
}

/// Shared libraries in the plugin directory
pub struct DynamicLibraryModules {
    discoverer: PluginDiscoverer,
}

impl DynamicLibraryModules {
    pub fn new(discoverer: PluginDiscoverer) -> Self {
        Self { discoverer }
    }

    fn library_path(&self, id: &str) -> Option<PathBuf> {
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

impl ModuleSource for DynamicLibraryModules {
    fn available(&self) -> BTreeSet<String> {
        self.discoverer.discover()
    }

    fn open(&self, id: &str) -> PluginResult<Box<dyn PluginModule>> {
        let path = self
            .library_path(id)
            .ok_or_else(|| PluginError::ModuleNotFound(id.to_string()))?;

        // Loading runs the library's initialisers; only trusted modules belong in the plugin dir
        let library = unsafe {
            Library::new(&path)
                .map_err(|e| PluginError::Load(format!("{}: {}", path.display(), e)))?
        };

        let create = unsafe {
            let symbol: Symbol<PluginCreateFn> =
                library
                    .get(ENTRY_POINT.as_bytes())
                    .map_err(|_| PluginError::EntryPointMissing {
                        plugin: id.to_string(),
                        symbol: ENTRY_POINT.to_string(),
                    })?;
            *symbol
        };

        tracing::debug!(plugin = %id, path = %path.display(), "Opened plugin library");
        Ok(Box::new(DynamicModule {
            id: id.to_string(),
            create,
            _library: library,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Command;
    use crate::plugins::PluginContext;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Greeter;

    impl Plugin for Greeter {
        fn name(&self) -> &str {
            "Greeter"
        }

        fn description(&self) -> &str {
            "Says hello"
        }

        fn init(&mut self, _ctx: &PluginContext) -> PluginResult<()> {
            Ok(())
        }

        fn commands(&self) -> Vec<Command> {
            vec![Command::new("hello").with_handler(|_| Ok("hello".to_string()))]
        }
    }

    crate::declare_plugin!(Greeter::default);

    extern "C" fn returns_null() -> *mut Box<dyn Plugin> {
        std::ptr::null_mut()
    }

    #[test]
    fn test_declared_entry_point_hands_over_an_instance() {
        let plugin = unsafe { instantiate("greeter", flexcore_plugin_create) }.unwrap();
        assert_eq!(plugin.name(), "Greeter");
        assert_eq!(plugin.commands().len(), 1);
    }

    #[test]
    fn test_null_instance_is_an_init_error() {
        let result = unsafe { instantiate("empty", returns_null) };
        assert!(matches!(result, Err(PluginError::Init(msg)) if msg.contains("empty")));
    }

    #[test]
    fn test_missing_library_is_module_not_found() {
        let dir = TempDir::new().unwrap();
        let source = DynamicLibraryModules::new(PluginDiscoverer::new(dir.path()));
        assert!(matches!(source.open("ghost"), Err(PluginError::ModuleNotFound(_))));
    }

    #[test]
    fn test_garbage_library_fails_to_load() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(format!("broken{}", std::env::consts::DLL_SUFFIX)),
            b"not a shared object",
        )
        .unwrap();

        let source = DynamicLibraryModules::new(PluginDiscoverer::new(dir.path()));
        assert_eq!(source.available().into_iter().collect::<Vec<_>>(), vec!["broken".to_string()]);
        assert!(matches!(source.open("broken"), Err(PluginError::Load(_))));
    }
}

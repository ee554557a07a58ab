//! Plugin host integration tests
//! Run with: cargo test --test plugin_host_test

use std::fs;
use std::sync::{Arc, Once};

use flexcore::application::services::CommandService;
use flexcore::domain::entities::User;
use flexcore::infrastructure::config::AppPaths;
use flexcore::infrastructure::database::ModerationLedger;
use flexcore::infrastructure::i18n::Catalog;
use flexcore::infrastructure::plugins::{DynamicLibraryModules, PluginDiscoverer, PluginRegistry};
use flexcore::infrastructure::validation::SchemaValidator;
use flexcore::plugins::{builtin_modules, ChainedModules, HostContext, LoadSummary, PluginManager, PluginStatus};
use tempfile::TempDir;

static INIT: Once = Once::new();

fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

const OWNER: i64 = 1234;

fn host(root: &TempDir) -> (PluginManager, CommandService, AppPaths) {
    let paths = AppPaths::new(root.path());
    fs::create_dir_all(paths.config_dir()).unwrap();
    fs::create_dir_all(paths.plugin_dir()).unwrap();
    fs::write(
        paths.plugin_config("moderation"),
        r#"{"staff_roles": [10], "admin_roles": [], "rate_limit": 5, "auto_actions": {}}"#,
    )
    .unwrap();
    // A file that looks like a plugin but is not a loadable library
    fs::write(
        paths.plugin_dir().join(format!("broken{}", std::env::consts::DLL_SUFFIX)),
        b"garbage",
    )
    .unwrap();

    let catalog = Catalog::builtin();
    let source = ChainedModules::new()
        .with(builtin_modules())
        .with(DynamicLibraryModules::new(PluginDiscoverer::new(paths.plugin_dir())));
    let manager = PluginManager::new(
        PluginRegistry::load(paths.plugin_registry()),
        source,
        Arc::new(SchemaValidator::new(paths.clone(), catalog.clone())),
        HostContext::new(paths.clone(), Some(OWNER), catalog),
    );

    let mut commands = CommandService::new("!");
    commands.register_defaults();
    (manager, commands, paths)
}

#[test]
fn test_moderation_loads_and_broken_plugin_errors() {
    ensure_init();
    let root = TempDir::new().unwrap();
    let (mut manager, mut commands, paths) = host(&root);

    let summary = manager.load_all(&mut commands);
    assert_eq!(summary, LoadSummary { loaded: 1, disabled: 0, errors: 1 });

    let statuses = manager.statuses();
    assert_eq!(statuses.get("moderation"), Some(&PluginStatus::Active));
    assert!(matches!(statuses.get("broken"), Some(PluginStatus::Error(_))));

    // Registry now lists both, enabled
    let registry = PluginRegistry::load(paths.plugin_registry());
    assert!(registry.is_enabled("moderation"));
    assert!(registry.is_enabled("broken"));

    // Commands reach the ledger file
    let owner = User::new(OWNER, "owner");
    let reply = commands
        .handle_text("general", "!warn <@42> spam", Some(owner), Some(7))
        .unwrap()
        .unwrap();
    assert!(reply.contains("<@42>"));

    manager.maintenance();
    manager.unload_all(&mut commands);
    assert!(commands.handle_text("general", "!warn 42", None, Some(7)).is_err());

    let ledger = ModerationLedger::open(paths.moderation_db()).unwrap();
    assert_eq!(ledger.get_warn_count(42, 7).unwrap(), 1);
    assert_eq!(ledger.get_audit_log(7, 10).unwrap().len(), 1);
}

#[test]
fn test_disabled_plugin_is_not_loaded() {
    ensure_init();
    let root = TempDir::new().unwrap();
    let (mut manager, mut commands, paths) = host(&root);
    manager.load_all(&mut commands);
    manager.unload_all(&mut commands);
    drop(manager);

    let mut registry = PluginRegistry::load(paths.plugin_registry());
    registry.set_enabled("moderation", false).unwrap();

    let (mut manager, mut commands, _) = host(&root);
    let summary = manager.load_all(&mut commands);
    assert_eq!(summary, LoadSummary { loaded: 0, disabled: 1, errors: 1 });
    assert_eq!(manager.status("moderation"), Some(&PluginStatus::Disabled));
    assert!(commands
        .handle_text("general", "!warn 42", Some(User::new(OWNER, "owner")), Some(7))
        .is_err());
}

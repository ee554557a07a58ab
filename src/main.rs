use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use flexcore::application::errors::{BotError, PluginError, UpdateError};
use flexcore::application::services::CommandService;
use flexcore::application::update::{AutoUpdater, ProtectedPaths, UpdateApplier, UpdateOutcome};
use flexcore::domain::entities::User;
use flexcore::domain::traits::{Bot, PluginValidator};
use flexcore::infrastructure::adapters::ConsoleAdapter;
use flexcore::infrastructure::config::{AppPaths, Config};
use flexcore::infrastructure::github::GitHubSource;
use flexcore::infrastructure::i18n::Catalog;
use flexcore::infrastructure::plugins::{DynamicLibraryModules, PluginDiscoverer, PluginRegistry};
use flexcore::infrastructure::storage::{write_json, MarkerStore};
use flexcore::infrastructure::validation::SchemaValidator;
use flexcore::plugins::{builtin_modules, ChainedModules, HostContext, ModuleSource, PluginManager, PluginStore, StoreEntry};

/// Exit status of `update` when files changed and a restart is due
const EXIT_RESTART: u8 = 2;

#[derive(Parser)]
#[command(name = "flexcore")]
#[command(about = "A plugin-hosting bot with an explicit update step", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Installation root
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Sync the installation with the remote repository, then exit
    Update,
    /// Manage plugins
    Plugins {
        #[command(subcommand)]
        action: PluginCommands,
    },
    /// Write a default config/config.json
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show version
    Version,
}

#[derive(Subcommand)]
enum PluginCommands {
    /// Show every known plugin and whether it is enabled
    List,
    /// Enable a plugin
    Enable { id: String },
    /// Disable a plugin
    Disable { id: String },
    /// List plugins available in the store
    Store,
    /// Search the store by name
    Search { query: String },
    /// Download a plugin from the store
    Install { id: String },
    /// Remove an installed plugin
    Uninstall { id: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let paths = AppPaths::new(&cli.root);
    let result = match cli.command {
        Commands::Run => run_bot(&paths).map(|_| ExitCode::SUCCESS),
        Commands::Update => Ok(run_update(&paths)),
        Commands::Plugins { action } => plugins_command(&paths, action).map(|_| ExitCode::SUCCESS),
        Commands::InitConfig { force } => init_config(&paths, force),
        Commands::Version => {
            println!("flexcore v{}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            if let BotError::Validation(report) = &e {
                eprintln!("{}\n{}", report.title, report.message);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::default().add_directive(level.into()));

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .init();
}

fn load_config(paths: &AppPaths) -> Result<Config, BotError> {
    Ok(Config::load(paths.core_config())?.apply_env())
}

fn build_updater(paths: &AppPaths, config: &Config) -> Result<AutoUpdater<GitHubSource>, UpdateError> {
    let source = GitHubSource::new(&config.update.repository, &config.update.branch)
        .map_err(UpdateError::CouldNotCheck)?;

    let mut protected = ProtectedPaths::default();
    protected.extend(config.update.protected.iter().cloned());

    let applier = UpdateApplier::new(paths.root(), paths.backup_dir()).guard_current_exe();
    Ok(AutoUpdater::new(source, protected, applier, MarkerStore::new(paths.marker_file())))
}

fn module_source(paths: &AppPaths) -> ChainedModules {
    ChainedModules::new()
        .with(builtin_modules())
        .with(DynamicLibraryModules::new(PluginDiscoverer::new(paths.plugin_dir())))
}

// ===== run =====

fn run_bot(paths: &AppPaths) -> Result<(), BotError> {
    let config = load_config(paths)?;
    let catalog = Catalog::load(paths.lang_dir(), &config.language);
    tracing::info!("{}", catalog.get("bot.starting", &[("version", env!("CARGO_PKG_VERSION"))]));

    let validator = Arc::new(SchemaValidator::new(paths.clone(), catalog.clone()));
    validator.validate_core()?;

    if config.has_placeholder_token() {
        tracing::warn!("Bot token is still the placeholder; set BOT_TOKEN or edit config/config.json");
    }

    // Never rewrite files while serving: only report
    if config.auto_update {
        match build_updater(paths, &config).and_then(|u| u.check_only()) {
            Ok(check) if !check.is_up_to_date() => {
                let local = check.local.as_deref().unwrap_or("none");
                tracing::info!(
                    "{}",
                    catalog.get("bot.update_available", &[("local", short(local)), ("remote", short(&check.remote))])
                );
            }
            Ok(_) => tracing::info!("Installation is up to date"),
            Err(e) => tracing::warn!(error = %e, "Update check failed"),
        }
    }

    let mut commands = CommandService::new(&config.prefix);
    commands.register_defaults();

    let host = HostContext::new(paths.clone(), config.owner_id(), catalog.clone());
    let mut manager = PluginManager::new(
        PluginRegistry::load(paths.plugin_registry()),
        module_source(paths),
        validator,
        host,
    );
    manager.load_all(&mut commands);
    let manager = Arc::new(manager);

    tracing::info!(
        "{}",
        catalog.get(
            "bot.ready",
            &[("prefix", commands.prefix()), ("commands", &commands.command_count().to_string())]
        )
    );

    let rt = tokio::runtime::Runtime::new().map_err(|e| BotError::Internal(e.to_string()))?;
    let owner = User::new(config.owner_id().unwrap_or_default(), "owner");
    let interval = Duration::from_secs(config.cleanup_interval_secs.max(1));

    let served = rt.block_on(serve(&commands, &catalog, Arc::clone(&manager), owner, interval));
    manager.unload_all(&mut commands);
    // A pending stdin read would otherwise keep the runtime alive
    rt.shutdown_timeout(Duration::from_secs(1));
    served
}

async fn serve(
    commands: &CommandService,
    catalog: &Catalog,
    manager: Arc<PluginManager>,
    owner: User,
    interval: Duration,
) -> Result<(), BotError> {
    let sweep = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let manager = Arc::clone(&manager);
            if let Err(e) = tokio::task::spawn_blocking(move || manager.maintenance()).await {
                tracing::warn!(error = %e, "Maintenance task panicked");
            }
        }
    });

    let bot = ConsoleAdapter::new(owner);
    bot.start().await?;
    tracing::info!("Bot started: @{}", bot.bot_info().username);

    loop {
        let message = tokio::select! {
            message = bot.next_message() => message,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                None
            }
        };
        let Some(message) = message else { break };
        let Some(text) = message.content.text() else { continue };

        let reply = tokio::task::block_in_place(|| {
            commands.handle_text(&message.channel_id, text, message.author.clone(), message.guild_id)
        });
        let response = match reply {
            Ok(Some(response)) => response,
            Ok(None) => continue,
            Err(e) => catalog.command_error(commands.prefix(), &e),
        };
        if let Err(e) = bot.send_message(&message.channel_id, &response).await {
            tracing::warn!(error = %e, "Failed to send reply");
        }
    }

    sweep.abort();
    Ok(())
}

// ===== update =====

fn run_update(paths: &AppPaths) -> ExitCode {
    let config = match load_config(paths) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "Using default update settings");
            Config::default()
        }
    };

    let outcome = build_updater(paths, &config).and_then(|u| u.check_and_apply());
    match outcome {
        Ok(UpdateOutcome::UpToDate { marker }) => {
            println!("Already up to date ({})", short(&marker));
            ExitCode::SUCCESS
        }
        Ok(UpdateOutcome::NothingToApply { marker, skipped_protected, removed_upstream }) => {
            println!(
                "Now at {}; nothing to apply ({} protected, {} removed upstream)",
                short(&marker),
                skipped_protected.len(),
                removed_upstream.len()
            );
            ExitCode::SUCCESS
        }
        Ok(outcome @ UpdateOutcome::Applied(_)) => {
            let restart = outcome.restart_recommended();
            if let UpdateOutcome::Applied(report) = &outcome {
                println!("Updated {}/{} files to {}", report.updated.len(), report.attempted, short(&report.marker));
                for path in &report.updated {
                    println!("  updated  {}", path);
                }
                for path in &report.failed {
                    println!("  failed   {} (retried next run)", path);
                }
                for path in &report.removed_upstream {
                    println!("  removed upstream, kept locally  {}", path);
                }
            }
            if restart {
                println!("Restart the bot to use the new files.");
                ExitCode::from(EXIT_RESTART)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Update failed");
            eprintln!("Could not update: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ===== plugins =====

fn plugins_command(paths: &AppPaths, action: PluginCommands) -> Result<(), BotError> {
    let mut registry = PluginRegistry::load(paths.plugin_registry());

    match action {
        PluginCommands::List => {
            registry.reconcile(&module_source(paths).available())?;
            if registry.entries().is_empty() {
                println!("No plugins found in {}", paths.plugin_dir().display());
            }
            for (id, enabled) in registry.entries() {
                println!("{:<20} {}", id, if *enabled { "enabled" } else { "disabled" });
            }
        }
        PluginCommands::Enable { id } => set_enabled(paths, &mut registry, &id, true)?,
        PluginCommands::Disable { id } => set_enabled(paths, &mut registry, &id, false)?,
        PluginCommands::Store => {
            let store = plugin_store(paths)?;
            for entry in store.available()? {
                let mark = if store.is_installed(&entry.id) { " [installed]" } else { "" };
                print_entry(&entry, mark);
            }
        }
        PluginCommands::Search { query } => {
            let hits = plugin_store(paths)?.search(&query)?;
            if hits.is_empty() {
                println!("No plugins match '{}'", query);
            }
            for entry in hits {
                print_entry(&entry, "");
            }
        }
        PluginCommands::Install { id } => {
            let store = plugin_store(paths)?;
            if store.is_installed(&id) {
                println!("{} is already installed", id);
                return Ok(());
            }
            let entry = store.find(&id)?;
            let path = store.install(&entry, &mut registry)?;
            println!("Installed {} to {}", entry.display_name, path.display());
        }
        PluginCommands::Uninstall { id } => {
            plugin_store(paths)?.uninstall(&id, &mut registry)?;
            println!("Uninstalled {}", id);
        }
    }
    Ok(())
}

fn set_enabled(paths: &AppPaths, registry: &mut PluginRegistry, id: &str, enabled: bool) -> Result<(), BotError> {
    // Pick up modules added since the last run
    if !registry.contains(id) {
        registry.reconcile(&module_source(paths).available())?;
    }
    if !registry.set_enabled(id, enabled)? {
        return Err(PluginError::NotFound(id.to_string()).into());
    }
    println!("{} {}", id, if enabled { "enabled" } else { "disabled" });
    Ok(())
}

fn print_entry(entry: &StoreEntry, mark: &str) {
    let manifest = &entry.manifest;
    println!(
        "{:<20} {} v{} by {} ({} bytes){}",
        entry.id, entry.display_name, manifest.version, manifest.author, entry.file.size, mark
    );
    println!("    {}", manifest.description);
    if !manifest.tags.is_empty() {
        println!("    tags: {}", manifest.tags.join(", "));
    }
}

fn plugin_store(paths: &AppPaths) -> Result<PluginStore<GitHubSource>, BotError> {
    let config = load_config(paths).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Using default store settings");
        Config::default()
    });
    let catalog = GitHubSource::new(&config.store.repository, &config.store.branch)
        .map_err(PluginError::from)?
        .with_directory(&config.store.directory);
    Ok(PluginStore::new(catalog, PluginDiscoverer::new(paths.plugin_dir())))
}

// ===== init-config =====

fn init_config(paths: &AppPaths, force: bool) -> Result<ExitCode, BotError> {
    let path = paths.core_config();
    if path.exists() && !force {
        eprintln!("{} already exists; pass --force to overwrite it", path.display());
        return Ok(ExitCode::FAILURE);
    }

    write_json(&path, &Config::default())?;
    println!("Wrote {}", path.display());
    println!("Fill in token and owner_id before running the bot.");
    Ok(ExitCode::SUCCESS)
}

fn short(marker: &str) -> &str {
    marker.get(..7).unwrap_or(marker)
}

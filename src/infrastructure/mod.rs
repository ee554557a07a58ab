//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading and installation paths
//! - Storage: Atomic file writes and the update marker
//! - Database: SQLite moderation ledger
//! - GitHub: Remote source for updates and the plugin store
//! - Plugins: Discovery, registry and native module loading
//! - Adapters: Platform integrations (console)

pub mod adapters;
pub mod config;
pub mod database;
pub mod github;
pub mod i18n;
pub mod plugins;
pub mod storage;
pub mod validation;

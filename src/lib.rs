//! flexcore - a plugin-hosting chat bot with an explicit self-update step
//! and a SQLite moderation ledger.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;

pub use application::errors::{BotError, PluginError, UpdateError};

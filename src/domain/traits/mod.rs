//! Domain traits - Abstractions for infrastructure implementations

pub mod bot;
pub mod remote;
pub mod validator;

pub use bot::{Bot, BotInfo};
pub use remote::{ChangeStatus, PluginCatalog, RemoteChange, RemotePluginFile, RemoteSource};
pub use validator::PluginValidator;

//! Domain layer - Core business objects and the seams to the outside world
//! 
//! This layer contains:
//! - Entities: Core business objects (User, Message, Command, Sanction)
//! - Traits: Abstractions for infrastructure (Bot, RemoteSource, PluginValidator)

pub mod entities;
pub mod traits;

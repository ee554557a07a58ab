//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Errors: Domain-specific errors
//! - Messaging: Command parsing
//! - Services: Command dispatch
//! - Update: Remote sync engine

pub mod errors;
pub mod messaging;
pub mod services;
pub mod update;

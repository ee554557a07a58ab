//! Domain entities - Core business objects with no external dependencies

pub mod user;
pub mod message;
pub mod command;
pub mod sanction;

pub use user::User;
pub use message::{Message, Content};
pub use command::{Command, CommandHandler, CommandRegistry};
pub use sanction::{AuditEntry, ExpiryCounts, Sanction, SanctionKind, UserHistory};

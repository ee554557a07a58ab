//! Message handling - turns raw text into structured messages

pub mod parser;

pub use parser::MessageParser;

//! Message parser - Parses raw messages into structured messages

use crate::domain::entities::{Content, Message, User};

/// Parses incoming text into [`Message`]s, splitting prefix commands
pub struct MessageParser {
    command_prefix: String,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.command_prefix
    }

    /// Parse a text message
    pub fn parse(&self, channel_id: impl Into<String>, text: &str, author: Option<User>) -> Message {
        let content = self.parse_content(text);
        Message::new(channel_id, content).with_author_opt(author)
    }

    fn parse_content(&self, text: &str) -> Content {
        let text = text.trim();
        if text.is_empty() {
            return Content::Empty;
        }

        let Some(rest) = text.strip_prefix(self.command_prefix.as_str()) else {
            return Content::Text(text.to_string());
        };

        let mut parts = rest.split_whitespace();
        match parts.next() {
            Some(name) => Content::Command {
                name: name.to_lowercase(),
                args: parts.map(str::to_string).collect(),
            },
            // A lone prefix is just text
            None => Content::Text(text.to_string()),
        }
    }
}

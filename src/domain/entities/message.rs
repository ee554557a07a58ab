use super::User;
use chrono::{DateTime, Utc};

/// Message content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Command { name: String, args: Vec<String> },
    Empty,
}

impl Content {
    pub fn text(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_command(&self) -> bool {
        matches!(self, Content::Command { .. })
    }
}

/// An incoming message routed to the command dispatcher
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub guild_id: Option<i64>,
    pub channel_id: String,
    pub author: Option<User>,
    pub content: Content,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(channel_id: impl Into<String>, content: Content) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            guild_id: None,
            channel_id: channel_id.into(),
            author: None,
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn from_text(channel_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(channel_id, Content::Text(text.into()))
    }

    pub fn from_command(channel_id: impl Into<String>, name: impl Into<String>, args: Vec<String>) -> Self {
        Self::new(channel_id, Content::Command { name: name.into(), args })
    }

    pub fn with_author(mut self, user: User) -> Self {
        self.author = Some(user);
        self
    }

    pub fn with_author_opt(mut self, user: Option<User>) -> Self {
        self.author = user;
        self
    }

    pub fn with_guild(mut self, guild_id: i64) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    /// Arguments of a command message; empty for anything else
    pub fn args(&self) -> &[String] {
        match &self.content {
            Content::Command { args, .. } => args,
            _ => &[],
        }
    }
}

use async_trait::async_trait;
use crate::application::errors::BotError;
use crate::domain::entities::Message;

/// Bot trait - abstraction for messaging platform adapters
#[async_trait]
pub trait Bot: Send + Sync {
    /// Start the bot
    async fn start(&self) -> Result<(), BotError>;

    /// Wait for the next incoming message; `None` once the adapter is closed
    async fn next_message(&self) -> Option<Message>;

    /// Send a message to a channel
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, BotError>;

    /// Get bot info
    fn bot_info(&self) -> BotInfo;
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    pub username: String,
}

//! Console adapter for development/testing

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::Mutex;

use crate::application::errors::BotError;
use crate::domain::entities::{Message, User};
use crate::domain::traits::{Bot, BotInfo};

pub const CONSOLE_CHANNEL: &str = "console";
/// Guild ID used for everything typed at the console
pub const CONSOLE_GUILD: i64 = 0;

type LineSource = Lines<Box<dyn AsyncBufRead + Unpin + Send>>;

/// Console bot adapter for local development.
///
/// Every line read is a message from `author` in the console guild.
pub struct ConsoleAdapter {
    info: BotInfo,
    author: User,
    lines: Mutex<LineSource>,
}

impl ConsoleAdapter {
    /// Read from stdin, speaking as `author`
    pub fn new(author: User) -> Self {
        Self::with_reader(author, BufReader::new(tokio::io::stdin()))
    }

    pub fn with_reader(author: User, reader: impl AsyncBufRead + Unpin + Send + 'static) -> Self {
        let reader: Box<dyn AsyncBufRead + Unpin + Send> = Box::new(reader);
        Self {
            info: BotInfo {
                id: "console".to_string(),
                name: "flexcore".to_string(),
                username: "console".to_string(),
            },
            author,
            lines: Mutex::new(reader.lines()),
        }
    }
}

#[async_trait]
impl Bot for ConsoleAdapter {
    async fn start(&self) -> Result<(), BotError> {
        tracing::info!("Starting console bot (dev mode), type commands below");
        Ok(())
    }

    async fn next_message(&self) -> Option<Message> {
        let mut lines = self.lines.lock().await;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    return Some(
                        Message::from_text(CONSOLE_CHANNEL, line.trim())
                            .with_author(self.author.clone())
                            .with_guild(CONSOLE_GUILD),
                    )
                }
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(error = %e, "Console read failed");
                    return None;
                }
            }
        }
    }

    async fn send_message(&self, _channel_id: &str, text: &str) -> Result<String, BotError> {
        println!("[BOT] {}", text);
        Ok("console_msg".to_string())
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}

use crate::application::errors::CommandError;
use crate::application::messaging::MessageParser;
use crate::domain::entities::{Command, CommandRegistry, Content, Message, User};

/// Host command-dispatch surface: built-in commands plus whatever plugins register
pub struct CommandService {
    registry: CommandRegistry,
    parser: MessageParser,
}

impl CommandService {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            registry: CommandRegistry::new(),
            parser: MessageParser::new(prefix),
        }
    }

    pub fn register(&mut self, command: Command) -> Result<(), CommandError> {
        tracing::debug!(command = %command.name, plugin = ?command.plugin, "Registering command");
        self.registry.register(command)
    }

    /// Register a plugin's capability set, tagging each command with the plugin id
    pub fn register_plugin(&mut self, plugin: &str, commands: Vec<Command>) -> Result<usize, CommandError> {
        let mut count = 0;
        for command in commands {
            if let Err(e) = self.register(command.owned_by(plugin)) {
                // Roll back so a plugin is either fully registered or not at all
                self.registry.unregister_plugin(plugin);
                return Err(e);
            }
            count += 1;
        }
        tracing::info!(plugin = %plugin, commands = count, "Registered plugin commands");
        Ok(count)
    }

    pub fn unregister_plugin(&mut self, plugin: &str) -> usize {
        self.registry.unregister_plugin(plugin)
    }

    pub fn register_defaults(&mut self) {
        let version = Command::new("version")
            .with_description("Show bot version")
            .with_handler(|_| Ok(format!("flexcore v{}", env!("CARGO_PKG_VERSION"))));
        if let Err(e) = self.register(version) {
            tracing::warn!(error = %e, "Failed to register default command");
        }
    }

    /// Parse raw text and dispatch it
    pub fn handle_text(&self, channel_id: &str, text: &str, author: Option<User>, guild_id: Option<i64>) -> Result<Option<String>, CommandError> {
        let mut message = self.parser.parse(channel_id, text, author);
        message.guild_id = guild_id;
        self.handle(&message)
    }

    pub fn handle(&self, message: &Message) -> Result<Option<String>, CommandError> {
        let Content::Command { name, .. } = &message.content else {
            return Ok(None);
        };

        if name == "help" {
            let topic = message.args().first().map(String::as_str);
            return Ok(Some(self.get_help(topic)));
        }

        let cmd = self.registry.find(name)
            .ok_or_else(|| CommandError::NotFound(name.clone()))?;

        if let Some(handler) = &cmd.handler {
            Ok(Some(handler(message)?))
        } else {
            Ok(Some(format!("Command {} not implemented", cmd.name)))
        }
    }

    pub fn get_help(&self, command: Option<&str>) -> String {
        let prefix = self.parser.prefix();
        if let Some(name) = command {
            if let Some(cmd) = self.registry.find(name) {
                let mut help = format!("{}{} - {}", prefix, cmd.name, cmd.description.as_deref().unwrap_or("No description"));
                if let Some(usage) = &cmd.usage {
                    help.push_str(&format!("\nUsage: {}", usage));
                }
                return help;
            }
            return format!("Command {}{} not found", prefix, name);
        }

        let mut help = "Available commands:\n".to_string();
        help.push_str(&format!("  {}help - Show this message\n", prefix));
        for cmd in self.registry.all() {
            help.push_str(&format!("  {}{} - {}\n", prefix, cmd.name, cmd.description.as_deref().unwrap_or("")));
        }
        help
    }

    pub fn prefix(&self) -> &str {
        self.parser.prefix()
    }

    pub fn command_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_plugin_command() {
        let mut service = CommandService::new("!");
        service.register_defaults();
        service
            .register_plugin(
                "echo",
                vec![Command::new("echo").with_handler(|m| Ok(m.args().join(" ")))],
            )
            .unwrap();

        let reply = service.handle_text("c", "!echo hi there", None, None).unwrap();
        assert_eq!(reply.as_deref(), Some("hi there"));
        assert!(service.handle_text("c", "just chatting", None, None).unwrap().is_none());
        assert!(matches!(
            service.handle_text("c", "!nope", None, None),
            Err(CommandError::NotFound(_))
        ));
    }

    #[test]
    fn test_conflicting_plugin_is_rolled_back() {
        let mut service = CommandService::new("!");
        service.register_plugin("a", vec![Command::new("ping")]).unwrap();
        let err = service.register_plugin("b", vec![Command::new("pong"), Command::new("ping")]);
        assert!(err.is_err());
        assert_eq!(service.command_count(), 1);
    }

    #[test]
    fn test_help_lists_commands() {
        let mut service = CommandService::new("?");
        service.register_defaults();
        let help = service.handle_text("c", "?help", None, None).unwrap().unwrap();
        assert!(help.contains("?version"));
        let one = service.get_help(Some("version"));
        assert!(one.starts_with("?version"));
    }
}

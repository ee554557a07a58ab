use std::collections::BTreeMap;
use std::sync::Arc;

use crate::application::errors::CommandError;
use crate::domain::entities::Message;

/// Command handler function type
pub type CommandHandler = Arc<dyn Fn(&Message) -> Result<String, CommandError> + Send + Sync>;

/// A command exposed to users, optionally owned by a plugin
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub description: Option<String>,
    pub aliases: Vec<String>,
    pub usage: Option<String>,
    /// Identifier of the plugin that contributed the command
    pub plugin: Option<String>,
    pub handler: Option<CommandHandler>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            aliases: Vec::new(),
            usage: None,
            plugin: None,
            handler: None,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn owned_by(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Message) -> Result<String, CommandError> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Case-insensitive match on name or alias
    pub fn matches(&self, input: &str) -> bool {
        self.name.eq_ignore_ascii_case(input) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(input))
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("plugin", &self.plugin)
            .finish()
    }
}

/// Command registry for managing available commands
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command; names and aliases must not collide with existing ones
    pub fn register(&mut self, command: Command) -> Result<(), CommandError> {
        let taken = std::iter::once(&command.name)
            .chain(command.aliases.iter())
            .find(|n| self.find(n).is_some());
        if let Some(name) = taken {
            return Err(CommandError::ExecutionFailed(format!("Command '{}' already registered", name)));
        }
        self.commands.insert(command.name.to_lowercase(), command);
        Ok(())
    }

    /// Remove every command contributed by `plugin`, returning how many were dropped
    pub fn unregister_plugin(&mut self, plugin: &str) -> usize {
        let before = self.commands.len();
        self.commands.retain(|_, c| c.plugin.as_deref() != Some(plugin));
        before - self.commands.len()
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(&name.to_lowercase())
    }

    pub fn find(&self, input: &str) -> Option<&Command> {
        self.get(input).or_else(|| self.commands.values().find(|c| c.matches(input)))
    }

    pub fn all(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_collision_rejected() {
        let mut registry = CommandRegistry::new();
        registry
            .register(Command::new("ban").with_aliases(vec!["b".into()]))
            .unwrap();
        assert!(registry.register(Command::new("B")).is_err());
        assert!(registry.find("b").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_plugin_commands() {
        let mut registry = CommandRegistry::new();
        registry.register(Command::new("warn").owned_by("moderation")).unwrap();
        registry.register(Command::new("kick").owned_by("moderation")).unwrap();
        registry.register(Command::new("help")).unwrap();

        assert_eq!(registry.unregister_plugin("moderation"), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("help").is_some());
    }
}

//! Translation catalog
//!
//! Strings live in `lang/<code>.json` as nested objects addressed with dotted
//! keys. Anything missing falls back to the built-in English strings, and
//! finally to the key itself.

use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::path::Path;

use crate::application::errors::CommandError;
use crate::infrastructure::storage::read_json;

pub const SUPPORTED_LANGUAGES: &[&str] = &["eng", "ita"];
pub const DEFAULT_LANGUAGE: &str = "eng";

static BUILTIN: Lazy<Value> = Lazy::new(|| {
    json!({
        "bot": {
            "starting": "Starting flexcore v{version}",
            "ready": "Ready with prefix {prefix} ({commands} commands)",
            "update_available": "Update available: {local} -> {remote}. Run `flexcore update` to apply it.",
            "no_permission": "You are not allowed to use this command.",
            "unknown_command": "Unknown command {prefix}{command}, try {prefix}help",
            "command_failed": "Error: {error}"
        },
        "validation": {
            "core_missing_title": "Core configuration missing",
            "core_missing": "{file} was not found. Run `flexcore init-config` and fill it in.",
            "core_invalid_title": "Core configuration is invalid",
            "corrupt": "{file} is not valid JSON: {error}",
            "missing_keys": "{file} is missing required keys: {keys}",
            "empty_values": "{file} has empty values for: {keys}",
            "plugin_invalid_title": "Configuration of plugin '{plugin}' is invalid",
            "staff_roles": "staff_roles must be a non-empty list of role IDs",
            "numeric_id": "{key} must be a numeric ID"
        },
        "moderation": {
            "guild_only": "This command only works inside a server.",
            "warned": "Warned {user} (warn #{id}, {count} total).",
            "unwarned": "Removed a warn from {user}.",
            "no_warns": "{user} has no warns.",
            "banned": "Banned {user} ({duration}).",
            "unbanned": "Unbanned {user}.",
            "muted": "Muted {user} ({duration}).",
            "unmuted": "Unmuted {user}.",
            "kicked": "Kicked {user}.",
            "not_found": "Nothing to remove for {user}.",
            "permanent": "permanent",
            "bad_duration": "Invalid duration {value}: use 1s up to {max}"
        }
    })
});

/// Loaded language strings plus the built-in English fallback
#[derive(Debug, Clone)]
pub struct Catalog {
    language: String,
    strings: Value,
}

impl Catalog {
    /// Load `dir/<lang>.json`. Unsupported languages fall back to English,
    /// unreadable files to the built-in strings.
    pub fn load(dir: impl AsRef<Path>, lang: &str) -> Self {
        let language = if SUPPORTED_LANGUAGES.contains(&lang) {
            lang.to_string()
        } else {
            tracing::warn!(language = %lang, "Unsupported language, using {}", DEFAULT_LANGUAGE);
            DEFAULT_LANGUAGE.to_string()
        };

        let path = dir.as_ref().join(format!("{}.json", language));
        let strings = match read_json::<Value>(&path) {
            Ok(Some(strings)) => strings,
            Ok(None) => {
                tracing::debug!(path = %path.display(), "Language file missing, using built-in strings");
                Value::Null
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Language file unreadable, using built-in strings");
                Value::Null
            }
        };

        Self { language, strings }
    }

    /// Built-in English strings only
    pub fn builtin() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            strings: Value::Null,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Look up `key` and substitute `{name}` placeholders
    pub fn get(&self, key: &str, args: &[(&str, &str)]) -> String {
        let template = lookup(&self.strings, key)
            .or_else(|| lookup(&BUILTIN, key))
            .unwrap_or(key);

        args.iter().fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name), value)
        })
    }

    /// User-facing reply for a failed command
    pub fn command_error(&self, prefix: &str, error: &CommandError) -> String {
        match error {
            CommandError::PermissionDenied => self.get("bot.no_permission", &[]),
            CommandError::NotFound(name) => {
                self.get("bot.unknown_command", &[("prefix", prefix), ("command", name)])
            }
            other => self.get("bot.command_failed", &[("error", &other.to_string())]),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a str> {
    key.split('.')
        .try_fold(root, |node, part| node.get(part))
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_lookup_and_format() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.get("moderation.kicked", &[("user", "<@1>")]),
            "Kicked <@1>."
        );
    }

    #[test]
    fn test_command_errors_are_translated() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("ita.json"),
            r#"{"bot": {"no_permission": "Non hai il permesso."}}"#,
        )
        .unwrap();

        let catalog = Catalog::load(dir.path(), "ita");
        assert_eq!(catalog.command_error("!", &CommandError::PermissionDenied), "Non hai il permesso.");
        assert_eq!(
            catalog.command_error("!", &CommandError::NotFound("wran".into())),
            "Unknown command !wran, try !help"
        );
        assert_eq!(
            Catalog::builtin().command_error("!", &CommandError::InvalidArgs("ban <user>".into())),
            "Error: Invalid arguments: ban <user>"
        );
    }

    #[test]
    fn test_unknown_key_returns_key() {
        assert_eq!(Catalog::builtin().get("no.such.key", &[]), "no.such.key");
    }

    #[test]
    fn test_language_file_overrides_and_falls_back() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("ita.json"),
            r#"{"moderation": {"kicked": "Espulso {user}."}}"#,
        )
        .unwrap();

        let catalog = Catalog::load(dir.path(), "ita");
        assert_eq!(catalog.language(), "ita");
        assert_eq!(catalog.get("moderation.kicked", &[("user", "x")]), "Espulso x.");
        assert_eq!(catalog.get("moderation.unmuted", &[("user", "x")]), "Unmuted x.");
    }

    #[test]
    fn test_unsupported_language_uses_default() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Catalog::load(dir.path(), "klingon").language(), "eng");
    }
}

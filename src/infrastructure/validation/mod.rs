//! Config validation for the core config and per-plugin config files

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::application::errors::ValidationError;
use crate::domain::traits::PluginValidator;
use crate::infrastructure::config::{AppPaths, REQUIRED_CORE};
use crate::infrastructure::i18n::Catalog;

/// Checks config files against required-key schemas
pub struct SchemaValidator {
    paths: AppPaths,
    catalog: Catalog,
    schemas: BTreeMap<String, Vec<String>>,
}

impl SchemaValidator {
    /// Validator with the schemas of the bundled plugins
    pub fn new(paths: AppPaths, catalog: Catalog) -> Self {
        Self {
            paths,
            catalog,
            schemas: BTreeMap::new(),
        }
        .with_schema("moderation", &["staff_roles", "admin_roles", "rate_limit", "auto_actions"])
        .with_schema("tickets", &["category_id", "support_role_id"])
    }

    pub fn with_schema(mut self, plugin: &str, required: &[&str]) -> Self {
        self.schemas
            .insert(plugin.to_string(), required.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn has_schema(&self, plugin: &str) -> bool {
        self.schemas.contains_key(plugin)
    }

    fn load_object(&self, path: &Path, title: &str) -> Result<Option<Map<String, Value>>, ValidationError> {
        let file = display_name(path);
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ValidationError::new(
                    title,
                    self.catalog.get("validation.corrupt", &[("file", &file), ("error", &e.to_string())]),
                ))
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(_) => Err(ValidationError::new(
                title,
                self.catalog.get("validation.corrupt", &[("file", &file), ("error", "expected an object")]),
            )),
            Err(e) => Err(ValidationError::new(
                title,
                self.catalog.get("validation.corrupt", &[("file", &file), ("error", &e.to_string())]),
            )),
        }
    }

    fn check_keys(&self, path: &Path, map: &Map<String, Value>, required: &[&str], title: &str) -> Result<(), ValidationError> {
        let missing: Vec<&str> = required.iter().copied().filter(|k| !map.contains_key(*k)).collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(ValidationError::new(
            title,
            self.catalog.get(
                "validation.missing_keys",
                &[("file", &display_name(path)), ("keys", &missing.join(", "))],
            ),
        ))
    }

    fn check_moderation_values(&self, map: &Map<String, Value>, title: &str) -> Result<(), ValidationError> {
        let staff_ok = matches!(map.get("staff_roles"), Some(Value::Array(roles)) if !roles.is_empty());
        if !staff_ok {
            return Err(ValidationError::new(title, self.catalog.get("validation.staff_roles", &[])));
        }

        for key in ["log_channel_id", "mute_role_id"] {
            if let Some(value) = map.get(key) {
                if !is_numeric_id(value) {
                    return Err(ValidationError::new(
                        title,
                        self.catalog.get("validation.numeric_id", &[("key", key)]),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl PluginValidator for SchemaValidator {
    fn validate_core(&self) -> Result<(), ValidationError> {
        let path = self.paths.core_config();
        let title = self.catalog.get("validation.core_invalid_title", &[]);

        let Some(map) = self.load_object(&path, &title)? else {
            return Err(ValidationError::new(
                self.catalog.get("validation.core_missing_title", &[]),
                self.catalog.get("validation.core_missing", &[("file", &display_name(&path))]),
            ));
        };

        self.check_keys(&path, &map, REQUIRED_CORE, &title)?;

        let empty: Vec<&str> = REQUIRED_CORE
            .iter()
            .copied()
            .filter(|k| match map.get(*k) {
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(Value::Null) => true,
                _ => false,
            })
            .collect();
        if !empty.is_empty() {
            tracing::warn!(
                "{}",
                self.catalog.get(
                    "validation.empty_values",
                    &[("file", &display_name(&path)), ("keys", &empty.join(", "))]
                )
            );
        }
        Ok(())
    }

    fn validate_plugin(&self, plugin: &str) -> Result<(), ValidationError> {
        let Some(required) = self.schemas.get(plugin) else {
            return Ok(());
        };

        let path = self.paths.plugin_config(plugin);
        let title = self.catalog.get("validation.plugin_invalid_title", &[("plugin", plugin)]);

        let Some(map) = self.load_object(&path, &title)? else {
            tracing::debug!(plugin = %plugin, "No config file, using plugin defaults");
            return Ok(());
        };

        let required: Vec<&str> = required.iter().map(String::as_str).collect();
        self.check_keys(&path, &map, &required, &title)?;

        if plugin == "moderation" {
            self.check_moderation_values(&map, &title)?;
        }
        Ok(())
    }
}

/// Numbers, digit strings and empty values are acceptable IDs
fn is_numeric_id(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Number(n) => n.is_u64() || n.is_i64(),
        Value::String(s) => s.trim().is_empty() || s.trim().chars().all(|c| c.is_ascii_digit()),
        _ => false,
    }
}

fn display_name(path: &Path) -> String {
    let mut parts: Vec<String> = path
        .components()
        .rev()
        .take(2)
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.reverse();
    parts.join("/")
}

//! Protected-path filter

/// Paths automated updates must never touch, out of the box
pub const DEFAULT_PROTECTED: &[&str] = &[
    "config/config.json",
    ".env",
    ".git",
    ".venv",
    "__pycache__",
    "data/",
    "logs/",
    "target/",
    ".update_backups",
    ".last_update_check",
];

/// Ordered set of rules; a path matching any of them is left alone.
///
/// A rule matches when the path starts with it or contains it anywhere, so
/// `data/` also covers `plugins/data/cache.db`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedPaths {
    rules: Vec<String>,
}

impl ProtectedPaths {
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self { rules: Vec::new() };
        set.extend(rules);
        set
    }

    /// Append rules, skipping empties and duplicates
    pub fn extend<I, S>(&mut self, rules: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for rule in rules {
            let rule = rule.into();
            // An empty rule would be a substring of every path
            if rule.is_empty() || self.rules.contains(&rule) {
                continue;
            }
            self.rules.push(rule);
        }
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| path.starts_with(rule.as_str()) || path.contains(rule.as_str()))
    }

    pub fn rules(&self) -> &[String] {
        &self.rules
    }
}

impl Default for ProtectedPaths {
    fn default() -> Self {
        Self::new(DEFAULT_PROTECTED.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let rules = ProtectedPaths::default();
        assert!(rules.is_protected("config/config.json"));
        assert!(rules.is_protected(".env"));
        assert!(rules.is_protected("data/moderation.db"));
        assert!(rules.is_protected("logs/2024-01-01.log"));
        assert!(!rules.is_protected("plugins/moderation.so"));
        assert!(!rules.is_protected("config/moderation.json"));
    }

    #[test]
    fn test_substring_rule_protects_nested_paths() {
        let rules = ProtectedPaths::new(["data/"]);
        assert!(rules.is_protected("data/moderation.db"));
        assert!(rules.is_protected("plugins/extra/data/cache.db"));
        assert!(rules.is_protected("x/y/data/z"));
        assert!(!rules.is_protected("database.rs"));
    }

    #[test]
    fn test_empty_and_duplicate_rules_ignored() {
        let mut rules = ProtectedPaths::new(["", "a/"]);
        rules.extend(["a/", "b/"]);
        assert_eq!(rules.rules(), &["a/".to_string(), "b/".to_string()]);
        assert!(!rules.is_protected("c.txt"));
    }
}

//! Update applier - writes one remote file into the local tree

use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::merge::merge_values;
use crate::application::errors::UpdateError;
use crate::infrastructure::storage::write_atomic;

/// What happened to a file during apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyAction {
    /// File did not exist locally
    Created,
    /// JSON file merged with the local copy
    Merged,
    /// Local file backed up then replaced
    Overwritten,
}

/// Applies remote content beneath an installation root.
#[derive(Debug, Clone)]
pub struct UpdateApplier {
    root: PathBuf,
    backup_dir: PathBuf,
    guarded: Vec<PathBuf>,
}

impl UpdateApplier {
    pub fn new(root: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backup_dir: backup_dir.into(),
            guarded: Vec::new(),
        }
    }

    /// Never overwrite `path`, wherever the remote says it lives
    pub fn guard(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let path = path.canonicalize().unwrap_or(path);
        self.guarded.push(path);
        self
    }

    /// Refuse to replace the executable that is currently running
    pub fn guard_current_exe(self) -> Self {
        match std::env::current_exe() {
            Ok(exe) => self.guard(exe),
            Err(e) => {
                tracing::warn!(error = %e, "Could not resolve current executable");
                self
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Write `content` to the remote-relative `path`.
    ///
    /// `.json` files are smart-merged with the local copy; anything else is
    /// backed up and overwritten.
    pub fn apply(&self, path: &str, content: &[u8]) -> Result<ApplyAction, UpdateError> {
        let target = self.resolve(path)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| UpdateError::io(path, e))?;
        }

        let action = if is_json(path) {
            self.merge_json(path, &target, content)?
        } else {
            self.overwrite(path, &target, content)?
        };

        tracing::info!(path = %path, action = ?action, "Applied update");
        Ok(action)
    }

    /// Copy the current local file into the flat backup directory
    pub fn backup(&self, path: &str) -> Result<Option<PathBuf>, UpdateError> {
        let target = self.resolve(path)?;
        self.backup_target(path, &target)
    }

    /// Backup file name: separators flattened so nested paths never collide
    pub fn backup_name(path: &str) -> String {
        path.replace(['/', '\\'], "_")
    }

    fn backup_target(&self, path: &str, target: &Path) -> Result<Option<PathBuf>, UpdateError> {
        if !target.is_file() {
            return Ok(None);
        }
        fs::create_dir_all(&self.backup_dir).map_err(|e| UpdateError::io(path, e))?;
        let backup_path = self.backup_dir.join(Self::backup_name(path));
        fs::copy(target, &backup_path).map_err(|e| UpdateError::io(path, e))?;
        tracing::debug!(path = %path, backup = %backup_path.display(), "Backed up file");
        Ok(Some(backup_path))
    }

    fn merge_json(&self, path: &str, target: &Path, content: &[u8]) -> Result<ApplyAction, UpdateError> {
        let remote: Value = serde_json::from_slice(content).map_err(|e| UpdateError::InvalidJson {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let local = match fs::read(target) {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Local JSON is corrupt, replacing with remote defaults");
                    self.backup_target(path, target)?;
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(UpdateError::io(path, e)),
        };

        let (merged, action) = match local {
            Some(local) => (merge_values(local, &remote), ApplyAction::Merged),
            None => (remote, ApplyAction::Created),
        };

        let mut bytes = serde_json::to_vec_pretty(&merged).map_err(|e| UpdateError::InvalidJson {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        bytes.push(b'\n');
        write_atomic(target, &bytes).map_err(|e| UpdateError::io(path, e))?;
        Ok(action)
    }

    fn overwrite(&self, path: &str, target: &Path, content: &[u8]) -> Result<ApplyAction, UpdateError> {
        let action = match self.backup_target(path, target)? {
            Some(_) => ApplyAction::Overwritten,
            None => ApplyAction::Created,
        };
        write_atomic(target, content).map_err(|e| UpdateError::io(path, e))?;
        Ok(action)
    }

    /// Map a remote path onto the local tree, rejecting anything that escapes the root
    fn resolve(&self, path: &str) -> Result<PathBuf, UpdateError> {
        let relative = Path::new(path);
        if path.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(UpdateError::UnsafePath(path.to_string()));
        }

        let target = self.root.join(relative);
        if let Ok(canonical) = target.canonicalize() {
            if self.guarded.contains(&canonical) {
                return Err(UpdateError::SelfOverwrite(path.to_string()));
            }
        }
        Ok(target)
    }
}

fn is_json(path: &str) -> bool {
    Path::new(path)
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn applier(dir: &TempDir) -> UpdateApplier {
        UpdateApplier::new(dir.path(), dir.path().join(".update_backups"))
    }

    #[test]
    fn test_new_file_is_created_with_parents() {
        let dir = TempDir::new().unwrap();
        let action = applier(&dir).apply("plugins/extra/hello.so", b"bin").unwrap();
        assert_eq!(action, ApplyAction::Created);
        assert_eq!(fs::read(dir.path().join("plugins/extra/hello.so")).unwrap(), b"bin");
        assert!(!dir.path().join(".update_backups").exists());
    }

    #[test]
    fn test_overwrite_backs_up_previous_content() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("src/bot.rs");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "old").unwrap();

        let action = applier(&dir).apply("src/bot.rs", b"new").unwrap();
        assert_eq!(action, ApplyAction::Overwritten);
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
        let backup = dir.path().join(".update_backups/src_bot.rs");
        assert_eq!(fs::read_to_string(backup).unwrap(), "old");
    }

    #[test]
    fn test_json_merge_keeps_local_values() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("config/moderation.json");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, r#"{"staff_roles": [42], "rate_limit": 5}"#).unwrap();

        let remote = br#"{"staff_roles": [], "rate_limit": 10, "auto_actions": {"warns": 3}}"#;
        let action = applier(&dir).apply("config/moderation.json", remote).unwrap();
        assert_eq!(action, ApplyAction::Merged);

        let merged: Value = serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(
            merged,
            json!({"staff_roles": [42], "rate_limit": 5, "auto_actions": {"warns": 3}})
        );
    }

    #[test]
    fn test_malformed_remote_json_leaves_local_untouched() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("config/tickets.json");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, r#"{"category_id": 1}"#).unwrap();

        let err = applier(&dir).apply("config/tickets.json", b"{oops").unwrap_err();
        assert!(matches!(err, UpdateError::InvalidJson { .. }));
        assert_eq!(fs::read_to_string(&target).unwrap(), r#"{"category_id": 1}"#);
    }

    #[test]
    fn test_corrupt_local_json_is_backed_up_and_replaced() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("lang/eng.json");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "{ broken").unwrap();

        let action = applier(&dir).apply("lang/eng.json", br#"{"a": 1}"#).unwrap();
        assert_eq!(action, ApplyAction::Created);
        assert_eq!(
            fs::read_to_string(dir.path().join(".update_backups/lang_eng.json")).unwrap(),
            "{ broken"
        );
    }

    #[test]
    fn test_paths_escaping_root_are_rejected() {
        let dir = TempDir::new().unwrap();
        let applier = applier(&dir);
        assert!(matches!(applier.apply("../evil.sh", b"x"), Err(UpdateError::UnsafePath(_))));
        assert!(matches!(applier.apply("/etc/passwd", b"x"), Err(UpdateError::UnsafePath(_))));
        assert!(matches!(applier.apply("", b"x"), Err(UpdateError::UnsafePath(_))));
    }

    #[test]
    fn test_guarded_file_is_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("flexcore");
        fs::write(&exe, "running").unwrap();

        let applier = applier(&dir).guard(&exe);
        assert!(matches!(applier.apply("flexcore", b"new"), Err(UpdateError::SelfOverwrite(_))));
        assert_eq!(fs::read_to_string(&exe).unwrap(), "running");
    }

    #[test]
    fn test_backup_name_flattens_separators() {
        assert_eq!(UpdateApplier::backup_name("a/b\\c.py"), "a_b_c.py");
    }
}

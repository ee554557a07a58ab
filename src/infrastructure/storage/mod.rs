//! File-based storage helpers
//!
//! Every write goes through a temp file in the target directory followed by a
//! rename, so a crash mid-write never leaves a truncated config behind.

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::application::errors::StorageError;

/// Atomically replace `path` with `bytes`, creating parent directories.
///
/// Permissions of an existing file are carried over to the replacement.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions())?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read and deserialize a JSON file. A missing file yields `Ok(None)`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&content)?))
}

/// Serialize as pretty JSON (two-space indent) and write atomically.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)?;
    Ok(())
}

/// Last synced revision, as persisted between update cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerState {
    pub last_commit: String,
    #[serde(default)]
    pub last_check: Option<String>,
    /// Paths whose apply failed in the last cycle; retried next time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<String>,
}

impl MarkerState {
    pub fn new(last_commit: impl Into<String>, pending: Vec<String>) -> Self {
        Self {
            last_commit: last_commit.into(),
            last_check: Some(Utc::now().to_rfc3339()),
            pending,
        }
    }
}

/// Persists the [`MarkerState`] in a small JSON file.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    path: PathBuf,
}

impl MarkerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored marker. An unreadable marker file counts as "never synced".
    pub fn load(&self) -> Option<MarkerState> {
        match read_json::<MarkerState>(&self.path) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable marker file");
                None
            }
        }
    }

    pub fn save(&self, state: &MarkerState) -> Result<(), StorageError> {
        write_json(&self.path, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.txt");
        write_atomic(&path, b"hello").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");

        write_atomic(&path, b"bye").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"bye");
    }

    #[test]
    fn test_read_json_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let value: Option<serde_json::Value> = read_json(&dir.path().join("nope.json")).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_marker_roundtrip_and_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let store = MarkerStore::new(dir.path().join(".last_update_check"));
        assert!(store.load().is_none());

        store.save(&MarkerState::new("abc123", vec!["a.py".into()])).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.last_commit, "abc123");
        assert_eq!(loaded.pending, vec!["a.py".to_string()]);

        fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_marker_accepts_legacy_file() {
        let dir = TempDir::new().unwrap();
        let store = MarkerStore::new(dir.path().join(".last_update_check"));
        fs::write(
            store.path(),
            r#"{"last_commit": "deadbeef", "last_check": "2024-05-01T10:00:00.123456"}"#,
        )
        .unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.last_commit, "deadbeef");
        assert!(loaded.pending.is_empty());
    }
}

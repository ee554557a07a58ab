//! Update engine
//!
//! Syncs the installation tree with a remote repository while leaving user
//! configuration and data alone.

pub mod applier;
pub mod merge;
pub mod protected;
pub mod resolver;
pub mod updater;

pub use applier::{ApplyAction, UpdateApplier};
pub use merge::{merge_values, smart_merge};
pub use protected::{ProtectedPaths, DEFAULT_PROTECTED};
pub use resolver::{resolve_changes, ChangeSet};
pub use updater::{ApplyReport, AutoUpdater, UpdateCheck, UpdateOutcome};

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::application::errors::RemoteError;
    use crate::domain::traits::{RemoteChange, RemoteSource};

    /// In-memory remote used by the update engine tests
    pub struct FakeRemote {
        head: String,
        online: bool,
        diff_ok: bool,
        tree: Vec<String>,
        diff: Vec<RemoteChange>,
        files: HashMap<String, Vec<u8>>,
        fetched: Mutex<Vec<String>>,
    }

    impl FakeRemote {
        pub fn new(head: &str) -> Self {
            Self {
                head: head.to_string(),
                online: true,
                diff_ok: true,
                tree: Vec::new(),
                diff: Vec::new(),
                files: HashMap::new(),
                fetched: Mutex::new(Vec::new()),
            }
        }

        pub fn with_tree(mut self, paths: &[&str]) -> Self {
            self.tree = paths.iter().map(|p| p.to_string()).collect();
            self
        }

        pub fn with_diff(mut self, diff: Vec<RemoteChange>) -> Self {
            self.diff = diff;
            self
        }

        pub fn with_file(mut self, path: &str, content: &[u8]) -> Self {
            self.files.insert(path.to_string(), content.to_vec());
            self
        }

        pub fn offline(mut self) -> Self {
            self.online = false;
            self
        }

        pub fn failing_diff(mut self) -> Self {
            self.diff_ok = false;
            self
        }

        pub fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    impl RemoteSource for FakeRemote {
        fn latest_marker(&self) -> Result<String, RemoteError> {
            if self.online {
                Ok(self.head.clone())
            } else {
                Err(RemoteError::Http("offline".into()))
            }
        }

        fn tree(&self, _marker: &str) -> Result<Vec<String>, RemoteError> {
            Ok(self.tree.clone())
        }

        fn diff(&self, _from: &str, _to: &str) -> Result<Vec<RemoteChange>, RemoteError> {
            if self.diff_ok {
                Ok(self.diff.clone())
            } else {
                Err(RemoteError::Status { status: 404, url: "compare".into() })
            }
        }

        fn fetch_file(&self, _marker: &str, path: &str) -> Result<Vec<u8>, RemoteError> {
            self.fetched.lock().unwrap().push(path.to_string());
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| RemoteError::Status { status: 404, url: path.to_string() })
        }
    }

    #[test]
    fn test_resolver_full_tree_on_first_sync() {
        use crate::application::update::resolve_changes;

        let remote = FakeRemote::new("abc").with_tree(&["a.py", "b/c.json", "a.py"]);
        let set = resolve_changes(&remote, None, "abc").unwrap();
        assert_eq!(set.changed, vec!["a.py".to_string(), "b/c.json".to_string()]);
        assert!(set.removed.is_empty());
    }

    #[test]
    fn test_resolver_splits_removals_from_diff() {
        use crate::application::update::resolve_changes;
        use crate::domain::traits::ChangeStatus;

        let remote = FakeRemote::new("new").with_diff(vec![
            RemoteChange::new("a.py", ChangeStatus::Modified),
            RemoteChange::new("old.py", ChangeStatus::Removed),
            RemoteChange::new("moved.py", ChangeStatus::Renamed),
        ]);
        let set = resolve_changes(&remote, Some("old"), "new").unwrap();
        assert_eq!(set.changed, vec!["a.py".to_string(), "moved.py".to_string()]);
        assert_eq!(set.removed, vec!["old.py".to_string()]);
    }
}

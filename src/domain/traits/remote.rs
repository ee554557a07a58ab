use crate::application::errors::RemoteError;

/// How a path changed between two remote revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Added,
    Modified,
    Renamed,
    Copied,
    Removed,
    Changed,
}

impl ChangeStatus {
    /// Parse the status strings used by the GitHub compare API.
    pub fn parse(s: &str) -> Self {
        match s {
            "added" => ChangeStatus::Added,
            "modified" => ChangeStatus::Modified,
            "renamed" => ChangeStatus::Renamed,
            "copied" => ChangeStatus::Copied,
            "removed" => ChangeStatus::Removed,
            _ => ChangeStatus::Changed,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, ChangeStatus::Removed)
    }
}

/// One entry of a remote diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChange {
    pub path: String,
    pub status: ChangeStatus,
}

impl RemoteChange {
    pub fn new(path: impl Into<String>, status: ChangeStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

/// A plugin file offered by the remote plugin store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePluginFile {
    pub name: String,
    pub size: u64,
    pub sha: String,
    pub download_url: String,
}

/// Read-only view of the repository the installation syncs from.
///
/// All calls block; they are only made at startup or from explicit CLI actions.
pub trait RemoteSource: Send + Sync {
    /// Current head marker of the tracked branch
    fn latest_marker(&self) -> Result<String, RemoteError>;

    /// Every blob path in the tree at `marker`
    fn tree(&self, marker: &str) -> Result<Vec<String>, RemoteError>;

    /// File-level diff between two markers
    fn diff(&self, from: &str, to: &str) -> Result<Vec<RemoteChange>, RemoteError>;

    /// Raw content of `path` at `marker`
    fn fetch_file(&self, marker: &str, path: &str) -> Result<Vec<u8>, RemoteError>;
}

/// Remote listing of installable plugins
pub trait PluginCatalog: Send + Sync {
    fn list_plugins(&self) -> Result<Vec<RemotePluginFile>, RemoteError>;

    fn download(&self, file: &RemotePluginFile) -> Result<Vec<u8>, RemoteError>;
}

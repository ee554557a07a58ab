//! GitHub-backed remote source for updates and the plugin store

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::application::errors::RemoteError;
use crate::domain::traits::{ChangeStatus, PluginCatalog, RemoteChange, RemotePluginFile, RemoteSource};

const API_BASE: &str = "https://api.github.com";
const RAW_BASE: &str = "https://raw.githubusercontent.com";
/// The compare API lists at most this many files; a full page may be cut short
const COMPARE_FILE_LIMIT: usize = 300;

#[derive(Deserialize)]
struct CommitInfo {
    sha: String,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    sha: String,
}

#[derive(Deserialize)]
struct CompareResponse {
    #[serde(default)]
    files: Vec<CompareFile>,
}

#[derive(Deserialize)]
struct CompareFile {
    filename: String,
    status: String,
    previous_filename: Option<String>,
}

#[derive(Deserialize)]
struct ContentEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
    sha: String,
    download_url: Option<String>,
}

/// A repository (`owner/name`) at a branch, optionally scoped to a directory
pub struct GitHubSource {
    client: Client,
    repository: String,
    branch: String,
    directory: Option<String>,
}

impl GitHubSource {
    /// Build a client; `GITHUB_TOKEN` is sent as a bearer token when set
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.is_empty() {
                let value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| RemoteError::Http(format!("Invalid GITHUB_TOKEN: {}", e)))?;
                headers.insert(AUTHORIZATION, value);
            }
        }

        let client = Client::builder()
            .user_agent(concat!("flexcore/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        Ok(Self {
            client,
            repository: repository.into(),
            branch: branch.into(),
            directory: None,
        })
    }

    /// Scope plugin listing to a directory of the repository
    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    fn get(&self, url: &str) -> Result<Response, RemoteError> {
        tracing::debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RemoteError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, RemoteError> {
        self.get(url)?
            .json()
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        self.get(url)?
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| RemoteError::Http(e.to_string()))
    }
}

/// Blob paths of a recursive tree listing mapped to their content hash.
/// A truncated listing is an error, never a partial success.
fn tree_blobs(tree: TreeResponse) -> Result<BTreeMap<String, String>, RemoteError> {
    if tree.truncated {
        return Err(RemoteError::Decode("tree listing truncated by the remote".to_string()));
    }
    Ok(tree
        .tree
        .into_iter()
        .filter(|e| e.kind == "blob")
        .map(|e| (e.path, e.sha))
        .collect())
}

/// File changes from a compare response, or `None` when the listing may be capped
fn compare_changes(compare: CompareResponse) -> Option<Vec<RemoteChange>> {
    if compare.files.len() >= COMPARE_FILE_LIMIT {
        return None;
    }

    let mut changes = Vec::with_capacity(compare.files.len());
    for file in compare.files {
        let status = ChangeStatus::parse(&file.status);
        // A rename also removes the old path
        if status == ChangeStatus::Renamed {
            if let Some(previous) = file.previous_filename {
                changes.push(RemoteChange::new(previous, ChangeStatus::Removed));
            }
        }
        changes.push(RemoteChange::new(file.filename, status));
    }
    Some(changes)
}

/// Diff two full tree listings by blob hash
fn tree_changes(old: &BTreeMap<String, String>, new: &BTreeMap<String, String>) -> Vec<RemoteChange> {
    let mut changes: Vec<RemoteChange> = new
        .iter()
        .filter_map(|(path, sha)| match old.get(path) {
            None => Some(RemoteChange::new(path.clone(), ChangeStatus::Added)),
            Some(previous) if previous != sha => Some(RemoteChange::new(path.clone(), ChangeStatus::Modified)),
            Some(_) => None,
        })
        .collect();
    changes.extend(
        old.keys()
            .filter(|path| !new.contains_key(*path))
            .map(|path| RemoteChange::new(path.clone(), ChangeStatus::Removed)),
    );
    changes
}

/// Raw content URL with every path segment percent-encoded
fn raw_url(repository: &str, marker: &str, path: &str) -> Result<Url, RemoteError> {
    let mut url = Url::parse(RAW_BASE).map_err(|e| RemoteError::Http(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| RemoteError::Http(format!("{} cannot take a path", RAW_BASE)))?
        .extend(repository.split('/'))
        .push(marker)
        .extend(path.split('/'));
    Ok(url)
}

impl GitHubSource {
    fn blobs(&self, marker: &str) -> Result<BTreeMap<String, String>, RemoteError> {
        let url = format!("{}/repos/{}/git/trees/{}?recursive=1", API_BASE, self.repository, marker);
        tree_blobs(self.get_json(&url)?)
    }
}

impl RemoteSource for GitHubSource {
    fn latest_marker(&self) -> Result<String, RemoteError> {
        let url = format!("{}/repos/{}/commits/{}", API_BASE, self.repository, self.branch);
        let commit: CommitInfo = self.get_json(&url)?;
        Ok(commit.sha)
    }

    fn tree(&self, marker: &str) -> Result<Vec<String>, RemoteError> {
        Ok(self.blobs(marker)?.into_keys().collect())
    }

    fn diff(&self, from: &str, to: &str) -> Result<Vec<RemoteChange>, RemoteError> {
        let url = format!("{}/repos/{}/compare/{}...{}", API_BASE, self.repository, from, to);
        if let Some(changes) = compare_changes(self.get_json(&url)?) {
            return Ok(changes);
        }

        tracing::info!(from = %from, to = %to, "Compare listing at its file limit, diffing full trees");
        Ok(tree_changes(&self.blobs(from)?, &self.blobs(to)?))
    }

    fn fetch_file(&self, marker: &str, path: &str) -> Result<Vec<u8>, RemoteError> {
        let url = raw_url(&self.repository, marker, path)?;
        self.get_bytes(url.as_str())
    }
}

impl PluginCatalog for GitHubSource {
    fn list_plugins(&self) -> Result<Vec<RemotePluginFile>, RemoteError> {
        let directory = self.directory.as_deref().unwrap_or("");
        let url = format!(
            "{}/repos/{}/contents/{}?ref={}",
            API_BASE, self.repository, directory, self.branch
        );
        let entries: Vec<ContentEntry> = self.get_json(&url)?;

        Ok(entries
            .into_iter()
            .filter(|e| e.kind == "file" && !e.name.starts_with('_'))
            .filter_map(|e| {
                let download_url = e.download_url?;
                Some(RemotePluginFile {
                    name: e.name,
                    size: e.size,
                    sha: e.sha,
                    download_url,
                })
            })
            .collect())
    }

    fn download(&self, file: &RemotePluginFile) -> Result<Vec<u8>, RemoteError> {
        self.get_bytes(&file.download_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> TreeResponse {
        serde_json::from_value(value).unwrap()
    }

    fn compare(value: serde_json::Value) -> CompareResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_truncated_tree_is_an_error() {
        let listing = tree(json!({
            "truncated": true,
            "tree": [{"path": "bot.py", "type": "blob", "sha": "a1"}]
        }));
        assert!(matches!(tree_blobs(listing), Err(RemoteError::Decode(_))));

        let listing = tree(json!({
            "tree": [
                {"path": "bot.py", "type": "blob", "sha": "a1"},
                {"path": "plugins", "type": "tree", "sha": "b2"}
            ]
        }));
        let blobs = tree_blobs(listing).unwrap();
        assert_eq!(blobs.keys().collect::<Vec<_>>(), vec!["bot.py"]);
    }

    #[test]
    fn test_compare_at_file_limit_is_not_trusted() {
        let files: Vec<_> = (0..COMPARE_FILE_LIMIT)
            .map(|i| json!({"filename": format!("f{}.txt", i), "status": "modified"}))
            .collect();
        assert!(compare_changes(compare(json!({ "files": files }))).is_none());

        let changes = compare_changes(compare(json!({
            "files": [{"filename": "new.py", "status": "renamed", "previous_filename": "old.py"}]
        })))
        .unwrap();
        assert_eq!(
            changes,
            vec![
                RemoteChange::new("old.py", ChangeStatus::Removed),
                RemoteChange::new("new.py", ChangeStatus::Renamed),
            ]
        );
    }

    #[test]
    fn test_tree_changes_by_hash() {
        let old = BTreeMap::from([
            ("same.py".to_string(), "1".to_string()),
            ("edited.py".to_string(), "2".to_string()),
            ("gone.py".to_string(), "3".to_string()),
        ]);
        let new = BTreeMap::from([
            ("same.py".to_string(), "1".to_string()),
            ("edited.py".to_string(), "9".to_string()),
            ("added.py".to_string(), "4".to_string()),
        ]);

        assert_eq!(
            tree_changes(&old, &new),
            vec![
                RemoteChange::new("added.py", ChangeStatus::Added),
                RemoteChange::new("edited.py", ChangeStatus::Modified),
                RemoteChange::new("gone.py", ChangeStatus::Removed),
            ]
        );
    }

    #[test]
    fn test_raw_url_encodes_path_segments() {
        let url = raw_url("owner/repo", "abc123", "docs/a#b?c.md").unwrap();
        assert_eq!(
            url.as_str(),
            "https://raw.githubusercontent.com/owner/repo/abc123/docs/a%23b%3Fc.md"
        );
    }
}

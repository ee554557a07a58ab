//! Remote change resolver

use crate::application::errors::UpdateError;
use crate::domain::traits::RemoteSource;

/// Paths touched between two remote revisions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Added, modified, renamed or copied paths, in remote order
    pub changed: Vec<String>,
    /// Paths deleted upstream. They are reported, never removed locally.
    pub removed: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Work out which files need syncing to reach `new_marker`.
///
/// Without a previous marker this is the whole tree at `new_marker`; otherwise
/// it is the file-level diff. Network and decode failures surface as
/// [`UpdateError::Resolve`] so "no changes" is never confused with "unknown".
pub fn resolve_changes<S: RemoteSource + ?Sized>(
    source: &S,
    previous_marker: Option<&str>,
    new_marker: &str,
) -> Result<ChangeSet, UpdateError> {
    let mut set = ChangeSet::default();

    match previous_marker {
        None => {
            tracing::info!(marker = %new_marker, "First sync, listing full remote tree");
            let paths = source.tree(new_marker).map_err(UpdateError::Resolve)?;
            for path in paths {
                push_unique(&mut set.changed, path);
            }
        }
        Some(previous) => {
            tracing::info!(from = %previous, to = %new_marker, "Comparing remote revisions");
            let diff = source.diff(previous, new_marker).map_err(UpdateError::Resolve)?;
            for change in diff {
                if change.status.is_removal() {
                    push_unique(&mut set.removed, change.path);
                } else {
                    push_unique(&mut set.changed, change.path);
                }
            }
        }
    }

    tracing::debug!(changed = set.changed.len(), removed = set.removed.len(), "Resolved remote changes");
    Ok(set)
}

fn push_unique(list: &mut Vec<String>, path: String) {
    if !list.contains(&path) {
        list.push(path);
    }
}

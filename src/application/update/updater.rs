//! Auto-updater - one sync cycle against the remote repository

use super::applier::UpdateApplier;
use super::protected::ProtectedPaths;
use super::resolver::{resolve_changes, ChangeSet};
use crate::application::errors::UpdateError;
use crate::domain::traits::RemoteSource;
use crate::infrastructure::storage::{MarkerState, MarkerStore};

/// Per-file results of an apply cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub previous: Option<String>,
    pub marker: String,
    pub attempted: usize,
    pub updated: Vec<String>,
    pub failed: Vec<String>,
    pub skipped_protected: Vec<String>,
    pub removed_upstream: Vec<String>,
}

/// Result of [`AutoUpdater::check_and_apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Stored marker already matches the remote head
    UpToDate { marker: String },
    /// Remote moved but every changed path was protected (or nothing changed)
    NothingToApply {
        marker: String,
        skipped_protected: Vec<String>,
        removed_upstream: Vec<String>,
    },
    Applied(ApplyReport),
}

impl UpdateOutcome {
    /// The service should be restarted to pick up new files
    pub fn restart_recommended(&self) -> bool {
        matches!(self, UpdateOutcome::Applied(report) if !report.updated.is_empty())
    }

    pub fn marker(&self) -> &str {
        match self {
            UpdateOutcome::UpToDate { marker } => marker,
            UpdateOutcome::NothingToApply { marker, .. } => marker,
            UpdateOutcome::Applied(report) => &report.marker,
        }
    }
}

/// Result of a read-only [`AutoUpdater::check_only`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheck {
    pub local: Option<String>,
    pub remote: String,
    pub pending: usize,
}

impl UpdateCheck {
    pub fn is_up_to_date(&self) -> bool {
        self.local.as_deref() == Some(self.remote.as_str()) && self.pending == 0
    }
}

/// Ties marker comparison, change resolution, filtering and apply together.
pub struct AutoUpdater<S: RemoteSource> {
    source: S,
    protected: ProtectedPaths,
    applier: UpdateApplier,
    markers: MarkerStore,
}

impl<S: RemoteSource> AutoUpdater<S> {
    pub fn new(source: S, protected: ProtectedPaths, applier: UpdateApplier, markers: MarkerStore) -> Self {
        Self {
            source,
            protected,
            applier,
            markers,
        }
    }

    pub fn protected(&self) -> &ProtectedPaths {
        &self.protected
    }

    /// Compare stored and remote markers without touching any file
    pub fn check_only(&self) -> Result<UpdateCheck, UpdateError> {
        let remote = self.source.latest_marker().map_err(UpdateError::CouldNotCheck)?;
        let stored = self.markers.load();
        Ok(UpdateCheck {
            local: stored.as_ref().map(|s| s.last_commit.clone()),
            remote,
            pending: stored.map(|s| s.pending.len()).unwrap_or(0),
        })
    }

    /// Run one full update cycle.
    ///
    /// The stored marker only moves after a cycle completes. Files that fail to
    /// download or apply are kept as pending and retried on the next cycle.
    pub fn check_and_apply(&self) -> Result<UpdateOutcome, UpdateError> {
        tracing::info!("Checking for updates");
        let remote = self.source.latest_marker().map_err(UpdateError::CouldNotCheck)?;

        let stored = self.markers.load();
        let previous = stored.as_ref().map(|s| s.last_commit.clone());
        let pending = stored.map(|s| s.pending).unwrap_or_default();
        let same_marker = previous.as_deref() == Some(remote.as_str());

        if same_marker && pending.is_empty() {
            tracing::info!(marker = %short(&remote), "Already up to date");
            return Ok(UpdateOutcome::UpToDate { marker: remote });
        }

        match &previous {
            Some(prev) if !same_marker => {
                tracing::info!(local = %short(prev), remote = %short(&remote), "New updates available")
            }
            Some(_) => tracing::info!(pending = pending.len(), "Retrying files that failed last cycle"),
            None => tracing::info!(remote = %short(&remote), "First sync with remote"),
        }

        let changes = if same_marker {
            ChangeSet::default()
        } else {
            resolve_changes(&self.source, previous.as_deref(), &remote)?
        };

        let ChangeSet { mut changed, removed } = changes;
        for path in pending {
            if !changed.contains(&path) && !removed.contains(&path) {
                changed.push(path);
            }
        }

        if !removed.is_empty() {
            tracing::warn!(count = removed.len(), files = ?removed, "Files removed upstream are kept locally");
        }

        let (skipped_protected, to_apply): (Vec<String>, Vec<String>) =
            changed.into_iter().partition(|p| self.protected.is_protected(p));

        for path in &skipped_protected {
            tracing::debug!(path = %path, "Skipping protected path");
        }

        if to_apply.is_empty() {
            tracing::info!(protected = skipped_protected.len(), "Nothing to apply");
            self.markers.save(&MarkerState::new(remote.clone(), Vec::new()))?;
            return Ok(UpdateOutcome::NothingToApply {
                marker: remote,
                skipped_protected,
                removed_upstream: removed,
            });
        }

        tracing::info!(count = to_apply.len(), "Applying updates");
        let mut updated = Vec::new();
        let mut failed = Vec::new();
        for path in &to_apply {
            let result = self
                .source
                .fetch_file(&remote, path)
                .map_err(|source| UpdateError::Download {
                    path: path.clone(),
                    source,
                })
                .and_then(|content| self.applier.apply(path, &content));

            match result {
                Ok(_) => updated.push(path.clone()),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Failed to update file");
                    failed.push(path.clone());
                }
            }
        }

        self.markers.save(&MarkerState::new(remote.clone(), failed.clone()))?;

        tracing::info!(
            updated = updated.len(),
            attempted = to_apply.len(),
            failed = failed.len(),
            "Update complete"
        );

        Ok(UpdateOutcome::Applied(ApplyReport {
            previous,
            marker: remote,
            attempted: to_apply.len(),
            updated,
            failed,
            skipped_protected,
            removed_upstream: removed,
        }))
    }
}

fn short(marker: &str) -> &str {
    marker.get(..8).unwrap_or(marker)
}

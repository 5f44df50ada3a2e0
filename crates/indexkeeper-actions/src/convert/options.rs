//! Options for the storage-tier conversion

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ActionError, ActionResult};
use crate::poller::BoundedPoller;

/// Options accepted by [`ConvertToRemote`](super::ConvertToRemote)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConvertOptions {
    /// Repository holding the snapshot
    #[serde(default)]
    pub repository: Option<String>,

    /// Snapshot name; strftime escapes are expanded once, in UTC
    #[serde(default)]
    pub snapshot_name: Option<String>,

    /// Restore from an existing snapshot instead of creating one
    #[serde(default)]
    pub use_existing_snapshot: bool,

    /// Create one snapshot per index, sequentially
    #[serde(default)]
    pub snapshot_per_index: bool,

    /// Repository backing the remote storage tier; restores carry the storage directive when set
    #[serde(default)]
    pub remote_store_repository: Option<String>,

    /// Appended to each source name to build the restored index name
    #[serde(default = "default_suffix")]
    pub remote_index_suffix: String,

    /// Point an alias at every restored index
    #[serde(default = "default_true")]
    pub create_alias: bool,

    /// Alias to create instead of the source name; single index only
    #[serde(default)]
    pub alias_name: Option<String>,

    /// Delete source indices once the targets are verified
    #[serde(default)]
    pub delete_after: bool,

    /// Compare document counts between sources and targets
    #[serde(default = "default_true")]
    pub verify_availability: bool,

    /// Fail verification when a target reports no stats instead of skipping it
    #[serde(default)]
    pub strict_verification: bool,

    /// Forwarded to snapshot and restore requests
    #[serde(default)]
    pub ignore_unavailable: bool,

    /// Forwarded to snapshot and restore requests; also accepts PARTIAL snapshots
    #[serde(default)]
    pub partial: bool,

    /// Wait for snapshots and restores to complete
    #[serde(default = "default_true")]
    pub wait_for_completion: bool,

    /// Seconds between completion checks
    #[serde(default = "default_wait_interval")]
    pub wait_interval: u64,

    /// Seconds to wait for completion; -1 waits forever
    #[serde(default = "default_max_wait")]
    pub max_wait: i64,

    /// Skip the repository `_verify` call before snapshot and restore
    #[serde(default = "default_true")]
    pub skip_repo_fs_check: bool,

    /// Seconds between checks while waiting for the previous per-index snapshot
    #[serde(default = "default_pacing_interval")]
    pub pacing_interval: u64,

    /// Seconds to wait for the previous per-index snapshot; -1 waits forever
    #[serde(default = "default_pacing_max_wait")]
    pub pacing_max_wait: i64,

    /// Seconds to wait after deleting sources before checking they are gone
    #[serde(default = "default_delete_grace_period")]
    pub delete_grace_period: u64,
}

fn default_true() -> bool {
    true
}

fn default_suffix() -> String {
    "_remote".to_string()
}

fn default_wait_interval() -> u64 {
    9
}

fn default_max_wait() -> i64 {
    -1
}

fn default_pacing_interval() -> u64 {
    10
}

fn default_pacing_max_wait() -> i64 {
    600
}

fn default_delete_grace_period() -> u64 {
    2
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            repository: None,
            snapshot_name: None,
            use_existing_snapshot: false,
            snapshot_per_index: false,
            remote_store_repository: None,
            remote_index_suffix: default_suffix(),
            create_alias: true,
            alias_name: None,
            delete_after: false,
            verify_availability: true,
            strict_verification: false,
            ignore_unavailable: false,
            partial: false,
            wait_for_completion: true,
            wait_interval: default_wait_interval(),
            max_wait: default_max_wait(),
            skip_repo_fs_check: true,
            pacing_interval: default_pacing_interval(),
            pacing_max_wait: default_pacing_max_wait(),
            delete_grace_period: default_delete_grace_period(),
        }
    }
}

impl ConvertOptions {
    /// Options with the two required fields set
    pub fn new(repository: impl Into<String>, snapshot_name: impl Into<String>) -> Self {
        Self {
            repository: Some(repository.into()),
            snapshot_name: Some(snapshot_name.into()),
            ..Default::default()
        }
    }

    /// Reuse an existing snapshot
    pub fn with_existing_snapshot(mut self, enabled: bool) -> Self {
        self.use_existing_snapshot = enabled;
        self
    }

    /// Snapshot each index separately
    pub fn with_snapshot_per_index(mut self, enabled: bool) -> Self {
        self.snapshot_per_index = enabled;
        self
    }

    /// Restore onto the remote storage tier backed by `repository`
    pub fn with_remote_store_repository(mut self, repository: impl Into<String>) -> Self {
        self.remote_store_repository = Some(repository.into());
        self
    }

    /// Back the remote tier with the snapshot repository unless another one is set
    pub fn with_default_remote_store(mut self) -> Self {
        if self.remote_store_repository.is_none() {
            self.remote_store_repository = self.repository.clone();
        }
        self
    }

    /// Set the restored index suffix
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.remote_index_suffix = suffix.into();
        self
    }

    /// Toggle alias creation
    pub fn with_create_alias(mut self, enabled: bool) -> Self {
        self.create_alias = enabled;
        self
    }

    /// Use a custom alias name
    pub fn with_alias_name(mut self, alias: impl Into<String>) -> Self {
        self.alias_name = Some(alias.into());
        self
    }

    /// Toggle deletion of the sources
    pub fn with_delete_after(mut self, enabled: bool) -> Self {
        self.delete_after = enabled;
        self
    }

    /// Toggle document count verification
    pub fn with_verify_availability(mut self, enabled: bool) -> Self {
        self.verify_availability = enabled;
        self
    }

    /// Treat targets without stats as verification failures
    pub fn with_strict_verification(mut self, enabled: bool) -> Self {
        self.strict_verification = enabled;
        self
    }

    /// Allow partial snapshots and restores
    pub fn with_partial(mut self, enabled: bool) -> Self {
        self.partial = enabled;
        self
    }

    /// Toggle waiting for snapshots and restores
    pub fn with_wait_for_completion(mut self, enabled: bool) -> Self {
        self.wait_for_completion = enabled;
        self
    }

    /// Set the poll interval and bound, in seconds
    pub fn with_wait(mut self, wait_interval: u64, max_wait: i64) -> Self {
        self.wait_interval = wait_interval;
        self.max_wait = max_wait;
        self
    }

    /// Set the per-index pacing interval and bound, in seconds
    pub fn with_pacing(mut self, pacing_interval: u64, pacing_max_wait: i64) -> Self {
        self.pacing_interval = pacing_interval;
        self.pacing_max_wait = pacing_max_wait;
        self
    }

    /// Verify the repository before snapshot and restore
    pub fn with_repository_check(mut self, enabled: bool) -> Self {
        self.skip_repo_fs_check = !enabled;
        self
    }

    pub(super) fn required_repository(&self) -> ActionResult<&str> {
        required("repository", self.repository.as_deref())
    }

    pub(super) fn required_snapshot_name(&self) -> ActionResult<&str> {
        required("snapshot_name", self.snapshot_name.as_deref())
    }

    pub(super) fn completion_poller(&self) -> ActionResult<BoundedPoller> {
        BoundedPoller::from_secs(self.wait_interval, self.max_wait)
    }

    pub(super) fn pacing_poller(&self) -> ActionResult<BoundedPoller> {
        BoundedPoller::from_secs(self.pacing_interval, self.pacing_max_wait)
    }

    pub(super) fn delete_grace(&self) -> Duration {
        Duration::from_secs(self.delete_grace_period)
    }

    /// Check everything that can be checked without the cluster
    pub fn validate(&self, selected: usize) -> ActionResult<()> {
        self.required_repository()?;
        self.required_snapshot_name()?;
        if self.remote_index_suffix.is_empty() {
            return Err(ActionError::Configuration(
                "remote_index_suffix must not be empty".to_string(),
            ));
        }
        if let Some(alias) = &self.alias_name {
            if alias.trim().is_empty() {
                return Err(ActionError::Configuration(
                    "alias_name must not be blank".to_string(),
                ));
            }
            if selected > 1 {
                return Err(ActionError::Configuration(format!(
                    "alias_name can only be used when converting a single index ({} selected)",
                    selected
                )));
            }
        }
        if let Some(remote) = &self.remote_store_repository {
            if remote.trim().is_empty() {
                return Err(ActionError::Configuration(
                    "remote_store_repository must not be blank".to_string(),
                ));
            }
        }
        self.completion_poller()?;
        self.pacing_poller()?;
        Ok(())
    }
}

fn required<'a>(field: &str, value: Option<&'a str>) -> ActionResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ActionError::Configuration(format!(
            "{} is required",
            field
        ))),
    }
}

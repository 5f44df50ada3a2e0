//! Management API capability surface consumed by the actions
//!
//! The orchestrators never build requests against a transport directly. They
//! describe what they want with the typed requests below and an implementation
//! of [`ManagementApi`] turns them into wire calls.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiResult;

/// Lifecycle state of a snapshot as reported by the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotState {
    /// Still being written
    InProgress,
    /// Every shard was captured
    Success,
    /// Some shards could not be captured
    Partial,
    /// Nothing usable was captured
    Failed,
}

impl SnapshotState {
    /// Parse the state string used by the cluster; unknown terminal states count as failed
    pub fn from_remote(state: &str) -> Self {
        match state {
            "IN_PROGRESS" | "STARTED" | "INIT" => SnapshotState::InProgress,
            "SUCCESS" => SnapshotState::Success,
            "PARTIAL" => SnapshotState::Partial,
            _ => SnapshotState::Failed,
        }
    }

    /// Whether the snapshot will not change state any more
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SnapshotState::InProgress)
    }

    /// Whether the snapshot can be restored from, given the partial-operation setting
    pub fn is_usable(&self, allow_partial: bool) -> bool {
        match self {
            SnapshotState::Success => true,
            SnapshotState::Partial => allow_partial,
            _ => false,
        }
    }
}

/// One snapshot in a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDescriptor {
    /// Snapshot name
    pub name: String,
    /// Repository holding the snapshot
    pub repository: String,
    /// Indices captured by the snapshot
    pub indices: Vec<String>,
    /// Current state
    pub state: SnapshotState,
}

impl SnapshotDescriptor {
    /// Indices from `required` that this snapshot does not cover
    pub fn missing_indices<'a>(&self, required: &'a [String]) -> Vec<&'a String> {
        required
            .iter()
            .filter(|index| !self.indices.contains(index))
            .collect()
    }
}

/// Body of a create-snapshot call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRequest {
    /// Indices to capture
    pub indices: Vec<String>,
    /// Skip missing or closed indices instead of failing
    pub ignore_unavailable: bool,
    /// Capture cluster state alongside the indices
    pub include_global_state: bool,
    /// Allow a snapshot of indices with unavailable primaries
    pub partial: bool,
}

/// Storage tier directive attached to a restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// Host the restored index on remote object storage
    RemoteSnapshot,
}

/// Body of a restore call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreRequest {
    /// Indices to restore from the snapshot
    pub indices: Vec<String>,
    /// Skip indices missing from the snapshot
    pub ignore_unavailable: bool,
    /// Restore the aliases stored in the snapshot
    pub include_aliases: bool,
    /// Restore cluster state
    pub include_global_state: bool,
    /// Allow restoring partially snapshotted indices
    pub partial: bool,
    /// Regex matched against each restored index name
    pub rename_pattern: String,
    /// Replacement producing the restored index name
    pub rename_replacement: String,
    /// Storage tier for the restored index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
}

/// One entry of an atomic alias update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasAction {
    /// Point `alias` at `index`
    Add {
        /// Target index
        index: String,
        /// Alias name
        alias: String,
    },
}

impl AliasAction {
    /// Build an add action
    pub fn add(index: impl Into<String>, alias: impl Into<String>) -> Self {
        AliasAction::Add {
            index: index.into(),
            alias: alias.into(),
        }
    }
}

/// Snapshot repository definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "settings", rename_all = "lowercase")]
pub enum RepositorySettings {
    /// Shared filesystem repository
    Fs {
        /// Path registered in `path.repo`
        location: String,
    },
    /// S3 bucket repository
    S3 {
        /// Bucket name
        bucket: String,
        /// Key prefix inside the bucket
        #[serde(skip_serializing_if = "Option::is_none")]
        base_path: Option<String>,
    },
}

/// An index as listed by the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Index name
    pub name: String,
    /// Whether the index is open
    pub open: bool,
}

/// Segment totals for an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCount {
    /// Shard copies (primaries and replicas)
    pub shard_copies: u64,
    /// Segments across all shard copies
    pub segments: u64,
}

impl SegmentCount {
    /// Whether every shard copy is already at or below `max_num_segments`
    pub fn is_merged_to(&self, max_num_segments: u32) -> bool {
        self.segments <= self.shard_copies * u64::from(max_num_segments)
    }
}

/// A long-running operation currently executing on the cluster
///
/// Always read fresh from the cluster; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningTask {
    /// Task id, `node:number`
    pub id: String,
    /// Node running the task
    pub node: String,
    /// Task action identifier, e.g. `indices:admin/forcemerge`
    pub action: String,
    /// Free-text description supplied by the cluster
    pub description: String,
    /// How long the task has been running
    pub running_time: Duration,
    /// Structured index metadata, when the cluster provides it
    #[serde(default)]
    pub indices: Option<Vec<String>>,
}

/// Longest comma-separated index list sent in one URL path
pub const MAX_CSV_LEN: usize = 3072;

/// Split `indices` into consecutive groups whose comma-joined form fits [`MAX_CSV_LEN`]
///
/// A single name longer than the limit still gets a group of its own.
pub fn chunk_index_list(indices: &[String]) -> Vec<Vec<String>> {
    let mut chunks: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut len = 0;
    for name in indices {
        if !current.is_empty() && len + 1 + name.len() > MAX_CSV_LEN {
            chunks.push(std::mem::take(&mut current));
            len = 0;
        }
        len += if current.is_empty() { name.len() } else { name.len() + 1 };
        current.push(name.clone());
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Capabilities of a cluster management API used by the actions
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// Whether a snapshot repository is registered
    async fn repository_exists(&self, repository: &str) -> ApiResult<bool>;

    /// All registered repositories with their raw definitions
    async fn get_repositories(&self) -> ApiResult<BTreeMap<String, Value>>;

    /// Register a snapshot repository
    async fn create_repository(
        &self,
        repository: &str,
        settings: &RepositorySettings,
        verify: bool,
    ) -> ApiResult<()>;

    /// Unregister a snapshot repository
    async fn delete_repository(&self, repository: &str) -> ApiResult<()>;

    /// Ask every node to confirm it can access the repository
    async fn verify_repository(&self, repository: &str) -> ApiResult<()>;

    /// Start a snapshot without waiting for it to complete
    async fn create_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        request: &SnapshotRequest,
    ) -> ApiResult<()>;

    /// Fetch a snapshot; `None` when the repository has no such snapshot
    async fn get_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
    ) -> ApiResult<Option<SnapshotDescriptor>>;

    /// Whether any snapshot is currently running on the cluster
    async fn snapshot_in_progress(&self) -> ApiResult<bool>;

    /// Start a restore without waiting for it to complete
    async fn restore_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        request: &RestoreRequest,
    ) -> ApiResult<()>;

    /// Indices matching a pattern (comma separated names and wildcards)
    async fn list_indices(&self, pattern: &str) -> ApiResult<Vec<IndexInfo>>;

    /// Whether an index exists
    async fn index_exists(&self, index: &str) -> ApiResult<bool>;

    /// The subset of `indices` that currently exist, in input order
    async fn existing_indices(&self, indices: &[String]) -> ApiResult<Vec<String>> {
        let mut present = Vec::with_capacity(indices.len());
        for index in indices {
            if self.index_exists(index).await? {
                present.push(index.clone());
            }
        }
        Ok(present)
    }

    /// Primary document count; `None` when the index reports no stats (no allocated shard)
    async fn doc_count(&self, index: &str) -> ApiResult<Option<u64>>;

    /// Segment totals for an index
    async fn segment_count(&self, index: &str) -> ApiResult<SegmentCount>;

    /// Delete indices in one call
    async fn delete_indices(&self, indices: &[String]) -> ApiResult<()>;

    /// Apply alias actions atomically
    async fn update_aliases(&self, actions: &[AliasAction]) -> ApiResult<()>;

    /// Start a forcemerge over the given indices; returns the task id if the cluster created one
    async fn start_forcemerge(
        &self,
        indices: &[String],
        max_num_segments: u32,
    ) -> ApiResult<Option<String>>;

    /// Whether a task has finished (a task the cluster no longer knows counts as finished)
    async fn task_completed(&self, task_id: &str) -> ApiResult<bool>;

    /// Running tasks whose action matches one of `actions`
    async fn list_tasks(&self, actions: &[&str]) -> ApiResult<Vec<RunningTask>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_state_parsing() {
        assert_eq!(SnapshotState::from_remote("SUCCESS"), SnapshotState::Success);
        assert_eq!(SnapshotState::from_remote("IN_PROGRESS"), SnapshotState::InProgress);
        assert_eq!(SnapshotState::from_remote("INCOMPATIBLE"), SnapshotState::Failed);
        assert!(!SnapshotState::InProgress.is_terminal());
        assert!(SnapshotState::Partial.is_terminal());
    }

    #[test]
    fn test_partial_snapshot_usability() {
        assert!(SnapshotState::Success.is_usable(false));
        assert!(!SnapshotState::Partial.is_usable(false));
        assert!(SnapshotState::Partial.is_usable(true));
        assert!(!SnapshotState::Failed.is_usable(true));
    }

    #[test]
    fn test_missing_indices() {
        let snapshot = SnapshotDescriptor {
            name: "snap".to_string(),
            repository: "repo".to_string(),
            indices: vec!["a".to_string(), "b".to_string()],
            state: SnapshotState::Success,
        };
        let required = vec!["a".to_string(), "c".to_string()];
        assert_eq!(snapshot.missing_indices(&required), vec![&"c".to_string()]);
    }

    #[test]
    fn test_restore_request_wire_shape() {
        let request = RestoreRequest {
            indices: vec!["logs".to_string()],
            ignore_unavailable: false,
            include_aliases: false,
            include_global_state: false,
            partial: false,
            rename_pattern: "^logs$".to_string(),
            rename_replacement: "logs_remote".to_string(),
            storage_type: Some(StorageType::RemoteSnapshot),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["storage_type"], "remote_snapshot");
        assert_eq!(body["rename_replacement"], "logs_remote");

        let local = RestoreRequest {
            storage_type: None,
            ..request
        };
        assert!(serde_json::to_value(&local).unwrap().get("storage_type").is_none());
    }

    #[test]
    fn test_alias_and_repository_wire_shape() {
        let action = serde_json::to_value(AliasAction::add("logs_remote", "logs")).unwrap();
        assert_eq!(action, json!({"add": {"index": "logs_remote", "alias": "logs"}}));

        let repo = serde_json::to_value(RepositorySettings::Fs {
            location: "/mnt/backups".to_string(),
        })
        .unwrap();
        assert_eq!(repo, json!({"type": "fs", "settings": {"location": "/mnt/backups"}}));
    }

    #[test]
    fn test_segment_threshold() {
        let counts = SegmentCount {
            shard_copies: 2,
            segments: 4,
        };
        assert!(counts.is_merged_to(2));
        assert!(!counts.is_merged_to(1));
    }

    #[test]
    fn test_chunk_index_list_respects_url_limit() {
        // 100 names of 99 chars: 30 fit in 3072 bytes with separators
        let indices: Vec<String> = (0..100).map(|i| format!("{:0>99}", i)).collect();
        let chunks = chunk_index_list(&indices);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].len(), 30);
        assert_eq!(chunks[3].len(), 10);
        assert!(chunks.iter().all(|c| c.join(",").len() <= MAX_CSV_LEN));
        let flattened: Vec<String> = chunks.into_iter().flatten().collect();
        assert_eq!(flattened, indices);

        let oversized = vec!["x".repeat(MAX_CSV_LEN + 1), "y".to_string()];
        assert_eq!(chunk_index_list(&oversized).len(), 2);
        assert!(chunk_index_list(&[]).is_empty());
    }
}

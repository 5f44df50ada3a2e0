//! Detection of long-running cluster operations that conflict with new work
//!
//! Tasks are always listed fresh from the cluster. A task is matched to an
//! index through its structured index metadata when the cluster supplies it;
//! otherwise the index name is searched for in the bracketed index lists of
//! the task's free-text description (`Force-merge indices [a, b], ...`). The
//! fallback is approximate: `logs-1` also matches a task describing
//! `logs-10`, so it may over-report conflicts, never under-report.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{ManagementApi, RunningTask};
use crate::error::{ActionResult, ApiResultExt};

/// Kind of long-running operation, mapped onto cluster task actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Segment merge
    Forcemerge,
    /// Copy documents between indices
    Reindex,
    /// Shrink into fewer primary shards
    Shrink,
    /// Split into more primary shards
    Split,
    /// Clone an index
    Clone,
    /// Snapshot creation
    Snapshot,
    /// Snapshot restore
    Restore,
    /// Open closed indices
    Open,
    /// Close open indices
    Close,
    /// Index deletion
    DeleteIndices,
    /// Alias rollover
    Rollover,
}

impl TaskKind {
    /// Every known kind
    pub const ALL: [TaskKind; 11] = [
        TaskKind::Forcemerge,
        TaskKind::Reindex,
        TaskKind::Shrink,
        TaskKind::Split,
        TaskKind::Clone,
        TaskKind::Snapshot,
        TaskKind::Restore,
        TaskKind::Open,
        TaskKind::Close,
        TaskKind::DeleteIndices,
        TaskKind::Rollover,
    ];

    /// Task action identifiers the cluster uses for this kind
    pub fn task_actions(&self) -> &'static [&'static str] {
        match self {
            TaskKind::Forcemerge => &["indices:admin/forcemerge"],
            TaskKind::Reindex => &["indices:data/write/reindex"],
            TaskKind::Shrink => &["indices:admin/shrink"],
            TaskKind::Split => &["indices:admin/split"],
            TaskKind::Clone => &["indices:admin/clone"],
            TaskKind::Snapshot => &["cluster:admin/snapshot/create"],
            TaskKind::Restore => &["cluster:admin/snapshot/restore"],
            TaskKind::Open => &["indices:admin/open"],
            TaskKind::Close => &["indices:admin/close"],
            TaskKind::DeleteIndices => &["indices:admin/delete"],
            TaskKind::Rollover => &["indices:admin/rollover"],
        }
    }

    /// Snake-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Forcemerge => "forcemerge",
            TaskKind::Reindex => "reindex",
            TaskKind::Shrink => "shrink",
            TaskKind::Split => "split",
            TaskKind::Clone => "clone",
            TaskKind::Snapshot => "snapshot",
            TaskKind::Restore => "restore",
            TaskKind::Open => "open",
            TaskKind::Close => "close",
            TaskKind::DeleteIndices => "delete_indices",
            TaskKind::Rollover => "rollover",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bracketed `[...]` segments of a description with the text preceding each
fn bracketed(description: &str) -> Vec<(&str, &str)> {
    let mut segments = Vec::new();
    let mut rest = description;
    let mut consumed = 0;
    while let Some(open) = rest.find('[') {
        let Some(close) = rest[open..].find(']') else {
            break;
        };
        let before = &description[..consumed + open];
        segments.push((before, &rest[open + 1..open + close]));
        consumed += open + close + 1;
        rest = &rest[open + close + 1..];
    }
    segments
}

/// Index names listed in a task description
///
/// Uses the segments introduced by `indices [` when there are any, otherwise
/// every bracketed segment (`reindex from [src] to [dest]`). Option values
/// such as `maxSegments[1]` are never treated as index names.
fn described_indices(description: &str) -> Vec<&str> {
    let segments = bracketed(description);
    let labelled: Vec<&str> = segments
        .iter()
        .filter(|(before, _)| before.trim_end().ends_with("indices"))
        .map(|(_, inner)| *inner)
        .collect();
    let lists = if labelled.is_empty() {
        segments
            .iter()
            .filter(|(before, _)| before.ends_with(' ') || before.is_empty())
            .map(|(_, inner)| *inner)
            .collect()
    } else {
        labelled
    };
    lists
        .into_iter()
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Whether `task` operates on `index`
fn task_mentions(task: &RunningTask, index: &str) -> bool {
    match &task.indices {
        Some(indices) => indices.iter().any(|name| name == index),
        None => described_indices(&task.description)
            .iter()
            .any(|name| name.contains(index)),
    }
}

/// Lists running tasks of a kind and matches them against index names
#[derive(Clone)]
pub struct TaskConflictResolver {
    client: Arc<dyn ManagementApi>,
}

impl TaskConflictResolver {
    /// Create a resolver over a management client
    pub fn new(client: Arc<dyn ManagementApi>) -> Self {
        Self { client }
    }

    /// Running tasks of `kind`
    pub async fn tasks_for_kind(&self, kind: TaskKind) -> ActionResult<Vec<RunningTask>> {
        let tasks = self
            .client
            .list_tasks(kind.task_actions())
            .await
            .with_context(|| format!("list running {} tasks", kind))?;
        debug!("Found {} running {} task(s)", tasks.len(), kind);
        Ok(tasks)
    }

    /// Running tasks of `kind` that touch any of `indices`
    pub async fn tasks_for_indices(
        &self,
        kind: TaskKind,
        indices: &[String],
    ) -> ActionResult<Vec<RunningTask>> {
        Ok(self
            .tasks_for_kind(kind)
            .await?
            .into_iter()
            .filter(|task| indices.iter().any(|index| task_mentions(task, index)))
            .collect())
    }

    /// Whether any task of `kind` is running
    pub async fn is_running(&self, kind: TaskKind) -> ActionResult<bool> {
        Ok(!self.tasks_for_kind(kind).await?.is_empty())
    }

    /// Whether any task of `kind` touches any of `indices`
    pub async fn is_running_for_indices(
        &self,
        kind: TaskKind,
        indices: &[String],
    ) -> ActionResult<bool> {
        Ok(!self.tasks_for_indices(kind, indices).await?.is_empty())
    }

    /// The subset of `indices` touched by a running task of `kind`
    pub async fn conflicting_indices(
        &self,
        kind: TaskKind,
        indices: &[String],
    ) -> ActionResult<BTreeSet<String>> {
        let tasks = self.tasks_for_kind(kind).await?;
        let conflicting = conflicts_among(&tasks, indices);
        if !conflicting.is_empty() {
            debug!(
                "{} of {} index(es) conflict with running {} tasks",
                conflicting.len(),
                indices.len(),
                kind
            );
        }
        Ok(conflicting)
    }

    /// `indices` minus those touched by a running task of `kind`, order preserved
    pub async fn non_conflicting_indices(
        &self,
        kind: TaskKind,
        indices: &[String],
    ) -> ActionResult<Vec<String>> {
        let conflicting = self.conflicting_indices(kind, indices).await?;
        Ok(indices
            .iter()
            .filter(|index| !conflicting.contains(*index))
            .cloned()
            .collect())
    }
}

/// The subset of `indices` touched by any of `tasks`
///
/// Lets a caller match against a task listing it already holds instead of
/// asking the cluster again.
pub fn conflicts_among(tasks: &[RunningTask], indices: &[String]) -> BTreeSet<String> {
    indices
        .iter()
        .filter(|index| tasks.iter().any(|task| task_mentions(task, index)))
        .cloned()
        .collect()
}

/// Human-readable listing of running tasks, one per line
pub fn format_running_tasks(tasks: &[RunningTask]) -> String {
    if tasks.is_empty() {
        return "No running tasks found".to_string();
    }
    tasks
        .iter()
        .map(|task| {
            format!(
                "  - Task {}: {} (running for {:.1}s) - {}",
                task.id,
                task.action,
                task.running_time.as_secs_f64(),
                task.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

//! Paced, batched forcemerge
//!
//! Indices are merged one request per index, or one request per fixed-size
//! group when `batch_size` is set. Requests are issued strictly one after
//! another with an optional pause between them. The first failing request
//! stops the run; merges already issued are left to finish.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::{chunk_index_list, ManagementApi};
use crate::error::{ActionError, ActionResult, ApiResultExt};
use crate::poller::BoundedPoller;
use crate::selection::IndexSelection;
use crate::tasks::{conflicts_among, format_running_tasks, TaskConflictResolver, TaskKind};

/// Options accepted by [`ForceMerge`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForceMergeOptions {
    /// Target segments per shard
    #[serde(default)]
    pub max_num_segments: Option<u32>,

    /// Seconds to pause between requests
    #[serde(default)]
    pub delay: u64,

    /// Indices per request; one request per index when unset
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Leave out indices a running forcemerge task already covers
    #[serde(default)]
    pub skip_if_running: bool,

    /// Wait for each request's task to complete before the next one
    #[serde(default = "default_true")]
    pub wait_for_completion: bool,

    /// Seconds between task completion checks
    #[serde(default = "default_wait_interval")]
    pub wait_interval: u64,

    /// Seconds to wait for one task; -1 waits forever
    #[serde(default = "default_max_wait")]
    pub max_wait: i64,
}

fn default_true() -> bool {
    true
}

fn default_wait_interval() -> u64 {
    9
}

fn default_max_wait() -> i64 {
    -1
}

impl Default for ForceMergeOptions {
    fn default() -> Self {
        Self {
            max_num_segments: None,
            delay: 0,
            batch_size: None,
            skip_if_running: false,
            wait_for_completion: true,
            wait_interval: default_wait_interval(),
            max_wait: default_max_wait(),
        }
    }
}

impl ForceMergeOptions {
    /// Options merging down to `max_num_segments` per shard
    pub fn new(max_num_segments: u32) -> Self {
        Self {
            max_num_segments: Some(max_num_segments),
            ..Default::default()
        }
    }

    /// Pause between requests
    pub fn with_delay(mut self, secs: u64) -> Self {
        self.delay = secs;
        self
    }

    /// Merge in groups of `size`
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Skip indices with a running forcemerge
    pub fn with_skip_if_running(mut self, enabled: bool) -> Self {
        self.skip_if_running = enabled;
        self
    }

    /// Toggle waiting for each task
    pub fn with_wait_for_completion(mut self, enabled: bool) -> Self {
        self.wait_for_completion = enabled;
        self
    }

    /// Set the task poll interval and bound, in seconds
    pub fn with_wait(mut self, wait_interval: u64, max_wait: i64) -> Self {
        self.wait_interval = wait_interval;
        self.max_wait = max_wait;
        self
    }
}

/// Split `indices` into consecutive groups of `batch_size`, or single indices when unset
///
/// A group whose comma-joined names would overflow a URL path is split further.
pub fn batches(indices: &[String], batch_size: Option<usize>) -> Vec<Vec<String>> {
    let size = batch_size.unwrap_or(1).max(1);
    indices.chunks(size).flat_map(chunk_index_list).collect()
}

/// Result of a forcemerge run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Index groups sent, one entry per request
    pub requests: Vec<Vec<String>>,
    /// Indices left out because a forcemerge was already running on them
    pub skipped: Vec<String>,
    /// Task ids returned in asynchronous mode
    pub task_ids: Vec<String>,
}

/// What a forcemerge run would do
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergePlan {
    /// Target segments per shard
    pub max_num_segments: u32,
    /// Indices that would be left out because of running tasks
    pub skipped: Vec<String>,
    /// Index groups that would be sent, one entry per request
    pub requests: Vec<Vec<String>>,
    /// Pause between requests
    pub delay: Duration,
    /// Whether each request would be waited on
    pub wait_for_completion: bool,
}

impl fmt::Display for MergePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "DRY-RUN: would forcemerge to {} segment(s) per shard in {} request(s)",
            self.max_num_segments,
            self.requests.len()
        )?;
        for (position, group) in self.requests.iter().enumerate() {
            writeln!(
                f,
                "  request {}/{}: {}",
                position + 1,
                self.requests.len(),
                group.join(",")
            )?;
        }
        if !self.skipped.is_empty() {
            writeln!(f, "  skipped (forcemerge running): {}", self.skipped.join(","))?;
        }
        writeln!(
            f,
            "  delay: {:?}, wait_for_completion: {}",
            self.delay, self.wait_for_completion
        )
    }
}

/// Forcemerges the selected indices
pub struct ForceMerge<'a> {
    selection: &'a mut dyn IndexSelection,
    client: Arc<dyn ManagementApi>,
    resolver: TaskConflictResolver,
    max_num_segments: u32,
    delay: Duration,
    batch_size: Option<usize>,
    skip_if_running: bool,
    wait_for_completion: bool,
    poller: BoundedPoller,
}

impl<'a> ForceMerge<'a> {
    /// Validate the options; no cluster call is made
    pub fn new(
        selection: &'a mut dyn IndexSelection,
        options: ForceMergeOptions,
    ) -> ActionResult<ForceMerge<'a>> {
        let max_num_segments = match options.max_num_segments {
            Some(n) if n > 0 => n,
            Some(_) => {
                return Err(ActionError::Configuration(
                    "max_num_segments must be greater than 0".to_string(),
                ))
            }
            None => {
                return Err(ActionError::Configuration(
                    "max_num_segments is required".to_string(),
                ))
            }
        };
        if options.batch_size == Some(0) {
            return Err(ActionError::Configuration(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        let poller = BoundedPoller::from_secs(options.wait_interval, options.max_wait)?;
        let client = selection.client();

        Ok(Self {
            selection,
            resolver: TaskConflictResolver::new(Arc::clone(&client)),
            client,
            max_num_segments,
            delay: Duration::from_secs(options.delay),
            batch_size: options.batch_size,
            skip_if_running: options.skip_if_running,
            wait_for_completion: options.wait_for_completion,
            poller,
        })
    }

    /// Apply the selection filters and drop indices with a running forcemerge
    async fn prepare(&mut self) -> ActionResult<Vec<String>> {
        self.selection.filter_closed().await?;
        self.selection
            .filter_forcemerged(self.max_num_segments)
            .await?;
        let skipped = self.filter_running_tasks().await?;
        self.selection.empty_list_check()?;
        Ok(skipped)
    }

    async fn filter_running_tasks(&mut self) -> ActionResult<Vec<String>> {
        if !self.skip_if_running {
            return Ok(Vec::new());
        }
        info!("Checking for running forcemerge tasks");
        let running = self.resolver.tasks_for_kind(TaskKind::Forcemerge).await?;
        if running.is_empty() {
            info!("No running forcemerge tasks found");
            return Ok(Vec::new());
        }
        info!(
            "Found {} running forcemerge task(s):\n{}",
            running.len(),
            format_running_tasks(&running)
        );

        let skipped: Vec<String> = conflicts_among(&running, self.selection.indices())
            .into_iter()
            .collect();
        if !skipped.is_empty() {
            warn!(
                "Skipping {} index(es) with running forcemerge tasks: {:?}",
                skipped.len(),
                skipped
            );
            for index in &skipped {
                self.selection.remove(index);
            }
        }
        Ok(skipped)
    }

    /// Merge the selection
    pub async fn do_action(&mut self) -> ActionResult<MergeReport> {
        let skipped = self.prepare().await?;
        let groups = batches(self.selection.indices(), self.batch_size);
        info!(
            "Forcemerging {} index(es) in {} request(s){}{}",
            self.selection.indices().len(),
            groups.len(),
            if skipped.is_empty() {
                String::new()
            } else {
                format!(" (skipped {} with running tasks)", skipped.len())
            },
            if self.wait_for_completion {
                ""
            } else {
                " (async mode - will not wait for completion)"
            }
        );

        let mut report = MergeReport {
            skipped,
            ..Default::default()
        };
        let total = groups.len();
        for (position, group) in groups.into_iter().enumerate() {
            let number = position + 1;
            info!(
                "Forcemerging request {}/{} ({}) to {} segment(s) per shard",
                number,
                total,
                group.join(","),
                self.max_num_segments
            );

            let context = || format!("forcemerge request {}/{} ({})", number, total, group.join(","));
            let task_id = self
                .client
                .start_forcemerge(&group, self.max_num_segments)
                .await
                .with_context(context)?;

            match (task_id, self.wait_for_completion) {
                (Some(id), true) => self.await_task(&id).await?,
                (Some(id), false) => {
                    info!("Forcemerge task started with id {}", id);
                    report.task_ids.push(id);
                }
                (None, _) => debug!("Cluster returned no task id for request {}", number),
            }
            report.requests.push(group);

            if number < total && !self.delay.is_zero() {
                info!("Pausing for {:?} before the next request", self.delay);
                sleep(self.delay).await;
            }
        }

        if !report.task_ids.is_empty() {
            info!(
                "Started {} async forcemerge task(s): {:?}",
                report.task_ids.len(),
                report.task_ids
            );
        }
        Ok(report)
    }

    async fn await_task(&self, task_id: &str) -> ActionResult<()> {
        let client = self.client.as_ref();
        self.poller
            .poll_until(&format!("forcemerge task {}", task_id), || async move {
                let done = client
                    .task_completed(task_id)
                    .await
                    .with_context(|| format!("check forcemerge task {}", task_id))?;
                Ok(done.then_some(()))
            })
            .await
    }

    /// Report the filtered selection and request grouping without merging anything
    pub async fn do_dry_run(&mut self) -> ActionResult<MergePlan> {
        let skipped = self.prepare().await?;
        let plan = MergePlan {
            max_num_segments: self.max_num_segments,
            skipped,
            requests: batches(self.selection.indices(), self.batch_size),
            delay: self.delay,
            wait_for_completion: self.wait_for_completion,
        };
        info!("DRY-RUN MODE. No changes will be made.");
        for line in plan.to_string().lines() {
            info!("{}", line);
        }
        Ok(plan)
    }
}

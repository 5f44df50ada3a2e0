//! In-memory cluster for testing actions without a live cluster
//!
//! [`MockCluster`] implements [`ManagementApi`] over a small model of indices,
//! repositories, snapshots and tasks. Asynchronous cluster behavior is
//! scripted: snapshots walk through a configured state sequence, restored
//! indices appear after a number of existence checks, and merge tasks finish
//! after a number of polls. Every call is logged so tests can assert which
//! mutations were (or were not) issued.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use crate::api::{
    AliasAction, IndexInfo, ManagementApi, RepositorySettings, RestoreRequest, RunningTask,
    SegmentCount, SnapshotDescriptor, SnapshotRequest, SnapshotState,
};
use crate::error::{ApiError, ApiResult};

/// Methods that change cluster state
pub const MUTATING_METHODS: &[&str] = &[
    "create_repository",
    "delete_repository",
    "create_snapshot",
    "restore_snapshot",
    "delete_indices",
    "update_aliases",
    "start_forcemerge",
];

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// Trait method name
    pub method: &'static str,
    /// Compact rendering of the arguments
    pub args: String,
}

#[derive(Debug, Clone)]
struct MockIndex {
    doc_count: Option<u64>,
    open: bool,
    shard_copies: u64,
    segments: u64,
}

impl MockIndex {
    fn with_docs(doc_count: Option<u64>) -> Self {
        Self {
            doc_count,
            open: true,
            shard_copies: 1,
            segments: 10,
        }
    }
}

#[derive(Debug, Clone)]
struct MockSnapshot {
    indices: Vec<String>,
    states: VecDeque<SnapshotState>,
}

impl MockSnapshot {
    fn current(&self) -> SnapshotState {
        self.states.front().copied().unwrap_or(SnapshotState::Success)
    }

    /// Current state; advances the script, keeping the last state forever
    fn observe(&mut self) -> SnapshotState {
        let state = self.current();
        if self.states.len() > 1 {
            self.states.pop_front();
        }
        state
    }
}

#[derive(Debug, Clone)]
struct PendingRestore {
    checks_left: u32,
    index: MockIndex,
}

#[derive(Debug, Default)]
struct ClusterState {
    indices: BTreeMap<String, MockIndex>,
    repositories: BTreeMap<String, Value>,
    snapshots: BTreeMap<(String, String), MockSnapshot>,
    aliases: BTreeMap<String, String>,
    pending_restores: BTreeMap<String, PendingRestore>,
    tasks: Vec<RunningTask>,
    merge_tasks: BTreeMap<String, u32>,
    next_task: u64,

    new_snapshot_states: Vec<SnapshotState>,
    in_progress_script: VecDeque<bool>,
    restore_checks: u32,
    never_restore: bool,
    target_doc_counts: HashMap<String, Option<u64>>,
    missing_stats: BTreeSet<String>,
    sticky: BTreeSet<String>,
    merge_polls: u32,
    no_task_ids: bool,
    failures: HashMap<(&'static str, usize), ApiError>,

    call_counts: HashMap<&'static str, usize>,
    calls: Vec<MockCall>,
}

/// In-memory [`ManagementApi`] implementation
#[derive(Debug, Default)]
pub struct MockCluster {
    state: Mutex<ClusterState>,
}

fn rejected(status: u16, error_type: &str, reason: impl Into<String>) -> ApiError {
    ApiError::Rejected {
        status,
        error_type: Some(error_type.to_string()),
        reason: reason.into(),
    }
}

fn index_missing(index: &str) -> ApiError {
    rejected(404, "index_not_found_exception", format!("no such index [{}]", index))
}

/// Whether `name` matches a comma separated list of names and `*` wildcards
fn matches_pattern(pattern: &str, name: &str) -> bool {
    pattern.split(',').map(str::trim).any(|part| {
        if part == "_all" || part == "*" {
            return true;
        }
        let expr = format!("^{}$", regex::escape(part).replace(r"\*", ".*"));
        Regex::new(&expr).map(|re| re.is_match(name)).unwrap_or(false)
    })
}

impl MockCluster {
    /// Empty cluster; new snapshots complete immediately with SUCCESS
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        // A panicking test thread must not hide the state from the assertions that follow
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Log a call and return the injected failure for it, if any
    fn record(&self, method: &'static str, args: impl Into<String>) -> ApiResult<()> {
        let mut state = self.lock();
        let count = state.call_counts.entry(method).or_insert(0);
        *count += 1;
        let nth = *count;
        state.calls.push(MockCall {
            method,
            args: args.into(),
        });
        match state.failures.remove(&(method, nth)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // ---- setup ----

    /// Add an open index with a document count
    pub fn with_index(self, name: &str, doc_count: u64) -> Self {
        self.add_index(name, doc_count);
        self
    }

    /// Register a filesystem repository
    pub fn with_repository(self, name: &str) -> Self {
        self.lock().repositories.insert(
            name.to_string(),
            json!({"type": "fs", "settings": {"location": format!("/mnt/{}", name)}}),
        );
        self
    }

    /// Add an existing snapshot in a fixed state
    pub fn with_snapshot(
        self,
        repository: &str,
        snapshot: &str,
        indices: &[&str],
        state: SnapshotState,
    ) -> Self {
        self.lock().snapshots.insert(
            (repository.to_string(), snapshot.to_string()),
            MockSnapshot {
                indices: indices.iter().map(|s| s.to_string()).collect(),
                states: VecDeque::from(vec![state]),
            },
        );
        self
    }

    /// Add an open index with a document count
    pub fn add_index(&self, name: &str, doc_count: u64) {
        self.lock()
            .indices
            .insert(name.to_string(), MockIndex::with_docs(Some(doc_count)));
    }

    /// Mark an index closed
    pub fn close_index(&self, name: &str) {
        if let Some(index) = self.lock().indices.get_mut(name) {
            index.open = false;
        }
    }

    /// Set segment totals for an index
    pub fn set_segments(&self, name: &str, shard_copies: u64, segments: u64) {
        if let Some(index) = self.lock().indices.get_mut(name) {
            index.shard_copies = shard_copies;
            index.segments = segments;
        }
    }

    /// State sequence every newly created snapshot walks through (last state is kept)
    pub fn set_new_snapshot_states(&self, states: &[SnapshotState]) {
        self.lock().new_snapshot_states = states.to_vec();
    }

    /// Answers for `snapshot_in_progress`, consumed in order (last answer is kept)
    ///
    /// Without a script the answer is derived from the snapshots' current states.
    pub fn script_snapshot_in_progress(&self, answers: &[bool]) {
        self.lock().in_progress_script = answers.iter().copied().collect();
    }

    /// Restored targets become visible only after this many existence checks
    pub fn set_restore_delay(&self, checks: u32) {
        self.lock().restore_checks = checks;
    }

    /// Restored targets never become visible
    pub fn never_finish_restores(&self) {
        self.lock().never_restore = true;
    }

    /// Override the document count a restored target will report
    pub fn set_target_doc_count(&self, target: &str, doc_count: u64) {
        self.lock()
            .target_doc_counts
            .insert(target.to_string(), Some(doc_count));
    }

    /// Restored target reports no stats (no shard allocated yet)
    pub fn set_target_without_stats(&self, target: &str) {
        self.lock().missing_stats.insert(target.to_string());
    }

    /// Index survives delete calls
    pub fn make_sticky(&self, name: &str) {
        self.lock().sticky.insert(name.to_string());
    }

    /// Add a running task
    pub fn add_task(&self, task: RunningTask) {
        self.lock().tasks.push(task);
    }

    /// Merge tasks report completion only after this many polls
    pub fn set_merge_polls(&self, polls: u32) {
        self.lock().merge_polls = polls;
    }

    /// Forcemerge calls return no task id
    pub fn omit_task_ids(&self) {
        self.lock().no_task_ids = true;
    }

    /// Make the `nth` (1-based) call to `method` fail with `error`
    pub fn fail_on(&self, method: &'static str, nth: usize, error: ApiError) {
        self.lock().failures.insert((method, nth), error);
    }

    // ---- inspection ----

    /// Whether an index is visible
    pub fn has_index(&self, name: &str) -> bool {
        self.lock().indices.contains_key(name)
    }

    /// Document count of a visible index
    pub fn docs(&self, name: &str) -> Option<u64> {
        self.lock().indices.get(name).and_then(|i| i.doc_count)
    }

    /// Index an alias points to
    pub fn alias_target(&self, alias: &str) -> Option<String> {
        self.lock().aliases.get(alias).cloned()
    }

    /// Whether a snapshot exists
    pub fn has_snapshot(&self, repository: &str, snapshot: &str) -> bool {
        self.lock()
            .snapshots
            .contains_key(&(repository.to_string(), snapshot.to_string()))
    }

    /// Names of all snapshots in a repository
    pub fn snapshot_names(&self, repository: &str) -> Vec<String> {
        self.lock()
            .snapshots
            .keys()
            .filter(|(repo, _)| repo == repository)
            .map(|(_, snap)| snap.clone())
            .collect()
    }

    /// Whether a repository is registered
    pub fn has_repository(&self, name: &str) -> bool {
        self.lock().repositories.contains_key(name)
    }

    /// Every call in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Arguments of every call to `method`, in order
    pub fn calls_to(&self, method: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .map(|c| c.args.clone())
            .collect()
    }

    /// Calls that change cluster state
    pub fn mutating_calls(&self) -> Vec<MockCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| MUTATING_METHODS.contains(&c.method))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ManagementApi for MockCluster {
    async fn repository_exists(&self, repository: &str) -> ApiResult<bool> {
        self.record("repository_exists", repository)?;
        Ok(self.lock().repositories.contains_key(repository))
    }

    async fn get_repositories(&self) -> ApiResult<BTreeMap<String, Value>> {
        self.record("get_repositories", "")?;
        Ok(self.lock().repositories.clone())
    }

    async fn create_repository(
        &self,
        repository: &str,
        settings: &RepositorySettings,
        verify: bool,
    ) -> ApiResult<()> {
        self.record("create_repository", format!("{} verify={}", repository, verify))?;
        let definition = serde_json::to_value(settings)
            .map_err(|e| ApiError::UnexpectedResponse(e.to_string()))?;
        self.lock()
            .repositories
            .insert(repository.to_string(), definition);
        Ok(())
    }

    async fn delete_repository(&self, repository: &str) -> ApiResult<()> {
        self.record("delete_repository", repository)?;
        match self.lock().repositories.remove(repository) {
            Some(_) => Ok(()),
            None => Err(rejected(
                404,
                "repository_missing_exception",
                format!("[{}] missing", repository),
            )),
        }
    }

    async fn verify_repository(&self, repository: &str) -> ApiResult<()> {
        self.record("verify_repository", repository)?;
        if self.lock().repositories.contains_key(repository) {
            Ok(())
        } else {
            Err(rejected(
                404,
                "repository_missing_exception",
                format!("[{}] missing", repository),
            ))
        }
    }

    async fn create_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        request: &SnapshotRequest,
    ) -> ApiResult<()> {
        self.record(
            "create_snapshot",
            format!("{}/{} {}", repository, snapshot, request.indices.join(",")),
        )?;
        let mut state = self.lock();
        let key = (repository.to_string(), snapshot.to_string());
        if state.snapshots.contains_key(&key) {
            return Err(rejected(
                400,
                "invalid_snapshot_name_exception",
                format!("[{}:{}] snapshot with the same name already exists", repository, snapshot),
            ));
        }
        let states = if state.new_snapshot_states.is_empty() {
            VecDeque::from(vec![SnapshotState::Success])
        } else {
            state.new_snapshot_states.iter().copied().collect()
        };
        state.snapshots.insert(
            key,
            MockSnapshot {
                indices: request.indices.clone(),
                states,
            },
        );
        Ok(())
    }

    async fn get_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
    ) -> ApiResult<Option<SnapshotDescriptor>> {
        self.record("get_snapshot", format!("{}/{}", repository, snapshot))?;
        let mut state = self.lock();
        let key = (repository.to_string(), snapshot.to_string());
        Ok(state.snapshots.get_mut(&key).map(|snap| SnapshotDescriptor {
            name: snapshot.to_string(),
            repository: repository.to_string(),
            indices: snap.indices.clone(),
            state: snap.observe(),
        }))
    }

    async fn snapshot_in_progress(&self) -> ApiResult<bool> {
        self.record("snapshot_in_progress", "")?;
        let mut state = self.lock();
        if let Some(&answer) = state.in_progress_script.front() {
            if state.in_progress_script.len() > 1 {
                state.in_progress_script.pop_front();
            }
            return Ok(answer);
        }
        Ok(state
            .snapshots
            .values()
            .any(|snap| snap.current() == SnapshotState::InProgress))
    }

    async fn restore_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        request: &RestoreRequest,
    ) -> ApiResult<()> {
        self.record(
            "restore_snapshot",
            format!(
                "{}/{} {} -> {}{}",
                repository,
                snapshot,
                request.indices.join(","),
                request.rename_replacement,
                if request.storage_type.is_some() {
                    " remote"
                } else {
                    ""
                }
            ),
        )?;
        let mut state = self.lock();
        let key = (repository.to_string(), snapshot.to_string());
        let covered = match state.snapshots.get(&key) {
            Some(snap) => snap.indices.clone(),
            None => {
                return Err(rejected(
                    404,
                    "snapshot_missing_exception",
                    format!("[{}:{}] is missing", repository, snapshot),
                ))
            }
        };
        let target = request.rename_replacement.clone();
        if state.indices.contains_key(&target) {
            return Err(rejected(
                500,
                "snapshot_restore_exception",
                format!("cannot restore index [{}] because an open index with same name already exists", target),
            ));
        }
        for source in &request.indices {
            if !covered.contains(source) {
                return Err(rejected(
                    500,
                    "snapshot_restore_exception",
                    format!("index [{}] not found in snapshot", source),
                ));
            }
            let source_docs = state.indices.get(source).and_then(|i| i.doc_count);
            let doc_count = if state.missing_stats.contains(&target) {
                None
            } else {
                state
                    .target_doc_counts
                    .get(&target)
                    .copied()
                    .unwrap_or(source_docs)
            };
            let pending = PendingRestore {
                checks_left: state.restore_checks,
                index: MockIndex::with_docs(doc_count),
            };
            state.pending_restores.insert(target.clone(), pending);
        }
        Ok(())
    }

    async fn list_indices(&self, pattern: &str) -> ApiResult<Vec<IndexInfo>> {
        self.record("list_indices", pattern)?;
        Ok(self
            .lock()
            .indices
            .iter()
            .filter(|(name, _)| matches_pattern(pattern, name))
            .map(|(name, index)| IndexInfo {
                name: name.clone(),
                open: index.open,
            })
            .collect())
    }

    async fn index_exists(&self, index: &str) -> ApiResult<bool> {
        self.record("index_exists", index)?;
        let mut state = self.lock();
        if state.indices.contains_key(index) {
            return Ok(true);
        }
        let never = state.never_restore;
        let ready = match state.pending_restores.get_mut(index) {
            Some(_) if never => false,
            Some(pending) if pending.checks_left == 0 => true,
            Some(pending) => {
                pending.checks_left -= 1;
                false
            }
            None => false,
        };
        if ready {
            if let Some(pending) = state.pending_restores.remove(index) {
                state.indices.insert(index.to_string(), pending.index);
            }
        }
        Ok(ready)
    }

    async fn doc_count(&self, index: &str) -> ApiResult<Option<u64>> {
        self.record("doc_count", index)?;
        match self.lock().indices.get(index) {
            Some(found) => Ok(found.doc_count),
            None => Err(index_missing(index)),
        }
    }

    async fn segment_count(&self, index: &str) -> ApiResult<SegmentCount> {
        self.record("segment_count", index)?;
        match self.lock().indices.get(index) {
            Some(found) => Ok(SegmentCount {
                shard_copies: found.shard_copies,
                segments: found.segments,
            }),
            None => Err(index_missing(index)),
        }
    }

    async fn delete_indices(&self, indices: &[String]) -> ApiResult<()> {
        self.record("delete_indices", indices.join(","))?;
        let mut state = self.lock();
        if let Some(missing) = indices.iter().find(|i| !state.indices.contains_key(*i)) {
            return Err(index_missing(missing));
        }
        for index in indices {
            if !state.sticky.contains(index) {
                state.indices.remove(index);
            }
        }
        Ok(())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> ApiResult<()> {
        let rendered: Vec<String> = actions
            .iter()
            .map(|AliasAction::Add { index, alias }| format!("{}->{}", alias, index))
            .collect();
        self.record("update_aliases", rendered.join(","))?;
        let mut state = self.lock();
        // Validate everything first; the update is atomic
        for AliasAction::Add { index, alias } in actions {
            if state.indices.contains_key(alias) {
                return Err(rejected(
                    400,
                    "invalid_alias_name_exception",
                    format!("an index exists with the same name as the alias [{}]", alias),
                ));
            }
            if !state.indices.contains_key(index) {
                return Err(index_missing(index));
            }
        }
        for AliasAction::Add { index, alias } in actions {
            state.aliases.insert(alias.clone(), index.clone());
        }
        Ok(())
    }

    async fn start_forcemerge(
        &self,
        indices: &[String],
        max_num_segments: u32,
    ) -> ApiResult<Option<String>> {
        self.record(
            "start_forcemerge",
            format!("{} max={}", indices.join(","), max_num_segments),
        )?;
        let mut state = self.lock();
        for name in indices {
            match state.indices.get_mut(name) {
                Some(index) => {
                    index.segments = index
                        .segments
                        .min(index.shard_copies * u64::from(max_num_segments));
                }
                None => return Err(index_missing(name)),
            }
        }
        if state.no_task_ids {
            return Ok(None);
        }
        state.next_task += 1;
        let id = format!("node-1:{}", state.next_task);
        let polls = state.merge_polls;
        state.merge_tasks.insert(id.clone(), polls);
        Ok(Some(id))
    }

    async fn task_completed(&self, task_id: &str) -> ApiResult<bool> {
        self.record("task_completed", task_id)?;
        let mut state = self.lock();
        match state.merge_tasks.get_mut(task_id) {
            Some(0) | None => Ok(true),
            Some(left) => {
                *left -= 1;
                Ok(false)
            }
        }
    }

    async fn list_tasks(&self, actions: &[&str]) -> ApiResult<Vec<RunningTask>> {
        self.record("list_tasks", actions.join(","))?;
        Ok(self
            .lock()
            .tasks
            .iter()
            .filter(|task| actions.contains(&task.action.as_str()))
            .cloned()
            .collect())
    }
}

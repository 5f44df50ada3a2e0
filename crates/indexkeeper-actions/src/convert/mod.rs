//! Storage-tier conversion: snapshot, restore as remote, alias, delete
//!
//! ```text
//! INIT -> SNAPSHOT -> RESTORE -> ALIAS -> (DELETE) -> DONE
//!            \           \         \         \
//!             +-----------+---------+---------+--> FAILED
//! ```
//!
//! There is no compensation. A failure during RESTORE leaves the snapshot in
//! place; a failure during DELETE leaves the targets and aliases in place. The
//! caller gets the error plus the [`RunState`] reached so far.

mod alias;
mod delete;
mod dry_run;
mod naming;
mod options;
mod restore;
mod snapshot;
mod state;
mod verify;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::api::ManagementApi;
use crate::error::{ActionError, ActionResult, ApiResultExt};
use crate::poller::BoundedPoller;
use crate::selection::IndexSelection;

pub use dry_run::{ConversionPlan, PlannedConversion};
pub use naming::{snapshot_name_for_index, target_name};
pub use options::ConvertOptions;
pub use state::{
    AliasBinding, ConversionFailure, ConversionPhase, CountCheck, RestoreMapping, RunState,
};

/// Converts the selected indices to remote-backed storage
pub struct ConvertToRemote<'a> {
    selection: &'a dyn IndexSelection,
    client: Arc<dyn ManagementApi>,
    options: ConvertOptions,
    repository: String,
    snapshot_name: String,
    poller: BoundedPoller,
    pacing: BoundedPoller,
    delete_grace: Duration,
}

impl<'a> ConvertToRemote<'a> {
    /// Validate the options and check the repository exists
    ///
    /// Option errors surface as [`ActionError::Configuration`] before any
    /// cluster call. An unregistered repository is
    /// [`ActionError::DependencyMissing`].
    pub async fn new(
        selection: &'a dyn IndexSelection,
        options: ConvertOptions,
    ) -> ActionResult<ConvertToRemote<'a>> {
        Self::new_at(selection, options, Utc::now()).await
    }

    /// Like [`ConvertToRemote::new`], expanding the snapshot name against `now`
    pub async fn new_at(
        selection: &'a dyn IndexSelection,
        options: ConvertOptions,
        now: DateTime<Utc>,
    ) -> ActionResult<ConvertToRemote<'a>> {
        options.validate(selection.indices().len())?;
        selection.empty_list_check()?;

        let repository = options.required_repository()?.to_string();
        let snapshot_name = naming::expand_snapshot_name(options.required_snapshot_name()?, now)?;
        let poller = options.completion_poller()?;
        let pacing = options.pacing_poller()?;
        let delete_grace = options.delete_grace();

        let client = selection.client();
        let exists = client
            .repository_exists(&repository)
            .await
            .with_context(|| format!("look up repository {}", repository))?;
        if !exists {
            return Err(ActionError::DependencyMissing(format!(
                "repository {} is not registered",
                repository
            )));
        }
        debug!(
            "Conversion of {} index(es) configured with snapshot {} in {}",
            selection.indices().len(),
            snapshot_name,
            repository
        );

        Ok(Self {
            selection,
            client,
            options,
            repository,
            snapshot_name,
            poller,
            pacing,
            delete_grace,
        })
    }

    /// Options in effect
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Snapshot name after date expansion
    pub fn snapshot_name(&self) -> &str {
        &self.snapshot_name
    }

    /// Run every phase in order
    pub async fn do_action(&self) -> Result<RunState, ConversionFailure> {
        let indices = self.selection.indices().to_vec();
        let mut state = RunState::new();
        info!(
            "Starting conversion of {} index(es) to remote storage",
            indices.len()
        );

        match self.run_phases(&indices, &mut state).await {
            Ok(()) => {
                state.enter(ConversionPhase::Done);
                self.report(&state);
                Ok(state)
            }
            Err(err) => {
                state.fail();
                error!(
                    "Conversion failed during {} phase: {}",
                    state.failed_in.unwrap_or(ConversionPhase::Init),
                    err
                );
                Err(ConversionFailure { error: err, state })
            }
        }
    }

    async fn run_phases(&self, indices: &[String], state: &mut RunState) -> ActionResult<()> {
        state.enter(ConversionPhase::Snapshot);
        info!("Step 1/4: creating or verifying snapshot");
        self.snapshot_phase(indices, state).await?;

        state.enter(ConversionPhase::Restore);
        info!("Step 2/4: restoring indices with remote storage");
        self.restore_phase(indices, state).await?;

        state.enter(ConversionPhase::Alias);
        if self.options.create_alias {
            info!("Step 3/4: creating aliases");
            self.alias_phase(state).await?;
        } else {
            info!("Step 3/4: skipping aliases (create_alias=false)");
        }

        if self.options.delete_after {
            state.enter(ConversionPhase::Delete);
            info!("Step 4/4: deleting original indices");
            self.delete_phase(indices, state).await?;
        } else {
            info!("Step 4/4: skipping deletion (delete_after=false)");
        }
        Ok(())
    }

    fn report(&self, state: &RunState) {
        info!(
            "Successfully converted {} index(es) to remote storage",
            state.restores.len()
        );
        for mapping in &state.restores {
            info!(
                "Conversion complete: {} -> {} (alias: {}, original: {})",
                mapping.source,
                mapping.target,
                state.alias_of(&mapping.target).unwrap_or("(none)"),
                if state.was_deleted(&mapping.source) {
                    "deleted"
                } else {
                    "retained"
                }
            );
        }
    }

    /// Fail with [`ActionError::Conflict`] if any snapshot is running
    async fn ensure_no_snapshot_running(&self) -> ActionResult<()> {
        let running = self
            .client
            .snapshot_in_progress()
            .await
            .context("check for running snapshots")?;
        if running {
            return Err(ActionError::Conflict(
                "a snapshot is already in progress".to_string(),
            ));
        }
        Ok(())
    }

    /// Ask the nodes to verify repository access unless the check is skipped
    async fn ensure_repository_reachable(&self) -> ActionResult<()> {
        if self.options.skip_repo_fs_check {
            return Ok(());
        }
        self.client
            .verify_repository(&self.repository)
            .await
            .with_context(|| format!("verify repository {}", self.repository))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SnapshotState;
    use crate::mocks::MockCluster;
    use crate::selection::IndexList;

    fn cluster() -> Arc<MockCluster> {
        Arc::new(
            MockCluster::new()
                .with_index("logs-1", 10)
                .with_index("logs-2", 20)
                .with_repository("repo"),
        )
    }

    #[tokio::test]
    async fn test_construction_rejects_custom_alias_for_many_indices() {
        let cluster = cluster();
        let selection = IndexList::from_names(cluster.clone(), ["logs-1", "logs-2"]);
        let options = ConvertOptions::new("repo", "snap").with_alias_name("current");
        let result = ConvertToRemote::new(&selection, options).await;
        assert!(matches!(result, Err(ActionError::Configuration(_))));
        assert!(cluster.calls().is_empty());
    }

    #[tokio::test]
    async fn test_construction_requires_registered_repository() {
        let cluster = cluster();
        let selection = IndexList::from_names(cluster.clone(), ["logs-1"]);
        let result = ConvertToRemote::new(&selection, ConvertOptions::new("other", "snap")).await;
        assert!(matches!(result, Err(ActionError::DependencyMissing(_))));
    }

    #[tokio::test]
    async fn test_construction_rejects_empty_selection() {
        let selection = IndexList::from_names(cluster(), Vec::<String>::new());
        let result = ConvertToRemote::new(&selection, ConvertOptions::new("repo", "snap")).await;
        assert!(matches!(result, Err(ActionError::EmptySelection(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_carries_partial_state() {
        let cluster = cluster();
        cluster.set_new_snapshot_states(&[SnapshotState::Failed]);
        let selection = IndexList::from_names(cluster.clone(), ["logs-1"]);
        let action = ConvertToRemote::new(&selection, ConvertOptions::new("repo", "snap"))
            .await
            .unwrap();

        let failure = action.do_action().await.unwrap_err();
        assert!(matches!(failure.error, ActionError::Verification(_)));
        assert_eq!(failure.phase(), ConversionPhase::Snapshot);
        assert_eq!(failure.state.phase, ConversionPhase::Failed);
        assert!(cluster.calls_to("restore_snapshot").is_empty());
        assert!(cluster.has_snapshot("repo", "snap"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflicting_snapshot_aborts_before_creation() {
        let cluster = cluster();
        cluster.script_snapshot_in_progress(&[true]);
        let selection = IndexList::from_names(cluster.clone(), ["logs-1"]);
        let action = ConvertToRemote::new(&selection, ConvertOptions::new("repo", "snap"))
            .await
            .unwrap();

        let failure = action.do_action().await.unwrap_err();
        assert_eq!(failure.error.kind(), "ConflictError");
        assert!(cluster.mutating_calls().is_empty());
    }
}

//! SNAPSHOT phase

use tracing::{debug, info, warn};

use super::{naming, ConvertToRemote, RunState};
use crate::api::{SnapshotDescriptor, SnapshotRequest, SnapshotState};
use crate::error::{ActionError, ActionResult, ApiResultExt};

impl ConvertToRemote<'_> {
    pub(super) async fn snapshot_phase(
        &self,
        indices: &[String],
        state: &mut RunState,
    ) -> ActionResult<()> {
        if self.options.use_existing_snapshot {
            return self.use_existing_snapshot(indices, state).await;
        }

        self.ensure_repository_reachable().await?;
        self.ensure_no_snapshot_running().await?;

        if self.options.snapshot_per_index {
            self.create_snapshots_per_index(indices, state).await
        } else {
            let descriptor = self.create_snapshot(&self.snapshot_name, indices).await?;
            for index in indices {
                state
                    .index_snapshots
                    .insert(index.clone(), descriptor.name.clone());
            }
            state.snapshots.push(descriptor);
            Ok(())
        }
    }

    async fn use_existing_snapshot(
        &self,
        indices: &[String],
        state: &mut RunState,
    ) -> ActionResult<()> {
        info!(
            "Using existing snapshot {} from {}",
            self.snapshot_name, self.repository
        );
        let descriptor = self
            .client
            .get_snapshot(&self.repository, &self.snapshot_name)
            .await
            .with_context(|| format!("fetch snapshot {}", self.snapshot_name))?
            .ok_or_else(|| {
                ActionError::DependencyMissing(format!(
                    "snapshot {} not found in repository {}",
                    self.snapshot_name, self.repository
                ))
            })?;

        let missing = descriptor.missing_indices(indices);
        if !missing.is_empty() {
            return Err(ActionError::DependencyMissing(format!(
                "snapshot {} does not contain {:?}",
                descriptor.name, missing
            )));
        }
        self.require_usable(&descriptor)?;

        for index in indices {
            state
                .index_snapshots
                .insert(index.clone(), descriptor.name.clone());
        }
        state.snapshots.push(descriptor);
        Ok(())
    }

    /// One snapshot per index, each started only once the previous one has stopped running
    async fn create_snapshots_per_index(
        &self,
        indices: &[String],
        state: &mut RunState,
    ) -> ActionResult<()> {
        info!(
            "Creating {} per-index snapshot(s) sequentially",
            indices.len()
        );
        let client = self.client.as_ref();

        for (position, index) in indices.iter().enumerate() {
            if position > 0 {
                self.pacing
                    .poll_until("the previous snapshot to finish", || async move {
                        let running = client
                            .snapshot_in_progress()
                            .await
                            .context("check for running snapshots")?;
                        Ok((!running).then_some(()))
                    })
                    .await?;
            }

            let name = naming::snapshot_name_for_index(&self.snapshot_name, index);
            let descriptor = self.create_snapshot(&name, std::slice::from_ref(index)).await?;
            state.index_snapshots.insert(index.clone(), name);
            state.snapshots.push(descriptor);
            debug!("Snapshot {}/{} done", position + 1, indices.len());
        }
        Ok(())
    }

    async fn create_snapshot(
        &self,
        name: &str,
        indices: &[String],
    ) -> ActionResult<SnapshotDescriptor> {
        info!(
            "Creating snapshot {} of {} index(es) in {}",
            name,
            indices.len(),
            self.repository
        );
        let request = SnapshotRequest {
            indices: indices.to_vec(),
            ignore_unavailable: self.options.ignore_unavailable,
            include_global_state: false,
            partial: self.options.partial,
        };
        self.client
            .create_snapshot(&self.repository, name, &request)
            .await
            .with_context(|| format!("create snapshot {}", name))?;

        if !self.options.wait_for_completion {
            warn!(
                "Not waiting for snapshot {}; its state is unresolved",
                name
            );
            return Ok(SnapshotDescriptor {
                name: name.to_string(),
                repository: self.repository.clone(),
                indices: indices.to_vec(),
                state: SnapshotState::InProgress,
            });
        }

        let descriptor = self.await_snapshot(name).await?;
        self.require_usable(&descriptor)?;
        info!("Snapshot {} finished with state {:?}", name, descriptor.state);
        Ok(descriptor)
    }

    /// Poll a snapshot until it reaches a terminal state
    async fn await_snapshot(&self, name: &str) -> ActionResult<SnapshotDescriptor> {
        let client = self.client.as_ref();
        let repository = self.repository.as_str();
        self.poller
            .poll_until(&format!("snapshot {}", name), || async move {
                let descriptor = client
                    .get_snapshot(repository, name)
                    .await
                    .with_context(|| format!("fetch snapshot {}", name))?
                    .ok_or_else(|| {
                        ActionError::DependencyMissing(format!(
                            "snapshot {} disappeared from repository {}",
                            name, repository
                        ))
                    })?;
                Ok(descriptor.state.is_terminal().then_some(descriptor))
            })
            .await
    }

    fn require_usable(&self, descriptor: &SnapshotDescriptor) -> ActionResult<()> {
        if descriptor.state.is_usable(self.options.partial) {
            Ok(())
        } else {
            Err(ActionError::Verification(format!(
                "snapshot {} is in state {:?}{}",
                descriptor.name,
                descriptor.state,
                if descriptor.state == SnapshotState::Partial {
                    " and partial snapshots are not allowed"
                } else {
                    ""
                }
            )))
        }
    }
}

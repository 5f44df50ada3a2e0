//! RESTORE phase

use regex::escape;
use tracing::{info, warn};

use super::{naming, ConvertToRemote, RestoreMapping, RunState};
use crate::api::{RestoreRequest, StorageType};
use crate::error::{ActionError, ActionResult, ApiResultExt};

impl ConvertToRemote<'_> {
    pub(super) async fn restore_phase(
        &self,
        indices: &[String],
        state: &mut RunState,
    ) -> ActionResult<()> {
        self.ensure_repository_reachable().await?;
        self.ensure_no_snapshot_running().await?;

        for source in indices {
            let target = naming::target_name(source, &self.options.remote_index_suffix);
            let snapshot = state
                .index_snapshots
                .get(source)
                .cloned()
                .unwrap_or_else(|| self.snapshot_name.clone());

            let request = self.restore_request(source, &target);
            info!(
                "Restoring {} as {} from snapshot {}{}",
                source,
                target,
                snapshot,
                if request.storage_type.is_some() {
                    " on remote storage"
                } else {
                    ""
                }
            );
            self.client
                .restore_snapshot(&self.repository, &snapshot, &request)
                .await
                .with_context(|| format!("restore {} as {}", source, target))?;

            state.restores.push(RestoreMapping {
                source: source.clone(),
                target,
                snapshot,
            });
        }

        if !self.options.wait_for_completion {
            warn!("Not waiting for restores; target verification skipped");
            return Ok(());
        }

        let targets: Vec<String> = state.restores.iter().map(|m| m.target.clone()).collect();
        self.await_targets(&targets).await?;
        self.verify_targets(state).await
    }

    fn restore_request(&self, source: &str, target: &str) -> RestoreRequest {
        RestoreRequest {
            indices: vec![source.to_string()],
            ignore_unavailable: self.options.ignore_unavailable,
            include_aliases: false,
            include_global_state: false,
            partial: self.options.partial,
            rename_pattern: format!("^{}$", escape(source)),
            rename_replacement: target.to_string(),
            storage_type: self
                .options
                .remote_store_repository
                .as_ref()
                .map(|_| StorageType::RemoteSnapshot),
        }
    }

    /// Wait until every target exists; a timeout names the targets still missing
    async fn await_targets(&self, targets: &[String]) -> ActionResult<()> {
        let client = self.client.as_ref();
        let waited = self
            .poller
            .poll_until("restored indices to appear", || async move {
                let present = client
                    .existing_indices(targets)
                    .await
                    .context("check restored indices")?;
                Ok((present.len() == targets.len()).then_some(()))
            })
            .await;

        match waited {
            Err(ActionError::Timeout {
                waiting_for,
                elapsed,
            }) => {
                let present = client
                    .existing_indices(targets)
                    .await
                    .context("check restored indices")?;
                let missing: Vec<&String> =
                    targets.iter().filter(|t| !present.contains(*t)).collect();
                Err(ActionError::Timeout {
                    waiting_for: format!(
                        "{} (appeared: {:?}, missing: {:?})",
                        waiting_for, present, missing
                    ),
                    elapsed,
                })
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::convert::{ConversionPhase, ConvertOptions, ConvertToRemote};
    use crate::error::ActionError;
    use crate::mocks::MockCluster;
    use crate::selection::IndexList;

    fn cluster() -> Arc<MockCluster> {
        Arc::new(
            MockCluster::new()
                .with_index("logs.1", 4)
                .with_index("logs.2", 8)
                .with_repository("repo"),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_requests_carry_rename_and_storage_tier() {
        let cluster = cluster();
        let selection = IndexList::from_names(cluster.clone(), ["logs.1", "logs.2"]);
        let options = ConvertOptions::new("repo", "snap")
            .with_remote_store_repository("repo")
            .with_suffix("-r")
            .with_create_alias(false);
        let action = ConvertToRemote::new(&selection, options).await.unwrap();

        let state = action.do_action().await.unwrap();
        assert_eq!(
            cluster.calls_to("restore_snapshot"),
            vec![
                "repo/snap logs.1 -> logs.1-r remote".to_string(),
                "repo/snap logs.2 -> logs.2-r remote".to_string(),
            ]
        );
        assert_eq!(state.target_of("logs.2"), Some("logs.2-r"));
        assert!(cluster.has_index("logs.1"));
        assert_eq!(cluster.docs("logs.1-r"), Some(4));
    }

    #[test]
    fn test_rename_pattern_is_anchored_and_escaped() {
        assert_eq!(format!("^{}$", regex::escape("logs.1")), r"^logs\.1$");
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_waits_for_targets() {
        let cluster = cluster();
        cluster.set_restore_delay(3);
        let selection = IndexList::from_names(cluster.clone(), ["logs.1"]);
        let options = ConvertOptions::new("repo", "snap").with_create_alias(false);
        let action = ConvertToRemote::new(&selection, options).await.unwrap();

        action.do_action().await.unwrap();
        assert!(cluster.has_index("logs.1_remote"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_timeout_reports_missing_targets() {
        let cluster = cluster();
        cluster.never_finish_restores();
        let selection = IndexList::from_names(cluster.clone(), ["logs.1", "logs.2"]);
        let options = ConvertOptions::new("repo", "snap").with_wait(9, 30);
        let action = ConvertToRemote::new(&selection, options).await.unwrap();

        let failure = action.do_action().await.unwrap_err();
        assert_eq!(failure.phase(), ConversionPhase::Restore);
        match &failure.error {
            ActionError::Timeout { waiting_for, .. } => {
                assert!(waiting_for.contains("logs.1_remote"));
                assert!(waiting_for.contains("logs.2_remote"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(failure.state.restores.len(), 2);
        assert!(failure.state.aliases.is_empty());
        // No compensation: the snapshot stays
        assert!(cluster.has_snapshot("repo", "snap"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_target_stats_skip_unless_strict() {
        let cluster = cluster();
        cluster.set_target_without_stats("logs.1_remote");
        let selection = IndexList::from_names(cluster.clone(), ["logs.1"]);

        let relaxed = ConvertToRemote::new(
            &selection,
            ConvertOptions::new("repo", "s1").with_create_alias(false),
        )
        .await
        .unwrap();
        let state = relaxed.do_action().await.unwrap();
        assert!(matches!(
            state.verifications[0],
            crate::convert::CountCheck::Skipped { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_target_stats_fail_when_strict() {
        let cluster = cluster();
        cluster.set_target_without_stats("logs.1_remote");
        let selection = IndexList::from_names(cluster.clone(), ["logs.1"]);

        let strict = ConvertToRemote::new(
            &selection,
            ConvertOptions::new("repo", "s1").with_strict_verification(true),
        )
        .await
        .unwrap();
        let failure = strict.do_action().await.unwrap_err();
        assert!(matches!(failure.error, ActionError::Verification(_)));
    }
}

// Command handlers for the ikeep CLI

pub mod convert;
pub mod forcemerge;
pub mod repository;
pub mod run;

pub use convert::ConvertCommand;
pub use forcemerge::ForceMergeCommand;
pub use repository::{RepositoryAction, RepositoryCommand};
pub use run::RunCommand;

use std::sync::Arc;

use indexkeeper_actions::{ActionError, ActionOutcome, ActionRegistry, ManagementApi};
use indexkeeper_http::shared_client;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::action_file::SelectionSpec;
use crate::cluster::HttpManagementApi;
use crate::error::{CliError, CliResult};
use crate::settings::Settings;

/// Trait for command handlers
#[async_trait::async_trait]
pub trait Command: Send + Sync {
    /// Execute the command
    async fn execute(&self) -> CliResult<()>;
}

/// What every command needs from the invocation
#[derive(Clone)]
pub struct CommandContext {
    pub client: Arc<dyn ManagementApi>,
    pub registry: ActionRegistry,
    pub dry_run: bool,
}

impl CommandContext {
    pub fn new(client: Arc<dyn ManagementApi>, dry_run: bool) -> Self {
        Self {
            client,
            registry: ActionRegistry::builtin(),
            dry_run,
        }
    }

    /// Context talking to the cluster named in `settings`
    pub fn connect(settings: &Settings, dry_run: bool) -> CliResult<Self> {
        let http = shared_client(settings.http_config())?;
        Ok(Self::new(HttpManagementApi::shared(http), dry_run))
    }

    /// Resolve a selection and run one registered action against it
    ///
    /// Returns `None` when the selection ended up empty and `ignore_empty_list` allows that.
    pub async fn run_action<O: Serialize>(
        &self,
        action: &str,
        selection: &SelectionSpec,
        ignore_empty_list: bool,
        options: &O,
    ) -> CliResult<Option<ActionOutcome>> {
        let options: Value = serde_json::to_value(options).map_err(|e| CliError::InvalidArgument {
            message: format!("could not encode options for {}: {}", action, e),
        })?;
        let result = match selection.resolve(Arc::clone(&self.client)).await {
            Ok(mut list) => {
                self.registry
                    .dispatch(action, &mut list, &options, self.dry_run)
                    .await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(outcome) => Ok(Some(outcome)),
            Err(ActionError::EmptySelection(reason)) if ignore_empty_list => {
                warn!("Nothing to do: {}", reason);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Human readable summary of an action outcome
pub fn render_outcome(outcome: &ActionOutcome) -> String {
    match outcome {
        ActionOutcome::ConversionPlanned(plan) => plan.to_string(),
        ActionOutcome::MergePlanned(plan) => plan.to_string(),
        ActionOutcome::Converted(state) => {
            let mut lines = vec![format!(
                "Converted {} index(es) to remote storage",
                state.restores.len()
            )];
            for mapping in &state.restores {
                lines.push(format!(
                    "  {} -> {} (alias: {}, original: {})",
                    mapping.source,
                    mapping.target,
                    state.alias_of(&mapping.target).unwrap_or("none"),
                    if state.was_deleted(&mapping.source) {
                        "deleted"
                    } else {
                        "retained"
                    }
                ));
            }
            for skipped in &state.skipped_aliases {
                lines.push(format!(
                    "  alias {} -> {} was not created",
                    skipped.alias, skipped.index
                ));
            }
            lines.join("\n")
        }
        ActionOutcome::Merged(report) => {
            let mut lines = vec![format!(
                "Sent {} forcemerge request(s)",
                report.requests.len()
            )];
            if !report.skipped.is_empty() {
                lines.push(format!(
                    "  skipped (forcemerge running): {}",
                    report.skipped.join(",")
                ));
            }
            if !report.task_ids.is_empty() {
                lines.push(format!("  tasks: {}", report.task_ids.join(", ")));
            }
            lines.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexkeeper_actions::{AliasBinding, MergeReport, RestoreMapping, RunState};

    #[test]
    fn test_connect_builds_http_client_from_settings() {
        let context = CommandContext::connect(&Settings::default(), true).unwrap();
        assert!(context.dry_run);
        assert!(context.registry.get("forcemerge").is_some());

        let bad = Settings::default().with_url("not a url");
        assert!(matches!(
            CommandContext::connect(&bad, false),
            Err(CliError::Http(_))
        ));
    }

    #[test]
    fn test_render_conversion_report() {
        let mut state = RunState::new();
        state.restores.push(RestoreMapping {
            source: "a".to_string(),
            target: "a_remote".to_string(),
            snapshot: "s".to_string(),
        });
        state.aliases.push(AliasBinding {
            alias: "a".to_string(),
            index: "a_remote".to_string(),
        });
        state.deleted.push("a".to_string());

        let text = render_outcome(&ActionOutcome::Converted(state));
        assert!(text.contains("a -> a_remote (alias: a, original: deleted)"));
    }

    #[test]
    fn test_render_merge_report() {
        let report = MergeReport {
            requests: vec![vec!["a".to_string()], vec!["b".to_string()]],
            skipped: vec!["c".to_string()],
            task_ids: vec![],
        };
        let text = render_outcome(&ActionOutcome::Merged(report));
        assert!(text.starts_with("Sent 2 forcemerge request(s)"));
        assert!(text.contains("skipped (forcemerge running): c"));
        assert!(!text.contains("tasks"));
    }
}

//! YAML action files
//!
//! ```yaml
//! actions:
//!   - action: forcemerge
//!     description: Merge last week's logs
//!     options:
//!       max_num_segments: 1
//!       delay: 60
//!     selection:
//!       pattern: "logs-*"
//!       exclude_regex: "-today$"
//!     ignore_empty_list: true
//! ```
//!
//! Steps run one after another; the first failing step stops the file.

use std::path::Path;
use std::sync::Arc;

use indexkeeper_actions::{
    ActionError, ActionOutcome, ActionRegistry, ActionResult, IndexList, ManagementApi,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{CliError, CliResult};

/// A parsed action file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionFile {
    pub actions: Vec<ActionStep>,
}

/// One entry of an action file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionStep {
    /// Registered action name
    pub action: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Action options, passed through to the action untouched
    #[serde(default)]
    pub options: Value,
    #[serde(default)]
    pub selection: SelectionSpec,
    /// Treat an empty selection as success
    #[serde(default)]
    pub ignore_empty_list: bool,
}

/// How a step picks its indices
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectionSpec {
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub exclude_regex: Option<String>,
}

fn default_pattern() -> String {
    "*".to_string()
}

impl Default for SelectionSpec {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            regex: None,
            exclude_regex: None,
        }
    }
}

impl SelectionSpec {
    /// Resolve against the cluster
    pub async fn resolve(&self, client: Arc<dyn ManagementApi>) -> ActionResult<IndexList> {
        let mut list = IndexList::from_pattern(client, &self.pattern).await?;
        list.filter_regex(self.regex.as_deref(), self.exclude_regex.as_deref())?;
        Ok(list)
    }
}

/// What happened to one step
#[derive(Debug)]
pub enum StepResult {
    Completed(ActionOutcome),
    /// The selection was empty and the step allowed it
    SkippedEmpty,
}

impl ActionFile {
    /// Parse YAML text and check every step names a known action
    pub fn parse(text: &str, registry: &ActionRegistry) -> CliResult<Self> {
        let file: ActionFile = serde_yaml::from_str(text)?;
        if file.actions.is_empty() {
            return Err(CliError::ActionFile("no actions defined".to_string()));
        }
        for (position, step) in file.actions.iter().enumerate() {
            if registry.get(&step.action).is_none() {
                return Err(CliError::ActionFile(format!(
                    "action {} names unknown action {:?}; available: {}",
                    position + 1,
                    step.action,
                    registry.names().join(", ")
                )));
            }
        }
        Ok(file)
    }

    /// Read and parse a file
    pub fn load(path: &Path, registry: &ActionRegistry) -> CliResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, registry)
    }

    /// Run every step in order, stopping at the first failure
    pub async fn run(
        &self,
        registry: &ActionRegistry,
        client: Arc<dyn ManagementApi>,
        dry_run: bool,
    ) -> CliResult<Vec<StepResult>> {
        let total = self.actions.len();
        let mut results = Vec::with_capacity(total);
        for (position, step) in self.actions.iter().enumerate() {
            let number = position + 1;
            info!(
                "Action {}/{}: {}{}",
                number,
                total,
                step.action,
                step.description
                    .as_deref()
                    .map(|d| format!(" ({})", d))
                    .unwrap_or_default()
            );
            let outcome = Self::run_step(step, registry, Arc::clone(&client), dry_run).await;
            match outcome {
                Ok(outcome) => results.push(StepResult::Completed(outcome)),
                Err(ActionError::EmptySelection(reason)) if step.ignore_empty_list => {
                    warn!("Action {} skipped: {}", number, reason);
                    results.push(StepResult::SkippedEmpty);
                }
                Err(source) => {
                    return Err(CliError::Step {
                        step: number,
                        action: step.action.clone(),
                        source,
                    })
                }
            }
        }
        Ok(results)
    }

    async fn run_step(
        step: &ActionStep,
        registry: &ActionRegistry,
        client: Arc<dyn ManagementApi>,
        dry_run: bool,
    ) -> ActionResult<ActionOutcome> {
        let mut list = step.selection.resolve(client).await?;
        registry
            .dispatch(&step.action, &mut list, &step.options, dry_run)
            .await
    }
}

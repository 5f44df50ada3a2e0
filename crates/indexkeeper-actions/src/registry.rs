//! Explicit registry of named actions
//!
//! The registry is built once by the caller and handed to whatever dispatches
//! actions; there is no global registration. Each action parses its own
//! options from JSON so action files and the CLI share one path.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use crate::convert::{ConversionPlan, ConvertOptions, ConvertToRemote, RunState};
use crate::error::{ActionError, ActionResult};
use crate::forcemerge::{ForceMerge, ForceMergeOptions, MergePlan, MergeReport};
use crate::selection::IndexSelection;

/// What a dispatched action produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// A conversion ran to completion
    Converted(RunState),
    /// A conversion dry run
    ConversionPlanned(ConversionPlan),
    /// A forcemerge ran to completion
    Merged(MergeReport),
    /// A forcemerge dry run
    MergePlanned(MergePlan),
}

/// A named action runnable against a selection
#[async_trait]
pub trait Action: Send + Sync {
    /// Registry key
    fn name(&self) -> &'static str;

    /// One-line description
    fn description(&self) -> &'static str;

    /// Report what would happen without changing the cluster
    async fn dry_run(
        &self,
        selection: &mut dyn IndexSelection,
        options: &Value,
    ) -> ActionResult<ActionOutcome>;

    /// Run the action
    async fn execute(
        &self,
        selection: &mut dyn IndexSelection,
        options: &Value,
    ) -> ActionResult<ActionOutcome>;
}

fn parse_options<T: DeserializeOwned>(action: &str, options: &Value) -> ActionResult<T> {
    let options = match options {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(options).map_err(|e| {
        ActionError::Configuration(format!("invalid options for {}: {}", action, e))
    })
}

/// `convert_index_to_remote`
pub struct ConvertIndexToRemote;

impl ConvertIndexToRemote {
    const NAME: &'static str = "convert_index_to_remote";

    fn options(options: &Value) -> ActionResult<ConvertOptions> {
        Ok(parse_options::<ConvertOptions>(Self::NAME, options)?.with_default_remote_store())
    }
}

#[async_trait]
impl Action for ConvertIndexToRemote {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Snapshot indices and restore them onto remote-backed storage"
    }

    async fn dry_run(
        &self,
        selection: &mut dyn IndexSelection,
        options: &Value,
    ) -> ActionResult<ActionOutcome> {
        let action = ConvertToRemote::new(&*selection, Self::options(options)?).await?;
        Ok(ActionOutcome::ConversionPlanned(action.do_dry_run()))
    }

    async fn execute(
        &self,
        selection: &mut dyn IndexSelection,
        options: &Value,
    ) -> ActionResult<ActionOutcome> {
        let action = ConvertToRemote::new(&*selection, Self::options(options)?).await?;
        match action.do_action().await {
            Ok(state) => Ok(ActionOutcome::Converted(state)),
            Err(failure) => {
                error!(
                    "Conversion stopped in {} phase after {} restore(s), {} alias(es), {} deletion(s)",
                    failure.phase(),
                    failure.state.restores.len(),
                    failure.state.aliases.len(),
                    failure.state.deleted.len()
                );
                Err(failure.into_error())
            }
        }
    }
}

/// `forcemerge`
pub struct ForceMergeAction;

impl ForceMergeAction {
    const NAME: &'static str = "forcemerge";
}

#[async_trait]
impl Action for ForceMergeAction {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Merge index segments in paced batches"
    }

    async fn dry_run(
        &self,
        selection: &mut dyn IndexSelection,
        options: &Value,
    ) -> ActionResult<ActionOutcome> {
        let options: ForceMergeOptions = parse_options(Self::NAME, options)?;
        let mut merge = ForceMerge::new(selection, options)?;
        Ok(ActionOutcome::MergePlanned(merge.do_dry_run().await?))
    }

    async fn execute(
        &self,
        selection: &mut dyn IndexSelection,
        options: &Value,
    ) -> ActionResult<ActionOutcome> {
        let options: ForceMergeOptions = parse_options(Self::NAME, options)?;
        let mut merge = ForceMerge::new(selection, options)?;
        Ok(ActionOutcome::Merged(merge.do_action().await?))
    }
}

/// Name to action lookup
#[derive(Default, Clone)]
pub struct ActionRegistry {
    actions: BTreeMap<&'static str, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every action this crate provides
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ConvertIndexToRemote));
        registry.register(Arc::new(ForceMergeAction));
        registry
    }

    /// Add an action, replacing any with the same name
    pub fn register(&mut self, action: Arc<dyn Action>) {
        debug!("Registering action {}", action.name());
        self.actions.insert(action.name(), action);
    }

    /// Look up an action
    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        self.actions.keys().copied().collect()
    }

    /// Run `name` (or its dry run) against a selection
    pub async fn dispatch(
        &self,
        name: &str,
        selection: &mut dyn IndexSelection,
        options: &Value,
        dry_run: bool,
    ) -> ActionResult<ActionOutcome> {
        let action = self.get(name).ok_or_else(|| {
            ActionError::Configuration(format!(
                "unknown action {:?}; available: {}",
                name,
                self.names().join(", ")
            ))
        })?;
        if dry_run {
            action.dry_run(selection, options).await
        } else {
            action.execute(selection, options).await
        }
    }
}

//! ALIAS phase

use tracing::{debug, info, warn};

use super::{naming, AliasBinding, ConvertToRemote, RunState};
use crate::api::AliasAction;
use crate::error::{ActionResult, ApiResultExt};

impl ConvertToRemote<'_> {
    pub(super) async fn alias_phase(&self, state: &mut RunState) -> ActionResult<()> {
        let mut ready = Vec::new();

        for mapping in &state.restores {
            let binding = AliasBinding {
                alias: naming::alias_for(&mapping.source, self.options.alias_name.as_deref())
                    .to_string(),
                index: mapping.target.clone(),
            };

            let target_present = self
                .client
                .index_exists(&binding.index)
                .await
                .with_context(|| format!("check {} exists", binding.index))?;
            if !target_present {
                warn!(
                    "Target {} is not present, not creating alias {}",
                    binding.index, binding.alias
                );
                state.skipped_aliases.push(binding);
                continue;
            }

            let collides = self
                .client
                .index_exists(&binding.alias)
                .await
                .with_context(|| format!("check {} exists", binding.alias))?;
            if collides {
                if binding.alias == mapping.source && self.options.delete_after {
                    info!(
                        "Alias {} -> {} deferred until {} is deleted",
                        binding.alias, binding.index, mapping.source
                    );
                    state.deferred_aliases.push(binding);
                } else {
                    warn!(
                        "An index named {} exists, cannot create alias for {}",
                        binding.alias, binding.index
                    );
                    state.skipped_aliases.push(binding);
                }
                continue;
            }

            debug!("Will create alias {} -> {}", binding.alias, binding.index);
            ready.push(binding);
        }

        if ready.is_empty() {
            info!("No aliases to create now");
            return Ok(());
        }
        self.submit_aliases(&ready).await?;
        state.aliases.extend(ready);
        Ok(())
    }

    /// Add every binding in one atomic call
    pub(super) async fn submit_aliases(&self, bindings: &[AliasBinding]) -> ActionResult<()> {
        let actions: Vec<AliasAction> = bindings
            .iter()
            .map(|b| AliasAction::add(&b.index, &b.alias))
            .collect();
        self.client
            .update_aliases(&actions)
            .await
            .with_context(|| format!("create {} alias(es)", actions.len()))?;
        for binding in bindings {
            info!("Alias created: {} -> {}", binding.alias, binding.index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::convert::{ConvertOptions, ConvertToRemote};
    use crate::mocks::MockCluster;
    use crate::selection::IndexList;

    #[tokio::test(start_paused = true)]
    async fn test_alias_colliding_with_retained_source_is_skipped() {
        let cluster = Arc::new(MockCluster::new().with_index("a", 1).with_repository("repo"));
        let selection = IndexList::from_names(cluster.clone(), ["a"]);
        let action = ConvertToRemote::new(&selection, ConvertOptions::new("repo", "s"))
            .await
            .unwrap();

        let state = action.do_action().await.unwrap();
        assert!(state.aliases.is_empty());
        assert_eq!(state.skipped_aliases.len(), 1);
        assert!(cluster.calls_to("update_aliases").is_empty());
        assert!(cluster.has_index("a"));
        assert!(cluster.has_index("a_remote"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_alias_for_single_index() {
        let cluster = Arc::new(MockCluster::new().with_index("a", 1).with_repository("repo"));
        let selection = IndexList::from_names(cluster.clone(), ["a"]);
        let options = ConvertOptions::new("repo", "s").with_alias_name("current");
        let action = ConvertToRemote::new(&selection, options).await.unwrap();

        let state = action.do_action().await.unwrap();
        assert_eq!(state.alias_of("a_remote"), Some("current"));
        assert_eq!(cluster.alias_target("current").as_deref(), Some("a_remote"));
        assert_eq!(cluster.calls_to("update_aliases"), vec!["current->a_remote"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aliases_are_submitted_in_one_call() {
        let cluster = Arc::new(
            MockCluster::new()
                .with_index("a", 1)
                .with_index("b", 1)
                .with_repository("repo"),
        );
        let selection = IndexList::from_names(cluster.clone(), ["a", "b"]);
        let options = ConvertOptions::new("repo", "s").with_delete_after(true);
        let action = ConvertToRemote::new(&selection, options).await.unwrap();

        let state = action.do_action().await.unwrap();
        // Both aliases collide with their sources until DELETE, then go out together
        assert_eq!(
            cluster.calls_to("update_aliases"),
            vec!["a->a_remote,b->b_remote"]
        );
        assert_eq!(state.aliases.len(), 2);
        assert!(state.deferred_aliases.is_empty());
    }
}

//! Target verification, shared by RESTORE and DELETE
//!
//! A target that reports no document stats usually has no shard allocated yet.
//! That case is skipped with a warning unless `strict_verification` is set.

use tracing::{info, warn};

use super::{ConvertToRemote, CountCheck, RestoreMapping, RunState};
use crate::error::{ActionError, ActionResult, ApiResultExt};

impl ConvertToRemote<'_> {
    pub(super) async fn verify_targets(&self, state: &mut RunState) -> ActionResult<()> {
        let targets: Vec<String> = state.restores.iter().map(|m| m.target.clone()).collect();
        let present = self
            .client
            .existing_indices(&targets)
            .await
            .context("check restored indices")?;
        let missing: Vec<&String> = targets.iter().filter(|t| !present.contains(*t)).collect();
        if !missing.is_empty() {
            return Err(ActionError::Verification(format!(
                "restored indices do not exist: {:?}",
                missing
            )));
        }

        if !self.options.verify_availability {
            return Ok(());
        }

        let mut checks = Vec::with_capacity(state.restores.len());
        for mapping in &state.restores {
            checks.push(self.compare_doc_counts(mapping).await?);
        }
        state.verifications = checks;
        Ok(())
    }

    async fn compare_doc_counts(&self, mapping: &RestoreMapping) -> ActionResult<CountCheck> {
        let RestoreMapping { source, target, .. } = mapping;
        let skipped = |reason: &str| CountCheck::Skipped {
            source: source.clone(),
            target: target.clone(),
            reason: reason.to_string(),
        };

        let source_exists = self
            .client
            .index_exists(source)
            .await
            .with_context(|| format!("check {} exists", source))?;
        if !source_exists {
            info!("Source {} no longer exists, skipping count check", source);
            return Ok(skipped("source no longer exists"));
        }

        let source_docs = self
            .client
            .doc_count(source)
            .await
            .with_context(|| format!("read document count of {}", source))?;
        let Some(source_docs) = source_docs else {
            warn!("Source {} reports no stats, skipping count check", source);
            return Ok(skipped("source reports no stats"));
        };

        let target_docs = self
            .client
            .doc_count(target)
            .await
            .with_context(|| format!("read document count of {}", target))?;
        let Some(target_docs) = target_docs else {
            if self.options.strict_verification {
                return Err(ActionError::Verification(format!(
                    "{} reports no document stats",
                    target
                )));
            }
            warn!(
                "{} reports no stats (no shard allocated yet), skipping count check",
                target
            );
            return Ok(skipped("target reports no stats"));
        };

        if source_docs != target_docs {
            return Err(ActionError::Verification(format!(
                "document count mismatch: {} has {}, {} has {}",
                source, source_docs, target, target_docs
            )));
        }
        info!("{} and {} both hold {} documents", source, target, source_docs);
        Ok(CountCheck::Matched {
            source: source.clone(),
            target: target.clone(),
            docs: source_docs,
        })
    }
}

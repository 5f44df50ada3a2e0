//! Side-effect-free preview of a conversion

use std::fmt;

use serde::Serialize;
use tracing::info;

use super::{naming, ConvertToRemote};

/// What would happen to one index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedConversion {
    /// Source index
    pub source: String,
    /// Index the snapshot would be restored as
    pub target: String,
    /// Snapshot the target would come from
    pub snapshot: String,
    /// Alias that would point at the target
    pub alias: Option<String>,
    /// Alias that would be skipped because the source keeps its name
    pub skipped_alias: Option<String>,
    /// Whether the source would be deleted
    pub delete_source: bool,
}

/// Every decision a conversion would make
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionPlan {
    /// Snapshot repository
    pub repository: String,
    /// Repository backing remote storage, if any
    pub remote_store_repository: Option<String>,
    /// Snapshot name after date expansion
    pub snapshot_name: String,
    /// Whether an existing snapshot would be reused
    pub use_existing_snapshot: bool,
    /// Whether each index gets its own snapshot
    pub snapshot_per_index: bool,
    /// Per-index decisions, in selection order
    pub conversions: Vec<PlannedConversion>,
}

impl fmt::Display for ConversionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DRY-RUN: would convert indices to remote storage")?;
        writeln!(f, "  Repository: {}", self.repository)?;
        writeln!(
            f,
            "  Remote store repository: {}",
            self.remote_store_repository.as_deref().unwrap_or("(none)")
        )?;
        writeln!(f, "  Snapshot name: {}", self.snapshot_name)?;
        writeln!(f, "  Use existing snapshot: {}", self.use_existing_snapshot)?;
        writeln!(f, "  Snapshot per index: {}", self.snapshot_per_index)?;
        for planned in &self.conversions {
            writeln!(
                f,
                "DRY-RUN: {} -> {} (snapshot: {})",
                planned.source, planned.target, planned.snapshot
            )?;
            if let Some(alias) = &planned.alias {
                writeln!(f, "  Would create alias: {} -> {}", alias, planned.target)?;
            }
            if let Some(alias) = &planned.skipped_alias {
                writeln!(
                    f,
                    "  Would skip alias: {} -> {} (collides with source index)",
                    alias, planned.target
                )?;
            }
            if planned.delete_source {
                writeln!(f, "  Would delete original index: {}", planned.source)?;
            }
        }
        Ok(())
    }
}

impl ConvertToRemote<'_> {
    /// Compute every name, target and alias decision without calling the cluster
    pub fn do_dry_run(&self) -> ConversionPlan {
        let conversions = self
            .selection
            .indices()
            .iter()
            .map(|source| {
                let alias = self.options.create_alias.then(|| {
                    naming::alias_for(source, self.options.alias_name.as_deref()).to_string()
                });
                // The source is only gone before aliasing when it gets deleted
                let (alias, skipped_alias) = match alias {
                    Some(alias) if alias == *source && !self.options.delete_after => {
                        (None, Some(alias))
                    }
                    alias => (alias, None),
                };
                PlannedConversion {
                    source: source.clone(),
                    target: naming::target_name(source, &self.options.remote_index_suffix),
                    snapshot: if self.options.snapshot_per_index
                        && !self.options.use_existing_snapshot
                    {
                        naming::snapshot_name_for_index(&self.snapshot_name, source)
                    } else {
                        self.snapshot_name.clone()
                    },
                    alias,
                    skipped_alias,
                    delete_source: self.options.delete_after,
                }
            })
            .collect();

        let plan = ConversionPlan {
            repository: self.repository.clone(),
            remote_store_repository: self.options.remote_store_repository.clone(),
            snapshot_name: self.snapshot_name.clone(),
            use_existing_snapshot: self.options.use_existing_snapshot,
            snapshot_per_index: self.options.snapshot_per_index,
            conversions,
        };
        info!("DRY-RUN MODE. No changes will be made.");
        for line in plan.to_string().lines() {
            info!("{}", line);
        }
        plan
    }
}

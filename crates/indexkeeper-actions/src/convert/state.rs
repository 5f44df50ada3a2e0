//! Run-scoped state of a conversion
//!
//! A [`RunState`] is created empty when a run starts and returned to the
//! caller afterwards, whether the run succeeded or not. Nothing reuses it.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::api::SnapshotDescriptor;
use crate::error::ActionError;

/// Phase of the conversion state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionPhase {
    /// Nothing has run yet
    Init,
    /// Creating or checking the snapshot
    Snapshot,
    /// Restoring targets from the snapshot
    Restore,
    /// Pointing aliases at targets
    Alias,
    /// Removing sources
    Delete,
    /// Finished successfully
    Done,
    /// Stopped on an error
    Failed,
}

impl fmt::Display for ConversionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversionPhase::Init => "INIT",
            ConversionPhase::Snapshot => "SNAPSHOT",
            ConversionPhase::Restore => "RESTORE",
            ConversionPhase::Alias => "ALIAS",
            ConversionPhase::Delete => "DELETE",
            ConversionPhase::Done => "DONE",
            ConversionPhase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// A source index and the target restored from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreMapping {
    /// Source index
    pub source: String,
    /// Restored index, always source plus suffix
    pub target: String,
    /// Snapshot the target was restored from
    pub snapshot: String,
}

/// An alias and the index it points to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasBinding {
    /// Alias name
    pub alias: String,
    /// Index the alias points to
    pub index: String,
}

/// Outcome of one document count comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CountCheck {
    /// Source and target hold the same number of documents
    Matched {
        /// Source index
        source: String,
        /// Restored index
        target: String,
        /// Document count of both
        docs: u64,
    },
    /// The comparison could not be made
    Skipped {
        /// Source index
        source: String,
        /// Restored index
        target: String,
        /// Why the comparison was skipped
        reason: String,
    },
}

/// Everything a conversion run did, up to where it stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunState {
    /// Current phase
    pub phase: ConversionPhase,
    /// Phase the run was in when it failed
    pub failed_in: Option<ConversionPhase>,
    /// Snapshots created or reused, in creation order
    pub snapshots: Vec<SnapshotDescriptor>,
    /// Snapshot holding each source index
    pub index_snapshots: BTreeMap<String, String>,
    /// Restores issued
    pub restores: Vec<RestoreMapping>,
    /// Aliases created
    pub aliases: Vec<AliasBinding>,
    /// Aliases waiting for their source to be deleted
    pub deferred_aliases: Vec<AliasBinding>,
    /// Aliases that could not be created
    pub skipped_aliases: Vec<AliasBinding>,
    /// Sources deleted
    pub deleted: Vec<String>,
    /// Latest document count comparisons
    pub verifications: Vec<CountCheck>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    /// Empty state in the INIT phase
    pub fn new() -> Self {
        Self {
            phase: ConversionPhase::Init,
            failed_in: None,
            snapshots: Vec::new(),
            index_snapshots: BTreeMap::new(),
            restores: Vec::new(),
            aliases: Vec::new(),
            deferred_aliases: Vec::new(),
            skipped_aliases: Vec::new(),
            deleted: Vec::new(),
            verifications: Vec::new(),
        }
    }

    pub(super) fn enter(&mut self, phase: ConversionPhase) {
        self.phase = phase;
    }

    pub(super) fn fail(&mut self) {
        self.failed_in = Some(self.phase);
        self.phase = ConversionPhase::Failed;
    }

    /// Target restored from `source`, if any
    pub fn target_of(&self, source: &str) -> Option<&str> {
        self.restores
            .iter()
            .find(|m| m.source == source)
            .map(|m| m.target.as_str())
    }

    /// Alias created for `index`, if any
    pub fn alias_of(&self, index: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find(|b| b.index == index)
            .map(|b| b.alias.as_str())
    }

    /// Whether `source` was deleted by this run
    pub fn was_deleted(&self, source: &str) -> bool {
        self.deleted.iter().any(|d| d == source)
    }
}

/// A failed conversion together with the partial state it left behind
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ConversionFailure {
    /// What went wrong
    pub error: ActionError,
    /// State when the run stopped; `failed_in` names the phase
    pub state: RunState,
}

impl ConversionFailure {
    /// Phase the run failed in
    pub fn phase(&self) -> ConversionPhase {
        self.state.failed_in.unwrap_or(self.state.phase)
    }

    /// Discard the state and keep the error
    pub fn into_error(self) -> ActionError {
        self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_records_phase() {
        let mut state = RunState::new();
        state.enter(ConversionPhase::Restore);
        state.fail();
        assert_eq!(state.phase, ConversionPhase::Failed);
        assert_eq!(state.failed_in, Some(ConversionPhase::Restore));

        let failure = ConversionFailure {
            error: ActionError::failed("boom"),
            state,
        };
        assert_eq!(failure.phase(), ConversionPhase::Restore);
        assert_eq!(failure.to_string(), "Failed execution: boom");
    }

    #[test]
    fn test_lookups() {
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
        assert_eq!(state.target_of("a"), Some("a_remote"));
        assert_eq!(state.alias_of("a_remote"), Some("a"));
        assert_eq!(state.target_of("b"), None);
        assert!(!state.was_deleted("a"));
    }
}

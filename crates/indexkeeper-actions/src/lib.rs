#![warn(missing_docs)]

//! indexkeeper actions
//!
//! Multi-step maintenance actions against a search cluster's management API:
//! converting local indices to remote-backed storage through
//! snapshot/restore/alias/delete, and paced batched forcemerge that avoids
//! indices already being merged.
//!
//! The orchestrators only talk to the cluster through [`ManagementApi`] and
//! receive their targets through an [`IndexSelection`]. All waiting goes
//! through [`BoundedPoller`].

pub mod api;
pub mod convert;
pub mod error;
pub mod forcemerge;
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;
pub mod poller;
pub mod registry;
pub mod selection;
pub mod tasks;

pub use api::{
    chunk_index_list, AliasAction, IndexInfo, ManagementApi, RepositorySettings, RestoreRequest, RunningTask,
    SegmentCount, SnapshotDescriptor, SnapshotRequest, SnapshotState, StorageType,
};
pub use convert::{
    AliasBinding, ConversionFailure, ConversionPhase, ConversionPlan, ConvertOptions,
    ConvertToRemote, CountCheck, PlannedConversion, RestoreMapping, RunState,
};
pub use error::{ActionError, ActionResult, ApiError, ApiResult, ApiResultExt};
pub use forcemerge::{ForceMerge, ForceMergeOptions, MergePlan, MergeReport};
pub use poller::{BoundedPoller, MaxWait};
pub use registry::{Action, ActionOutcome, ActionRegistry};
pub use selection::{IndexList, IndexSelection};
pub use tasks::{conflicts_among, format_running_tasks, TaskConflictResolver, TaskKind};

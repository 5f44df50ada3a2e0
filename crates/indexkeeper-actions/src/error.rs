//! Error types for cluster actions

use std::time::Duration;

use thiserror::Error;

/// Result type for management API calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for action operations
pub type ActionResult<T> = Result<T, ActionError>;

/// Failures reported by a [`ManagementApi`](crate::ManagementApi) implementation
///
/// Implementations translate their transport errors into this type at a single
/// boundary; nothing above the trait sees transport-specific errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The cluster answered and refused the request
    #[error("cluster rejected request (HTTP {status}): {reason}")]
    Rejected {
        /// HTTP status code of the rejection
        status: u16,
        /// Cluster error type (e.g. `index_not_found_exception`)
        error_type: Option<String>,
        /// Human readable reason
        reason: String,
    },

    /// The cluster could not be reached or the request did not complete
    #[error("transport failure: {0}")]
    Transport(String),

    /// The cluster answered with a body the client could not interpret
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ApiError {
    /// Whether the cluster refused the request because a conflicting operation is running
    pub fn is_conflict(&self) -> bool {
        match self {
            ApiError::Rejected { error_type, .. } => matches!(
                error_type.as_deref(),
                Some("concurrent_snapshot_execution_exception")
                    | Some("snapshot_in_progress_exception")
            ),
            _ => false,
        }
    }

    /// Whether the cluster reported the addressed resource as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Rejected { status: 404, .. })
    }
}

/// Errors that can occur while constructing or running an action
#[derive(Debug, Error)]
pub enum ActionError {
    /// Invalid or missing option, detected before any network call
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A referenced repository or snapshot is absent or incomplete
    #[error("Missing dependency: {0}")]
    DependencyMissing(String),

    /// A blocking remote operation is already in progress
    #[error("Conflicting operation in progress: {0}")]
    Conflict(String),

    /// A bounded wait was exceeded
    #[error("Timed out after {elapsed:?} waiting for {waiting_for}")]
    Timeout {
        /// What the poller was waiting for
        waiting_for: String,
        /// Time spent before giving up
        elapsed: Duration,
    },

    /// A post-condition did not hold (count mismatch, missing target, bad snapshot state)
    #[error("Verification failed: {0}")]
    Verification(String),

    /// A remote call failed; the cause is preserved when there is one
    #[error("Failed execution: {context}{}", describe_source(.source))]
    FailedExecution {
        /// What was being attempted
        context: String,
        /// Underlying management API failure
        #[source]
        source: Option<ApiError>,
    },

    /// Nothing is left to act on
    #[error("No actionable indices: {0}")]
    EmptySelection(String),
}

fn describe_source(source: &Option<ApiError>) -> String {
    source
        .as_ref()
        .map(|e| format!(": {}", e))
        .unwrap_or_default()
}

impl ActionError {
    /// Wrap a management API failure, classifying remote conflicts as [`ActionError::Conflict`]
    pub fn from_api(context: impl Into<String>, source: ApiError) -> Self {
        let context = context.into();
        if source.is_conflict() {
            ActionError::Conflict(format!("{}: {}", context, source))
        } else {
            ActionError::FailedExecution {
                context,
                source: Some(source),
            }
        }
    }

    /// A failed execution detected locally rather than reported by the cluster
    pub fn failed(context: impl Into<String>) -> Self {
        ActionError::FailedExecution {
            context: context.into(),
            source: None,
        }
    }

    /// Stable name of the error kind, used in logs and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::Configuration(_) => "ConfigurationError",
            ActionError::DependencyMissing(_) => "DependencyMissing",
            ActionError::Conflict(_) => "ConflictError",
            ActionError::Timeout { .. } => "TimeoutError",
            ActionError::Verification(_) => "VerificationError",
            ActionError::FailedExecution { .. } => "FailedExecution",
            ActionError::EmptySelection(_) => "NoIndices",
        }
    }
}

/// Attach context to management API results
pub trait ApiResultExt<T> {
    /// Convert into an [`ActionResult`], describing what was being attempted
    fn context(self, context: impl Into<String>) -> ActionResult<T>;

    /// Like [`ApiResultExt::context`] but builds the message only on failure
    fn with_context<F>(self, f: F) -> ActionResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ApiResultExt<T> for ApiResult<T> {
    fn context(self, context: impl Into<String>) -> ActionResult<T> {
        self.map_err(|e| ActionError::from_api(context, e))
    }

    fn with_context<F>(self, f: F) -> ActionResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ActionError::from_api(f(), e))
    }
}

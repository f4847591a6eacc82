//! Error and retry-policy types for the Crewline pipeline domain.
//!
//! Errors are split by the point at which they are detected:
//!
//! - [`DefinitionError`]: the pipeline definition or the run's input
//!   parameters are invalid. Always detected before any task runs.
//! - [`BackendError`]: a backend round-trip failed; carries a [`RetryPolicy`].
//! - [`ToolError`]: a tool handler failed. Surfaced to the backend as a tool
//!   result, never fatal to the task by itself.
//! - [`TaskError`]: the reason a task ended `FAILED`.
//! - [`RunError`]: the run rejected a state change or a result-log update.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ArtifactName, RunStatus, TaskId, ToolCallId, ToolName, WorkerId};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by [`BackendError::retry_policy`] to let the runner decide whether
/// to re-issue a backend round-trip.
///
/// - `Retryable` errors: timeouts, connection failures, rate limiting, 5xx.
/// - `NonRetryable` errors: malformed requests, authentication failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried; the task fails immediately.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Definition errors
// ---------------------------------------------------------------------------

/// The pipeline definition, or the parameters bound to a run, are invalid.
///
/// Produced by `PipelineBuilder::build` and by the runner's pre-flight check.
/// A run never enters `RUNNING` when one of these is present, so no backend
/// call is ever issued for an invalid definition.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DefinitionError {
    /// The pipeline declares no tasks.
    #[error("Pipeline '{pipeline}' declares no tasks")]
    EmptyPipeline { pipeline: String },

    /// An identifier field was empty.
    #[error("Invalid {kind} identifier: '{value}'")]
    InvalidIdentifier { kind: String, value: String },

    /// Two tasks share an identifier.
    #[error("Duplicate task '{task}'")]
    DuplicateTask { task: TaskId },

    /// Two workers share an identifier.
    #[error("Duplicate worker '{worker}'")]
    DuplicateWorker { worker: WorkerId },

    /// A task is assigned to a worker that is not part of the pipeline.
    #[error("Task '{task}' is assigned to unknown worker '{worker}'")]
    UnknownWorker { task: TaskId, worker: WorkerId },

    /// A worker lists a capability with no registered tool handler.
    #[error("Worker '{worker}' declares unknown capability '{tool}'")]
    UnknownCapability { worker: WorkerId, tool: ToolName },

    /// A task names a predecessor that does not exist in the pipeline.
    #[error("Task '{task}' depends on unknown task '{predecessor}'")]
    UnknownPredecessor { task: TaskId, predecessor: TaskId },

    /// A task lists the same predecessor more than once.
    #[error("Task '{task}' lists predecessor '{predecessor}' more than once")]
    DuplicatePredecessor { task: TaskId, predecessor: TaskId },

    /// Under the sequential policy a predecessor must be declared strictly
    /// earlier than the task that depends on it.
    #[error("Task '{task}' depends on '{predecessor}', which is not declared before it")]
    PredecessorNotEarlier { task: TaskId, predecessor: TaskId },

    /// No topological order exists. `tasks` lists every task that could not
    /// be ordered, in declaration order.
    #[error("Cyclic dependency among tasks: {}", join_ids(.tasks))]
    CyclicDependency { tasks: Vec<TaskId> },

    /// A `{placeholder}` in a task template has no matching input parameter.
    #[error("Task '{task}' references unbound parameter '{parameter}'")]
    UnboundParameter { task: TaskId, parameter: String },
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Backend errors
// ---------------------------------------------------------------------------

/// A backend round-trip failed.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum BackendError {
    /// Transient failure (timeout, connection reset, rate limit, server error).
    ///
    /// Eligible for a bounded number of retries with back-off.
    #[error("Backend unavailable: {message}")]
    Unavailable {
        message: String,
        /// Server-provided minimum delay before retrying, if any.
        retry_after: Option<Duration>,
    },

    /// The backend refused the request (malformed request, authentication,
    /// unparseable response). Never retried.
    #[error("Backend rejected request: {message}")]
    Rejected { message: String },
}

impl BackendError {
    /// Convenience constructor for a transient failure without a delay hint.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Convenience constructor for a non-retryable failure.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Returns whether (and when) the failed round-trip may be re-issued.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Unavailable { retry_after, .. } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::Rejected { .. } => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Tool errors
// ---------------------------------------------------------------------------

/// A tool handler failed.
///
/// Tool errors are returned to the backend as the outcome of the call so the
/// worker can adapt; they do not fail the task on their own.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ToolError {
    /// Writing or reading the underlying storage failed.
    #[error("I/O error on artifact '{name}': {message}")]
    Io { name: String, message: String },

    /// The requested artifact does not exist.
    #[error("Artifact not found: '{name}'")]
    NotFound { name: String },

    /// The arguments supplied by the backend do not match the tool schema.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The backend requested a tool the worker is not bound to.
    #[error("Unknown tool '{0}'")]
    UnknownTool(ToolName),

    /// The backend reused a call id from this turn for a different call.
    #[error("Tool call id '{0}' was already used with a different tool or arguments")]
    DuplicateCallId(ToolCallId),

    /// The artifact name escapes the working directory or is malformed.
    #[error("Invalid artifact name '{0}'")]
    InvalidArtifactName(String),
}

// ---------------------------------------------------------------------------
// Task and run errors
// ---------------------------------------------------------------------------

/// Why a task ended with `TaskStatus::Failed`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum TaskError {
    /// The backend failed and the retry budget (if any) is exhausted.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A predecessor has no successful recorded result.
    ///
    /// The resolver guarantees predecessors run first, so this indicates an
    /// orchestration bug and is always fatal.
    #[error("Task '{task}' has no recorded result for predecessor '{predecessor}'")]
    MissingDependencyResult { task: TaskId, predecessor: TaskId },

    /// Persisting the task's output artifact failed.
    #[error("Failed to persist artifact '{artifact}': {source}")]
    Artifact {
        artifact: ArtifactName,
        #[source]
        source: ToolError,
    },

    /// The worker kept requesting tools past the per-turn round limit.
    #[error("Worker exceeded {limit} tool round-trips without a final answer")]
    ToolRoundLimit { limit: u32 },

    /// The task could not be executed by the runtime (e.g. a worker task panicked).
    #[error("Task execution aborted: {message}")]
    Aborted { message: String },
}

/// The run rejected a state change or a result-log update.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RunError {
    /// Results are insert-once; a second result for the same task is refused.
    #[error("A result for task '{task}' has already been recorded")]
    ResultAlreadyRecorded { task: TaskId },

    /// The run is already in a terminal state.
    #[error("Run is already finished")]
    AlreadyFinished,

    /// Only `Pending → Running → {Completed, Failed, Cancelled}` is allowed.
    #[error("Run cannot move from {from} to {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },

    /// Results are only recorded while the run is `Running`.
    #[error("Run is {status}; results are only recorded while RUNNING")]
    NotRunning { status: RunStatus },
}

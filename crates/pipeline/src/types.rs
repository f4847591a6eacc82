//! Shared value types for the Crewline pipeline domain.
//!
//! Workers and tasks are definition-time data: they are built once, validated
//! by [`crate::PipelineBuilder`], and then shared immutably (behind `Arc`) by
//! every run of the pipeline. Tool calls and task results are run-time records.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ArtifactName, TaskId, ToolCallId, ToolName, WorkerId};

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

/// Per-worker backend selection.
///
/// The engine never chooses a model; this is carried verbatim into every
/// backend request the worker issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Model identifier understood by the backend.
    pub model: String,

    /// Sampling temperature in `[0.0, 2.0]`.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Upper bound on generated tokens, if the backend supports one.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl BackendConfig {
    /// Creates a config for `model` with the default temperature.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    /// Sets the sampling temperature, clamped to `[0.0, 2.0]`.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = if temperature.is_finite() {
            temperature.clamp(0.0, 2.0)
        } else {
            default_temperature()
        };
        self
    }

    /// Sets the generated-token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A role-bound invoker of the backend.
///
/// The capability set is explicit: a worker may only invoke the tools listed
/// here, and each must be present in the pipeline's tool registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub role: String,
    pub goal: String,
    #[serde(default)]
    pub backstory: String,
    pub backend: BackendConfig,
    #[serde(default)]
    pub capabilities: BTreeSet<ToolName>,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        role: impl Into<String>,
        goal: impl Into<String>,
        backend: BackendConfig,
    ) -> Self {
        Self {
            id,
            role: role.into(),
            goal: goal.into(),
            backstory: String::new(),
            backend,
            capabilities: BTreeSet::new(),
        }
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn with_capability(mut self, tool: ToolName) -> Self {
        self.capabilities.insert(tool);
        self
    }

    /// Returns `true` if the worker is bound to `tool`.
    pub fn can_use(&self, tool: &ToolName) -> bool {
        self.capabilities.contains(tool)
    }
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// The declared effect of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectKind {
    /// Persists text to a named artifact (overwriting).
    WriteArtifact,
    /// Reads a named artifact.
    ReadArtifact,
}

/// Tool description handed to the backend so it can request invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: ToolName,
    pub description: String,
    pub effect: EffectKind,
    /// JSON Schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// A tool invocation requested by the backend during a worker turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: ToolCallId,
    pub tool: ToolName,
    pub arguments: serde_json::Value,
}

/// What happened when a tool call was executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { value: serde_json::Value },
    Failed { message: String },
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Audit record of a side effect that occurred during a worker turn.
///
/// Records are never re-executed on replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: ToolCallId,
    pub tool: ToolName,
    pub arguments: serde_json::Value,
    pub outcome: ToolOutcome,
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// How a pipeline's tasks are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// Declaration order, one task at a time. Predecessors must be declared
    /// before their dependants.
    #[default]
    Sequential,
    /// Topological order; independent tasks may run concurrently.
    DependencyOrdered,
}

impl std::fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::DependencyOrdered => write!(f, "dependency_ordered"),
        }
    }
}

/// One node of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    /// Description with `{parameter}` placeholders.
    #[serde(rename = "description")]
    pub description_template: String,

    /// Advisory contract for the final answer; may also contain placeholders.
    #[serde(default)]
    pub expected_output: String,

    pub worker: WorkerId,

    /// Tasks whose outputs form this task's context, most specific last.
    #[serde(rename = "context", default)]
    pub predecessors: Vec<TaskId>,

    /// Artifact the final answer is written to after a successful turn.
    #[serde(default)]
    pub output_artifact: Option<ArtifactName>,
}

impl Task {
    pub fn new(id: TaskId, worker: WorkerId, description_template: impl Into<String>) -> Self {
        Self {
            id,
            description_template: description_template.into(),
            expected_output: String::new(),
            worker,
            predecessors: Vec::new(),
            output_artifact: None,
        }
    }

    pub fn with_expected_output(mut self, expected_output: impl Into<String>) -> Self {
        self.expected_output = expected_output.into();
        self
    }

    pub fn with_context(mut self, predecessors: impl IntoIterator<Item = TaskId>) -> Self {
        self.predecessors = predecessors.into_iter().collect();
        self
    }

    pub fn with_output_artifact(mut self, artifact: ArtifactName) -> Self {
        self.output_artifact = Some(artifact);
        self
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Success,
    Failed,
}

/// The recorded outcome of one task turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    /// Final answer text. Empty for failed tasks.
    pub raw_output: String,
    /// Tool calls from the turn, in execution order.
    pub tool_invocations: Vec<ToolCall>,
    pub status: TaskStatus,
    /// Rendered error for failed tasks.
    pub error: Option<String>,
    /// Backend round-trips issued, including retries.
    pub attempts: u32,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_is_clamped() {
        assert_eq!(BackendConfig::new("m").with_temperature(3.5).temperature, 2.0);
        assert_eq!(BackendConfig::new("m").with_temperature(-1.0).temperature, 0.0);
        assert_eq!(BackendConfig::new("m").with_temperature(f32::NAN).temperature, 0.7);
    }

    #[test]
    fn test_task_deserialises_from_crew_file_shape() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": "review",
            "description": "Review the {project} code",
            "worker": "reviewer",
            "context": ["code"],
            "output_artifact": "review.md"
        }))
        .unwrap();

        assert_eq!(task.description_template, "Review the {project} code");
        assert_eq!(task.predecessors, vec![TaskId::new("code").unwrap()]);
        assert_eq!(task.output_artifact.as_ref().map(ArtifactName::as_str), Some("review.md"));
        assert!(task.expected_output.is_empty());
    }

    #[test]
    fn test_tool_outcome_serialises_tagged() {
        let outcome = ToolOutcome::Failed {
            message: "nope".into(),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"status": "failed", "message": "nope"})
        );
    }
}

//! Port traits implemented by infrastructure crates.
//!
//! The pipeline crate defines *what* the orchestration engine needs from the
//! outside world; `llm` and `tools` define *how* it is supplied.
//!
//! | Port | Implemented by |
//! |------|----------------|
//! | [`Backend`] | `llm::ChatCompletionsBackend` (and test doubles) |
//! | [`ToolHandler`] | `tools::WriteArtifactTool`, `tools::ReadArtifactTool` |
//! | [`ArtifactStore`] | `tools::FsArtifactStore` |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    ArtifactName, BackendError, ContextEntry, TaskId, ToolError, ToolOutcome, ToolRequest,
    ToolSchema, WorkerId,
};

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// A completed tool call fed back to the backend on the next round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExchange {
    pub request: ToolRequest,
    pub outcome: ToolOutcome,
}

/// One backend round-trip for a worker turn.
///
/// `exchanges` grows as the turn progresses: every tool call requested so far
/// in this turn, with its outcome, in execution order. Re-sending the same
/// request after a transient failure is therefore safe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRequest {
    pub task: TaskId,
    pub worker: WorkerId,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub description: String,
    pub expected_output: String,
    pub context: Vec<ContextEntry>,
    pub tools: Vec<ToolSchema>,
    pub exchanges: Vec<ToolExchange>,
}

/// What the backend answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackendResponse {
    /// The turn is over; this is the task's raw output.
    FinalAnswer(String),
    /// The backend wants these tools executed before it continues.
    ToolCalls(Vec<ToolRequest>),
}

/// A request/response generative backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Performs one round-trip.
    ///
    /// Implementations must classify failures: transport trouble is
    /// [`BackendError::Unavailable`], a refused request is
    /// [`BackendError::Rejected`].
    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError>;
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// A capability a worker may invoke during its turn.
///
/// Handlers must be safe to call again with the same arguments: a write
/// overwrites, a read has no effect.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn schema(&self) -> ToolSchema;

    async fn invoke(&self, arguments: &serde_json::Value) -> Result<serde_json::Value, ToolError>;
}

/// Named text artifacts in a working area.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Replaces the artifact's content (never appends).
    async fn write(&self, name: &ArtifactName, content: &str) -> Result<(), ToolError>;

    /// Returns the artifact's content, or [`ToolError::NotFound`].
    async fn read(&self, name: &ArtifactName) -> Result<String, ToolError>;
}

//! Core orchestration domain for Crewline.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, error type, and port trait used throughout the workspace.
//! Infrastructure crates implement the traits defined here; the `runner` crate
//! drives them.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`TaskId`, `WorkerId`, `ToolName`, etc.) |
//! | [`types`] | Workers, tasks, tool schemas, tool calls, task results |
//! | [`errors`] | Error taxonomy and retry policy |
//! | [`ports`] | `Backend`, `ToolHandler`, `ArtifactStore` traits |
//! | [`registry`] | `ToolRegistry` |
//! | [`template`] | `{parameter}` rendering |
//! | [`resolver`] | Execution-order resolution |
//! | [`context`] | Context assembly from predecessor results |
//! | [`definition`] | Validated `Pipeline` and its builder |
//! | [`run`] | `Run` state machine and result log |

pub mod context;
pub mod definition;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod registry;
pub mod resolver;
pub mod run;
pub mod template;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use context::{assemble_context, render_context, ContextEntry, ResultLookup};
pub use definition::{Pipeline, PipelineBuilder};
pub use errors::{BackendError, DefinitionError, RetryPolicy, RunError, TaskError, ToolError};
pub use identifiers::{ArtifactName, PipelineName, RunId, TaskId, ToolCallId, ToolName, WorkerId};
pub use ports::{ArtifactStore, Backend, BackendRequest, BackendResponse, ToolExchange, ToolHandler};
pub use registry::ToolRegistry;
pub use resolver::resolve_order;
pub use run::{Run, RunFailure, RunStatus};
pub use types::{
    BackendConfig, EffectKind, ExecutionPolicy, Task, TaskResult, TaskStatus, Timestamp,
    ToolCall, ToolOutcome, ToolRequest, ToolSchema, Worker,
};

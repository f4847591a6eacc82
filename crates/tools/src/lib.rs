//! Crewline tool infrastructure adapter.
//!
//! Implements the [`pipeline::ArtifactStore`] and [`pipeline::ToolHandler`]
//! ports: a filesystem-backed artifact store (plus an in-memory one) and the
//! `write_artifact` / `read_artifact` tools workers may be bound to.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All filesystem access lives here. The [`pipeline`]
//! crate sees only the port traits.

pub mod artifact_tools;
pub mod store;

use std::sync::Arc;

use pipeline::{ArtifactStore, ToolRegistry};

pub use artifact_tools::{ReadArtifactTool, WriteArtifactTool, READ_ARTIFACT, WRITE_ARTIFACT};
pub use store::{FsArtifactStore, MemoryArtifactStore};

/// Registry with both artifact tools bound to `store`.
///
/// Registering a tool does not grant it to anyone: each worker still lists
/// the tools it may use.
pub fn standard_registry(store: Arc<dyn ArtifactStore>) -> ToolRegistry {
    ToolRegistry::new()
        .with(Arc::new(WriteArtifactTool::new(store.clone())))
        .with(Arc::new(ReadArtifactTool::new(store)))
}

//! Output artifact persistence.

use pipeline::{ArtifactName, ArtifactStore, TaskError};
use tracing::info;

/// Writes a task's final answer to its declared artifact.
///
/// Called exactly once per successful turn, after any writes the worker made
/// through its own tools. The store overwrites, so re-running a pipeline
/// leaves only the latest output in the artifact.
pub async fn persist_output(
    store: &dyn ArtifactStore,
    artifact: &ArtifactName,
    output: &str,
) -> Result<(), TaskError> {
    store
        .write(artifact, output)
        .await
        .map_err(|source| TaskError::Artifact {
            artifact: artifact.clone(),
            source,
        })?;
    info!(artifact = %artifact, bytes = output.len(), "Persisted task output");
    Ok(())
}

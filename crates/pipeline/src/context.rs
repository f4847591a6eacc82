//! Context assembly: a task's view of its predecessors' outputs.

use serde::{Deserialize, Serialize};

use crate::{Task, TaskError, TaskId, TaskResult};

/// One predecessor output handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub task_id: TaskId,
    pub output: String,
}

/// Read access to already-recorded task results.
pub trait ResultLookup {
    fn result(&self, task: &TaskId) -> Option<&TaskResult>;
}

/// Builds the context for `task` from recorded results.
///
/// Entries follow the task's predecessor-declaration order, not completion
/// order: the last entry is the most specific context. Only successful
/// results count; a missing or failed predecessor is
/// [`TaskError::MissingDependencyResult`].
pub fn assemble_context(
    task: &Task,
    results: &impl ResultLookup,
) -> Result<Vec<ContextEntry>, TaskError> {
    task.predecessors
        .iter()
        .map(|predecessor| match results.result(predecessor) {
            Some(result) if result.is_success() => Ok(ContextEntry {
                task_id: predecessor.clone(),
                output: result.raw_output.clone(),
            }),
            _ => Err(TaskError::MissingDependencyResult {
                task: task.id.clone(),
                predecessor: predecessor.clone(),
            }),
        })
        .collect()
}

/// Joins context outputs into the single text block adapters embed in prompts.
pub fn render_context(entries: &[ContextEntry]) -> String {
    entries
        .iter()
        .map(|entry| entry.output.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

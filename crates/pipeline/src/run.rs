//! Run records: one execution of a pipeline against concrete inputs.
//!
//! A [`Run`] moves through `Pending → Running → {Completed, Failed,
//! Cancelled}`. Terminal states are final; retrying constructs a new run.
//! Its result log is insert-once: each task's result is written exactly once
//! and never mutated afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::context::ResultLookup;
use crate::{PipelineName, RunError, RunId, TaskError, TaskId, TaskResult, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

/// The task that halted a failed run, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    pub task: TaskId,
    pub error: TaskError,
}

/// One execution of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    id: RunId,
    pipeline: PipelineName,
    input_parameters: BTreeMap<String, String>,
    status: RunStatus,
    /// Results in the order tasks finished.
    results: Vec<TaskResult>,
    failure: Option<RunFailure>,
    started_at: Option<Timestamp>,
    finished_at: Option<Timestamp>,
}

impl Run {
    pub fn new(pipeline: PipelineName, input_parameters: BTreeMap<String, String>) -> Self {
        Self {
            id: RunId::new_random(),
            pipeline,
            input_parameters,
            status: RunStatus::Pending,
            results: Vec::new(),
            failure: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn pipeline(&self) -> &PipelineName {
        &self.pipeline
    }

    pub fn input_parameters(&self) -> &BTreeMap<String, String> {
        &self.input_parameters
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn results(&self) -> &[TaskResult] {
        &self.results
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        self.failure.as_ref()
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<Timestamp> {
        self.finished_at
    }

    /// `Pending → Running`.
    pub fn start(&mut self) -> Result<(), RunError> {
        self.transition(RunStatus::Pending, RunStatus::Running)?;
        self.started_at = Some(Timestamp::now());
        Ok(())
    }

    /// Appends a task result. A second result for the same task is refused.
    pub fn record(&mut self, result: TaskResult) -> Result<(), RunError> {
        match self.status {
            RunStatus::Running => {}
            status if status.is_terminal() => return Err(RunError::AlreadyFinished),
            status => return Err(RunError::NotRunning { status }),
        }
        if self.result(&result.task_id).is_some() {
            return Err(RunError::ResultAlreadyRecorded {
                task: result.task_id,
            });
        }
        self.results.push(result);
        Ok(())
    }

    /// `Running → Completed`.
    pub fn complete(&mut self) -> Result<(), RunError> {
        self.finish(RunStatus::Completed)
    }

    /// `Running → Failed`, remembering the task that halted the run.
    pub fn fail(&mut self, task: TaskId, error: TaskError) -> Result<(), RunError> {
        self.finish(RunStatus::Failed)?;
        self.failure = Some(RunFailure { task, error });
        Ok(())
    }

    /// `Running → Cancelled`.
    pub fn cancel(&mut self) -> Result<(), RunError> {
        self.finish(RunStatus::Cancelled)
    }

    fn finish(&mut self, status: RunStatus) -> Result<(), RunError> {
        self.transition(RunStatus::Running, status)?;
        self.finished_at = Some(Timestamp::now());
        Ok(())
    }

    fn transition(&mut self, from: RunStatus, to: RunStatus) -> Result<(), RunError> {
        if self.status == from {
            self.status = to;
            return Ok(());
        }
        if self.status.is_terminal() {
            return Err(RunError::AlreadyFinished);
        }
        Err(RunError::InvalidTransition {
            from: self.status,
            to,
        })
    }

    /// Output of a successful task, if any.
    pub fn output(&self, task: &TaskId) -> Option<&str> {
        self.result(task)
            .filter(|r| r.is_success())
            .map(|r| r.raw_output.as_str())
    }
}

impl ResultLookup for Run {
    fn result(&self, task: &TaskId) -> Option<&TaskResult> {
        self.results.iter().find(|r| &r.task_id == task)
    }
}

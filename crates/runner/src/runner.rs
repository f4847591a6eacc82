//! The pipeline runner: drives a [`Run`] from `PENDING` to a terminal state.
//!
//! For every task in resolved order the runner assembles context from the
//! run's result log, renders the task templates, invokes the worker, persists
//! the declared output artifact, and records the result. The first failed
//! task halts the run; no task starts after it.
//!
//! Sequential pipelines execute one task at a time. Dependency-ordered
//! pipelines launch every task whose predecessors have succeeded, up to
//! `max_concurrency` at once, on a [`JoinSet`]. The coordinating loop is the
//! only writer of the result log.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use pipeline::template::render;
use pipeline::{
    assemble_context, ArtifactStore, Backend, ContextEntry, DefinitionError, ExecutionPolicy,
    Pipeline, Run, RunError, Task, TaskError, TaskId, TaskResult, TaskStatus, Timestamp,
};
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};

use crate::cancellation::CancellationToken;
use crate::config::RunnerConfig;
use crate::invocation::{invoke_worker, TurnInput};
use crate::persistence::persist_output;

/// Result of executing one task, before it is recorded.
#[derive(Debug)]
struct TaskExecution {
    result: TaskResult,
    error: Option<TaskError>,
}

/// Executes runs of one pipeline against one backend and artifact store.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct PipelineRunner {
    pipeline: Arc<Pipeline>,
    backend: Arc<dyn Backend>,
    store: Arc<dyn ArtifactStore>,
    config: RunnerConfig,
    cancellation: CancellationToken,
}

impl PipelineRunner {
    pub fn new(
        pipeline: Arc<Pipeline>,
        backend: Arc<dyn Backend>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            pipeline,
            backend,
            store,
            config: RunnerConfig::default(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Handle that cancels runs started by this runner before their next task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Executes the pipeline once against `input_parameters`.
    ///
    /// Parameter binding is checked for every task first; if any placeholder
    /// is unbound the error is returned and no backend call is made. Otherwise
    /// the returned [`Run`] is terminal and its status and result log describe
    /// exactly what happened.
    pub async fn run(
        &self,
        input_parameters: BTreeMap<String, String>,
    ) -> Result<Run, DefinitionError> {
        self.pipeline.check_parameters(&input_parameters)?;

        let mut run = Run::new(self.pipeline.name().clone(), input_parameters);
        let span = info_span!(
            "run",
            run_id = %run.id(),
            pipeline = %self.pipeline.name(),
            policy = %self.pipeline.policy()
        );

        async {
            log_transition(run.start());
            info!(tasks = self.pipeline.tasks().len(), "Run started");

            match self.pipeline.policy() {
                ExecutionPolicy::Sequential => self.run_sequential(&mut run).await,
                ExecutionPolicy::DependencyOrdered => self.run_concurrent(&mut run).await,
            }

            match run.failure() {
                Some(failure) => error!(
                    status = %run.status(),
                    failed_task = %failure.task,
                    error = %failure.error,
                    "Run finished"
                ),
                None => info!(status = %run.status(), results = run.results().len(), "Run finished"),
            }
        }
        .instrument(span)
        .await;

        Ok(run)
    }

    async fn run_sequential(&self, run: &mut Run) {
        let parameters = Arc::new(run.input_parameters().clone());

        for id in self.pipeline.execution_order() {
            if self.cancellation.is_cancelled() {
                warn!(next_task = %id, "Run cancelled");
                log_transition(run.cancel());
                return;
            }

            let Some(task) = self.pipeline.task(id).cloned() else {
                continue;
            };

            let execution = match assemble_context(&task, &*run) {
                Ok(context) => self.clone().execute_task(task, context, parameters.clone()).await,
                Err(error) => failed_execution(&task, error, Timestamp::now()),
            };

            let failure = execution.error;
            log_transition(run.record(execution.result));
            if let Some(error) = failure {
                log_transition(run.fail(id.clone(), error));
                return;
            }
        }

        log_transition(run.complete());
    }

    async fn run_concurrent(&self, run: &mut Run) {
        let parameters = Arc::new(run.input_parameters().clone());
        let max = self.config.max_concurrency.max(1);

        let mut pending: Vec<Arc<Task>> = self
            .pipeline
            .execution_order()
            .iter()
            .filter_map(|id| self.pipeline.task(id).cloned())
            .collect();
        let mut in_flight: BTreeSet<TaskId> = BTreeSet::new();
        let mut join_set: JoinSet<TaskExecution> = JoinSet::new();
        let mut halted: Option<(TaskId, TaskError)> = None;
        let mut panics: Vec<String> = Vec::new();
        let mut cancelled = false;

        loop {
            if halted.is_none() && panics.is_empty() && !cancelled {
                if self.cancellation.is_cancelled() {
                    warn!(in_flight = in_flight.len(), "Run cancelled");
                    cancelled = true;
                } else {
                    let mut i = 0;
                    while i < pending.len() && join_set.len() < max {
                        if !pending[i].predecessors.iter().all(|p| run.output(p).is_some()) {
                            i += 1;
                            continue;
                        }
                        let task = pending.remove(i);
                        match assemble_context(&task, &*run) {
                            Ok(context) => {
                                in_flight.insert(task.id.clone());
                                join_set.spawn(self.clone().execute_task(
                                    task,
                                    context,
                                    parameters.clone(),
                                ));
                            }
                            Err(error) => {
                                let execution = failed_execution(&task, error.clone(), Timestamp::now());
                                log_transition(run.record(execution.result));
                                halted = Some((task.id.clone(), error));
                                break;
                            }
                        }
                    }
                }
            }

            match join_set.join_next().await {
                None => break,
                Some(Ok(execution)) => {
                    let id = execution.result.task_id.clone();
                    in_flight.remove(&id);
                    let failure = execution.error;
                    log_transition(run.record(execution.result));
                    if let Some(error) = failure {
                        if halted.is_none() {
                            halted = Some((id, error));
                        }
                    }
                }
                Some(Err(join_error)) => {
                    error!(error = %join_error, "Task execution aborted");
                    panics.push(join_error.to_string());
                }
            }
        }

        // Anything still marked in flight never reported back.
        for id in std::mem::take(&mut in_flight) {
            let Some(task) = self.pipeline.task(&id) else {
                continue;
            };
            let error = TaskError::Aborted {
                message: panics.first().cloned().unwrap_or_default(),
            };
            let execution = failed_execution(task, error.clone(), Timestamp::now());
            log_transition(run.record(execution.result));
            if halted.is_none() {
                halted = Some((id, error));
            }
        }

        match halted {
            Some((task, error)) => log_transition(run.fail(task, error)),
            None if cancelled => log_transition(run.cancel()),
            None => log_transition(run.complete()),
        }
    }

    async fn execute_task(
        self,
        task: Arc<Task>,
        context: Vec<ContextEntry>,
        parameters: Arc<BTreeMap<String, String>>,
    ) -> TaskExecution {
        let span = info_span!("task", task_id = %task.id, worker_id = %task.worker);
        async move {
            let started_at = Timestamp::now();

            let Some(worker) = self.pipeline.worker(&task.worker) else {
                let error = TaskError::Aborted {
                    message: format!("worker '{}' is not part of the pipeline", task.worker),
                };
                return failed_execution(&task, error, started_at);
            };

            let rendered = render(&task.description_template, &parameters)
                .and_then(|d| render(&task.expected_output, &parameters).map(|e| (d, e)));
            let (description, expected_output) = match rendered {
                Ok(pair) => pair,
                Err(parameter) => {
                    let error = TaskError::Aborted {
                        message: format!("unbound parameter '{parameter}'"),
                    };
                    return failed_execution(&task, error, started_at);
                }
            };

            info!(context_entries = context.len(), "Task started");

            let input = TurnInput {
                task: task.id.clone(),
                description,
                expected_output,
                context,
                tools: self.pipeline.tool_schemas(worker),
            };
            let outcome = invoke_worker(
                self.backend.as_ref(),
                self.pipeline.registry(),
                &self.config,
                worker,
                input,
            )
            .await;

            // A failed write keeps the generated text on the failed result.
            let (raw_output, status, error) = match outcome.output {
                Ok(text) => {
                    let persisted = match &task.output_artifact {
                        Some(artifact) => persist_output(self.store.as_ref(), artifact, &text).await,
                        None => Ok(()),
                    };
                    match persisted {
                        Ok(()) => (text, TaskStatus::Success, None),
                        Err(error) => (text, TaskStatus::Failed, Some(error)),
                    }
                }
                Err(error) => (String::new(), TaskStatus::Failed, Some(error)),
            };

            match &error {
                None => info!(
                    attempts = outcome.attempts,
                    tool_calls = outcome.tool_invocations.len(),
                    "Task succeeded"
                ),
                Some(e) => error!(
                    attempts = outcome.attempts,
                    tool_calls = outcome.tool_invocations.len(),
                    error = %e,
                    "Task failed"
                ),
            }

            TaskExecution {
                result: TaskResult {
                    task_id: task.id.clone(),
                    worker_id: worker.id.clone(),
                    raw_output,
                    tool_invocations: outcome.tool_invocations,
                    status,
                    error: error.as_ref().map(ToString::to_string),
                    attempts: outcome.attempts,
                    started_at,
                    finished_at: Timestamp::now(),
                },
                error,
            }
        }
        .instrument(span)
        .await
    }
}

fn failed_execution(task: &Task, error: TaskError, started_at: Timestamp) -> TaskExecution {
    TaskExecution {
        result: TaskResult {
            task_id: task.id.clone(),
            worker_id: task.worker.clone(),
            raw_output: String::new(),
            tool_invocations: Vec::new(),
            status: TaskStatus::Failed,
            error: Some(error.to_string()),
            attempts: 0,
            started_at,
            finished_at: Timestamp::now(),
        },
        error: Some(error),
    }
}

/// Run transitions only fail on an orchestration bug; log rather than panic.
fn log_transition(result: Result<(), RunError>) {
    if let Err(e) = result {
        error!(error = %e, "Invalid run transition");
    }
}

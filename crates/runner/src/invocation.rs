//! One worker turn: backend round-trips with intercepted tool calls.
//!
//! The turn starts with a single request carrying the worker's persona, the
//! rendered task, its context, and the schemas of the worker's tools. While
//! the backend answers with tool requests, each requested call is executed
//! locally, recorded as a [`ToolCall`], and fed back as a [`ToolExchange`] on
//! the next round-trip. The turn ends at the first final answer.

use std::time::Duration;

use pipeline::{
    Backend, BackendError, BackendRequest, BackendResponse, ContextEntry, TaskError, ToolCall,
    ToolError, ToolExchange, ToolOutcome, ToolRegistry, ToolRequest, ToolSchema, Worker,
};
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::retry::with_retry;

/// Everything the backend needs to know about one task turn.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub task: pipeline::TaskId,
    pub description: String,
    pub expected_output: String,
    pub context: Vec<ContextEntry>,
    pub tools: Vec<ToolSchema>,
}

/// What a finished turn produced.
///
/// Tool calls are reported even when the turn fails: their side effects
/// happened and belong in the audit log.
#[derive(Debug)]
pub struct TurnOutcome {
    pub output: Result<String, TaskError>,
    pub tool_invocations: Vec<ToolCall>,
    pub attempts: u32,
}

/// Drives one worker turn to a final answer.
pub async fn invoke_worker(
    backend: &dyn Backend,
    registry: &ToolRegistry,
    config: &RunnerConfig,
    worker: &Worker,
    input: TurnInput,
) -> TurnOutcome {
    let mut request = BackendRequest {
        task: input.task,
        worker: worker.id.clone(),
        model: worker.backend.model.clone(),
        temperature: worker.backend.temperature,
        max_tokens: worker.backend.max_tokens,
        role: worker.role.clone(),
        goal: worker.goal.clone(),
        backstory: worker.backstory.clone(),
        description: input.description,
        expected_output: input.expected_output,
        context: input.context,
        tools: input.tools,
        exchanges: Vec::new(),
    };

    let timeout = config.call_timeout();
    let mut calls: Vec<ToolCall> = Vec::new();
    let mut attempts = 0;
    let mut rounds = 0;

    loop {
        let (response, tries) = with_retry(&config.retry, "backend.complete", || {
            complete_with_timeout(backend, &request, timeout)
        })
        .await;
        attempts += tries;

        let requests = match response {
            Ok(BackendResponse::FinalAnswer(text)) => {
                debug!(
                    task = %request.task,
                    rounds,
                    tool_calls = calls.len(),
                    "Worker produced final answer"
                );
                return TurnOutcome {
                    output: Ok(text),
                    tool_invocations: calls,
                    attempts,
                };
            }
            Ok(BackendResponse::ToolCalls(requests)) => requests,
            Err(error) => {
                return TurnOutcome {
                    output: Err(TaskError::Backend(error)),
                    tool_invocations: calls,
                    attempts,
                };
            }
        };

        if rounds >= config.max_tool_rounds {
            warn!(task = %request.task, limit = config.max_tool_rounds, "Tool round limit reached");
            return TurnOutcome {
                output: Err(TaskError::ToolRoundLimit {
                    limit: config.max_tool_rounds,
                }),
                tool_invocations: calls,
                attempts,
            };
        }
        rounds += 1;

        for tool_request in requests {
            let previous = calls.iter().find(|c| c.id == tool_request.id);
            let outcome = match previous {
                Some(done)
                    if done.tool == tool_request.tool
                        && done.arguments == tool_request.arguments =>
                {
                    debug!(call_id = %tool_request.id, "Tool call already executed; replaying outcome");
                    done.outcome.clone()
                }
                Some(_) => {
                    warn!(
                        call_id = %tool_request.id,
                        tool = %tool_request.tool,
                        "Tool call id reused with different content; not executed"
                    );
                    let outcome = ToolOutcome::Failed {
                        message: ToolError::DuplicateCallId(tool_request.id.clone()).to_string(),
                    };
                    calls.push(record(&tool_request, outcome.clone()));
                    outcome
                }
                None => {
                    let outcome = execute_tool(registry, worker, &tool_request).await;
                    calls.push(record(&tool_request, outcome.clone()));
                    outcome
                }
            };
            request.exchanges.push(ToolExchange {
                request: tool_request,
                outcome,
            });
        }
    }
}

fn record(request: &ToolRequest, outcome: ToolOutcome) -> ToolCall {
    ToolCall {
        id: request.id.clone(),
        tool: request.tool.clone(),
        arguments: request.arguments.clone(),
        outcome,
    }
}

async fn complete_with_timeout(
    backend: &dyn Backend,
    request: &BackendRequest,
    timeout: Duration,
) -> Result<BackendResponse, BackendError> {
    match tokio::time::timeout(timeout, backend.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::unavailable(format!(
            "no response within {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Executes one requested tool call. Failures become a `Failed` outcome for
/// the backend to see; they never abort the turn.
async fn execute_tool(registry: &ToolRegistry, worker: &Worker, request: &ToolRequest) -> ToolOutcome {
    let handler = if worker.can_use(&request.tool) {
        registry.get(&request.tool)
    } else {
        None
    };

    let result = match handler {
        Some(handler) => handler.invoke(&request.arguments).await,
        None => Err(ToolError::UnknownTool(request.tool.clone())),
    };

    match result {
        Ok(value) => {
            info!(worker = %worker.id, tool = %request.tool, call_id = %request.id, "Tool call succeeded");
            ToolOutcome::Success { value }
        }
        Err(error) => {
            warn!(
                worker = %worker.id,
                tool = %request.tool,
                call_id = %request.id,
                error = %error,
                "Tool call failed"
            );
            ToolOutcome::Failed {
                message: error.to_string(),
            }
        }
    }
}

//! Shared test doubles for runner integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{
    render_context, ArtifactName, Backend, BackendConfig, BackendError, BackendRequest,
    BackendResponse, ExecutionPolicy, Pipeline, PipelineName, Task, TaskId, ToolCallId,
    ToolName, ToolRegistry, ToolRequest, Worker, WorkerId,
};
use runner::{RetryConfig, RunnerConfig};

/// Echoes the rendered description, followed by the context, as the final answer.
#[derive(Default)]
pub struct EchoBackend {
    calls: AtomicUsize,
}

impl EchoBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for EchoBackend {
    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = if request.context.is_empty() {
            request.description.clone()
        } else {
            format!("{}\n\n{}", request.description, render_context(&request.context))
        };
        Ok(BackendResponse::FinalAnswer(answer))
    }
}

/// Replays a fixed script of responses and records every request it sees.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<BackendResponse, BackendError>>>,
    requests: Mutex<Vec<BackendRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, response: Result<BackendResponse, BackendError>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(response);
        self
    }

    pub fn then_final(self, text: &str) -> Self {
        self.then(Ok(BackendResponse::FinalAnswer(text.to_string())))
    }

    pub fn then_tool(self, id: &str, tool: &str, arguments: serde_json::Value) -> Self {
        self.then(Ok(BackendResponse::ToolCalls(vec![tool_request(id, tool, arguments)])))
    }

    pub fn then_unavailable(self, times: usize) -> Self {
        (0..times).fold(self, |backend, _| {
            backend.then(Err(BackendError::unavailable("503 Service Unavailable")))
        })
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::rejected("script exhausted")))
    }
}

/// Answers `out:<task>` after a per-task delay, recording the context each
/// task received and the order tasks finished in.
#[derive(Default)]
pub struct DelayedBackend {
    delays: HashMap<String, Duration>,
    contexts: Mutex<HashMap<String, Vec<String>>>,
    finished: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl DelayedBackend {
    pub fn new(delays: &[(&str, u64)]) -> Self {
        Self {
            delays: delays
                .iter()
                .map(|(task, ms)| (task.to_string(), Duration::from_millis(*ms)))
                .collect(),
            ..Default::default()
        }
    }

    pub fn context_of(&self, task: &str) -> Vec<String> {
        self.contexts
            .lock()
            .unwrap()
            .get(task)
            .cloned()
            .unwrap_or_default()
    }

    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for DelayedBackend {
    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        let task = request.task.to_string();
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        self.contexts.lock().unwrap().insert(
            task.clone(),
            request.context.iter().map(|c| c.output.clone()).collect(),
        );
        if let Some(delay) = self.delays.get(&task) {
            tokio::time::sleep(*delay).await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().unwrap().push(task.clone());
        Ok(BackendResponse::FinalAnswer(format!("out:{task}")))
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn id(s: &str) -> TaskId {
    TaskId::new(s).unwrap()
}

pub fn artifact(s: &str) -> ArtifactName {
    ArtifactName::new(s).unwrap()
}

pub fn tool(s: &str) -> ToolName {
    ToolName::new(s).unwrap()
}

pub fn tool_request(call_id: &str, name: &str, arguments: serde_json::Value) -> ToolRequest {
    ToolRequest {
        id: ToolCallId::new(call_id).unwrap(),
        tool: tool(name),
        arguments,
    }
}

pub fn worker(name: &str, tools: &[&str]) -> Worker {
    tools.iter().fold(
        Worker::new(
            WorkerId::new(name).unwrap(),
            format!("{name} role"),
            format!("{name} goal"),
            BackendConfig::new("test-model").with_temperature(0.5),
        ),
        |w, t| w.with_capability(tool(t)),
    )
}

pub fn task(name: &str, worker: &str, description: &str, context: &[&str]) -> Task {
    Task::new(id(name), WorkerId::new(worker).unwrap(), description)
        .with_context(context.iter().map(|c| id(c)))
}

pub fn build_pipeline(
    policy: ExecutionPolicy,
    workers: Vec<Worker>,
    tasks: Vec<Task>,
    registry: ToolRegistry,
) -> Arc<Pipeline> {
    Arc::new(
        Pipeline::builder(PipelineName::new("test").unwrap())
            .policy(policy)
            .workers(workers)
            .tasks(tasks)
            .tools(registry)
            .build()
            .unwrap(),
    )
}

pub fn params(pairs: &[(&str, &str)]) -> std::collections::BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Millisecond back-off so retry tests stay fast.
pub fn fast_config(max_retries: u32) -> RunnerConfig {
    RunnerConfig::default()
        .with_call_timeout(Duration::from_secs(5))
        .with_retry(
            RetryConfig::new(max_retries)
                .with_initial_interval(Duration::from_millis(1))
                .with_max_interval(Duration::from_millis(5))
                .with_randomization_factor(0.0),
        )
}

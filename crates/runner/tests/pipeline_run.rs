//! End-to-end runs of small pipelines against scripted backends.

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::*;
use pipeline::{
    ArtifactStore, Backend, BackendError, BackendRequest, BackendResponse, DefinitionError,
    ExecutionPolicy, Pipeline, PipelineName, RunStatus, TaskError, TaskStatus, ToolRegistry,
};
use runner::{CancellationToken, PipelineRunner};
use tempfile::tempdir;
use tools::{FsArtifactStore, MemoryArtifactStore};

/// Architect, coder, reviewer: each task sees the previous one's output.
fn mvp_pipeline() -> Arc<Pipeline> {
    build_pipeline(
        ExecutionPolicy::Sequential,
        vec![
            worker("architect", &[]),
            worker("coder", &[]),
            worker("reviewer", &[]),
        ],
        vec![
            task("t1", "architect", "Design the architecture for {project}.", &[])
                .with_output_artifact(artifact("architecture.md")),
            task("t2", "coder", "Implement {project} from the design.", &["t1"]),
            task("t3", "reviewer", "Review the implementation.", &["t2"])
                .with_output_artifact(artifact("review.md")),
        ],
        ToolRegistry::new(),
    )
}

/// Echoes `out:<task>` and cancels the run once the named task has answered.
struct CancelAfter {
    task: &'static str,
    token: CancellationToken,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl Backend for CancelAfter {
    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        self.seen.lock().unwrap().push(request.task.to_string());
        if request.task.as_str() == self.task {
            self.token.cancel();
        }
        Ok(BackendResponse::FinalAnswer(format!("out:{}", request.task)))
    }
}

/// Panics inside the round-trip for one named task.
struct PanicsOn {
    task: &'static str,
}

#[async_trait]
impl Backend for PanicsOn {
    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        if request.task.as_str() == self.task {
            panic!("backend blew up on {}", request.task);
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        Ok(BackendResponse::FinalAnswer(format!("out:{}", request.task)))
    }
}

/// Runs the chain `t1 -> t2 -> t3`, cancelling as soon as `t1` has answered.
async fn cancel_after_first_task(policy: ExecutionPolicy) {
    let token = CancellationToken::new();
    let backend = Arc::new(CancelAfter {
        task: "t1",
        token: token.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let pipeline = build_pipeline(
        policy,
        vec![worker("w", &[])],
        vec![
            task("t1", "w", "One", &[]),
            task("t2", "w", "Two", &["t1"]),
            task("t3", "w", "Three", &["t2"]),
        ],
        ToolRegistry::new(),
    );
    let runner = PipelineRunner::new(pipeline, backend.clone(), Arc::new(MemoryArtifactStore::new()))
        .with_cancellation(token);

    let run = runner.run(params(&[])).await.unwrap();

    assert_eq!(run.status(), RunStatus::Cancelled, "{policy:?}");
    assert_eq!(run.results().len(), 1, "{policy:?}");
    assert_eq!(run.output(&id("t1")), Some("out:t1"));
    assert!(run.failure().is_none());
    assert!(run.finished_at().is_some());
    assert_eq!(*backend.seen.lock().unwrap(), vec!["t1".to_string()]);
}

/// Rejects the round-trip for one named task and echoes `out:<task>` for all others.
struct FailingOn {
    task: &'static str,
}

#[async_trait]
impl Backend for FailingOn {
    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        if request.task.as_str() == self.task {
            return Err(BackendError::rejected("400 Bad Request"));
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Ok(BackendResponse::FinalAnswer(format!("out:{}", request.task)))
    }
}

#[tokio::test]
async fn test_sequential_run_threads_context_and_persists_artifacts() {
    let backend = Arc::new(EchoBackend::default());
    let store = Arc::new(MemoryArtifactStore::new());
    let runner = PipelineRunner::new(mvp_pipeline(), backend.clone(), store.clone());

    let run = runner.run(params(&[("project", "Todo App")])).await.unwrap();

    assert_eq!(run.status(), RunStatus::Completed);
    assert_eq!(backend.calls(), 3);
    let order: Vec<&str> = run.results().iter().map(|r| r.task_id.as_str()).collect();
    assert_eq!(order, vec!["t1", "t2", "t3"]);

    let t1 = run.output(&id("t1")).unwrap();
    assert_eq!(t1, "Design the architecture for Todo App.");
    let t3 = run.output(&id("t3")).unwrap();
    assert!(t3.contains("Review the implementation."));
    assert!(t3.contains("Implement Todo App from the design."));
    assert!(t3.contains("Design the architecture for Todo App."));

    let artifacts = store.snapshot().await;
    assert_eq!(artifacts.len(), 2);
    assert_eq!(artifacts[&artifact("architecture.md")], t1);
    assert_eq!(artifacts[&artifact("review.md")], t3);
    assert!(run.finished_at().is_some());
}

#[tokio::test]
async fn test_unbound_parameter_aborts_before_any_backend_call() {
    let backend = Arc::new(EchoBackend::default());
    let runner = PipelineRunner::new(
        mvp_pipeline(),
        backend.clone(),
        Arc::new(MemoryArtifactStore::new()),
    );

    let err = runner.run(params(&[])).await.unwrap_err();

    assert_eq!(
        err,
        DefinitionError::UnboundParameter {
            task: id("t1"),
            parameter: "project".into()
        }
    );
    assert_eq!(backend.calls(), 0);
}

#[test]
fn test_unknown_predecessor_is_rejected_at_build_time() {
    let err = Pipeline::builder(PipelineName::new("broken").unwrap())
        .worker(worker("architect", &[]))
        .task(task("t1", "architect", "Design.", &["t99"]))
        .build()
        .unwrap_err();

    assert_eq!(
        err,
        DefinitionError::UnknownPredecessor {
            task: id("t1"),
            predecessor: id("t99")
        }
    );
}

#[test]
fn test_cycle_is_rejected_under_dependency_ordering() {
    let err = Pipeline::builder(PipelineName::new("cyclic").unwrap())
        .policy(ExecutionPolicy::DependencyOrdered)
        .worker(worker("w", &[]))
        .tasks([
            task("t1", "w", "Design", &["t3"]),
            task("free", "w", "Free", &[]),
            task("t2", "w", "Build", &["t1"]),
            task("t3", "w", "Review", &["t2"]),
        ])
        .build()
        .unwrap_err();

    assert_eq!(
        err,
        DefinitionError::CyclicDependency {
            tasks: vec![id("t1"), id("t2"), id("t3")]
        }
    );
}

#[test]
fn test_forward_reference_is_rejected_under_sequential_policy() {
    let err = Pipeline::builder(PipelineName::new("forward").unwrap())
        .worker(worker("w", &[]))
        .tasks([task("a", "w", "A", &["b"]), task("b", "w", "B", &[])])
        .build()
        .unwrap_err();

    assert_eq!(
        err,
        DefinitionError::PredecessorNotEarlier {
            task: id("a"),
            predecessor: id("b")
        }
    );
}

#[tokio::test]
async fn test_rejected_backend_halts_run_at_first_task() {
    let backend = Arc::new(ScriptedBackend::new().then(Err(BackendError::rejected("401 Unauthorized"))));
    let store = Arc::new(MemoryArtifactStore::new());
    let runner = PipelineRunner::new(mvp_pipeline(), backend.clone(), store.clone())
        .with_config(fast_config(3));

    let run = runner.run(params(&[("project", "Todo App")])).await.unwrap();

    assert_eq!(run.status(), RunStatus::Failed);
    assert_eq!(backend.requests().len(), 1, "rejections are never retried");
    assert_eq!(run.results().len(), 1);
    assert_eq!(run.results()[0].status, TaskStatus::Failed);
    assert!(run.output(&id("t2")).is_none());

    let failure = run.failure().unwrap();
    assert_eq!(failure.task, id("t1"));
    assert!(matches!(failure.error, TaskError::Backend(BackendError::Rejected { .. })));
    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_transient_failures_are_retried_within_a_task() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .then_unavailable(2)
            .then_final("design")
            .then_final("code")
            .then_final("review"),
    );
    let runner = PipelineRunner::new(
        mvp_pipeline(),
        backend.clone(),
        Arc::new(MemoryArtifactStore::new()),
    )
    .with_config(fast_config(3));

    let run = runner.run(params(&[("project", "Todo App")])).await.unwrap();

    assert_eq!(run.status(), RunStatus::Completed);
    assert_eq!(run.results()[0].attempts, 3);
    assert_eq!(run.results()[1].attempts, 1);
    assert_eq!(run.output(&id("t2")), Some("code"));
}

#[tokio::test]
async fn test_cancelled_before_start_runs_nothing() {
    let backend = Arc::new(EchoBackend::default());
    let token = CancellationToken::new();
    let runner = PipelineRunner::new(
        mvp_pipeline(),
        backend.clone(),
        Arc::new(MemoryArtifactStore::new()),
    )
    .with_cancellation(token.clone());

    token.cancel();
    let run = runner.run(params(&[("project", "Todo App")])).await.unwrap();

    assert_eq!(run.status(), RunStatus::Cancelled);
    assert!(run.results().is_empty());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_rerun_overwrites_artifacts() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FsArtifactStore::new(dir.path()));
    let runner = PipelineRunner::new(mvp_pipeline(), Arc::new(EchoBackend::default()), store.clone());

    let first = runner.run(params(&[("project", "Todo App")])).await.unwrap();
    let second = runner.run(params(&[("project", "Todo App")])).await.unwrap();

    assert_ne!(first.id(), second.id());
    let on_disk = std::fs::read_to_string(dir.path().join("architecture.md")).unwrap();
    assert_eq!(on_disk, "Design the architecture for Todo App.");
    assert_eq!(
        store.read(&artifact("review.md")).await.unwrap(),
        second.output(&id("t3")).unwrap()
    );
}

#[tokio::test]
async fn test_unwritable_artifact_fails_the_task() {
    let dir = tempdir().unwrap();
    // A file where the artifact's parent directory should be.
    std::fs::write(dir.path().join("docs"), "not a directory").unwrap();

    let pipeline = build_pipeline(
        ExecutionPolicy::Sequential,
        vec![worker("w", &[])],
        vec![
            task("a", "w", "A", &[]).with_output_artifact(artifact("docs/a.md")),
            task("b", "w", "B", &["a"]),
        ],
        ToolRegistry::new(),
    );
    let backend = Arc::new(EchoBackend::default());
    let runner = PipelineRunner::new(pipeline, backend.clone(), Arc::new(FsArtifactStore::new(dir.path())));

    let run = runner.run(params(&[])).await.unwrap();

    assert_eq!(run.status(), RunStatus::Failed);
    assert_eq!(backend.calls(), 1);
    assert!(matches!(
        run.failure().unwrap().error,
        TaskError::Artifact { .. }
    ));
    let a = &run.results()[0];
    assert_eq!(a.status, TaskStatus::Failed);
    assert_eq!(a.raw_output, "A");
    assert_eq!(run.output(&id("a")), None);
}

#[tokio::test]
async fn test_dependency_ordered_context_follows_declaration_not_completion() {
    let backend = Arc::new(DelayedBackend::new(&[("a", 80), ("b", 5)]));
    let pipeline = build_pipeline(
        ExecutionPolicy::DependencyOrdered,
        vec![worker("w", &[])],
        vec![
            task("a", "w", "A", &[]),
            task("b", "w", "B", &[]),
            task("c", "w", "C", &["a", "b"]),
        ],
        ToolRegistry::new(),
    );
    let runner = PipelineRunner::new(pipeline, backend.clone(), Arc::new(MemoryArtifactStore::new()));

    let run = runner.run(params(&[])).await.unwrap();

    assert_eq!(run.status(), RunStatus::Completed);
    assert_eq!(backend.finished(), vec!["b", "a", "c"]);
    assert_eq!(backend.context_of("c"), vec!["out:a", "out:b"]);
    assert_eq!(backend.peak_concurrency(), 2);
}

#[tokio::test]
async fn test_max_concurrency_bounds_parallel_tasks() {
    let backend = Arc::new(DelayedBackend::new(&[("a", 10), ("b", 10), ("c", 10)]));
    let pipeline = build_pipeline(
        ExecutionPolicy::DependencyOrdered,
        vec![worker("w", &[])],
        vec![task("a", "w", "A", &[]), task("b", "w", "B", &[]), task("c", "w", "C", &[])],
        ToolRegistry::new(),
    );
    let runner = PipelineRunner::new(pipeline, backend.clone(), Arc::new(MemoryArtifactStore::new()))
        .with_config(fast_config(0).with_max_concurrency(1));

    let run = runner.run(params(&[])).await.unwrap();

    assert_eq!(run.status(), RunStatus::Completed);
    assert_eq!(backend.peak_concurrency(), 1);
    assert_eq!(backend.finished(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_dependency_ordered_failure_stops_dependents_but_records_in_flight() {
    let pipeline = build_pipeline(
        ExecutionPolicy::DependencyOrdered,
        vec![worker("w", &[])],
        vec![
            task("a", "w", "A", &[]),
            task("b", "w", "B", &[]),
            task("c", "w", "C", &["a"]),
        ],
        ToolRegistry::new(),
    );
    let runner = PipelineRunner::new(
        pipeline,
        Arc::new(FailingOn { task: "a" }),
        Arc::new(MemoryArtifactStore::new()),
    )
    .with_config(fast_config(0));

    let run = runner.run(params(&[])).await.unwrap();

    assert_eq!(run.status(), RunStatus::Failed);
    assert_eq!(run.failure().unwrap().task, id("a"));
    assert_eq!(run.output(&id("b")), Some("out:b"));
    assert!(run.results().iter().all(|r| r.task_id != id("c")));
}

#[tokio::test]
async fn test_sequential_cancel_mid_run_keeps_finished_results() {
    cancel_after_first_task(ExecutionPolicy::Sequential).await;
}

#[tokio::test]
async fn test_dependency_ordered_cancel_mid_run_keeps_finished_results() {
    cancel_after_first_task(ExecutionPolicy::DependencyOrdered).await;
}

#[tokio::test]
async fn test_panicking_task_aborts_and_fails_the_run() {
    let pipeline = build_pipeline(
        ExecutionPolicy::DependencyOrdered,
        vec![worker("w", &[])],
        vec![
            task("a", "w", "A", &[]),
            task("b", "w", "B", &[]),
            task("c", "w", "C", &["a"]),
        ],
        ToolRegistry::new(),
    );
    let runner = PipelineRunner::new(
        pipeline,
        Arc::new(PanicsOn { task: "b" }),
        Arc::new(MemoryArtifactStore::new()),
    )
    .with_config(fast_config(0));

    let run = runner.run(params(&[])).await.unwrap();

    assert_eq!(run.status(), RunStatus::Failed);
    let failure = run.failure().unwrap();
    assert_eq!(failure.task, id("b"));
    match &failure.error {
        TaskError::Aborted { message } => assert!(message.contains("panicked"), "{message}"),
        other => panic!("expected aborted task, got {other:?}"),
    }

    let b = run.results().iter().find(|r| r.task_id == id("b")).unwrap();
    assert_eq!(b.status, TaskStatus::Failed);
    // The sibling already in flight still reports; its dependent never starts.
    assert_eq!(run.output(&id("a")), Some("out:a"));
    assert!(run.results().iter().all(|r| r.task_id != id("c")));
}

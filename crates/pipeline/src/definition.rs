//! Validated pipeline (crew) definitions.
//!
//! A [`Pipeline`] can only be obtained from [`PipelineBuilder::build`], which
//! checks every structural invariant up front:
//!
//! - at least one task, unique task and worker identifiers;
//! - every task's worker exists;
//! - every worker capability has a registered tool handler;
//! - predecessors exist, are not repeated, and admit an execution order under
//!   the chosen [`ExecutionPolicy`].
//!
//! Parameter binding is checked per run by [`Pipeline::check_parameters`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::resolver::resolve_order;
use crate::template::placeholders;
use crate::{
    DefinitionError, ExecutionPolicy, PipelineName, Task, TaskId, ToolRegistry, ToolSchema,
    Worker, WorkerId,
};

/// An immutable, validated pipeline definition.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: PipelineName,
    policy: ExecutionPolicy,
    workers: BTreeMap<WorkerId, Arc<Worker>>,
    tasks: Vec<Arc<Task>>,
    order: Vec<TaskId>,
    registry: ToolRegistry,
}

impl Pipeline {
    pub fn builder(name: PipelineName) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    pub fn name(&self) -> &PipelineName {
        &self.name
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> &[Arc<Task>] {
        &self.tasks
    }

    pub fn task(&self, id: &TaskId) -> Option<&Arc<Task>> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn worker(&self, id: &WorkerId) -> Option<&Arc<Worker>> {
        self.workers.get(id)
    }

    pub fn workers(&self) -> impl Iterator<Item = &Arc<Worker>> {
        self.workers.values()
    }

    /// The resolved execution order: every task appears after its predecessors.
    pub fn execution_order(&self) -> &[TaskId] {
        &self.order
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Schemas of the tools `worker` is bound to.
    pub fn tool_schemas(&self, worker: &Worker) -> Vec<ToolSchema> {
        self.registry.schemas_for(&worker.capabilities)
    }

    /// Every placeholder name used by any task template.
    pub fn required_parameters(&self) -> BTreeSet<String> {
        self.tasks
            .iter()
            .flat_map(|t| {
                placeholders(&t.description_template)
                    .into_iter()
                    .chain(placeholders(&t.expected_output))
            })
            .map(str::to_string)
            .collect()
    }

    /// Checks that `parameters` bind every placeholder of every task.
    ///
    /// Tasks are checked in execution order so the reported task is the first
    /// one that would have failed.
    pub fn check_parameters(
        &self,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), DefinitionError> {
        for id in &self.order {
            let Some(task) = self.task(id) else { continue };
            let unbound = placeholders(&task.description_template)
                .into_iter()
                .chain(placeholders(&task.expected_output))
                .find(|name| !parameters.contains_key(*name));
            if let Some(parameter) = unbound {
                return Err(DefinitionError::UnboundParameter {
                    task: task.id.clone(),
                    parameter: parameter.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Collects workers, tasks, and tools, then validates them into a [`Pipeline`].
#[derive(Debug)]
pub struct PipelineBuilder {
    name: PipelineName,
    policy: ExecutionPolicy,
    workers: Vec<Worker>,
    tasks: Vec<Task>,
    registry: ToolRegistry,
}

impl PipelineBuilder {
    pub fn new(name: PipelineName) -> Self {
        Self {
            name,
            policy: ExecutionPolicy::default(),
            workers: Vec::new(),
            tasks: Vec::new(),
            registry: ToolRegistry::new(),
        }
    }

    pub fn policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn worker(mut self, worker: Worker) -> Self {
        self.workers.push(worker);
        self
    }

    pub fn workers(mut self, workers: impl IntoIterator<Item = Worker>) -> Self {
        self.workers.extend(workers);
        self
    }

    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    pub fn tools(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn build(self) -> Result<Pipeline, DefinitionError> {
        if self.tasks.is_empty() {
            return Err(DefinitionError::EmptyPipeline {
                pipeline: self.name.to_string(),
            });
        }

        let mut workers = BTreeMap::new();
        for worker in self.workers {
            if let Some(tool) = worker
                .capabilities
                .iter()
                .find(|tool| !self.registry.contains(tool))
            {
                return Err(DefinitionError::UnknownCapability {
                    worker: worker.id.clone(),
                    tool: tool.clone(),
                });
            }
            let id = worker.id.clone();
            if workers.insert(id.clone(), Arc::new(worker)).is_some() {
                return Err(DefinitionError::DuplicateWorker { worker: id });
            }
        }

        for task in &self.tasks {
            if !workers.contains_key(&task.worker) {
                return Err(DefinitionError::UnknownWorker {
                    task: task.id.clone(),
                    worker: task.worker.clone(),
                });
            }
        }

        let order = resolve_order(&self.tasks, self.policy)?;

        debug!(
            pipeline = %self.name,
            policy = %self.policy,
            tasks = self.tasks.len(),
            workers = workers.len(),
            "Pipeline definition validated"
        );

        Ok(Pipeline {
            name: self.name,
            policy: self.policy,
            workers,
            tasks: self.tasks.into_iter().map(Arc::new).collect(),
            order,
            registry: self.registry,
        })
    }
}

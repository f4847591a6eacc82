//! Crew definition files.
//!
//! A crew file is JSON describing the workers, the tasks, the execution
//! policy, and default input parameters. It is validated by building a
//! [`Pipeline`] against the tool registry the run will use.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use pipeline::{
    DefinitionError, ExecutionPolicy, Pipeline, PipelineName, Task, ToolRegistry, Worker,
};
use serde::Deserialize;

/// Architect, coder, reviewer: the crew used when no file is given.
const MVP_CREW: &str = include_str!("../crews/mvp.json");

#[derive(Debug, Clone, Deserialize)]
pub struct CrewDefinition {
    pub name: String,
    #[serde(default)]
    pub policy: ExecutionPolicy,
    /// Parameter values used when `--input` does not supply one.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    pub workers: Vec<Worker>,
    pub tasks: Vec<Task>,
}

impl CrewDefinition {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid crew definition")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read crew definition {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("In {}", path.display()))
    }

    /// The built-in architect/coder/reviewer crew.
    pub fn mvp() -> Result<Self> {
        Self::from_json(MVP_CREW)
    }

    /// Defaults overlaid with explicit values; explicit values win.
    pub fn merge_inputs(&self, explicit: impl IntoIterator<Item = (String, String)>) -> BTreeMap<String, String> {
        let mut merged = self.inputs.clone();
        merged.extend(explicit);
        merged
    }

    pub fn build(&self, registry: ToolRegistry) -> Result<Pipeline, DefinitionError> {
        let name = PipelineName::new(self.name.clone()).ok_or_else(|| {
            DefinitionError::InvalidIdentifier {
                kind: "pipeline".into(),
                value: self.name.clone(),
            }
        })?;

        // Temperatures read from JSON are not clamped by deserialisation.
        let workers = self.workers.iter().cloned().map(|mut worker| {
            worker.backend = worker.backend.clone().with_temperature(worker.backend.temperature);
            worker
        });

        Pipeline::builder(name)
            .policy(self.policy)
            .workers(workers)
            .tasks(self.tasks.iter().cloned())
            .tools(registry)
            .build()
    }
}

//! Artifact tools exposed to workers.
//!
//! Both tools delegate to an [`ArtifactStore`], so a worker writing a file and
//! the runner persisting a task's output go through the same contract.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{ArtifactName, ArtifactStore, EffectKind, ToolError, ToolHandler, ToolName, ToolSchema};
use serde::Deserialize;
use serde_json::{json, Value};

pub const WRITE_ARTIFACT: &str = "write_artifact";
pub const READ_ARTIFACT: &str = "read_artifact";

const _: () = assert!(!WRITE_ARTIFACT.is_empty() && !READ_ARTIFACT.is_empty());

/// Arguments for writing an artifact
#[derive(Debug, Deserialize)]
struct WriteArtifactArgs {
    /// Relative artifact name, e.g. `src/main.py`
    name: String,
    content: String,
}

/// Arguments for reading an artifact
#[derive(Debug, Deserialize)]
struct ReadArtifactArgs {
    name: String,
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: &Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments.clone()).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn artifact_name(raw: String) -> Result<ArtifactName, ToolError> {
    ArtifactName::new(raw.clone()).ok_or(ToolError::InvalidArtifactName(raw))
}

/// `WRITE_ARTIFACT(name, content)`: replaces the artifact's content.
pub struct WriteArtifactTool {
    store: Arc<dyn ArtifactStore>,
}

impl WriteArtifactTool {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for WriteArtifactTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::from_static(WRITE_ARTIFACT),
            description: "Write text content to a named file in the working directory. \
                          Overwrites the file if it already exists."
                .to_string(),
            effect: EffectKind::WriteArtifact,
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Relative file name, e.g. 'src/app.py'"
                    },
                    "content": {
                        "type": "string",
                        "description": "Full file content"
                    }
                },
                "required": ["name", "content"]
            }),
        }
    }

    async fn invoke(&self, arguments: &Value) -> Result<Value, ToolError> {
        let args: WriteArtifactArgs = parse_args(arguments)?;
        let name = artifact_name(args.name)?;
        self.store.write(&name, &args.content).await?;
        Ok(json!({
            "success": true,
            "name": name.as_str(),
            "bytes_written": args.content.len()
        }))
    }
}

/// `READ_ARTIFACT(name)`: returns the artifact's content.
pub struct ReadArtifactTool {
    store: Arc<dyn ArtifactStore>,
}

impl ReadArtifactTool {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for ReadArtifactTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::from_static(READ_ARTIFACT),
            description: "Read the content of a named file in the working directory.".to_string(),
            effect: EffectKind::ReadArtifact,
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Relative file name to read"
                    }
                },
                "required": ["name"]
            }),
        }
    }

    async fn invoke(&self, arguments: &Value) -> Result<Value, ToolError> {
        let args: ReadArtifactArgs = parse_args(arguments)?;
        let name = artifact_name(args.name)?;
        let content = self.store.read(&name).await?;
        Ok(json!({
            "name": name.as_str(),
            "content": content
        }))
    }
}

//! Artifact stores.
//!
//! [`FsArtifactStore`] keeps artifacts as files under a working directory.
//! Names are relative paths; anything that could escape the directory
//! (absolute paths, `..`, drive prefixes) is rejected before touching disk.
//! [`MemoryArtifactStore`] keeps them in a map, for dry runs and tests.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use pipeline::{ArtifactName, ArtifactStore, ToolError};
use tokio::sync::RwLock;
use tracing::debug;

/// Artifacts as files below `root`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves `name` below the root, refusing names that would escape it.
    pub fn resolve(&self, name: &ArtifactName) -> Result<PathBuf, ToolError> {
        let relative = Path::new(name.as_str());
        let mut has_file = false;
        for component in relative.components() {
            match component {
                Component::Normal(_) => has_file = true,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ToolError::InvalidArtifactName(name.to_string()));
                }
            }
        }
        if !has_file {
            return Err(ToolError::InvalidArtifactName(name.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn write(&self, name: &ArtifactName, content: &str) -> Result<(), ToolError> {
        let path = self.resolve(name)?;
        let io_error = |e: std::io::Error| ToolError::Io {
            name: name.to_string(),
            message: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(&path, content).await.map_err(io_error)?;

        debug!(path = %path.display(), bytes = content.len(), "Artifact written");
        Ok(())
    }

    async fn read(&self, name: &ArtifactName) -> Result<String, ToolError> {
        let path = self.resolve(name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ToolError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(ToolError::Io {
                name: name.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Artifacts held in memory.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<BTreeMap<ArtifactName, String>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored artifact.
    pub async fn snapshot(&self) -> BTreeMap<ArtifactName, String> {
        self.artifacts.read().await.clone()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn write(&self, name: &ArtifactName, content: &str) -> Result<(), ToolError> {
        self.artifacts
            .write()
            .await
            .insert(name.clone(), content.to_string());
        Ok(())
    }

    async fn read(&self, name: &ArtifactName) -> Result<String, ToolError> {
        self.artifacts
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound {
                name: name.to_string(),
            })
    }
}

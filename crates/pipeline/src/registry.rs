//! Tool registry: the closed set of capabilities a pipeline may bind.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{ToolHandler, ToolName, ToolSchema};

/// Maps tool names to handlers.
///
/// Worker capabilities are checked against this registry when a pipeline is
/// built, so an unknown capability is a definition error rather than a
/// runtime surprise.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under the name from its schema, replacing any
    /// previous handler with that name.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.schema().name;
        self.tools.insert(name, handler);
    }

    pub fn with(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn get(&self, name: &ToolName) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &ToolName) -> bool {
        self.tools.contains_key(name)
    }

    /// Schemas for the given names, skipping unregistered ones.
    pub fn schemas_for<'a>(&self, names: impl IntoIterator<Item = &'a ToolName>) -> Vec<ToolSchema> {
        names
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|handler| handler.schema())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

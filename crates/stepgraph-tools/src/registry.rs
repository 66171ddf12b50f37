use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use stepgraph_core::error::Result;
use stepgraph_core::traits::Tool;
use stepgraph_core::value::StateMap;
use tracing::debug;

use crate::func::{AsyncFnTool, FnTool};

/// Registry of available tools, keyed by the name graph nodes refer to.
///
/// Populated once at startup, then shared read-only (behind an `Arc`)
/// by every run.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. A previous tool with the same name is replaced.
    pub fn register(&mut self, name: impl Into<String>, tool: impl Tool) {
        self.register_arc(name, Arc::new(tool));
    }

    /// Register an already shared tool.
    pub fn register_arc(&mut self, name: impl Into<String>, tool: Arc<dyn Tool>) {
        let name = name.into();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(tool = %name, "Replaced existing tool registration");
        }
    }

    /// Register a synchronous closure as a tool.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, description: impl Into<String>, func: F)
    where
        F: Fn(&StateMap) -> Result<Option<serde_json::Value>> + Send + Sync + 'static,
    {
        self.register(name, FnTool::new(description, func));
    }

    /// Register an async closure as a tool.
    pub fn register_async<F, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        func: F,
    ) where
        F: Fn(StateMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<serde_json::Value>>> + Send + 'static,
    {
        self.register(name, AsyncFnTool::new(description, func));
    }

    /// Unregister a tool by name.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Every registered name with its description (empty if none).
    pub fn list(&self) -> BTreeMap<String, String> {
        self.tools
            .iter()
            .map(|(name, tool)| (name.clone(), tool.description().to_string()))
            .collect()
    }

    /// Create a registry with all built-in tools registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register_summarization_tools(&mut registry);
        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

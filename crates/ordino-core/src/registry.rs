//! Name-keyed tool registry.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::schema::InputSchema;
use crate::tool::Tool;

/// Catalog entry describing one registered tool.
///
/// Returned by [`ToolRegistry::list_tools`] and serialized as-is by the
/// `/tools` endpoint; the planner renders the same catalog into its
/// prompt context.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

/// Registry mapping tool names to shared implementations.
///
/// Registration happens once at startup; after that the registry is a
/// read-only structure shared across runs. Re-registering a name
/// overwrites silently (last write wins).
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its declared name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Builder-style registration for startup wiring.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All registered names, sorted for stable output.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Name-keyed catalog of every registered tool.
    pub fn list_tools(&self) -> BTreeMap<String, ToolInfo> {
        self.tools
            .iter()
            .map(|(name, tool)| {
                (
                    name.clone(),
                    ToolInfo {
                        name: tool.name().to_string(),
                        description: tool.description().to_string(),
                        input_schema: tool.input_schema(),
                    },
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

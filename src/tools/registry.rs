//! Registry of tools discovered from remote servers.

use std::collections::BTreeMap;

use crate::error::RegistryError;
use crate::tools::tool::ToolDescriptor;

/// Tools available to one session, keyed by name.
///
/// Ordered by name so that "the first tool" is stable across runs.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A name already offered by another server is kept as-is.
    pub fn register(&mut self, tool: ToolDescriptor) {
        if let Some(existing) = self.tools.get(&tool.name) {
            tracing::warn!(
                tool = %tool.name,
                kept = %existing.server,
                ignored = %tool.server,
                "Rejected tool registration: name already offered by another server"
            );
            return;
        }
        tracing::debug!(server = %tool.server, "Registered tool: {}", tool.name);
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Check if a tool exists.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all tool names.
    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Get the number of registered tools.
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Pick the tool the loop should search with: the named one, or the first.
    ///
    /// Without a name, tools hosted on `prompt_server` are only used when no
    /// other server offers one.
    pub fn resolve(
        &self,
        name: Option<&str>,
        prompt_server: &str,
    ) -> Result<&ToolDescriptor, RegistryError> {
        match name {
            Some(name) => self
                .get(name)
                .ok_or_else(|| RegistryError::UnknownTool(name.to_string())),
            None => self
                .tools
                .values()
                .find(|t| t.server != prompt_server)
                .or_else(|| self.tools.values().next())
                .ok_or(RegistryError::NoTools),
        }
    }
}

impl FromIterator<ToolDescriptor> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = ToolDescriptor>>(iter: I) -> Self {
        let mut registry = Self::new();
        for tool in iter {
            registry.register(tool);
        }
        registry
    }
}

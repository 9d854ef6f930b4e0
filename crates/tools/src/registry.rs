//! Name → capability lookup.

use std::collections::HashMap;
use std::sync::Arc;

use cl_domain::tool::ToolDefinition;

use crate::capability::Capability;

/// Names in this namespace belong to externally registered tools and are
/// always treated as well-formed, registered or not.
pub const EXTERNAL_TOOL_PREFIX: &str = "mcp__";

/// Registered capabilities, in registration order.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Capability>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability. A later registration with the same name
    /// replaces the earlier one in place.
    pub fn register(&mut self, tool: Arc<dyn Capability>) {
        let name = tool.name().to_owned();
        match self.index.get(&name) {
            Some(&i) => self.tools[i] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.index.get(name).map(|&i| self.tools[i].clone())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Whether `name` is a name the model may legitimately use.
    pub fn is_known_name(&self, name: &str) -> bool {
        self.index.contains_key(name) || name.starts_with(EXTERNAL_TOOL_PREFIX)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ToolError;
    use cl_domain::tool::ToolResult;
    use serde_json::Value;

    struct Echo(&'static str, &'static str);

    #[async_trait::async_trait]
    impl Capability for Echo {
        fn name(&self) -> &str {
            self.0
        }
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.0.into(),
                description: self.1.into(),
                parameters: serde_json::json!({"type": "object"}),
            }
        }
        async fn invoke(&self, _args: Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(self.1))
        }
    }

    #[test]
    fn re_registering_replaces_in_place() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(Echo("a", "first")));
        reg.register(Arc::new(Echo("b", "b")));
        reg.register(Arc::new(Echo("a", "second")));
        assert_eq!(reg.names(), vec!["a", "b"]);
        assert_eq!(reg.definitions()[0].description, "second");
    }

    #[test]
    fn external_namespace_is_always_known() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(Echo("bash", "")));
        assert!(reg.is_known_name("bash"));
        assert!(reg.is_known_name("mcp__github__list_issues"));
        assert!(!reg.is_known_name("bashx"));
        assert!(reg.get("mcp__github__list_issues").is_none());
    }
}

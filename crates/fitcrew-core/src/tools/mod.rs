//! Tools an agent may invoke during its own generation.
//!
//! A tool never fails from the agent's point of view: bad arguments and
//! internal problems come back as text the model can act on.

pub mod knowledge_lookup;
pub mod plan_validator;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{ToolCall, ToolSpec};

pub use knowledge_lookup::KnowledgeLookupTool;
pub use plan_validator::{PlanCheck, PlanValidatorTool, check_final_plan};

/// A callable capability bound to an agent.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call this tool.
    fn name(&self) -> &str;

    /// Function-calling declaration sent to the model.
    fn spec(&self) -> ToolSpec;

    /// Execute with a parsed argument object and return the text reply.
    async fn call(&self, args: &Value) -> String;
}

// Compile-time assertion: Tool must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Tool) {}
};

/// Read a string argument, accepting an inline object or array by
/// re-serializing it.
pub(crate) fn string_arg(args: &Value, name: &str) -> Option<String> {
    match args.get(name)? {
        Value::String(s) => Some(s.clone()),
        v @ (Value::Object(_) | Value::Array(_)) => Some(v.to_string()),
        _ => None,
    }
}

/// The tools bound to one agent, keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced and returned.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Option<Box<dyn Tool>> {
        let name = tool.name().to_string();
        self.tools.insert(name, Box::new(tool))
    }

    /// Builder-style [`ToolRegistry::register`].
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|b| b.as_ref())
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Declarations for every registered tool, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.list()
            .into_iter()
            .filter_map(|name| self.get(name))
            .map(|t| t.spec())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a model-requested call.
    ///
    /// Unknown tools and unparseable arguments produce a corrective message
    /// instead of an error.
    pub async fn dispatch(&self, call: &ToolCall) -> String {
        let Some(tool) = self.get(&call.name) else {
            return format!(
                "Unknown tool '{}'. Available tools: {}.",
                call.name,
                self.list().join(", ")
            );
        };
        let raw = if call.arguments.trim().is_empty() {
            "{}"
        } else {
            call.arguments.as_str()
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(args) => tool.call(&args).await,
            Err(e) => format!(
                "Arguments for '{}' are not valid JSON: {e}. Send a JSON object.",
                call.name
            ),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "upper".into(),
                description: "Uppercase text.".into(),
                parameters: json!({"type": "object", "properties": {"text": {"type": "string"}}}),
            }
        }

        async fn call(&self, args: &Value) -> String {
            string_arg(args, "text")
                .map(|s| s.to_uppercase())
                .unwrap_or_else(|| "missing 'text'".into())
        }
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "c1".into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[test]
    fn registry_starts_empty() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.specs().is_empty());
    }

    #[test]
    fn register_replaces_existing() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(Upper).is_none());
        assert!(registry.register(Upper).is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list(), vec!["upper"]);
    }

    #[tokio::test]
    async fn dispatch_runs_tool() {
        let registry = ToolRegistry::new().with(Upper);
        let out = registry.dispatch(&call("upper", r#"{"text":"abc"}"#)).await;
        assert_eq!(out, "ABC");
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_is_corrective() {
        let registry = ToolRegistry::new().with(Upper);
        let out = registry.dispatch(&call("lower", "{}")).await;
        assert!(out.contains("Unknown tool 'lower'"));
        assert!(out.contains("upper"));
    }

    #[tokio::test]
    async fn dispatch_bad_arguments_is_corrective() {
        let registry = ToolRegistry::new().with(Upper);
        let out = registry.dispatch(&call("upper", "{oops")).await;
        assert!(out.contains("not valid JSON"));
    }

    #[test]
    fn string_arg_accepts_inline_object() {
        let args = json!({"plan_json": {"a": 1}});
        assert_eq!(string_arg(&args, "plan_json").as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(string_arg(&json!({"plan_json": 3}), "plan_json"), None);
    }

    #[test]
    fn registry_debug_shows_names() {
        let registry = ToolRegistry::new().with(Upper);
        assert!(format!("{registry:?}").contains("upper"));
    }
}

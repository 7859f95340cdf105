//! Search over the body-assessment knowledge base.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Tool, string_arg};
use crate::knowledge::{DEFAULT_LIMIT, KnowledgeBase};
use crate::llm::ToolSpec;

pub const TOOL_NAME: &str = "search_body_assessment";

const MAX_LIMIT: u64 = 8;

/// Keyword search over a shared [`KnowledgeBase`].
#[derive(Debug, Clone)]
pub struct KnowledgeLookupTool {
    knowledge: Arc<KnowledgeBase>,
}

impl KnowledgeLookupTool {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self { knowledge }
    }
}

#[async_trait]
impl Tool for KnowledgeLookupTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_NAME.to_string(),
            description: "Search the body-assessment reference table for body-composition norms: \
                          BMI categories, body-fat ranges by sex and age, estimation formulas, and \
                          somatotype markers."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Keywords to search for, e.g. 'body fat ranges men'."
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of entries to return (default 3)."
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, args: &Value) -> String {
        let Some(query) = string_arg(args, "query").filter(|q| !q.trim().is_empty()) else {
            return "Missing 'query' argument. Pass the keywords to search for.".to_string();
        };
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_LIMIT, |n| n.clamp(1, MAX_LIMIT) as usize);

        let hits = self.knowledge.search(&query, limit);
        tracing::debug!(query = %query, hits = hits.len(), "knowledge lookup");
        if hits.is_empty() {
            return format!("No reference entries matched '{query}'. Try broader keywords.");
        }

        let mut out = String::new();
        for (i, hit) in hits.iter().enumerate() {
            if i > 0 {
                out.push_str("\n\n");
            }
            out.push_str(&format!(
                "[{}] {} ({})\n{}",
                i + 1,
                hit.entry.topic,
                hit.entry.category,
                hit.entry.content
            ));
        }
        out
    }
}

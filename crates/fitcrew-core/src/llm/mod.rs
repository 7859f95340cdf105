//! Language-model client interface.
//!
//! Agents talk to a model only through the [`ChatModel`] trait, so the
//! pipeline can run against the OpenAI-compatible client in production and a
//! scripted model in tests.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use openai::{OpenAiClient, OpenAiConfig};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier echoed back in the matching tool result.
    pub id: String,
    pub name: String,
    /// Raw JSON argument object as produced by the model.
    pub arguments: String,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    /// Calls requested by an assistant turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool results, the call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Assistant turn that requested tool calls.
    pub fn assistant_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::new(MessageRole::Assistant, content)
        }
    }

    /// Result of executing the tool call `call_id`.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::new(MessageRole::Tool, content)
        }
    }
}

/// Function-calling declaration offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object.
    pub parameters: Value,
}

/// A completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// The system prompt, if the conversation starts with one.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
    }
}

/// Token accounting reported by the model service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A completion result: final text, tool calls, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
    pub model: String,
}

impl ChatResponse {
    /// A plain text answer.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// A turn that only requests tool calls.
    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures talking to the model service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The service could not be reached (connect failure, timeout, 502-504).
    #[error("model service unreachable: {0}")]
    Unreachable(String),

    /// The service rejected the call because of rate limiting.
    #[error("model service rate limited: {0}")]
    RateLimited(String),

    /// Credentials were missing or rejected.
    #[error("model service rejected credentials: {0}")]
    Auth(String),

    /// The service answered with an error status.
    #[error("model service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The service answered with something that is not a completion.
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::RateLimited(_) => true,
            Self::Upstream { status, .. } => *status >= 500,
            Self::Auth(_) | Self::InvalidResponse(_) => false,
        }
    }

    /// Whether the service was unavailable rather than answering badly.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::RateLimited(_))
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A chat-completion model with function calling.
///
/// Object-safe so agents can hold `Arc<dyn ChatModel>`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier for logging (e.g. "gpt-4o").
    fn name(&self) -> &str;

    /// Run one completion turn.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ModelError>;
}

// Compile-time assertion: ChatModel must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ChatModel) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ModelError> {
            let last = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(ChatResponse::text(last))
        }
    }

    #[tokio::test]
    async fn model_is_usable_as_trait_object() {
        let model: Box<dyn ChatModel> = Box::new(EchoModel);
        let request = ChatRequest {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hello")],
            tools: vec![],
            temperature: None,
        };
        let response = model.complete(&request).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("hello"));
        assert_eq!(request.system_prompt(), Some("sys"));
    }

    #[test]
    fn retryable_classification() {
        assert!(ModelError::Unreachable("down".into()).is_retryable());
        assert!(ModelError::RateLimited("slow down".into()).is_retryable());
        assert!(
            ModelError::Upstream {
                status: 500,
                message: "oops".into()
            }
            .is_retryable()
        );
        assert!(
            !ModelError::Upstream {
                status: 400,
                message: "bad".into()
            }
            .is_retryable()
        );
        assert!(!ModelError::Auth("no key".into()).is_retryable());
        assert!(!ModelError::InvalidResponse("garbage".into()).is_retryable());
    }

    #[test]
    fn tool_result_carries_call_id() {
        let m = ChatMessage::tool_result("call_1", "ok");
        assert_eq!(m.role, MessageRole::Tool);
        assert_eq!(m.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn usage_accumulates() {
        let mut total = TokenUsage::default();
        total.add(TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        });
        total.add(TokenUsage {
            prompt_tokens: 1,
            completion_tokens: 1,
            total_tokens: 2,
        });
        assert_eq!(total.total_tokens, 17);
    }
}

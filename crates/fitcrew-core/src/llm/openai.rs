//! OpenAI-compatible chat-completions client with function calling.
//!
//! Works against api.openai.com and any server exposing the same
//! `/chat/completions` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, instrument};

use super::{ChatMessage, ChatModel, ChatRequest, ChatResponse, ModelError, TokenUsage, ToolCall, ToolSpec};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 180;

/// Longest slice of an error body carried into a [`ModelError`].
const ERROR_BODY_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

impl From<&ToolSpec> for WireTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            tool_type: "function",
            function: WireFunction {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        // Assistant turns that only call tools carry null content.
        let content = if msg.content.is_empty() && !msg.tool_calls.is_empty() {
            None
        } else {
            Some(msg.content.clone())
        };
        Self {
            role: msg.role.as_str(),
            content,
            tool_calls: msg.tool_calls.iter().map(WireToolCall::from).collect(),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

impl From<&ToolCall> for WireToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            call_type: function_type(),
            function: WireFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    model: String,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireErrorResponse {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL up to and including the version segment.
    pub base_url: String,
    /// Bearer token. Optional for local servers.
    pub api_key: Option<String>,
    pub model: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

/// [`ChatModel`] backed by an OpenAI-compatible HTTP endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ModelError::Unreachable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn wire_request<'a>(&'a self, request: &ChatRequest) -> WireRequest<'a> {
        let tools: Vec<WireTool> = request.tools.iter().map(WireTool::from).collect();
        let tool_choice = (!tools.is_empty()).then_some("auto");
        WireRequest {
            model: &self.config.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
            tools,
            tool_choice,
        }
    }
}

/// Map a non-success status and body to a [`ModelError`].
fn classify_error(status: u16, body: &str) -> ModelError {
    let message = serde_json::from_str::<WireErrorResponse>(body)
        .map(|r| r.error.message)
        .unwrap_or_else(|_| body.chars().take(ERROR_BODY_CHARS).collect());
    match status {
        401 | 403 => ModelError::Auth(message),
        429 => ModelError::RateLimited(message),
        502..=504 => ModelError::Unreachable(format!("HTTP {status}: {message}")),
        _ => ModelError::Upstream { status, message },
    }
}

fn convert_response(response: WireResponse) -> Result<ChatResponse, ModelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::InvalidResponse("response contained no choices".to_string()))?;
    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|c| ToolCall {
            id: c.id,
            name: c.function.name,
            arguments: c.function.arguments,
        })
        .collect();
    debug!(
        finish_reason = ?choice.finish_reason,
        model = %response.model,
        "received completion"
    );
    Ok(ChatResponse {
        content: choice.message.content,
        tool_calls,
        usage: response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
        model: response.model,
    })
}

#[async_trait]
impl ChatModel for OpenAiClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, request), fields(model = %self.config.model, messages = request.messages.len()))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ModelError> {
        let mut http = self.client.post(self.url()).json(&self.wire_request(request));
        if let Some(key) = &self.config.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await.map_err(|e| {
            error!(error = %e, base_url = %self.config.base_url, "model request failed");
            ModelError::Unreachable(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Unreachable(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &body));
        }

        let parsed: WireResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::InvalidResponse(format!("failed to parse response: {e}")))?;
        convert_response(parsed)
    }
}

//! Role-scoped agents and the bounded tool-calling loop.
//!
//! ```text
//! Agent::execute(prompt)
//!     |
//!     v
//! ChatModel::complete --text--> done
//!     |
//!     +--tool calls--> ToolRegistry::dispatch --> tool messages --> next turn
//!                      (at most max_iterations model turns)
//! ```

pub mod roster;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;

use crate::llm::{ChatMessage, ChatModel, ChatRequest, ModelError, TokenUsage};
use crate::tools::ToolRegistry;

pub use roster::{
    Crew, CrewConfig, DEFAULT_MAX_TOOL_ITERATIONS, DEFAULT_TEMPERATURE, RoleModels,
    body_metrics_analyst, nutrition_advisor, plan_synthesizer, workout_architect,
};

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// The four specialist roles of the crew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    MetricsAnalyst,
    WorkoutArchitect,
    NutritionAdvisor,
    PlanSynthesizer,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::MetricsAnalyst,
        Role::WorkoutArchitect,
        Role::NutritionAdvisor,
        Role::PlanSynthesizer,
    ];

    /// Stable identifier used in config keys and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MetricsAnalyst => "metrics_analyst",
            Self::WorkoutArchitect => "workout_architect",
            Self::NutritionAdvisor => "nutrition_advisor",
            Self::PlanSynthesizer => "plan_synthesizer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::MetricsAnalyst => "Body Metrics Analyst",
            Self::WorkoutArchitect => "Workout Plan Architect",
            Self::NutritionAdvisor => "Nutrition Advisor",
            Self::PlanSynthesizer => "Head Coach Plan Synthesizer",
        }
    }

    pub fn goal(self) -> &'static str {
        match self {
            Self::MetricsAnalyst => {
                "Analyze user body measurements to determine body type, BMI, and estimated body \
                 fat. Output this analysis as a structured JSON object."
            }
            Self::WorkoutArchitect => {
                "Design a structured, week-long workout plan draft in JSON format, tailored to the \
                 user's goals, experience level, and physical analysis. The plan MUST incorporate \
                 a variety of exercises, including bodyweight, free weights (dumbbells, barbells), \
                 and common gym machines."
            }
            Self::NutritionAdvisor => {
                "Provide foundational nutrition guidelines as a structured JSON object to \
                 complement the user's workout plan and goals."
            }
            Self::PlanSynthesizer => {
                "Compile the analyses and drafts from other agents into a single, final JSON \
                 string. Then, validate this JSON string to ensure it is perfect."
            }
        }
    }

    pub fn backstory(self) -> &'static str {
        match self {
            Self::MetricsAnalyst => {
                "You are an expert in anthropometry and body composition analysis. You process \
                 raw user data (age, gender, measurements) and produce a clear, structured \
                 analysis that other specialists use to formulate a fitness plan. When a \
                 measurement is missing you estimate from what is available and consult the \
                 body-assessment reference table. You never leave a field blank. Focus on \
                 accuracy and a machine-readable output format."
            }
            Self::WorkoutArchitect => {
                "You are a master fitness programmer at a well-equipped gym. You design the \
                 weekly split, exercise selection (bodyweight, dumbbells, barbells, cable \
                 machines, leg press and so on), sets, reps and rest periods. You respect the \
                 user's availability and work around any stated injuries. Your output is clean \
                 JSON that strictly follows the provided schema."
            }
            Self::NutritionAdvisor => {
                "You are a certified nutritionist who gives simple, actionable dietary guidance \
                 on macronutrient balance, hydration and meal timing. You give general guidance \
                 only and make no medical claims. Your output is concise and structured for \
                 integration into a larger plan."
            }
            Self::PlanSynthesizer => {
                "You are the meticulous Head Coach responsible for final review. You combine the \
                 specialists' outputs into one comprehensive JSON object. After drafting it you \
                 MUST check it with the validate_final_plan tool, fix every reported problem and \
                 validate again until it passes. Your final answer is ONLY the validated JSON."
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Events and errors
// ---------------------------------------------------------------------------

/// One step of an agent run, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Text produced by the model.
    Message { content: String },
    /// The model asked to run a tool.
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
    /// What the tool returned.
    ToolResult {
        id: String,
        name: String,
        content: String,
    },
    /// Tokens consumed by one model turn.
    TokenUsage { input: u32, output: u32 },
}

/// Failures of a single agent run.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("{role} made {limit} model calls without producing a final answer")]
    IterationLimit { role: Role, limit: usize },
}

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Final answer text.
    pub output: String,
    pub events: Vec<AgentEvent>,
    /// Model turns taken, including the final one.
    pub turns: usize,
    pub usage: TokenUsage,
}

impl AgentRun {
    /// Names of the tools called during the run, in order.
    pub fn tool_calls(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::ToolCall { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// A role bound to a model and a set of tools.
pub struct Agent {
    role: Role,
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    max_iterations: usize,
    temperature: Option<f32>,
}

impl Agent {
    pub fn new(role: Role, model: Arc<dyn ChatModel>) -> Self {
        Self {
            role,
            model,
            tools: ToolRegistry::new(),
            max_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            temperature: None,
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Cap on model turns per run. Zero is raised to one.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Persona, goal and backstory as a system message.
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are the {}.\n\nGoal: {}\n\n{}",
            self.role.title(),
            self.role.goal(),
            self.role.backstory()
        );
        if !self.tools.is_empty() {
            prompt.push_str("\n\nAvailable tools: ");
            prompt.push_str(&self.tools.list().join(", "));
            prompt.push('.');
        }
        prompt
    }

    /// Run the tool loop until the model answers without calling a tool.
    pub async fn execute(&self, prompt: &str) -> Result<AgentRun, AgentError> {
        let span = tracing::info_span!("agent", role = %self.role, model = %self.model.name());
        self.run_loop(prompt).instrument(span).await
    }

    async fn run_loop(&self, prompt: &str) -> Result<AgentRun, AgentError> {
        let mut request = ChatRequest {
            messages: vec![
                ChatMessage::system(self.system_prompt()),
                ChatMessage::user(prompt),
            ],
            tools: self.tools.specs(),
            temperature: self.temperature,
        };
        let mut events = Vec::new();
        let mut usage = TokenUsage::default();

        for turn in 1..=self.max_iterations {
            let response = self.model.complete(&request).await.map_err(|e| {
                tracing::warn!(turn, error = %e, "model call failed");
                e
            })?;

            if let Some(u) = response.usage {
                usage.add(u);
                events.push(AgentEvent::TokenUsage {
                    input: u.prompt_tokens,
                    output: u.completion_tokens,
                });
            }

            let content = response.content.unwrap_or_default();
            if !content.is_empty() {
                events.push(AgentEvent::Message {
                    content: content.clone(),
                });
            }

            if response.tool_calls.is_empty() {
                tracing::debug!(turn, chars = content.len(), "agent produced final answer");
                return Ok(AgentRun {
                    output: content,
                    events,
                    turns: turn,
                    usage,
                });
            }

            request
                .messages
                .push(ChatMessage::assistant_calls(content, response.tool_calls.clone()));
            for call in &response.tool_calls {
                tracing::debug!(turn, tool = %call.name, call_id = %call.id, "tool call");
                events.push(AgentEvent::ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });
                let result = self.tools.dispatch(call).await;
                events.push(AgentEvent::ToolResult {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    content: result.clone(),
                });
                request
                    .messages
                    .push(ChatMessage::tool_result(call.id.clone(), result));
            }
        }

        tracing::warn!(limit = self.max_iterations, "agent hit iteration limit");
        Err(AgentError::IterationLimit {
            role: self.role,
            limit: self.max_iterations,
        })
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("role", &self.role)
            .field("model", &self.model.name())
            .field("tools", &self.tools)
            .field("max_iterations", &self.max_iterations)
            .field("temperature", &self.temperature)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

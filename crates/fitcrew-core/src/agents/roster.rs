//! Factories that build each role from an explicit [`CrewConfig`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{Agent, Role};
use crate::knowledge::KnowledgeBase;
use crate::llm::ChatModel;
use crate::tools::{KnowledgeLookupTool, PlanValidatorTool, ToolRegistry};

/// Default cap on model turns per agent run.
pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 6;

/// Sampling temperature used when none is configured.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Model handles per role: a default plus optional overrides.
#[derive(Clone)]
pub struct RoleModels {
    default: Arc<dyn ChatModel>,
    overrides: HashMap<Role, Arc<dyn ChatModel>>,
}

impl RoleModels {
    /// Every role uses `model`.
    pub fn uniform(model: Arc<dyn ChatModel>) -> Self {
        Self {
            default: model,
            overrides: HashMap::new(),
        }
    }

    /// Use `model` for `role` instead of the default.
    pub fn with_override(mut self, role: Role, model: Arc<dyn ChatModel>) -> Self {
        self.overrides.insert(role, model);
        self
    }

    pub fn for_role(&self, role: Role) -> Arc<dyn ChatModel> {
        self.overrides
            .get(&role)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default))
    }
}

impl fmt::Debug for RoleModels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let overrides: HashMap<&str, &str> = self
            .overrides
            .iter()
            .map(|(role, m)| (role.as_str(), m.name()))
            .collect();
        f.debug_struct("RoleModels")
            .field("default", &self.default.name())
            .field("overrides", &overrides)
            .finish()
    }
}

/// Everything needed to build a crew. Passed in, never looked up globally.
#[derive(Debug, Clone)]
pub struct CrewConfig {
    pub models: RoleModels,
    pub knowledge: Arc<KnowledgeBase>,
    /// Cap on model turns per agent run.
    pub max_tool_iterations: usize,
    pub temperature: Option<f32>,
}

impl CrewConfig {
    pub fn new(models: RoleModels, knowledge: Arc<KnowledgeBase>) -> Self {
        Self {
            models,
            knowledge,
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            temperature: Some(DEFAULT_TEMPERATURE),
        }
    }

    fn agent(&self, role: Role, tools: ToolRegistry) -> Agent {
        Agent::new(role, self.models.for_role(role))
            .with_tools(tools)
            .with_max_iterations(self.max_tool_iterations)
            .with_temperature(self.temperature)
    }
}

/// Metrics analyst, bound to the body-assessment lookup.
pub fn body_metrics_analyst(config: &CrewConfig) -> Agent {
    let tools =
        ToolRegistry::new().with(KnowledgeLookupTool::new(Arc::clone(&config.knowledge)));
    config.agent(Role::MetricsAnalyst, tools)
}

pub fn workout_architect(config: &CrewConfig) -> Agent {
    config.agent(Role::WorkoutArchitect, ToolRegistry::new())
}

pub fn nutrition_advisor(config: &CrewConfig) -> Agent {
    config.agent(Role::NutritionAdvisor, ToolRegistry::new())
}

/// Synthesizer, bound to the final-plan validator.
pub fn plan_synthesizer(config: &CrewConfig) -> Agent {
    config.agent(Role::PlanSynthesizer, ToolRegistry::new().with(PlanValidatorTool))
}

/// One freshly built agent per role.
#[derive(Debug)]
pub struct Crew {
    pub metrics_analyst: Agent,
    pub workout_architect: Agent,
    pub nutrition_advisor: Agent,
    pub plan_synthesizer: Agent,
}

impl Crew {
    pub fn assemble(config: &CrewConfig) -> Self {
        Self {
            metrics_analyst: body_metrics_analyst(config),
            workout_architect: workout_architect(config),
            nutrition_advisor: nutrition_advisor(config),
            plan_synthesizer: plan_synthesizer(config),
        }
    }

    /// Split into role-tagged agents.
    pub fn into_agents(self) -> [Agent; 4] {
        [
            self.metrics_analyst,
            self.workout_architect,
            self.nutrition_advisor,
            self.plan_synthesizer,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatRequest, ChatResponse, ModelError};
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl ChatModel for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, ModelError> {
            Ok(ChatResponse::text(self.0))
        }
    }

    fn config() -> CrewConfig {
        CrewConfig::new(
            RoleModels::uniform(Arc::new(Named("base"))),
            Arc::new(KnowledgeBase::embedded().unwrap()),
        )
    }

    #[test]
    fn roles_get_their_tools() {
        let crew = Crew::assemble(&config());
        assert_eq!(
            crew.metrics_analyst.tools().list(),
            vec!["search_body_assessment"]
        );
        assert!(crew.workout_architect.tools().is_empty());
        assert!(crew.nutrition_advisor.tools().is_empty());
        assert_eq!(
            crew.plan_synthesizer.tools().list(),
            vec!["validate_final_plan"]
        );
    }

    #[test]
    fn overrides_apply_per_role() {
        let models = RoleModels::uniform(Arc::new(Named("base")))
            .with_override(Role::PlanSynthesizer, Arc::new(Named("strong")));
        assert_eq!(models.for_role(Role::PlanSynthesizer).name(), "strong");
        assert_eq!(models.for_role(Role::MetricsAnalyst).name(), "base");
        assert!(format!("{models:?}").contains("strong"));
    }

    #[test]
    fn iteration_cap_flows_into_agents() {
        let mut cfg = config();
        cfg.max_tool_iterations = 2;
        let agent = plan_synthesizer(&cfg);
        assert_eq!(agent.max_iterations(), 2);
        assert_eq!(agent.role(), Role::PlanSynthesizer);
    }

    #[test]
    fn agents_are_in_role_order() {
        let roles: Vec<Role> = Crew::assemble(&config())
            .into_agents()
            .iter()
            .map(Agent::role)
            .collect();
        assert_eq!(roles, Role::ALL.to_vec());
    }
}

//! Multi-agent plan generation pipeline.
//!
//! Four role-specialized agents turn a [`schema::UserProfile`] into a
//! validated [`schema::FinalPlan`]:
//!
//! ```text
//! metrics_analysis ──┬──> workout_draft ────┐
//!                    └──> nutrition_advice ─┴──> synthesis ──> extract ──> FinalPlan
//! ```
//!
//! The synthesis agent checks its own draft with the plan validator tool
//! before answering; the [`pipeline`] re-validates the result independently.

pub mod agents;
pub mod anthropometry;
pub mod extract;
pub mod knowledge;
pub mod llm;
pub mod orchestrator;
pub mod pipeline;
pub mod schema;
pub mod tasks;
pub mod tools;

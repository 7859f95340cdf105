//! Structured shapes every pipeline stage must satisfy.
//!
//! A value either satisfies its shape completely or is rejected with a
//! [`SchemaError`] listing every violation found.

pub mod profile;
pub mod shape;
pub mod types;
pub mod violation;

pub use profile::{NO_INJURIES, PlanRequest, UserProfile};
pub use shape::Shape;
pub use types::{
    BODYWEIGHT, Exercise, FinalPlan, MetricsAnalysis, NutritionAdvice, PENDING_REVIEW,
    SOMATOTYPES, UserSummary, WeeklyScheduleItem, WorkoutDetail, WorkoutPlan,
};
pub use violation::{FieldPath, SchemaError, ShapeParseError, Violation, ViolationKind};

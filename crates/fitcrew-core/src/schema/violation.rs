//! Violation reporting for schema checks.
//!
//! A schema check never stops at the first problem: every violation found
//! while walking a document is collected into a [`SchemaError`].

use std::fmt;

use thiserror::Error;

/// Dotted path to a field inside a JSON document, e.g.
/// `workout_plan.workouts.Push Day.exercises[2].equipment`.
///
/// Keys that contain `.`, `[` or `"` are rendered quoted in brackets, e.g.
/// `workouts["Day 1. Upper"]`, so the rendered path stays unambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    rendered: String,
    names: Vec<String>,
}

impl FieldPath {
    /// The document root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Path of a named child field or map key.
    pub fn field(&self, name: &str) -> Self {
        let rendered = if name.contains(['.', '[', '"']) {
            format!("{}[{name:?}]", self.rendered)
        } else if self.rendered.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.rendered)
        };
        let mut names = self.names.clone();
        names.push(name.to_string());
        Self { rendered, names }
    }

    /// Path of a list element.
    pub fn index(&self, i: usize) -> Self {
        Self {
            rendered: format!("{}[{i}]", self.rendered),
            names: self.names.clone(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.rendered.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Field names and map keys along the path, without list indices.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rendered.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.rendered)
        }
    }
}

/// What is wrong with a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// A required field is absent.
    Missing,
    /// The field is present but has the wrong JSON type.
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    /// The value has the right type but lies outside the declared range.
    OutOfRange(String),
    /// A required text or list field is empty.
    Empty,
}

/// A single field-level schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: FieldPath,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(path: FieldPath, kind: ViolationKind) -> Self {
        Self { path, kind }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::Missing => write!(f, "{}: field required", self.path),
            ViolationKind::WrongType { expected, found } => {
                write!(f, "{}: expected {expected}, found {found}", self.path)
            }
            ViolationKind::OutOfRange(detail) => write!(f, "{}: {detail}", self.path),
            ViolationKind::Empty => write!(f, "{}: must not be empty", self.path),
        }
    }
}

/// A value failed its shape. Carries every violation, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct SchemaError {
    /// Name of the shape that rejected the value (e.g. `FinalPlan`).
    pub shape: &'static str,
    pub violations: Vec<Violation>,
}

impl SchemaError {
    /// Whether any violation sits on a path that passes through `field`.
    pub fn mentions(&self, field: &str) -> bool {
        self.violations
            .iter()
            .any(|v| v.path.segments().any(|seg| seg == field))
    }

    /// The violated paths, in discovery order.
    pub fn paths(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.path.to_string()).collect()
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.violations.len();
        let noun = if n == 1 { "error" } else { "errors" };
        write!(f, "{n} validation {noun} for {}", self.shape)?;
        for v in &self.violations {
            write!(f, "\n  - {v}")?;
        }
        Ok(())
    }
}

/// Failure to turn a JSON string into a shape.
#[derive(Debug, Error)]
pub enum ShapeParseError {
    #[error("invalid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_building() {
        let p = FieldPath::root()
            .field("workout_plan")
            .field("weekly_schedule")
            .index(3)
            .field("day");
        assert_eq!(p.as_str(), "workout_plan.weekly_schedule[3].day");
        let segs: Vec<&str> = p.segments().collect();
        assert_eq!(segs, vec!["workout_plan", "weekly_schedule", "day"]);
    }

    #[test]
    fn keys_with_separators_are_quoted() {
        let p = FieldPath::root()
            .field("workouts")
            .field("Day 1. Upper [A]")
            .field("exercises")
            .index(0)
            .field("equipment");
        assert_eq!(
            p.as_str(),
            "workouts[\"Day 1. Upper [A]\"].exercises[0].equipment"
        );
        let segs: Vec<&str> = p.segments().collect();
        assert_eq!(segs, vec!["workouts", "Day 1. Upper [A]", "exercises", "equipment"]);

        let err = SchemaError {
            shape: "WorkoutPlan",
            violations: vec![Violation::new(p, ViolationKind::Empty)],
        };
        assert!(err.mentions("equipment"));
        assert!(err.mentions("Day 1. Upper [A]"));
        assert!(!err.mentions("Upper [A]"));
        assert!(!err.mentions("Day 1"));
    }

    #[test]
    fn root_displays_placeholder() {
        assert_eq!(FieldPath::root().to_string(), "<root>");
        assert!(FieldPath::root().is_root());
    }

    #[test]
    fn schema_error_lists_every_violation() {
        let err = SchemaError {
            shape: "Exercise",
            violations: vec![
                Violation::new(FieldPath::root().field("name"), ViolationKind::Missing),
                Violation::new(FieldPath::root().field("equipment"), ViolationKind::Empty),
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 validation errors for Exercise"));
        assert!(msg.contains("name: field required"));
        assert!(msg.contains("equipment: must not be empty"));
        assert!(err.mentions("equipment"));
        assert!(!err.mentions("sets"));
    }

    #[test]
    fn wrong_type_message() {
        let v = Violation::new(
            FieldPath::root().field("sets"),
            ViolationKind::WrongType {
                expected: "integer",
                found: "string",
            },
        );
        assert_eq!(v.to_string(), "sets: expected integer, found string");
    }
}

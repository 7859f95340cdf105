//! The [`Shape`] trait and the field reader used to implement it.
//!
//! Shapes are read from an untyped [`serde_json::Value`] rather than through
//! `Deserialize`, because serde stops at the first error while a schema check
//! has to report all of them.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::violation::{FieldPath, SchemaError, ShapeParseError, Violation, ViolationKind};

/// A named structural contract that a JSON value must satisfy.
pub trait Shape: Sized {
    /// Shape name used in error messages.
    const NAME: &'static str;

    /// Read `value` located at `path`, pushing every violation onto `errs`.
    ///
    /// Returns `None` if and only if at least one violation was pushed.
    fn read(value: &Value, path: &FieldPath, errs: &mut Vec<Violation>) -> Option<Self>;

    /// Validate a parsed JSON value against this shape.
    fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let mut violations = Vec::new();
        let parsed = Self::read(value, &FieldPath::root(), &mut violations);
        match parsed {
            Some(shape) if violations.is_empty() => Ok(shape),
            _ => {
                if violations.is_empty() {
                    violations.push(Violation::new(
                        FieldPath::root(),
                        ViolationKind::OutOfRange("value could not be read".to_string()),
                    ));
                }
                Err(SchemaError {
                    shape: Self::NAME,
                    violations,
                })
            }
        }
    }

    /// Parse a JSON string and validate it against this shape.
    fn from_json_str(json: &str) -> Result<Self, ShapeParseError> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::from_value(&value)?)
    }
}

/// JSON type name for diagnostics.
pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn wrong_type(path: FieldPath, expected: &'static str, found: &Value) -> Violation {
    Violation::new(
        path,
        ViolationKind::WrongType {
            expected,
            found: json_type(found),
        },
    )
}

/// Integer view of a JSON number. Floats with no fractional part count.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// Reader over the fields of one JSON object.
pub(crate) struct Fields<'a> {
    obj: &'a Map<String, Value>,
    path: &'a FieldPath,
}

impl<'a> Fields<'a> {
    /// Open `value` as an object, or record a type violation.
    pub(crate) fn open(
        value: &'a Value,
        path: &'a FieldPath,
        errs: &mut Vec<Violation>,
    ) -> Option<Self> {
        match value {
            Value::Object(obj) => Some(Self { obj, path }),
            other => {
                errs.push(wrong_type(path.clone(), "object", other));
                None
            }
        }
    }

    fn path(&self, name: &str) -> FieldPath {
        self.path.field(name)
    }

    /// Present and non-null value, or `None` without recording anything.
    fn get(&self, name: &str) -> Option<&'a Value> {
        self.obj.get(name).filter(|v| !v.is_null())
    }

    /// Required value; absence is recorded as [`ViolationKind::Missing`].
    fn required(&self, name: &str, errs: &mut Vec<Violation>) -> Option<&'a Value> {
        match self.obj.get(name) {
            None => {
                errs.push(Violation::new(self.path(name), ViolationKind::Missing));
                None
            }
            Some(v) => Some(v),
        }
    }

    pub(crate) fn text(&self, name: &str, errs: &mut Vec<Violation>) -> Option<String> {
        match self.required(name, errs)? {
            Value::String(s) => Some(s.clone()),
            other => {
                errs.push(wrong_type(self.path(name), "string", other));
                None
            }
        }
    }

    /// Required text that must contain something other than whitespace.
    pub(crate) fn non_empty_text(&self, name: &str, errs: &mut Vec<Violation>) -> Option<String> {
        let s = self.text(name, errs)?;
        if s.trim().is_empty() {
            errs.push(Violation::new(self.path(name), ViolationKind::Empty));
            return None;
        }
        Some(s)
    }

    /// Optional text with a default used when the field is absent or null.
    pub(crate) fn text_or(
        &self,
        name: &str,
        default: &str,
        errs: &mut Vec<Violation>,
    ) -> Option<String> {
        match self.get(name) {
            None => Some(default.to_string()),
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                errs.push(wrong_type(self.path(name), "string", other));
                None
            }
        }
    }

    /// Required integer within `[min, max]`, converted to `T`.
    pub(crate) fn integer_in<T: TryFrom<i64>>(
        &self,
        name: &str,
        min: i64,
        max: i64,
        errs: &mut Vec<Violation>,
    ) -> Option<T> {
        let value = self.required(name, errs)?;
        self.bounded(name, value, min, max, errs)
    }

    /// Optional integer within `[min, max]`. Absent or null reads as `None`.
    pub(crate) fn optional_integer_in<T: TryFrom<i64>>(
        &self,
        name: &str,
        min: i64,
        max: i64,
        errs: &mut Vec<Violation>,
    ) -> Option<Option<T>> {
        match self.get(name) {
            None => Some(None),
            Some(value) => self.bounded(name, value, min, max, errs).map(Some),
        }
    }

    fn bounded<T: TryFrom<i64>>(
        &self,
        name: &str,
        value: &Value,
        min: i64,
        max: i64,
        errs: &mut Vec<Violation>,
    ) -> Option<T> {
        let Some(n) = as_integer(value) else {
            errs.push(wrong_type(self.path(name), "integer", value));
            return None;
        };
        if n < min || n > max {
            errs.push(Violation::new(
                self.path(name),
                ViolationKind::OutOfRange(format!("{n} is outside {min}..={max}")),
            ));
            return None;
        }
        match T::try_from(n) {
            Ok(v) => Some(v),
            Err(_) => {
                errs.push(Violation::new(
                    self.path(name),
                    ViolationKind::OutOfRange(format!("{n} does not fit the field type")),
                ));
                None
            }
        }
    }

    /// Required number strictly greater than `min_exclusive` and at most `max`.
    pub(crate) fn number_in(
        &self,
        name: &str,
        min_exclusive: f64,
        max: f64,
        errs: &mut Vec<Violation>,
    ) -> Option<f64> {
        let value = self.required(name, errs)?;
        self.number_value(name, value, min_exclusive, max, errs)
    }

    /// Optional number with the same bounds as [`Fields::number_in`].
    pub(crate) fn optional_number_in(
        &self,
        name: &str,
        min_exclusive: f64,
        max: f64,
        errs: &mut Vec<Violation>,
    ) -> Option<Option<f64>> {
        match self.get(name) {
            None => Some(None),
            Some(value) => self
                .number_value(name, value, min_exclusive, max, errs)
                .map(Some),
        }
    }

    fn number_value(
        &self,
        name: &str,
        value: &Value,
        min_exclusive: f64,
        max: f64,
        errs: &mut Vec<Violation>,
    ) -> Option<f64> {
        let Some(n) = value.as_f64() else {
            errs.push(wrong_type(self.path(name), "number", value));
            return None;
        };
        if n <= min_exclusive || n > max {
            errs.push(Violation::new(
                self.path(name),
                ViolationKind::OutOfRange(format!(
                    "{n} must be greater than {min_exclusive} and at most {max}"
                )),
            ));
            return None;
        }
        Some(n)
    }

    /// Required nested object read as shape `T`.
    pub(crate) fn nested<T: Shape>(&self, name: &str, errs: &mut Vec<Violation>) -> Option<T> {
        let value = self.required(name, errs)?;
        T::read(value, &self.path(name), errs)
    }

    /// Required list of `T`. Every element is read so all violations surface.
    pub(crate) fn list<T: Shape>(
        &self,
        name: &str,
        non_empty: bool,
        errs: &mut Vec<Violation>,
    ) -> Option<Vec<T>> {
        let path = self.path(name);
        let items = match self.required(name, errs)? {
            Value::Array(items) => items,
            other => {
                errs.push(wrong_type(path, "array", other));
                return None;
            }
        };
        if non_empty && items.is_empty() {
            errs.push(Violation::new(path, ViolationKind::Empty));
            return None;
        }

        let before = errs.len();
        let parsed: Vec<Option<T>> = items
            .iter()
            .enumerate()
            .map(|(i, item)| T::read(item, &path.index(i), errs))
            .collect();
        if errs.len() > before {
            return None;
        }
        parsed.into_iter().collect()
    }

    /// Required string-keyed map of `T`.
    pub(crate) fn map<T: Shape>(
        &self,
        name: &str,
        non_empty: bool,
        errs: &mut Vec<Violation>,
    ) -> Option<BTreeMap<String, T>> {
        let path = self.path(name);
        let entries = match self.required(name, errs)? {
            Value::Object(entries) => entries,
            other => {
                errs.push(wrong_type(path, "object", other));
                return None;
            }
        };
        if non_empty && entries.is_empty() {
            errs.push(Violation::new(path, ViolationKind::Empty));
            return None;
        }

        let before = errs.len();
        let mut out = BTreeMap::new();
        for (key, item) in entries {
            if let Some(parsed) = T::read(item, &path.field(key), errs) {
                out.insert(key.clone(), parsed);
            }
        }
        if errs.len() > before {
            return None;
        }
        Some(out)
    }
}

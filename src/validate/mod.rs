//! Declarative body validation: schemas, rules, and violations.
//!
//! A target type declares the shape its input must satisfy by implementing
//! [`Validate`]: an ordered [`Schema`] of fields, each with optional
//! coercions and an ordered list of [`Rule`]s. The standalone
//! [`transform_and_validate`] function evaluates an opaque JSON value against
//! the schema and, when every constraint holds, constructs the typed instance.
//!
//! Schemas are plain read-only data; one schema value may be shared across
//! any number of concurrent validations.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// A single field-level constraint.
///
/// Rule names and messages follow the conventions of decorator-based
/// validators (`isNotEmpty`, `maxLength`, …) so violation payloads stay
/// familiar to API consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// The field must be present and neither `null` nor an empty string.
    NotEmpty,
    /// The field must be a JSON number.
    Number,
    /// The field must be a JSON string.
    String,
    /// The field must be a string of at most this many characters.
    MaxLength(usize),
    /// The field must be a string of at least this many characters.
    MinLength(usize),
}

impl Rule {
    /// Machine-readable constraint name, as reported in violations.
    pub fn name(&self) -> &'static str {
        match self {
            Rule::NotEmpty => "isNotEmpty",
            Rule::Number => "isNumber",
            Rule::String => "isString",
            Rule::MaxLength(_) => "maxLength",
            Rule::MinLength(_) => "minLength",
        }
    }

    fn message(&self, field: &str) -> String {
        match self {
            Rule::NotEmpty => format!("{field} should not be empty"),
            Rule::Number => format!("{field} must be a number"),
            Rule::String => format!("{field} must be a string"),
            Rule::MaxLength(max) => {
                format!("{field} must be shorter than or equal to {max} characters")
            }
            Rule::MinLength(min) => {
                format!("{field} must be longer than or equal to {min} characters")
            }
        }
    }

    /// Checks the rule against a field value (`None` when the field is absent),
    /// returning the violation on failure.
    fn check(&self, field: &str, value: Option<&Value>) -> Option<Violation> {
        let failed = match self {
            Rule::NotEmpty => match value {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            },
            Rule::Number => !matches!(value, Some(Value::Number(_))),
            Rule::String => !matches!(value, Some(Value::String(_))),
            // length rules fail outright on absent or non-string values
            Rule::MaxLength(max) => match value {
                Some(Value::String(s)) => s.chars().count() > *max,
                _ => true,
            },
            Rule::MinLength(min) => match value {
                Some(Value::String(s)) => s.chars().count() < *min,
                _ => true,
            },
        };

        failed.then(|| Violation {
            field: field.to_owned(),
            constraint: self.name().to_owned(),
            message: self.message(field),
        })
    }
}

/// A field-level transform applied before any rule is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coerce {
    /// Parses numeric strings into numbers, e.g. `"42"` into `42`.
    NumberFromString,
    /// Strips surrounding whitespace from strings.
    Trim,
}

impl Coerce {
    fn apply(self, value: Value) -> Value {
        match self {
            Coerce::NumberFromString => match value {
                Value::String(s) => {
                    if let Ok(n) = s.parse::<i64>() {
                        Value::Number(n.into())
                    } else if let Ok(f) = s.parse::<f64>() {
                        serde_json::Number::from_f64(f)
                            .map(Value::Number)
                            .unwrap_or(Value::String(s))
                    } else {
                        Value::String(s)
                    }
                }
                other => other,
            },
            Coerce::Trim => match value {
                Value::String(s) => Value::String(s.trim().to_owned()),
                other => other,
            },
        }
    }
}

#[derive(Debug, Clone)]
struct FieldSchema {
    name: String,
    coerce: Vec<Coerce>,
    rules: Vec<Rule>,
}

/// An ordered description of the fields a body must carry and the constraints
/// each must satisfy.
///
/// Field order determines violation order; within a field, rule order does.
///
/// # Examples
///
/// ```
/// use trellis::validate::{Rule, Schema};
///
/// let schema = Schema::new()
///     .field("a", [Rule::NotEmpty, Rule::Number])
///     .field("b", [Rule::NotEmpty, Rule::String, Rule::MaxLength(5)]);
/// assert_eq!(schema.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<FieldSchema>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field with an ordered list of rules.
    #[must_use]
    pub fn field(self, name: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.coerced_field(name, [], rules)
    }

    /// Declares a field whose value is transformed before its rules run.
    #[must_use]
    pub fn coerced_field(
        mut self,
        name: impl Into<String>,
        coerce: impl IntoIterator<Item = Coerce>,
        rules: impl IntoIterator<Item = Rule>,
    ) -> Self {
        self.fields.push(FieldSchema {
            name: name.into(),
            coerce: coerce.into_iter().collect(),
            rules: rules.into_iter().collect(),
        });
        self
    }

    /// Returns the number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` when no fields are declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Applies coercions to a working copy of `body`, then checks every rule
    /// of every field in declaration order.
    ///
    /// A body that is not a JSON object (null, scalar, array) is treated as an
    /// object with every declared field absent, so malformed input always
    /// produces the same violation list instead of passing through.
    fn evaluate(&self, body: &Value) -> (Value, Vec<Violation>) {
        let mut object = match body {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };

        let mut violations = Vec::new();
        for field in &self.fields {
            if let Some(slot) = object.get_mut(&field.name) {
                for coerce in &field.coerce {
                    let value = std::mem::take(slot);
                    *slot = coerce.apply(value);
                }
            }
            let value = object.get(&field.name);
            for rule in &field.rules {
                if let Some(violation) = rule.check(&field.name, value) {
                    violations.push(violation);
                }
            }
        }

        (Value::Object(object), violations)
    }
}

/// One field-level constraint failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Name of the offending field.
    pub field: String,
    /// Machine-readable name of the failed constraint.
    pub constraint: String,
    /// Human-readable description of the failure.
    pub message: String,
}

/// The failure half of [`transform_and_validate`]: a non-empty, ordered list
/// of constraint violations.
#[derive(Debug, Clone, Error)]
#[error("validation failed with {} violation(s)", violations.len())]
pub struct ValidationFailure {
    violations: Vec<Violation>,
}

impl ValidationFailure {
    /// Returns the violations in field-declaration order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Consumes the failure, returning the violations.
    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

/// Declares the shape a request body must satisfy before an instance of the
/// implementing type can be constructed from it.
pub trait Validate: DeserializeOwned {
    /// The field constraints checked before construction.
    fn schema() -> Schema;
}

/// Validates an opaque JSON value against `T`'s schema and constructs `T`.
///
/// Coercions run first on a working copy of the value, then every rule of
/// every declared field is checked and all failures are collected. Only when
/// no rule fails is the (coerced) value deserialized into `T`.
///
/// The function is async because constraint checking is not assumed to be
/// synchronous; callers must not rely on it resolving before yielding.
///
/// # Errors
///
/// Returns a [`ValidationFailure`] carrying the full ordered violation list.
/// A deserialization failure after all rules pass is reported as a single
/// violation on the pseudo-field `$` with constraint `transform`, so malformed
/// input never passes silently.
pub async fn transform_and_validate<T: Validate>(body: &Value) -> Result<T, ValidationFailure> {
    let (transformed, violations) = T::schema().evaluate(body);
    if !violations.is_empty() {
        return Err(ValidationFailure { violations });
    }

    serde_json::from_value(transformed).map_err(|e| ValidationFailure {
        violations: vec![Violation {
            field: "$".to_owned(),
            constraint: "transform".to_owned(),
            message: e.to_string(),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        a: f64,
        b: String,
    }

    impl Validate for Payload {
        fn schema() -> Schema {
            Schema::new()
                .field("a", [Rule::NotEmpty, Rule::Number])
                .field("b", [Rule::NotEmpty, Rule::String, Rule::MaxLength(5)])
        }
    }

    // ── rules ────────────────────────────────────────────────────────────────

    #[test]
    fn not_empty_rejects_absent_null_and_empty_string() {
        assert!(Rule::NotEmpty.check("x", None).is_some());
        assert!(Rule::NotEmpty.check("x", Some(&Value::Null)).is_some());
        assert!(Rule::NotEmpty.check("x", Some(&json!(""))).is_some());
        assert!(Rule::NotEmpty.check("x", Some(&json!("y"))).is_none());
        assert!(Rule::NotEmpty.check("x", Some(&json!(0))).is_none());
    }

    #[test]
    fn number_rule() {
        assert!(Rule::Number.check("x", Some(&json!(1.5))).is_none());
        assert!(Rule::Number.check("x", Some(&json!("1"))).is_some());
        assert!(Rule::Number.check("x", None).is_some());
    }

    #[test]
    fn string_rule() {
        assert!(Rule::String.check("x", Some(&json!("ok"))).is_none());
        assert!(Rule::String.check("x", Some(&json!(3))).is_some());
    }

    #[test]
    fn max_length_counts_characters() {
        assert!(Rule::MaxLength(5).check("x", Some(&json!("abcde"))).is_none());
        assert!(Rule::MaxLength(5).check("x", Some(&json!("abcdef"))).is_some());
        // five characters even though more bytes
        assert!(Rule::MaxLength(5).check("x", Some(&json!("héllo"))).is_none());
        assert!(Rule::MaxLength(5).check("x", None).is_some());
    }

    #[test]
    fn min_length_rule() {
        assert!(Rule::MinLength(2).check("x", Some(&json!("ab"))).is_none());
        assert!(Rule::MinLength(2).check("x", Some(&json!("a"))).is_some());
    }

    #[test]
    fn violation_carries_name_and_message() {
        let v = Rule::MaxLength(5).check("b", Some(&json!("toolong"))).unwrap();
        assert_eq!(v.field, "b");
        assert_eq!(v.constraint, "maxLength");
        assert_eq!(v.message, "b must be shorter than or equal to 5 characters");
    }

    // ── coercions ────────────────────────────────────────────────────────────

    #[test]
    fn coerce_number_from_string() {
        assert_eq!(Coerce::NumberFromString.apply(json!("42")), json!(42));
        assert_eq!(Coerce::NumberFromString.apply(json!("4.5")), json!(4.5));
        assert_eq!(Coerce::NumberFromString.apply(json!("abc")), json!("abc"));
        assert_eq!(Coerce::NumberFromString.apply(json!(7)), json!(7));
    }

    #[test]
    fn coerce_trim() {
        assert_eq!(Coerce::Trim.apply(json!("  hi  ")), json!("hi"));
        assert_eq!(Coerce::Trim.apply(json!(1)), json!(1));
    }

    // ── transform_and_validate ───────────────────────────────────────────────

    #[tokio::test]
    async fn valid_input_constructs_instance() {
        let result = transform_and_validate::<Payload>(&json!({ "a": 1, "b": "abc" })).await;
        assert_eq!(
            result.unwrap(),
            Payload {
                a: 1.0,
                b: "abc".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn missing_fields_collect_all_violations_in_order() {
        let failure = transform_and_validate::<Payload>(&json!({ "someVal": "abc" }))
            .await
            .unwrap_err();

        let constraints: Vec<(&str, &str)> = failure
            .violations()
            .iter()
            .map(|v| (v.field.as_str(), v.constraint.as_str()))
            .collect();
        assert_eq!(
            constraints,
            vec![
                ("a", "isNotEmpty"),
                ("a", "isNumber"),
                ("b", "isNotEmpty"),
                ("b", "isString"),
                ("b", "maxLength"),
            ]
        );
    }

    #[tokio::test]
    async fn non_object_body_fails_deterministically() {
        let from_null = transform_and_validate::<Payload>(&Value::Null)
            .await
            .unwrap_err();
        let from_scalar = transform_and_validate::<Payload>(&json!("hello"))
            .await
            .unwrap_err();
        assert_eq!(from_null.violations(), from_scalar.violations());
        assert!(!from_null.violations().is_empty());
    }

    #[tokio::test]
    async fn single_field_failure_reports_only_that_field() {
        let failure = transform_and_validate::<Payload>(&json!({ "a": 1, "b": "toolong" }))
            .await
            .unwrap_err();
        assert_eq!(failure.violations().len(), 1);
        assert_eq!(failure.violations()[0].field, "b");
        assert_eq!(failure.violations()[0].constraint, "maxLength");
    }

    #[tokio::test]
    async fn coercion_applies_before_rules() {
        #[derive(Debug, Deserialize)]
        struct Coerced {
            n: f64,
            s: String,
        }

        impl Validate for Coerced {
            fn schema() -> Schema {
                Schema::new()
                    .coerced_field("n", [Coerce::NumberFromString], [Rule::NotEmpty, Rule::Number])
                    .coerced_field("s", [Coerce::Trim], [Rule::String, Rule::MaxLength(3)])
            }
        }

        let instance = transform_and_validate::<Coerced>(&json!({ "n": "42", "s": " ab " }))
            .await
            .unwrap();
        assert_eq!(instance.n, 42.0);
        assert_eq!(instance.s, "ab");
    }

    #[tokio::test]
    async fn transform_failure_after_rules_pass_is_a_violation() {
        #[derive(Debug, Deserialize)]
        struct Wider {
            #[allow(dead_code)]
            a: f64,
            // not covered by the schema, so rules cannot catch its absence
            #[allow(dead_code)]
            flag: bool,
        }

        impl Validate for Wider {
            fn schema() -> Schema {
                Schema::new().field("a", [Rule::NotEmpty, Rule::Number])
            }
        }

        let failure = transform_and_validate::<Wider>(&json!({ "a": 1 }))
            .await
            .unwrap_err();
        assert_eq!(failure.violations().len(), 1);
        assert_eq!(failure.violations()[0].field, "$");
        assert_eq!(failure.violations()[0].constraint, "transform");
    }

    #[tokio::test]
    async fn failure_display_reports_count() {
        let failure = transform_and_validate::<Payload>(&json!({}))
            .await
            .unwrap_err();
        assert!(failure.to_string().contains("violation"));
    }

    #[test]
    fn violations_serialize_flat() {
        let v = Violation {
            field: "a".to_owned(),
            constraint: "isNumber".to_owned(),
            message: "a must be a number".to_owned(),
        };
        assert_eq!(
            serde_json::to_value(&v).unwrap(),
            json!({
                "field": "a",
                "constraint": "isNumber",
                "message": "a must be a number",
            })
        );
    }
}

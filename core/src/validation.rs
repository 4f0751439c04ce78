//! Pre-flight payload validation.
//!
//! # Design
//! Each endpoint declares a static `RuleSet`: which fields are required,
//! which are optional, and which constraint each constrained field must
//! satisfy. `validate` checks a payload against a rule set before any request
//! is built, and reports the first violation as a structured `ApiError`.
//!
//! Checks run in a fixed order: required fields in declaration order, then
//! constraints in declaration order for the fields that are present, then the
//! conventional `metadata` field. The payload is only read, never changed.
//!
//! Fields the rule set does not mention are passed through untouched; the
//! service is the authority on its own schema.

use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::types::Payload;

/// Name of the optional free-form field every SIGN AT resource accepts.
pub const METADATA_FIELD: &str = "metadata";

pub const METADATA_MAX_KEYS: usize = 20;
pub const METADATA_MAX_KEY_CHARS: usize = 40;
pub const METADATA_MAX_VALUE_CHARS: usize = 500;

const METADATA_GUIDANCE: &str = "a JSON object. Use `metadata` to attach custom \
    key-value data to an object; up to 20 keys, key names up to 40 characters \
    and values up to 500 characters";

/// Predicate a field's value must satisfy.
#[derive(Debug, Clone, Copy)]
pub enum Constraint {
    /// Any value except `null`.
    NonNull,
    /// A JSON string.
    String,
    /// A JSON object.
    Object,
    /// A JSON string from a fixed set.
    OneOf(&'static [&'static str]),
    /// A nested structure, with a human-readable rendering of it.
    Shape {
        shape: &'static Shape,
        description: &'static str,
    },
}

/// Structural description of a composite value.
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    /// Any non-null value.
    Present,
    /// An object with the listed fields.
    Object(&'static [ShapeField]),
    /// An array, possibly empty, whose items all match the inner shape.
    ArrayOf(&'static Shape),
    /// Like `ArrayOf`, but at least one item is required.
    NonEmptyArrayOf(&'static Shape),
}

#[derive(Debug, Clone, Copy)]
pub struct ShapeField {
    pub name: &'static str,
    pub required: bool,
    pub shape: Shape,
}

/// Declarative validation rules for one endpoint.
#[derive(Debug, Clone, Copy)]
pub struct RuleSet {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
    pub constraints: &'static [(&'static str, Constraint)],
}

impl RuleSet {
    pub const EMPTY: RuleSet = RuleSet {
        required: &[],
        optional: &[],
        constraints: &[],
    };

    pub fn constraint_for(&self, field: &str) -> Option<&Constraint> {
        self.constraints
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, constraint)| constraint)
    }

    /// True if the field is declared as required or optional.
    pub fn declares(&self, field: &str) -> bool {
        self.required
            .iter()
            .chain(self.optional)
            .any(|name| *name == field)
    }
}

/// Switches that tighten validation beyond the declared rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    pub enforce_metadata_limits: bool,
}

/// Check `payload` against `rules`.
pub fn validate(
    payload: &Payload,
    rules: &RuleSet,
    options: ValidationOptions,
) -> Result<(), ApiError> {
    for field in rules.required {
        match payload.get(*field) {
            None | Some(Value::Null) => return Err(ApiError::missing(*field)),
            Some(_) => {}
        }
    }

    for (field, constraint) in rules.constraints {
        if let Some(value) = payload.get(*field) {
            check_constraint(field, value, constraint)?;
        }
    }

    if let Some(metadata) = payload.get(METADATA_FIELD) {
        validate_metadata(metadata, options)?;
    }

    Ok(())
}

fn check_constraint(field: &str, value: &Value, constraint: &Constraint) -> Result<(), ApiError> {
    let ok = match constraint {
        Constraint::NonNull => !value.is_null(),
        Constraint::String => value.is_string(),
        Constraint::Object => value.is_object(),
        Constraint::OneOf(allowed) => value
            .as_str()
            .is_some_and(|s| allowed.iter().any(|candidate| *candidate == s)),
        Constraint::Shape { shape, description } => {
            return match_shape(shape, value, field).map_err(|problem| {
                ApiError::invalid(
                    field,
                    value.clone(),
                    Some(format!("{description}; {problem}")),
                )
            });
        }
    };
    if ok {
        Ok(())
    } else {
        Err(ApiError::invalid(field, value.clone(), Some(describe(constraint))))
    }
}

fn describe(constraint: &Constraint) -> String {
    match constraint {
        Constraint::NonNull => "a non-null value".to_string(),
        Constraint::String => "a string".to_string(),
        Constraint::Object => "a JSON object".to_string(),
        Constraint::OneOf(allowed) => format!("one of: {}", allowed.join(", ")),
        Constraint::Shape { description, .. } => description.to_string(),
    }
}

/// Walk `value` against `shape`, returning a description of the first
/// mismatch with its JSON path.
fn match_shape(shape: &Shape, value: &Value, path: &str) -> Result<(), String> {
    match shape {
        Shape::Present => {
            if value.is_null() {
                Err(format!("`{path}` must not be null"))
            } else {
                Ok(())
            }
        }
        Shape::Object(fields) => {
            let object = value
                .as_object()
                .ok_or_else(|| format!("`{path}` must be an object"))?;
            for field in *fields {
                let child_path = format!("{path}.{}", field.name);
                match object.get(field.name) {
                    None | Some(Value::Null) if field.required => {
                        return Err(format!("`{child_path}` is missing"));
                    }
                    None | Some(Value::Null) => {}
                    Some(child) => match_shape(&field.shape, child, &child_path)?,
                }
            }
            Ok(())
        }
        Shape::ArrayOf(item) | Shape::NonEmptyArrayOf(item) => {
            let items = value
                .as_array()
                .ok_or_else(|| format!("`{path}` must be an array"))?;
            if items.is_empty() && matches!(shape, Shape::NonEmptyArrayOf(_)) {
                return Err(format!("`{path}` must not be empty"));
            }
            for (index, child) in items.iter().enumerate() {
                match_shape(item, child, &format!("{path}[{index}]"))?;
            }
            Ok(())
        }
    }
}

fn validate_metadata(metadata: &Value, options: ValidationOptions) -> Result<(), ApiError> {
    let Some(entries) = metadata.as_object() else {
        return Err(ApiError::invalid(
            METADATA_FIELD,
            metadata.clone(),
            Some(METADATA_GUIDANCE.to_string()),
        ));
    };

    if options.enforce_metadata_limits {
        if let Some(problem) = metadata_limit_violation(entries) {
            return Err(ApiError::invalid(
                METADATA_FIELD,
                metadata.clone(),
                Some(format!("{METADATA_GUIDANCE}; {problem}")),
            ));
        }
    }

    Ok(())
}

fn metadata_limit_violation(entries: &Map<String, Value>) -> Option<String> {
    if entries.len() > METADATA_MAX_KEYS {
        return Some(format!("{} keys given", entries.len()));
    }
    for (key, value) in entries {
        if key.chars().count() > METADATA_MAX_KEY_CHARS {
            return Some(format!("key `{key}` is longer than {METADATA_MAX_KEY_CHARS} characters"));
        }
        let length = match value {
            Value::String(s) => s.chars().count(),
            other => other.to_string().chars().count(),
        };
        if length > METADATA_MAX_VALUE_CHARS {
            return Some(format!(
                "value of `{key}` is longer than {METADATA_MAX_VALUE_CHARS} characters"
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::types::payload;
    use serde_json::json;

    const STATES: &[&str] = &["INITIALIZED", "DECOMMISSIONED"];

    const RULES: RuleSet = RuleSet {
        required: &["state"],
        optional: &["description", "metadata"],
        constraints: &[
            ("state", Constraint::OneOf(STATES)),
            ("description", Constraint::String),
        ],
    };

    const LINE: Shape = Shape::Object(&[
        ShapeField {
            name: "text",
            required: true,
            shape: Shape::Present,
        },
        ShapeField {
            name: "quantity",
            required: false,
            shape: Shape::Present,
        },
    ]);
    const LINES: Shape = Shape::NonEmptyArrayOf(&LINE);
    const TAGS: Shape = Shape::ArrayOf(&Shape::Present);
    const DOC: Shape = Shape::Object(&[
        ShapeField {
            name: "lines",
            required: true,
            shape: LINES,
        },
        ShapeField {
            name: "tags",
            required: false,
            shape: TAGS,
        },
    ]);

    const NESTED: RuleSet = RuleSet {
        required: &["doc"],
        optional: &[],
        constraints: &[(
            "doc",
            Constraint::Shape {
                shape: &DOC,
                description: "{ lines: [ { text, quantity? } ], tags?: [ any ] }",
            },
        )],
    };

    fn check(value: Value) -> Result<(), ApiError> {
        validate(&payload(value), &RULES, ValidationOptions::default())
    }

    #[test]
    fn accepts_complete_payload() {
        assert!(check(json!({"state": "INITIALIZED", "description": "front desk"})).is_ok());
    }

    #[test]
    fn missing_required_field_is_named() {
        let err = check(json!({"description": "x"})).unwrap_err();
        assert_eq!(err, ApiError::missing("state"));
    }

    #[test]
    fn null_required_field_counts_as_missing() {
        let err = check(json!({"state": null})).unwrap_err();
        assert_eq!(err.kind(), FailureKind::MissingRequiredField);
    }

    #[test]
    fn enum_violation_is_invalid_value() {
        let err = check(json!({"state": "BROKEN"})).unwrap_err();
        match err {
            ApiError::InvalidFieldValue {
                field,
                value,
                expected,
            } => {
                assert_eq!(field, "state");
                assert_eq!(value, json!("BROKEN"));
                assert_eq!(expected.as_deref(), Some("one of: INITIALIZED, DECOMMISSIONED"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn enum_requires_a_string() {
        let err = check(json!({"state": 1})).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidFieldValue);
    }

    #[test]
    fn optional_constraint_applies_when_present() {
        let err = check(json!({"state": "INITIALIZED", "description": 42})).unwrap_err();
        assert_eq!(err.field(), Some("description"));
    }

    #[test]
    fn undeclared_fields_pass_through() {
        assert!(check(json!({"state": "INITIALIZED", "extra": [1, 2, 3]})).is_ok());
    }

    #[test]
    fn metadata_must_be_an_object() {
        for bad in [json!("tag"), json!(["a"]), json!(7), json!(null)] {
            let err = check(json!({"state": "INITIALIZED", "metadata": bad})).unwrap_err();
            assert_eq!(err.field(), Some("metadata"));
            assert_eq!(err.kind(), FailureKind::InvalidFieldValue);
        }
        assert!(check(json!({"state": "INITIALIZED", "metadata": {"branch": "vienna"}})).is_ok());
    }

    #[test]
    fn metadata_checked_even_when_undeclared() {
        let err = validate(
            &payload(json!({"metadata": "x"})),
            &RuleSet::EMPTY,
            ValidationOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("metadata"));
    }

    #[test]
    fn metadata_limits_are_opt_in() {
        let mut entries = Map::new();
        for i in 0..25 {
            entries.insert(format!("k{i}"), json!("v"));
        }
        let p = payload(json!({"state": "INITIALIZED", "metadata": entries}));

        assert!(validate(&p, &RULES, ValidationOptions::default()).is_ok());

        let strict = ValidationOptions {
            enforce_metadata_limits: true,
        };
        let err = validate(&p, &RULES, strict).unwrap_err();
        assert_eq!(err.field(), Some("metadata"));
    }

    #[test]
    fn metadata_key_count_boundary() {
        let strict = ValidationOptions {
            enforce_metadata_limits: true,
        };
        let with_keys = |count: usize| {
            let mut entries = Map::new();
            for i in 0..count {
                entries.insert(format!("k{i}"), json!("v"));
            }
            payload(json!({"state": "INITIALIZED", "metadata": entries}))
        };

        assert!(validate(&with_keys(METADATA_MAX_KEYS), &RULES, strict).is_ok());
        let err = validate(&with_keys(METADATA_MAX_KEYS + 1), &RULES, strict).unwrap_err();
        assert_eq!(err.field(), Some("metadata"));
    }

    #[test]
    fn metadata_limits_check_key_and_value_length() {
        let strict = ValidationOptions {
            enforce_metadata_limits: true,
        };
        let mut entries = Map::new();
        entries.insert("k".repeat(41), json!("v"));
        let p = payload(json!({"state": "INITIALIZED", "metadata": entries}));
        assert!(validate(&p, &RULES, strict).is_err());

        let p = payload(json!({"state": "INITIALIZED", "metadata": {"k": "v".repeat(501)}}));
        assert!(validate(&p, &RULES, strict).is_err());

        let p = payload(json!({"state": "INITIALIZED", "metadata": {"k": "v".repeat(500)}}));
        assert!(validate(&p, &RULES, strict).is_ok());

        let mut entries = Map::new();
        entries.insert("k".repeat(40), json!("v"));
        let p = payload(json!({"state": "INITIALIZED", "metadata": entries}));
        assert!(validate(&p, &RULES, strict).is_ok());
    }

    #[test]
    fn nested_shape_accepts_valid_structure() {
        let p = payload(json!({"doc": {"lines": [{"text": "coffee", "quantity": 2}]}}));
        assert!(validate(&p, &NESTED, ValidationOptions::default()).is_ok());
    }

    #[test]
    fn nested_shape_reports_path() {
        let p = payload(json!({"doc": {"lines": [{"text": "a"}, {"quantity": 1}]}}));
        let err = validate(&p, &NESTED, ValidationOptions::default()).unwrap_err();
        match err {
            ApiError::InvalidFieldValue { field, expected, .. } => {
                assert_eq!(field, "doc");
                let expected = expected.unwrap();
                assert!(expected.contains("`doc.lines[1].text` is missing"), "{expected}");
                assert!(expected.starts_with("{ lines:"), "{expected}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nested_shape_rejects_empty_array() {
        let p = payload(json!({"doc": {"lines": []}}));
        let err = validate(&p, &NESTED, ValidationOptions::default()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidFieldValue);
    }

    #[test]
    fn plain_array_accepts_empty() {
        let p = payload(json!({"doc": {"lines": [{"text": "tea"}], "tags": []}}));
        assert!(validate(&p, &NESTED, ValidationOptions::default()).is_ok());
    }

    #[test]
    fn plain_array_still_checks_items() {
        let p = payload(json!({"doc": {"lines": [{"text": "tea"}], "tags": [null]}}));
        let err = validate(&p, &NESTED, ValidationOptions::default()).unwrap_err();
        match err {
            ApiError::InvalidFieldValue { expected, .. } => {
                let expected = expected.unwrap();
                assert!(expected.contains("`doc.tags[0]` must not be null"), "{expected}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validation_does_not_mutate_payload() {
        let p = payload(json!({"state": "BROKEN", "metadata": "x"}));
        let before = p.clone();
        let _ = validate(&p, &RULES, ValidationOptions::default());
        assert_eq!(p, before);
    }

    #[test]
    fn rule_set_lookups() {
        assert!(RULES.declares("state"));
        assert!(RULES.declares("metadata"));
        assert!(!RULES.declares("other"));
        assert!(matches!(RULES.constraint_for("state"), Some(Constraint::OneOf(_))));
        assert!(RULES.constraint_for("metadata").is_none());
    }
}

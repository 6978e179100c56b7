//! Document payload validation against field definitions.
//!
//! Validation is an allow-list over declared rules, not a closed-world
//! schema: payload fields with no matching definition pass through and are
//! stored as-is. All violations found in one call are accumulated and
//! reported together as a single [`ValidationReport`].
//!
//! These functions are pure; nothing here touches storage.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{EngineError, EngineResult, ValidationReport};
use crate::schema::types::{json_kind, FieldDefinition};

/// Legal shape for document type and field names. Keeps names printable and
/// free of the separators used in tree keys and index names.
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Za-z][A-Za-z0-9_-]*$").expect("static pattern"));

pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// Structural checks on a schema's field list: names must be well-formed and
/// unique, defaults must match their declared type.
pub fn validate_field_definitions(fields: &[FieldDefinition]) -> EngineResult<()> {
    let mut seen = std::collections::HashSet::new();
    for field in fields {
        if !is_valid_name(&field.name) {
            return Err(EngineError::BadRequest(format!(
                "Invalid field name '{}': must start with a letter and contain only letters, digits, underscores and dashes",
                field.name
            )));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(EngineError::Conflict(format!(
                "Duplicate field name '{}' in schema definition",
                field.name
            )));
        }
        if let Some(default) = &field.default {
            if !field.field_type.matches(default) {
                return Err(EngineError::BadRequest(format!(
                    "Default for field '{}' must be {}, got {}",
                    field.name,
                    field.field_type.expected_kind(),
                    json_kind(default)
                )));
            }
        }
    }
    Ok(())
}

/// Full validation for a document about to be inserted.
pub fn validate_insert(
    payload: &Map<String, Value>,
    fields: &[FieldDefinition],
) -> EngineResult<()> {
    into_result(collect_violations(payload, fields, true))
}

/// Partial validation for an update: rules apply only to supplied fields.
pub fn validate_update(
    payload: &Map<String, Value>,
    fields: &[FieldDefinition],
) -> EngineResult<()> {
    into_result(collect_violations(payload, fields, false))
}

fn into_result(violations: Vec<String>) -> EngineResult<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Validation(ValidationReport::new(violations)))
    }
}

fn collect_violations(
    payload: &Map<String, Value>,
    fields: &[FieldDefinition],
    enforce_required: bool,
) -> Vec<String> {
    let mut violations = Vec::new();

    for field in fields {
        let value = match payload.get(&field.name) {
            Some(value) => value,
            None => {
                if enforce_required && field.required {
                    violations.push(format!("Required field '{}' is missing", field.name));
                }
                continue;
            }
        };

        if !field.field_type.matches(value) {
            violations.push(format!(
                "Field '{}' must be {}, got {}",
                field.name,
                field.field_type.expected_kind(),
                json_kind(value)
            ));
        }

        if let Some(allowed) = &field.allowed_values {
            if !allowed.contains(value) {
                violations.push(format!(
                    "Field '{}' must be one of {}, got {}",
                    field.name,
                    Value::Array(allowed.clone()),
                    value
                ));
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::FieldType;
    use serde_json::json;

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new("amount", FieldType::Number).required(),
            FieldDefinition::new("status", FieldType::String)
                .with_allowed_values(vec![json!("open"), json!("closed")]),
        ]
    }

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn violations_of(err: EngineError) -> Vec<String> {
        match err {
            EngineError::Validation(report) => report.violations().to_vec(),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn missing_required_field_is_cited_by_name() {
        let err = validate_insert(&payload(json!({})), &fields()).unwrap_err();
        let violations = violations_of(err);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("'amount'"));
    }

    #[test]
    fn type_mismatch_cites_expected_and_actual_kinds() {
        let err = validate_insert(&payload(json!({"amount": "10"})), &fields()).unwrap_err();
        let violations = violations_of(err);
        assert!(violations[0].contains("must be number"));
        assert!(violations[0].contains("got string"));
    }

    #[test]
    fn allowed_values_are_enforced() {
        let err = validate_insert(&payload(json!({"amount": 10, "status": "paid"})), &fields())
            .unwrap_err();
        let violations = violations_of(err);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("'status'"));
        assert!(violations[0].contains("open"));
    }

    #[test]
    fn conforming_payload_passes() {
        assert!(validate_insert(&payload(json!({"amount": 10, "status": "open"})), &fields()).is_ok());
    }

    #[test]
    fn violations_accumulate_rather_than_fail_fast() {
        let err = validate_insert(&payload(json!({"status": "paid"})), &fields()).unwrap_err();
        assert_eq!(violations_of(err).len(), 2);
    }

    #[test]
    fn undeclared_fields_pass_through() {
        let doc = payload(json!({"amount": 1, "free_form": {"anything": [1, 2, 3]}}));
        assert!(validate_insert(&doc, &fields()).is_ok());
    }

    #[test]
    fn update_validation_skips_required_checks() {
        assert!(validate_update(&payload(json!({})), &fields()).is_ok());
        let err = validate_update(&payload(json!({"amount": false})), &fields()).unwrap_err();
        assert!(violations_of(err)[0].contains("'amount'"));
    }

    #[test]
    fn field_definitions_reject_duplicates_and_bad_names() {
        let dup = vec![
            FieldDefinition::new("sku", FieldType::String),
            FieldDefinition::new("sku", FieldType::Number),
        ];
        assert!(matches!(
            validate_field_definitions(&dup),
            Err(EngineError::Conflict(_))
        ));

        let bad = vec![FieldDefinition::new("1sku", FieldType::String)];
        assert!(matches!(
            validate_field_definitions(&bad),
            Err(EngineError::BadRequest(_))
        ));
    }

    #[test]
    fn field_definitions_check_default_types() {
        let fields = vec![
            FieldDefinition::new("qty", FieldType::Number).with_default(json!("lots"))
        ];
        assert!(matches!(
            validate_field_definitions(&fields),
            Err(EngineError::BadRequest(_))
        ));
    }
}

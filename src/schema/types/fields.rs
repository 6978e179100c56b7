use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primitive kinds a declared field may take.
///
/// Dates travel as strings; a value passes the `Date` check when it parses as
/// RFC 3339 or as a plain `YYYY-MM-DD` calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
}

impl FieldType {
    /// Kind name used in validation messages.
    pub fn expected_kind(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date string (ISO format)",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }

    /// Checks a JSON value against this declared kind.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_i64() || value.is_u64() || value.is_f64(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Date => value.as_str().is_some_and(is_iso_date),
        }
    }
}

fn is_iso_date(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Kind name of an arbitrary JSON value, for validation messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A declared, typed attribute within a schema version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Drives a compound uniqueness index on (field name, tenant id).
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
    /// Informational reference to another document type; not enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            unique: false,
            default: None,
            allowed_values: None,
            ref_schema: None,
            description: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn with_allowed_values(mut self, values: Vec<Value>) -> Self {
        self.allowed_values = Some(values);
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_matching_covers_the_fixed_mapping() {
        assert!(FieldType::String.matches(&json!("x")));
        assert!(FieldType::Number.matches(&json!(10)));
        assert!(FieldType::Number.matches(&json!(10.5)));
        assert!(!FieldType::Number.matches(&json!("10")));
        assert!(FieldType::Boolean.matches(&json!(true)));
        assert!(FieldType::Array.matches(&json!([1, 2])));
        assert!(FieldType::Object.matches(&json!({"a": 1})));
    }

    #[test]
    fn date_accepts_rfc3339_and_calendar_dates() {
        assert!(FieldType::Date.matches(&json!("2026-01-31")));
        assert!(FieldType::Date.matches(&json!("2026-01-31T10:00:00Z")));
        assert!(!FieldType::Date.matches(&json!("next tuesday")));
        assert!(!FieldType::Date.matches(&json!(20260131)));
    }

    #[test]
    fn field_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&FieldType::String).unwrap(), "\"string\"");
        let parsed: FieldType = serde_json::from_str("\"date\"").unwrap();
        assert_eq!(parsed, FieldType::Date);
    }
}

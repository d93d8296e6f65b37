//! Typed validation rules for update payloads.
//!
//! A [`Rules`] set maps field names to an ordered list of [`Rule`]s.
//! Rules deserialize from plain JSON, for example:
//!
//! ```
//! use crudkit::{Payload, Rules};
//!
//! let rules: Rules = serde_json::from_value(serde_json::json!({
//!     "name": ["required", "string", {"max_length": 255}],
//!     "age": ["nullable", "integer", {"min": 0}]
//! })).unwrap();
//!
//! let payload = Payload::new().with("name", "Bob");
//! assert!(rules.check(&payload).is_none());
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::Payload;

/// A single constraint on a payload field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Field must be present and non-empty.
    Required,
    /// A `null` value passes and skips the remaining rules.
    Nullable,
    String,
    Integer,
    Numeric,
    Boolean,
    Array,
    /// Minimum character count (strings) or element count (arrays).
    MinLength(usize),
    /// Maximum character count (strings) or element count (arrays).
    MaxLength(usize),
    /// Minimum numeric value.
    Min(f64),
    /// Maximum numeric value.
    Max(f64),
    /// Value must equal one of these.
    In(Vec<Value>),
    /// Value must not equal any of these.
    NotIn(Vec<Value>),
}

impl Rule {
    /// Check a present value, returning a message on failure.
    fn check(&self, field: &str, value: &Value) -> Option<String> {
        let ok = match self {
            Rule::Required => !is_empty(value),
            Rule::Nullable => true,
            Rule::String => value.is_string(),
            Rule::Integer => value.is_i64() || value.is_u64(),
            Rule::Numeric => value.is_number(),
            Rule::Boolean => value.is_boolean(),
            Rule::Array => value.is_array(),
            Rule::MinLength(min) => length(value).map_or(true, |len| len >= *min),
            Rule::MaxLength(max) => length(value).map_or(true, |len| len <= *max),
            Rule::Min(min) => value.as_f64().map_or(true, |n| n >= *min),
            Rule::Max(max) => value.as_f64().map_or(true, |n| n <= *max),
            Rule::In(allowed) => allowed.contains(value),
            Rule::NotIn(denied) => !denied.contains(value),
        };

        if ok {
            None
        } else {
            Some(self.message(field, value))
        }
    }

    fn message(&self, field: &str, value: &Value) -> String {
        let unit = if value.is_array() { "items" } else { "characters" };
        match self {
            Rule::Required => format!("The {field} field is required."),
            Rule::Nullable => String::new(),
            Rule::String => format!("The {field} must be a string."),
            Rule::Integer => format!("The {field} must be an integer."),
            Rule::Numeric => format!("The {field} must be a number."),
            Rule::Boolean => format!("The {field} field must be true or false."),
            Rule::Array => format!("The {field} must be an array."),
            Rule::MinLength(min) => format!("The {field} must be at least {min} {unit}."),
            Rule::MaxLength(max) => format!("The {field} may not be greater than {max} {unit}."),
            Rule::Min(min) => format!("The {field} must be at least {min}."),
            Rule::Max(max) => format!("The {field} may not be greater than {max}."),
            Rule::In(_) => format!("The selected {field} is invalid."),
            Rule::NotIn(_) => format!("The selected {field} is invalid."),
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        _ => None,
    }
}

/// Field name to ordered rule list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rules(BTreeMap<String, Vec<Rule>>);

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: set the rules for a field, replacing any previous ones.
    pub fn field(mut self, name: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.0.insert(name.into(), rules.into_iter().collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Validate a payload, returning `None` when every rule passes.
    ///
    /// Absent fields only fail `Required`; their other rules are skipped.
    pub fn check(&self, payload: &Payload) -> Option<ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for (field, rules) in &self.0 {
            let Some(value) = payload.get(field) else {
                if rules.contains(&Rule::Required) {
                    errors.add(field, Rule::Required.message(field, &Value::Null));
                }
                continue;
            };

            // Nullable lets null through every rule except Required.
            if value.is_null() && rules.contains(&Rule::Nullable) {
                if rules.contains(&Rule::Required) {
                    errors.add(field, Rule::Required.message(field, value));
                }
                continue;
            }

            for rule in rules {
                if let Some(message) = rule.check(field, value) {
                    errors.add(field, message);
                }
            }
        }

        if errors.is_empty() {
            None
        } else {
            Some(errors)
        }
    }
}

/// Validation failures keyed by field, messages in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Messages for one field.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields with at least one failure.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for messages in self.0.values() {
            for message in messages {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(message)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_rules() -> Rules {
        Rules::new()
            .field("name", [Rule::Required, Rule::String, Rule::MaxLength(5)])
            .field("age", [Rule::Nullable, Rule::Integer, Rule::Min(0.0)])
    }

    #[test]
    fn test_valid_payload_passes() {
        let payload = Payload::new().with("name", "Bob").with("age", 30);
        assert!(user_rules().check(&payload).is_none());
    }

    #[test]
    fn test_missing_required_field() {
        let payload = Payload::new().with("age", 30);
        let errors = user_rules().check(&payload).unwrap();

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.get("name").unwrap(),
            &["The name field is required.".to_string()]
        );
    }

    #[test]
    fn test_absent_optional_field_skips_rules() {
        let rules = Rules::new().field("age", [Rule::Integer]);
        assert!(rules.check(&Payload::new()).is_none());
    }

    #[test]
    fn test_nullable_skips_remaining_rules() {
        let payload = Payload::new().with("name", "Bob").with("age", Value::Null);
        assert!(user_rules().check(&payload).is_none());
    }

    #[test]
    fn test_required_still_rejects_null_when_nullable() {
        let rules = Rules::new().field("name", [Rule::Required, Rule::Nullable, Rule::String]);
        let errors = rules.check(&Payload::new().with("name", Value::Null)).unwrap();
        assert_eq!(
            errors.get("name").unwrap(),
            &["The name field is required.".to_string()]
        );

        let rules = Rules::new().field("name", [Rule::Nullable, Rule::Required]);
        assert!(rules.check(&Payload::new().with("name", Value::Null)).is_some());
    }

    #[test]
    fn test_null_without_nullable_fails_type_rule() {
        let rules = Rules::new().field("age", [Rule::Integer]);
        let payload = Payload::new().with("age", Value::Null);
        let errors = rules.check(&payload).unwrap();
        assert_eq!(
            errors.get("age").unwrap(),
            &["The age must be an integer.".to_string()]
        );
    }

    #[test]
    fn test_collects_every_failed_rule_in_order() {
        let payload = Payload::new().with("name", "").with("age", -1.5);
        let errors = user_rules().check(&payload).unwrap();

        assert_eq!(
            errors.get("name").unwrap(),
            &["The name field is required.".to_string()]
        );
        assert_eq!(
            errors.get("age").unwrap(),
            &[
                "The age must be an integer.".to_string(),
                "The age must be at least 0.".to_string(),
            ]
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let rules = Rules::new().field("name", [Rule::MaxLength(5)]);
        let payload = Payload::new().with("name", "héllo");
        assert!(rules.check(&payload).is_none());

        let payload = Payload::new().with("name", "héllo!");
        assert!(rules.check(&payload).is_some());
    }

    #[test]
    fn test_in_and_not_in() {
        let rules = Rules::new()
            .field("role", [Rule::In(vec![json!("admin"), json!("user")])])
            .field("slug", [Rule::NotIn(vec![json!("root")])]);

        let ok = Payload::new().with("role", "user").with("slug", "bob");
        assert!(rules.check(&ok).is_none());

        let bad = Payload::new().with("role", "guest").with("slug", "root");
        let errors = rules.check(&bad).unwrap();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_rules_deserialize_from_json() {
        let rules: Rules = serde_json::from_value(json!({
            "name": ["required", "string", {"max_length": 255}],
            "tags": ["array", {"min_length": 1}],
            "role": [{"in": ["admin", "user"]}]
        }))
        .unwrap();

        let expected = Rules::new()
            .field("name", [Rule::Required, Rule::String, Rule::MaxLength(255)])
            .field("tags", [Rule::Array, Rule::MinLength(1)])
            .field("role", [Rule::In(vec![json!("admin"), json!("user")])]);
        assert_eq!(rules, expected);
    }

    #[test]
    fn test_errors_serialize_as_field_map() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "The name field is required.");
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({"name": ["The name field is required."]})
        );
    }
}

//! Output formatting for CLI display.
//!
//! Renders a record as a two-column field/value table as an alternative
//! to JSON serialization.

use serde_json::Value;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct FieldRow {
    field: String,
    value: String,
}

/// Render a JSON record as a field/value table.
///
/// Objects get one row per field in document order; any other value is
/// shown as a single `value` row.
pub fn record_table(record: &Value) -> String {
    let rows: Vec<FieldRow> = match record {
        Value::Object(map) => map
            .iter()
            .map(|(field, value)| FieldRow {
                field: field.clone(),
                value: display_value(value),
            })
            .collect(),
        other => vec![FieldRow {
            field: "value".to_string(),
            value: display_value(other),
        }],
    };

    Table::new(rows).to_string()
}

/// Strings unquoted, null as empty, everything else as compact JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_table_lists_fields_in_order() {
        let output = record_table(&json!({"id": 42, "name": "Bob", "tags": ["a"]}));

        assert!(output.contains("field"));
        assert!(output.contains("name"));
        assert!(output.contains("Bob"));
        assert!(output.contains(r#"["a"]"#));
        let id_pos = output.find("42").unwrap();
        let name_pos = output.find("Bob").unwrap();
        assert!(id_pos < name_pos);
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("text")), "text");
        assert_eq!(display_value(&Value::Null), "");
        assert_eq!(display_value(&json!(1.5)), "1.5");
    }
}

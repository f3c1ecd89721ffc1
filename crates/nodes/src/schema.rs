//! Thin JSON-schema helpers used to check a [`crate::RegisteredNode`]'s
//! declared input/output shape against a graph template.
//!
//! We don't pull in a full JSON-schema validator: the graph validator only
//! ever needs the *top-level field names* a schema declares, never deep
//! type checking of values (values aren't known until runtime).

use serde_json::Value;

use crate::NodeError;

/// Extract the top-level property names from a JSON-schema-shaped object,
/// i.e. the keys of its `properties` map.
///
/// Returns [`NodeError::InvalidSchema`] if `schema` is not a JSON object, or
/// has no `properties` object.
pub fn top_level_fields(node_label: &str, schema: &Value) -> Result<Vec<String>, NodeError> {
    let properties = schema
        .as_object()
        .and_then(|obj| obj.get("properties"))
        .and_then(|props| props.as_object())
        .ok_or_else(|| NodeError::InvalidSchema(node_label.to_string()))?;

    Ok(properties.keys().cloned().collect())
}

/// True iff `schema`'s `properties` map declares `field`.
pub fn has_field(schema: &Value, field: &str) -> bool {
    schema
        .as_object()
        .and_then(|obj| obj.get("properties"))
        .and_then(|props| props.as_object())
        .map(|props| props.contains_key(field))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn top_level_fields_reads_properties_keys() {
        let schema = json!({
            "type": "object",
            "properties": { "url": { "type": "string" }, "timeout": { "type": "integer" } }
        });
        let mut fields = top_level_fields("http_get", &schema).unwrap();
        fields.sort();
        assert_eq!(fields, vec!["timeout".to_string(), "url".to_string()]);
    }

    #[test]
    fn top_level_fields_rejects_non_object_schema() {
        let schema = json!("not a schema");
        assert!(matches!(
            top_level_fields("bad", &schema),
            Err(NodeError::InvalidSchema(name)) if name == "bad"
        ));
    }

    #[test]
    fn has_field_checks_properties_membership() {
        let schema = json!({ "properties": { "url": {} } });
        assert!(has_field(&schema, "url"));
        assert!(!has_field(&schema, "missing"));
    }
}

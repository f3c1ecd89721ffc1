//! The `RegisteredNode` contract — what a worker runtime declares about a
//! node kind it can execute.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NodeError;
use crate::schema::top_level_fields;

/// A node kind registered by some worker runtime: its namespace-scoped
/// identity, its input/output JSON schemas, and the secrets it needs.
///
/// This is a domain type, not a persistence row — see `db::models::RegisteredNodeDocument`
/// for the document that actually gets stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredNode {
    pub name: String,
    pub namespace: String,
    pub runtime_name: String,
    pub runtime_namespace: String,
    pub inputs_schema: Value,
    pub outputs_schema: Value,
    #[serde(default)]
    pub secrets: Vec<String>,
}

impl RegisteredNode {
    /// Validate that `name` and `namespace` are non-empty after trimming.
    pub fn validate_identity(&self) -> Result<(), NodeError> {
        if self.name.trim().is_empty() || self.namespace.trim().is_empty() {
            return Err(NodeError::EmptyIdentity);
        }
        Ok(())
    }

    /// The set of top-level field names this node's input schema declares.
    pub fn input_field_names(&self) -> Result<Vec<String>, NodeError> {
        top_level_fields(&self.name, &self.inputs_schema)
    }

    /// True iff the node's output schema declares `field` at the top level.
    pub fn has_output_field(&self, field: &str) -> bool {
        crate::schema::has_field(&self.outputs_schema, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node() -> RegisteredNode {
        RegisteredNode {
            name: "http_get".into(),
            namespace: "default".into(),
            runtime_name: "http-runtime".into(),
            runtime_namespace: "default".into(),
            inputs_schema: json!({ "properties": { "url": {} } }),
            outputs_schema: json!({ "properties": { "status_code": {}, "body": {} } }),
            secrets: vec!["api_key".into()],
        }
    }

    #[test]
    fn validate_identity_rejects_blank_fields() {
        let mut n = node();
        n.namespace = "   ".into();
        assert!(matches!(n.validate_identity(), Err(NodeError::EmptyIdentity)));
    }

    #[test]
    fn input_field_names_matches_schema_properties() {
        let n = node();
        assert_eq!(n.input_field_names().unwrap(), vec!["url".to_string()]);
    }

    #[test]
    fn has_output_field_checks_outputs_schema() {
        let n = node();
        assert!(n.has_output_field("status_code"));
        assert!(!n.has_output_field("nonexistent"));
    }
}

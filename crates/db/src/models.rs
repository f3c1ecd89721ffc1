//! Document shapes for the five collections this crate persists:
//! `graph_templates`, `registered_nodes`, `runs`, `store_entries`, `states`.
//!
//! These are storage rows, not domain types — `engine` holds the domain
//! model and converts to/from these at the repository boundary.

use bson::oid::ObjectId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Status of a `State` document. Transitions are enforced by `engine`, not
/// here; this crate only persists whatever status it's given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateStatus {
    Created,
    Queued,
    Executed,
    Success,
    Errored,
    RetryCreated,
    NextCreatedError,
    Cancelled,
    Pruned,
}

/// Validation status of a `GraphTemplate` document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Pending,
    Ongoing,
    Valid,
    Invalid,
}

/// One of nine retry strategies: a base strategy crossed with an optional
/// jitter variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryStrategy {
    Exponential,
    ExponentialFullJitter,
    ExponentialEqualJitter,
    Linear,
    LinearFullJitter,
    LinearEqualJitter,
    Fixed,
    FixedFullJitter,
    FixedEqualJitter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicyDocument {
    pub max_retries: u32,
    pub strategy: RetryStrategy,
    pub backoff_factor_ms: u64,
    pub exponent: f64,
    pub max_delay_ms: Option<u64>,
}

/// A fan-in barrier declaration on a `NodeTemplateDocument`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitesStrategy {
    AllSuccess,
    AllDone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitesDocument {
    pub identifier: String,
    pub strategy: UnitesStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTemplateDocument {
    pub identifier: String,
    pub node_name: String,
    pub namespace: String,
    /// Input field name -> dependent-string literal (unparsed; `engine`
    /// owns the placeholder grammar).
    pub inputs: HashMap<String, String>,
    pub next_nodes: Vec<String>,
    pub unites: Option<UnitesDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfigDocument {
    pub required_keys: Vec<String>,
    pub defaults: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphTemplateDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub namespace: String,
    pub name: String,
    pub nodes: Vec<NodeTemplateDocument>,
    /// Secret name -> sealed envelope string (see `engine::secrets`).
    pub secrets: HashMap<String, String>,
    pub store: StoreConfigDocument,
    pub retry_policy: RetryPolicyDocument,
    pub validation_status: ValidationStatus,
    #[serde(default)]
    pub validation_errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredNodeDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub namespace: String,
    pub name: String,
    pub runtime_name: String,
    pub runtime_namespace: String,
    pub inputs_schema: Value,
    pub outputs_schema: Value,
    #[serde(default)]
    pub secrets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub run_id: String,
    pub namespace: String,
    pub graph_name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEntryDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub run_id: String,
    pub key: String,
    pub value: String,
}

/// The central entity: one per node instance per run.
///
/// `parents` is an insertion-ordered map (ancestor identifier -> that
/// ancestor's state id); order matters because graph-rendering picks the
/// most-recently-added parent as "the" edge into a fan-in node.
///
/// `attempt` and `fanout_id` are two independent ordinals, not one
/// overloaded field: `attempt` counts retries of *this* unit of work
/// (1-indexed, bounded by the retry policy's `max_retries`), while
/// `fanout_id` (0-indexed) distinguishes the sibling states a single
/// multi-output `executed` call mints for the same successor identifier.
/// A state that was never fanned out always has `fanout_id = 0`. The two
/// together, alongside `(namespace, graph_name, run_id, identifier)`,
/// uniquely identify a state (see the compound index in `pool.rs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub run_id: String,
    pub namespace: String,
    pub graph_name: String,
    pub node_name: String,
    pub identifier: String,
    pub status: StateStatus,
    pub inputs: HashMap<String, Value>,
    #[serde(default)]
    pub outputs: HashMap<String, Value>,
    pub error: Option<String>,
    pub data: Option<Value>,
    pub parents: IndexMap<String, ObjectId>,
    pub does_unites: bool,
    pub eligible_at: i64,
    pub attempt: u32,
    #[serde(default)]
    pub fanout_id: u32,
    pub fingerprint: Option<String>,
}

impl StateDocument {
    /// `parents` joined with this state's own identifier, for a child
    /// inheriting this state as its most recent parent.
    pub fn parents_with_self(&self) -> IndexMap<String, ObjectId> {
        let mut parents = self.parents.clone();
        if let Some(id) = self.id {
            parents.insert(self.identifier.clone(), id);
        }
        parents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_with_self_preserves_insertion_order_and_appends_last() {
        let mut parents = IndexMap::new();
        parents.insert("root".to_string(), ObjectId::new());
        let state = StateDocument {
            id: Some(ObjectId::new()),
            run_id: "r1".into(),
            namespace: "default".into(),
            graph_name: "g".into(),
            node_name: "n".into(),
            identifier: "mid".into(),
            status: StateStatus::Success,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            error: None,
            data: None,
            parents,
            does_unites: false,
            eligible_at: 0,
            attempt: 1,
            fanout_id: 0,
            fingerprint: None,
        };
        let extended = state.parents_with_self();
        let keys: Vec<&String> = extended.keys().collect();
        assert_eq!(keys, vec!["root", "mid"]);
        assert_eq!(extended.get("mid"), state.id.as_ref());
    }
}

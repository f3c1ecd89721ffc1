//! Core domain models for the state manager.
//!
//! These are the in-memory, source-of-truth types every other engine module
//! operates on. They convert to/from the persistence-layer documents in
//! `db::models` at the repository boundary; nothing downstream of this
//! module should need to look at a `bson::oid::ObjectId` directly.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use db::models as row;

use crate::error::EngineError;

/// Opaque state identifier. Callers treat this as an opaque string; it
/// happens to be the hex form of a `bson::oid::ObjectId`.
pub type StateId = String;

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

impl RetryStrategy {
    fn to_row(self) -> row::RetryStrategy {
        match self {
            Self::Exponential => row::RetryStrategy::Exponential,
            Self::ExponentialFullJitter => row::RetryStrategy::ExponentialFullJitter,
            Self::ExponentialEqualJitter => row::RetryStrategy::ExponentialEqualJitter,
            Self::Linear => row::RetryStrategy::Linear,
            Self::LinearFullJitter => row::RetryStrategy::LinearFullJitter,
            Self::LinearEqualJitter => row::RetryStrategy::LinearEqualJitter,
            Self::Fixed => row::RetryStrategy::Fixed,
            Self::FixedFullJitter => row::RetryStrategy::FixedFullJitter,
            Self::FixedEqualJitter => row::RetryStrategy::FixedEqualJitter,
        }
    }

    fn from_row(value: row::RetryStrategy) -> Self {
        match value {
            row::RetryStrategy::Exponential => Self::Exponential,
            row::RetryStrategy::ExponentialFullJitter => Self::ExponentialFullJitter,
            row::RetryStrategy::ExponentialEqualJitter => Self::ExponentialEqualJitter,
            row::RetryStrategy::Linear => Self::Linear,
            row::RetryStrategy::LinearFullJitter => Self::LinearFullJitter,
            row::RetryStrategy::LinearEqualJitter => Self::LinearEqualJitter,
            row::RetryStrategy::Fixed => Self::Fixed,
            row::RetryStrategy::FixedFullJitter => Self::FixedFullJitter,
            row::RetryStrategy::FixedEqualJitter => Self::FixedEqualJitter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub strategy: RetryStrategy,
    pub backoff_factor_ms: u64,
    pub exponent: f64,
    pub max_delay_ms: Option<u64>,
}

impl RetryPolicy {
    fn to_row(&self) -> row::RetryPolicyDocument {
        row::RetryPolicyDocument {
            max_retries: self.max_retries,
            strategy: self.strategy.to_row(),
            backoff_factor_ms: self.backoff_factor_ms,
            exponent: self.exponent,
            max_delay_ms: self.max_delay_ms,
        }
    }

    fn from_row(row: row::RetryPolicyDocument) -> Self {
        Self {
            max_retries: row.max_retries,
            strategy: RetryStrategy::from_row(row.strategy),
            backoff_factor_ms: row.backoff_factor_ms,
            exponent: row.exponent,
            max_delay_ms: row.max_delay_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitesStrategy {
    AllSuccess,
    AllDone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unites {
    pub identifier: String,
    pub strategy: UnitesStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTemplate {
    pub identifier: String,
    pub node_name: String,
    pub namespace: String,
    pub inputs: HashMap<String, String>,
    pub next_nodes: Vec<String>,
    pub unites: Option<Unites>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    pub required_keys: Vec<String>,
    pub defaults: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Pending,
    Ongoing,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphTemplate {
    pub namespace: String,
    pub name: String,
    pub nodes: Vec<NodeTemplate>,
    /// Secret name -> sealed envelope string.
    pub secrets: HashMap<String, String>,
    pub store: StoreConfig,
    pub retry_policy: RetryPolicy,
    pub validation_status: ValidationStatus,
    pub validation_errors: Vec<String>,
}

impl GraphTemplate {
    pub fn node(&self, identifier: &str) -> Option<&NodeTemplate> {
        self.nodes.iter().find(|n| n.identifier == identifier)
    }

    pub fn to_document(&self) -> row::GraphTemplateDocument {
        row::GraphTemplateDocument {
            id: None,
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            nodes: self
                .nodes
                .iter()
                .map(|n| row::NodeTemplateDocument {
                    identifier: n.identifier.clone(),
                    node_name: n.node_name.clone(),
                    namespace: n.namespace.clone(),
                    inputs: n.inputs.clone(),
                    next_nodes: n.next_nodes.clone(),
                    unites: n.unites.as_ref().map(|u| row::UnitesDocument {
                        identifier: u.identifier.clone(),
                        strategy: match u.strategy {
                            UnitesStrategy::AllSuccess => row::UnitesStrategy::AllSuccess,
                            UnitesStrategy::AllDone => row::UnitesStrategy::AllDone,
                        },
                    }),
                })
                .collect(),
            secrets: self.secrets.clone(),
            store: row::StoreConfigDocument {
                required_keys: self.store.required_keys.clone(),
                defaults: self.store.defaults.clone(),
            },
            retry_policy: self.retry_policy.to_row(),
            validation_status: match self.validation_status {
                ValidationStatus::Pending => row::ValidationStatus::Pending,
                ValidationStatus::Ongoing => row::ValidationStatus::Ongoing,
                ValidationStatus::Valid => row::ValidationStatus::Valid,
                ValidationStatus::Invalid => row::ValidationStatus::Invalid,
            },
            validation_errors: self.validation_errors.clone(),
        }
    }

    pub fn from_document(doc: row::GraphTemplateDocument) -> Self {
        Self {
            namespace: doc.namespace,
            name: doc.name,
            nodes: doc
                .nodes
                .into_iter()
                .map(|n| NodeTemplate {
                    identifier: n.identifier,
                    node_name: n.node_name,
                    namespace: n.namespace,
                    inputs: n.inputs,
                    next_nodes: n.next_nodes,
                    unites: n.unites.map(|u| Unites {
                        identifier: u.identifier,
                        strategy: match u.strategy {
                            row::UnitesStrategy::AllSuccess => UnitesStrategy::AllSuccess,
                            row::UnitesStrategy::AllDone => UnitesStrategy::AllDone,
                        },
                    }),
                })
                .collect(),
            secrets: doc.secrets,
            store: StoreConfig {
                required_keys: doc.store.required_keys,
                defaults: doc.store.defaults,
            },
            retry_policy: RetryPolicy::from_row(doc.retry_policy),
            validation_status: match doc.validation_status {
                row::ValidationStatus::Pending => ValidationStatus::Pending,
                row::ValidationStatus::Ongoing => ValidationStatus::Ongoing,
                row::ValidationStatus::Valid => ValidationStatus::Valid,
                row::ValidationStatus::Invalid => ValidationStatus::Invalid,
            },
            validation_errors: doc.validation_errors,
        }
    }
}

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

impl StateStatus {
    pub fn to_row(self) -> row::StateStatus {
        match self {
            Self::Created => row::StateStatus::Created,
            Self::Queued => row::StateStatus::Queued,
            Self::Executed => row::StateStatus::Executed,
            Self::Success => row::StateStatus::Success,
            Self::Errored => row::StateStatus::Errored,
            Self::RetryCreated => row::StateStatus::RetryCreated,
            Self::NextCreatedError => row::StateStatus::NextCreatedError,
            Self::Cancelled => row::StateStatus::Cancelled,
            Self::Pruned => row::StateStatus::Pruned,
        }
    }

    pub fn from_row(value: row::StateStatus) -> Self {
        match value {
            row::StateStatus::Created => Self::Created,
            row::StateStatus::Queued => Self::Queued,
            row::StateStatus::Executed => Self::Executed,
            row::StateStatus::Success => Self::Success,
            row::StateStatus::Errored => Self::Errored,
            row::StateStatus::RetryCreated => Self::RetryCreated,
            row::StateStatus::NextCreatedError => Self::NextCreatedError,
            row::StateStatus::Cancelled => Self::Cancelled,
            row::StateStatus::Pruned => Self::Pruned,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub id: Option<StateId>,
    pub run_id: String,
    pub namespace: String,
    pub graph_name: String,
    pub node_name: String,
    pub identifier: String,
    pub status: StateStatus,
    pub inputs: HashMap<String, Value>,
    pub outputs: HashMap<String, Value>,
    pub error: Option<String>,
    pub data: Option<Value>,
    pub parents: IndexMap<String, StateId>,
    pub does_unites: bool,
    pub eligible_at: i64,
    pub attempt: u32,
    pub fanout_id: u32,
    pub fingerprint: Option<String>,
}

impl State {
    pub fn to_document(&self) -> Result<row::StateDocument, EngineError> {
        let mut parents = IndexMap::new();
        for (identifier, id) in &self.parents {
            parents.insert(identifier.clone(), parse_object_id(id)?);
        }
        Ok(row::StateDocument {
            id: self.id.as_deref().map(parse_object_id).transpose()?,
            run_id: self.run_id.clone(),
            namespace: self.namespace.clone(),
            graph_name: self.graph_name.clone(),
            node_name: self.node_name.clone(),
            identifier: self.identifier.clone(),
            status: self.status.to_row(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            error: self.error.clone(),
            data: self.data.clone(),
            parents,
            does_unites: self.does_unites,
            eligible_at: self.eligible_at,
            attempt: self.attempt,
            fanout_id: self.fanout_id,
            fingerprint: self.fingerprint.clone(),
        })
    }

    pub fn from_document(doc: row::StateDocument) -> Self {
        Self {
            id: doc.id.map(|id| id.to_hex()),
            run_id: doc.run_id,
            namespace: doc.namespace,
            graph_name: doc.graph_name,
            node_name: doc.node_name,
            identifier: doc.identifier,
            status: StateStatus::from_row(doc.status),
            inputs: doc.inputs,
            outputs: doc.outputs,
            error: doc.error,
            data: doc.data,
            parents: doc
                .parents
                .into_iter()
                .map(|(k, v)| (k, v.to_hex()))
                .collect(),
            does_unites: doc.does_unites,
            eligible_at: doc.eligible_at,
            attempt: doc.attempt,
            fanout_id: doc.fanout_id,
            fingerprint: doc.fingerprint,
        }
    }
}

pub(crate) fn parse_object_id(id: &str) -> Result<bson::oid::ObjectId, EngineError> {
    bson::oid::ObjectId::parse_str(id)
        .map_err(|_| EngineError::StateNotFound(id.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub namespace: String,
    pub graph_name: String,
    pub created_at: i64,
}

impl Run {
    pub fn to_document(&self) -> row::RunDocument {
        row::RunDocument {
            id: None,
            run_id: self.run_id.clone(),
            namespace: self.namespace.clone(),
            graph_name: self.graph_name.clone(),
            created_at: self.created_at,
        }
    }

    pub fn from_document(doc: row::RunDocument) -> Self {
        Self {
            run_id: doc.run_id,
            namespace: doc.namespace,
            graph_name: doc.graph_name,
            created_at: doc.created_at,
        }
    }
}

/// Convert a `nodes::RegisteredNode` (no persisted identity of its own) to
/// and from the document stored in `registered_nodes`.
pub fn registered_node_to_document(node: &nodes::RegisteredNode) -> row::RegisteredNodeDocument {
    row::RegisteredNodeDocument {
        id: None,
        namespace: node.namespace.clone(),
        name: node.name.clone(),
        runtime_name: node.runtime_name.clone(),
        runtime_namespace: node.runtime_namespace.clone(),
        inputs_schema: node.inputs_schema.clone(),
        outputs_schema: node.outputs_schema.clone(),
        secrets: node.secrets.clone(),
    }
}

pub fn registered_node_from_document(doc: row::RegisteredNodeDocument) -> nodes::RegisteredNode {
    nodes::RegisteredNode {
        name: doc.name,
        namespace: doc.namespace,
        runtime_name: doc.runtime_name,
        runtime_namespace: doc.runtime_namespace,
        inputs_schema: doc.inputs_schema,
        outputs_schema: doc.outputs_schema,
        secrets: doc.secrets,
    }
}

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use db::models as row;
use engine::models::{GraphTemplate, NodeTemplate, RetryPolicy, RetryStrategy, StoreConfig, Unites, UnitesStrategy};
use engine::validator::{self, NodeRegistry};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UnitesDto {
    pub identifier: String,
    pub strategy: UnitesStrategy,
}

#[derive(Debug, Deserialize)]
pub struct NodeTemplateDto {
    pub identifier: String,
    pub node_name: String,
    pub namespace: String,
    #[serde(default)]
    pub inputs: HashMap<String, String>,
    #[serde(default)]
    pub next_nodes: Vec<String>,
    #[serde(default)]
    pub unites: Option<UnitesDto>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfigDto {
    #[serde(default)]
    pub required_keys: Vec<String>,
    #[serde(default)]
    pub defaults: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct RetryPolicyDto {
    pub max_retries: u32,
    pub strategy: RetryStrategy,
    pub backoff_factor_ms: u64,
    pub exponent: f64,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

/// Body of `PUT /v0/namespace/{ns}/graph/{g}`. `secrets` is plaintext on
/// the way in; this handler seals every value before it ever touches the
/// store.
#[derive(Debug, Deserialize)]
pub struct GraphUpsertRequest {
    #[serde(default)]
    pub nodes: Vec<NodeTemplateDto>,
    #[serde(default)]
    pub secrets: HashMap<String, String>,
    #[serde(default)]
    pub store: StoreConfigDto,
    pub retry_policy: RetryPolicyDto,
}

#[derive(Debug, Serialize)]
pub struct GraphResponse {
    pub namespace: String,
    pub name: String,
    pub validation_status: row::ValidationStatus,
    pub validation_errors: Vec<String>,
}

impl From<row::GraphTemplateDocument> for GraphResponse {
    fn from(doc: row::GraphTemplateDocument) -> Self {
        Self {
            namespace: doc.namespace,
            name: doc.name,
            validation_status: doc.validation_status,
            validation_errors: doc.validation_errors,
        }
    }
}

pub async fn upsert(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<GraphUpsertRequest>,
) -> Result<(StatusCode, Json<GraphResponse>), ApiError> {
    let mut sealed_secrets = HashMap::with_capacity(body.secrets.len());
    for (secret_name, plaintext) in &body.secrets {
        sealed_secrets.insert(secret_name.clone(), engine::secrets::seal(&state.secrets_key, plaintext)?);
    }

    let template = GraphTemplate {
        namespace: namespace.clone(),
        name: name.clone(),
        nodes: body
            .nodes
            .into_iter()
            .map(|n| NodeTemplate {
                identifier: n.identifier,
                node_name: n.node_name,
                namespace: n.namespace,
                inputs: n.inputs,
                next_nodes: n.next_nodes,
                unites: n.unites.map(|u| Unites { identifier: u.identifier, strategy: u.strategy }),
            })
            .collect(),
        secrets: sealed_secrets,
        store: StoreConfig { required_keys: body.store.required_keys, defaults: body.store.defaults },
        retry_policy: RetryPolicy {
            max_retries: body.retry_policy.max_retries,
            strategy: body.retry_policy.strategy,
            backoff_factor_ms: body.retry_policy.backoff_factor_ms,
            exponent: body.retry_policy.exponent,
            max_delay_ms: body.retry_policy.max_delay_ms,
        },
        validation_status: engine::models::ValidationStatus::Pending,
        validation_errors: Vec::new(),
    };

    let stored = db::repository::graph_templates::upsert(&state.pool, template.to_document()).await?;

    let pool = state.pool.clone();
    let ns = namespace.clone();
    let g = name.clone();
    tokio::spawn(async move {
        if let Err(e) = run_validation(&pool, &ns, &g).await {
            tracing::error!(namespace = %ns, graph = %g, error = %e, "background validation failed");
        }
    });

    Ok((StatusCode::CREATED, Json(stored.into())))
}

/// Runs C6 against the latest stored template and persists the outcome.
/// Skipped results (a concurrent upsert raced us) are not distinguished
/// from any other write — the next upsert's validation pass wins either
/// way, which is the behavior §4.4 asks for.
async fn run_validation(pool: &db::DbPool, namespace: &str, name: &str) -> Result<(), db::DbError> {
    let doc = db::repository::graph_templates::get(pool, namespace, name).await?;
    let template = GraphTemplate::from_document(doc);

    let mut registry: NodeRegistry = HashMap::new();
    for registered in db::repository::registered_nodes::list(pool, namespace).await? {
        registry.insert((registered.namespace.clone(), registered.name.clone()), engine::models::registered_node_from_document(registered));
    }
    for system_ns in ["system"] {
        if let Ok(nodes) = db::repository::registered_nodes::list(pool, system_ns).await {
            for registered in nodes {
                registry.insert((registered.namespace.clone(), registered.name.clone()), engine::models::registered_node_from_document(registered));
            }
        }
    }

    let errors = validator::validate(&template, &registry);
    let status = if errors.is_empty() { row::ValidationStatus::Valid } else { row::ValidationStatus::Invalid };

    db::repository::graph_templates::set_validation_result(pool, namespace, name, status, errors).await
}

pub async fn get(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<GraphResponse>, ApiError> {
    let doc = db::repository::graph_templates::get(&state.pool, &namespace, &name).await?;
    Ok(Json(doc.into()))
}

pub async fn list(
    Path(namespace): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<GraphResponse>>, ApiError> {
    let docs = db::repository::graph_templates::list(&state.pool, &namespace).await?;
    Ok(Json(docs.into_iter().map(GraphResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub store: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub run_id: String,
    pub seed_state_id: String,
}

pub async fn trigger(
    Path((namespace, name)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<TriggerRequest>,
) -> Result<Json<TriggerResponse>, ApiError> {
    let doc = db::repository::graph_templates::get(&state.pool, &namespace, &name).await?;
    let template = GraphTemplate::from_document(doc);

    let result = engine::trigger::trigger(
        &state.pool,
        &template,
        engine::trigger::TriggerRequest { namespace, graph_name: name, store: body.store },
    )
    .await?;

    Ok(Json(TriggerResponse { run_id: result.run_id, seed_state_id: result.seed_state_id }))
}

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use engine::models::{GraphTemplate, State as EngineState, StateStatus};

use crate::error::{bad_request, ApiError};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StateView {
    pub id: String,
    pub run_id: String,
    pub namespace: String,
    pub graph_name: String,
    pub node_name: String,
    pub identifier: String,
    pub status: StateStatus,
    pub inputs: HashMap<String, Value>,
    pub attempt: u32,
    pub fanout_id: u32,
}

impl From<EngineState> for StateView {
    fn from(s: EngineState) -> Self {
        Self {
            id: s.id.unwrap_or_default(),
            run_id: s.run_id,
            namespace: s.namespace,
            graph_name: s.graph_name,
            node_name: s.node_name,
            identifier: s.identifier,
            status: s.status,
            inputs: s.inputs,
            attempt: s.attempt,
            fanout_id: s.fanout_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub nodes: Vec<String>,
    pub batch_size: usize,
}

pub async fn enqueue(
    Path(namespace): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<EnqueueRequest>,
) -> Result<Json<Vec<StateView>>, ApiError> {
    let leased = queue::scheduler::pull(&state.pool, &namespace, &body.nodes, body.batch_size).await?;
    Ok(Json(leased.into_iter().map(StateView::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ExecutedRequest {
    #[serde(default)]
    pub outputs: Vec<HashMap<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct ExecutedResponse {
    pub status: StateStatus,
}

pub async fn executed(
    Path((_namespace, state_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<ExecutedRequest>,
) -> Result<Json<ExecutedResponse>, ApiError> {
    let outcome = queue::signals::executed(&state.pool, &state_id, body.outputs).await?;
    Ok(Json(ExecutedResponse { status: outcome.status }))
}

#[derive(Debug, Deserialize)]
pub struct ErroredRequest {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ErroredResponse {
    pub status: StateStatus,
    pub retry_created: bool,
}

pub async fn errored(
    Path((_namespace, state_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<ErroredRequest>,
) -> Result<Json<ErroredResponse>, ApiError> {
    let outcome = queue::signals::errored(&state.pool, &state_id, body.error).await?;
    Ok(Json(ErroredResponse { status: outcome.status, retry_created: outcome.retry_created }))
}

#[derive(Debug, Deserialize)]
pub struct PruneRequest {
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct PruneResponse {
    pub status: StateStatus,
}

pub async fn prune(
    Path((_namespace, state_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<PruneRequest>,
) -> Result<Json<PruneResponse>, ApiError> {
    let outcome = queue::signals::prune(&state.pool, &state_id, body.data).await?;
    Ok(Json(PruneResponse { status: outcome.status }))
}

#[derive(Debug, Deserialize)]
pub struct ReenqueueRequest {
    pub enqueue_after: i64,
}

#[derive(Debug, Serialize)]
pub struct ReenqueueResponse {
    pub status: StateStatus,
    pub eligible_at: i64,
}

pub async fn reenqueue_after(
    Path((_namespace, state_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<ReenqueueRequest>,
) -> Result<Json<ReenqueueResponse>, ApiError> {
    let outcome = queue::signals::reenqueue_after(&state.pool, &state_id, body.enqueue_after).await?;
    Ok(Json(ReenqueueResponse { status: outcome.status, eligible_at: outcome.eligible_at }))
}

pub async fn secrets(
    Path((_namespace, state_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, String>>, ApiError> {
    let oid = bson::oid::ObjectId::parse_str(&state_id)
        .map_err(|_| bad_request(format!("'{state_id}' is not a valid state id")))?;
    let doc = db::repository::states::get(&state.pool, oid).await?;

    let template_doc = db::repository::graph_templates::get(&state.pool, &doc.namespace, &doc.graph_name).await?;
    let template = GraphTemplate::from_document(template_doc);

    let mut plaintext = HashMap::with_capacity(template.secrets.len());
    for (name, sealed) in &template.secrets {
        plaintext.insert(name.clone(), engine::secrets::unseal(&state.secrets_key, sealed)?);
    }

    Ok(Json(plaintext))
}

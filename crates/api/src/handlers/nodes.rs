use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use db::models::RegisteredNodeDocument;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterNodeRequest {
    pub name: String,
    pub runtime_name: String,
    pub runtime_namespace: String,
    pub inputs_schema: Value,
    pub outputs_schema: Value,
    #[serde(default)]
    pub secrets: Vec<String>,
}

pub async fn upsert(
    Path(namespace): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<RegisterNodeRequest>,
) -> Result<Json<RegisteredNodeDocument>, ApiError> {
    let node = nodes::RegisteredNode {
        name: body.name,
        namespace,
        runtime_name: body.runtime_name,
        runtime_namespace: body.runtime_namespace,
        inputs_schema: body.inputs_schema,
        outputs_schema: body.outputs_schema,
        secrets: body.secrets,
    };
    node.validate_identity()?;

    let stored = db::repository::registered_nodes::upsert(
        &state.pool,
        engine::models::registered_node_to_document(&node),
    )
    .await?;

    Ok(Json(stored))
}

pub async fn list(
    Path(namespace): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RegisteredNodeDocument>>, ApiError> {
    let docs = db::repository::registered_nodes::list(&state.pool, &namespace).await?;
    Ok(Json(docs))
}

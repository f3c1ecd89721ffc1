use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use engine::models::{Run, State as EngineState, StateStatus};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RunView {
    pub run_id: String,
    pub namespace: String,
    pub graph_name: String,
    pub created_at: i64,
}

impl From<Run> for RunView {
    fn from(r: Run) -> Self {
        Self { run_id: r.run_id, namespace: r.namespace, graph_name: r.graph_name, created_at: r.created_at }
    }
}

pub async fn list_page(
    Path((namespace, page, size)): Path<(String, u64, i64)>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RunView>>, ApiError> {
    let docs = db::repository::runs::list_page(&state.pool, &namespace, page, size).await?;
    Ok(Json(docs.into_iter().map(|d| RunView::from(Run::from_document(d))).collect()))
}

#[derive(Debug, Serialize)]
pub struct RunGraphNode {
    pub id: String,
    pub identifier: String,
    pub node_name: String,
    pub status: StateStatus,
}

#[derive(Debug, Serialize)]
pub struct RunGraphEdge {
    pub from: String,
    pub to: String,
}

/// Renders the run's graph from the states actually recorded, not the
/// template: one node per state, one edge per state from its most
/// recently added parent (the last entry in its `parents` map), and the
/// set of states with no parents at all as `roots`.
#[derive(Debug, Serialize)]
pub struct RunGraphResponse {
    pub run_id: String,
    pub nodes: Vec<RunGraphNode>,
    pub edges: Vec<RunGraphEdge>,
    pub status_summary: HashMap<String, u32>,
    pub roots: Vec<String>,
}

pub async fn graph(
    Path((_namespace, run_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<RunGraphResponse>, ApiError> {
    let docs = db::repository::states::list_by_run(&state.pool, &run_id).await?;
    let states: Vec<EngineState> = docs.into_iter().map(EngineState::from_document).collect();

    let mut nodes = Vec::with_capacity(states.len());
    let mut edges = Vec::new();
    let mut roots = Vec::new();
    let mut status_summary: HashMap<String, u32> = HashMap::new();

    for s in &states {
        let id = s.id.clone().unwrap_or_default();

        nodes.push(RunGraphNode {
            id: id.clone(),
            identifier: s.identifier.clone(),
            node_name: s.node_name.clone(),
            status: s.status,
        });

        *status_summary.entry(format!("{:?}", s.status)).or_insert(0) += 1;

        match s.parents.iter().last() {
            Some((_, ancestor_id)) => edges.push(RunGraphEdge { from: ancestor_id.clone(), to: id }),
            None => roots.push(id),
        }
    }

    Ok(Json(RunGraphResponse { run_id, nodes, edges, status_summary, roots }))
}

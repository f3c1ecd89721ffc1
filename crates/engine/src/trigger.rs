//! Run trigger (C12).

use std::collections::HashMap;

use bson::oid::ObjectId;
use indexmap::IndexMap;
use serde_json::Value;

use db::models as row;
use db::DbPool;

use crate::clock;
use crate::error::EngineError;
use crate::inputs;
use crate::models::{GraphTemplate, Run, ValidationStatus};

pub struct TriggerRequest {
    pub namespace: String,
    pub graph_name: String,
    pub store: HashMap<String, String>,
}

pub struct TriggerResult {
    pub run_id: String,
    pub seed_state_id: String,
}

/// Execute §4.8: load + check the template, seed the run and its store,
/// resolve the root node's inputs, and insert the seed state.
pub async fn trigger(
    pool: &DbPool,
    template: &GraphTemplate,
    request: TriggerRequest,
) -> Result<TriggerResult, EngineError> {
    if !matches!(template.validation_status, ValidationStatus::Valid) {
        return Err(EngineError::TemplateInvalid(template.validation_errors.clone()));
    }

    let missing: Vec<String> = template
        .store
        .required_keys
        .iter()
        .filter(|key| !request.store.contains_key(*key))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::MissingStoreKeys(missing));
    }

    let root_identifier = crate::validator::find_root(template).ok_or_else(|| {
        EngineError::Precondition("template has no unique root; re-validate before triggering".into())
    })?;
    let root_template = template.node(root_identifier).expect("find_root returns a real identifier");

    let run_id = ObjectId::new().to_hex();

    let run = Run {
        run_id: run_id.clone(),
        namespace: request.namespace.clone(),
        graph_name: request.graph_name.clone(),
        created_at: clock::now_millis(),
    };
    db::repository::runs::create(pool, run.to_document()).await?;

    db::repository::store_entries::insert_many(pool, &run_id, request.store.clone().into_iter())
        .await?;

    // Root node inputs may only reference `store.*`; any `id.outputs.*`
    // placeholder was already rejected at validation time (§4.2 rule 7
    // implicitly, since the root has no ancestors) — re-checked here as
    // defense in depth.
    for (field, literal) in &root_template.inputs {
        let parsed = crate::resolver::parse(literal)?;
        if !parsed.output_references().is_empty() {
            return Err(EngineError::Precondition(format!(
                "root node input '{field}' may not reference another state's outputs"
            )));
        }
    }

    let resolved_inputs: HashMap<String, Value> = inputs::resolve_literals(
        pool,
        &run_id,
        None,
        None,
        &IndexMap::new(),
        &template.store.defaults,
        &root_template.inputs,
    )
    .await?;

    let seed = row::StateDocument {
        id: None,
        run_id: run_id.clone(),
        namespace: request.namespace,
        graph_name: request.graph_name,
        node_name: root_template.node_name.clone(),
        identifier: root_template.identifier.clone(),
        status: row::StateStatus::Created,
        inputs: resolved_inputs,
        outputs: HashMap::new(),
        error: None,
        data: None,
        parents: IndexMap::new(),
        does_unites: false,
        eligible_at: clock::now_millis(),
        attempt: 1,
        fanout_id: 0,
        fingerprint: None,
    };

    let inserted = db::repository::states::insert(pool, seed).await?;
    let seed_state_id = inserted
        .id
        .map(|id| id.to_hex())
        .expect("insert always returns the generated id");

    Ok(TriggerResult { run_id, seed_state_id })
}

//! Successor materializer (C9).
//!
//! Invoked once a parent state has been written as `EXECUTED`. Walks its
//! template's `next_nodes`, creating ordinary (possibly fanned-out)
//! successors or checking/discharging a fan-in barrier, then writes the
//! parent's final status (`SUCCESS` or `NEXT_CREATED_ERROR`).
//!
//! Fan-out children that share an identifier (one per entry in a
//! multi-output `executed` call) are distinguished by `fanout_id` — 0, 1,
//! 2… — a field dedicated to this purpose; `attempt` stays `1` for every
//! one of them, since none has retried yet. This keeps `attempt` bounded
//! by the retry policy's `max_retries` regardless of fan-out width (P4),
//! while the compound uniqueness guard adds `fanout_id` alongside
//! `attempt` to keep siblings distinct.

use std::collections::HashMap;

use bson::doc;
use indexmap::IndexMap;
use serde_json::Value;

use db::models as row;
use db::DbPool;

use crate::clock;
use crate::error::EngineError;
use crate::fingerprint;
use crate::inputs;
use crate::models::{self, GraphTemplate, NodeTemplate, State, UnitesStrategy};

/// Run successor materialization for `parent` (already written EXECUTED
/// with `outputs = outputs[0]`), then write its final status.
pub async fn materialize(
    pool: &DbPool,
    template: &GraphTemplate,
    parent: &State,
    outputs: &[HashMap<String, Value>],
) -> Result<(), EngineError> {
    let parent_template = template.node(&parent.identifier).ok_or_else(|| {
        EngineError::Precondition(format!(
            "state '{}' has no matching node template",
            parent.identifier
        ))
    })?;

    let mut failure: Option<String> = None;

    for next_id in &parent_template.next_nodes {
        let next_template = match template.node(next_id) {
            Some(t) => t,
            None => {
                failure = Some(format!("successor '{next_id}' has no matching node template"));
                continue;
            }
        };

        let result = match &next_template.unites {
            Some(unites) if unites.identifier == *next_id => {
                // guarded against at validation time (rule 4); defensive only.
                Err(EngineError::Precondition(format!(
                    "node '{next_id}' cannot unite with itself"
                )))
            }
            Some(unites) => materialize_fan_in(pool, template, parent, next_template, unites).await,
            None => materialize_ordinary(pool, parent, next_template, outputs).await,
        };

        if let Err(e) = result {
            failure = Some(e.to_string());
        }
    }

    let parent_oid = models::parse_object_id(parent.id.as_deref().ok_or_else(|| {
        EngineError::Precondition("executed state has no id".to_string())
    })?)?;

    let (to_status, patch) = match failure {
        None => (row::StateStatus::Success, doc! {}),
        Some(msg) => (row::StateStatus::NextCreatedError, doc! { "error": msg }),
    };

    db::repository::states::transition(
        pool,
        parent_oid,
        &[row::StateStatus::Executed],
        to_status,
        patch,
    )
    .await?;

    Ok(())
}

async fn materialize_ordinary(
    pool: &DbPool,
    parent: &State,
    next_template: &NodeTemplate,
    outputs: &[HashMap<String, Value>],
) -> Result<(), EngineError> {
    let parents_with_self = {
        let mut p = parent.parents.clone();
        if let Some(id) = &parent.id {
            p.insert(parent.identifier.clone(), id.clone());
        }
        p
    };

    for (index, output_entry) in outputs.iter().enumerate() {
        let resolved_inputs = inputs::resolve_literals(
            pool,
            &parent.run_id,
            Some(parent.identifier.as_str()),
            Some(output_entry),
            &parents_with_self,
            &HashMap::new(),
            &next_template.inputs,
        )
        .await?;

        let mut parents_doc = IndexMap::new();
        for (k, v) in &parents_with_self {
            parents_doc.insert(k.clone(), models::parse_object_id(v)?);
        }

        let child = row::StateDocument {
            id: None,
            run_id: parent.run_id.clone(),
            namespace: parent.namespace.clone(),
            graph_name: parent.graph_name.clone(),
            node_name: next_template.node_name.clone(),
            identifier: next_template.identifier.clone(),
            status: row::StateStatus::Created,
            inputs: resolved_inputs,
            outputs: HashMap::new(),
            error: None,
            data: None,
            parents: parents_doc,
            does_unites: false,
            eligible_at: clock::now_millis(),
            attempt: 1,
            fanout_id: index as u32,
            fingerprint: None,
        };

        db::repository::states::insert(pool, child).await?;
    }

    Ok(())
}

async fn materialize_fan_in(
    pool: &DbPool,
    template: &GraphTemplate,
    parent: &State,
    next_template: &NodeTemplate,
    unites: &crate::models::Unites,
) -> Result<(), EngineError> {
    let ancestor_state_id = parent.parents.get(unites.identifier.as_str()).ok_or_else(|| {
        EngineError::Precondition(format!(
            "successor '{}' unites with '{}', which is not an ancestor of '{}'",
            next_template.identifier, unites.identifier, parent.identifier
        ))
    })?;
    let ancestor_oid = models::parse_object_id(ancestor_state_id)?;
    let parent_oid = models::parse_object_id(parent.id.as_deref().ok_or_else(|| {
        EngineError::Precondition("executed state has no id".to_string())
    })?)?;

    // `parent` itself still reads back as EXECUTED here (it's only promoted
    // to SUCCESS/NEXT_CREATED_ERROR after `materialize` returns), so it must
    // be excluded from the barrier scan rather than counted as undone.
    // Having reached this point it has already produced outputs without
    // error, so it's implicitly success-equivalent for either strategy and
    // needs no separate check.
    let siblings = db::repository::states::find_sharing_ancestor_excluding(
        pool,
        &parent.run_id,
        &parent.graph_name,
        &unites.identifier,
        ancestor_oid,
        parent_oid,
    )
    .await?;

    let barrier_satisfied = match unites.strategy {
        UnitesStrategy::AllSuccess => siblings.iter().all(|s| {
            matches!(s.status, row::StateStatus::Success | row::StateStatus::RetryCreated)
        }),
        UnitesStrategy::AllDone => siblings.iter().all(|s| {
            !matches!(
                s.status,
                row::StateStatus::Created | row::StateStatus::Queued | row::StateStatus::Executed
            )
        }),
    };

    if !barrier_satisfied {
        return Ok(());
    }

    let ancestor = db::repository::states::get(pool, ancestor_oid).await?;

    let resolved_inputs = inputs::resolve_literals(
        pool,
        &parent.run_id,
        Some(unites.identifier.as_str()),
        Some(&ancestor.outputs),
        &parent.parents,
        &template.store.defaults,
        &next_template.inputs,
    )
    .await?;

    let fingerprint_value = fingerprint::compute(
        &next_template.node_name,
        &next_template.namespace,
        &next_template.identifier,
        &parent.graph_name,
        &parent.run_id,
        parent.parents.iter().map(|(k, v)| (k.clone(), v.clone())),
    );

    let mut parents_doc = IndexMap::new();
    for (k, v) in &parent.parents {
        parents_doc.insert(k.clone(), models::parse_object_id(v)?);
    }

    let child = row::StateDocument {
        id: None,
        run_id: parent.run_id.clone(),
        namespace: parent.namespace.clone(),
        graph_name: parent.graph_name.clone(),
        node_name: next_template.node_name.clone(),
        identifier: next_template.identifier.clone(),
        status: row::StateStatus::Created,
        inputs: resolved_inputs,
        outputs: HashMap::new(),
        error: None,
        data: None,
        parents: parents_doc,
        does_unites: true,
        eligible_at: clock::now_millis(),
        attempt: 1,
        fanout_id: 0,
        fingerprint: Some(fingerprint_value),
    };

    match db::repository::states::insert(pool, child).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_duplicate_key() => {
            tracing::debug!(
                successor = %next_template.identifier,
                "fan-in successor already materialized by a concurrent completion"
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

//! Worker-initiated signal handlers (C11): `executed`, `errored`, `prune`,
//! `reenqueue_after`. Each performs one atomic status transition guarded by
//! `engine::lifecycle`'s expected-status tables, then whatever follow-on
//! work that transition implies.

use std::collections::HashMap;

use bson::{doc, oid::ObjectId};
use serde_json::Value;

use db::models as row;
use db::DbPool;
use engine::models::{GraphTemplate, State, StateStatus};
use engine::{clock, lifecycle, retry, successors};

use crate::error::QueueError;

fn parse_state_id(id: &str) -> Result<ObjectId, QueueError> {
    ObjectId::parse_str(id).map_err(|_| QueueError::InvalidStateId(id.to_string()))
}

async fn load_template(pool: &DbPool, namespace: &str, graph_name: &str) -> Result<GraphTemplate, QueueError> {
    let doc = db::repository::graph_templates::get(pool, namespace, graph_name).await?;
    Ok(GraphTemplate::from_document(doc))
}

pub struct ExecutedOutcome {
    pub status: StateStatus,
}

/// `status = QUEUED` -> `EXECUTED` (outputs[0] recorded), then successor
/// materialization, then the parent's final `SUCCESS`/`NEXT_CREATED_ERROR`
/// write (performed inside `successors::materialize`).
pub async fn executed(
    pool: &DbPool,
    state_id: &str,
    outputs: Vec<HashMap<String, Value>>,
) -> Result<ExecutedOutcome, QueueError> {
    let oid = parse_state_id(state_id)?;
    let primary = outputs.first().cloned().unwrap_or_default();

    let updated = db::repository::states::transition(
        pool,
        oid,
        lifecycle::expected_for_executed(),
        row::StateStatus::Executed,
        doc! { "outputs": bson::to_bson(&primary)? },
    )
    .await?;

    let parent = State::from_document(updated);
    let template = load_template(pool, &parent.namespace, &parent.graph_name).await?;

    successors::materialize(pool, &template, &parent, &outputs).await?;

    let final_doc = db::repository::states::get(pool, oid).await?;
    Ok(ExecutedOutcome {
        status: StateStatus::from_row(final_doc.status),
    })
}

pub struct ErroredOutcome {
    pub status: StateStatus,
    pub retry_created: bool,
}

/// `status = QUEUED` -> `ERRORED` or `RETRY_CREATED`, inserting a retry
/// sibling first if the policy's attempt budget allows it. `EXECUTED` is
/// rejected with a distinct error per §4.7, not folded into the generic
/// precondition-failure path.
pub async fn errored(pool: &DbPool, state_id: &str, error: String) -> Result<ErroredOutcome, QueueError> {
    let oid = parse_state_id(state_id)?;
    let current = db::repository::states::get(pool, oid).await?;

    if current.status == row::StateStatus::Executed {
        return Err(QueueError::AlreadyExecuted);
    }

    let template = load_template(pool, &current.namespace, &current.graph_name).await?;

    let mut retry_created = false;
    if current.attempt < template.retry_policy.max_retries + 1 {
        let new_attempt = current.attempt + 1;
        let mut rng = rand::thread_rng();
        let delay_ms = retry::compute_delay(&template.retry_policy, current.attempt, &mut rng);
        let eligible_at = clock::now_millis() + delay_ms as i64;

        let sibling = row::StateDocument {
            id: None,
            run_id: current.run_id.clone(),
            namespace: current.namespace.clone(),
            graph_name: current.graph_name.clone(),
            node_name: current.node_name.clone(),
            identifier: current.identifier.clone(),
            status: row::StateStatus::Created,
            inputs: current.inputs.clone(),
            outputs: HashMap::new(),
            error: None,
            data: None,
            parents: current.parents.clone(),
            does_unites: current.does_unites,
            eligible_at,
            attempt: new_attempt,
            fanout_id: current.fanout_id,
            // Deliberately not re-derived: the fingerprint unique index has
            // no `attempt` component, so carrying the parent's fingerprint
            // forward here would collide with the very row being retried.
            fingerprint: None,
        };

        match db::repository::states::insert(pool, sibling).await {
            Ok(_) => retry_created = true,
            Err(e) if e.is_duplicate_key() => retry_created = true,
            Err(e) => return Err(e.into()),
        }
    }

    let new_status = if retry_created {
        row::StateStatus::RetryCreated
    } else {
        row::StateStatus::Errored
    };

    let updated = db::repository::states::transition(
        pool,
        oid,
        lifecycle::expected_for_errored(),
        new_status,
        doc! { "error": error },
    )
    .await?;

    Ok(ErroredOutcome {
        status: StateStatus::from_row(updated.status),
        retry_created,
    })
}

pub struct PruneOutcome {
    pub status: StateStatus,
}

/// `status = QUEUED` -> `PRUNED`. The state's successors are never created.
pub async fn prune(pool: &DbPool, state_id: &str, data: Option<Value>) -> Result<PruneOutcome, QueueError> {
    let oid = parse_state_id(state_id)?;

    let updated = db::repository::states::transition(
        pool,
        oid,
        lifecycle::expected_for_prune(),
        row::StateStatus::Pruned,
        doc! { "data": bson::to_bson(&data)? },
    )
    .await?;

    Ok(PruneOutcome {
        status: StateStatus::from_row(updated.status),
    })
}

pub struct ReenqueueOutcome {
    pub status: StateStatus,
    pub eligible_at: i64,
}

/// Any non-terminal status -> `CREATED`, `eligible_at = now + delay_ms`.
pub async fn reenqueue_after(pool: &DbPool, state_id: &str, delay_ms: i64) -> Result<ReenqueueOutcome, QueueError> {
    if delay_ms <= 0 {
        return Err(QueueError::Precondition("delay_ms must be > 0".to_string()));
    }

    let oid = parse_state_id(state_id)?;
    let eligible_at = clock::now_millis() + delay_ms;

    let updated = db::repository::states::transition(
        pool,
        oid,
        lifecycle::expected_for_reenqueue(),
        row::StateStatus::Created,
        doc! { "eligible_at": eligible_at },
    )
    .await?;

    Ok(ReenqueueOutcome {
        status: StateStatus::from_row(updated.status),
        eligible_at,
    })
}

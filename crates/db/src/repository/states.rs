//! `states` collection — the busiest collection in the store.
//!
//! All cross-state coordination goes through either an atomic
//! `find_one_and_update` with a status precondition, or a unique-index
//! insert whose duplicate-key failure is a benign, expected outcome the
//! caller checks for with `DbError::is_duplicate_key`.

use bson::oid::ObjectId;
use bson::{doc, Bson};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::Collection;

use crate::models::{StateDocument, StateStatus};
use crate::{DbError, DbPool};

fn collection(pool: &DbPool) -> Collection<StateDocument> {
    pool.collection("states")
}

/// Insert a brand-new state. Callers in a fan-in/retry path should check
/// `DbError::is_duplicate_key` on failure rather than treating it as fatal.
pub async fn insert(pool: &DbPool, state: StateDocument) -> Result<StateDocument, DbError> {
    let result = collection(pool).insert_one(&state, None).await?;
    let mut state = state;
    state.id = result.inserted_id.as_object_id();
    Ok(state)
}

pub async fn get(pool: &DbPool, id: ObjectId) -> Result<StateDocument, DbError> {
    collection(pool)
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or(DbError::NotFound)
}

/// Atomically move `id` from one of `expected` statuses to `new_status`,
/// merging `extra_set` into the same update. Fails with
/// `DbError::PreconditionFailed` if the document isn't currently in one of
/// the expected statuses (or doesn't exist).
pub async fn transition(
    pool: &DbPool,
    id: ObjectId,
    expected: &[StateStatus],
    new_status: StateStatus,
    mut extra_set: bson::Document,
) -> Result<StateDocument, DbError> {
    let expected_bson: Vec<Bson> = expected
        .iter()
        .map(bson::to_bson)
        .collect::<Result<_, _>>()?;

    extra_set.insert("status", bson::to_bson(&new_status)?);

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let updated = collection(pool)
        .find_one_and_update(
            doc! { "_id": id, "status": { "$in": expected_bson } },
            doc! { "$set": extra_set },
            options,
        )
        .await?;

    updated.ok_or_else(|| {
        DbError::PreconditionFailed(format!(
            "state {id} is not in one of the expected statuses for this transition"
        ))
    })
}

/// Pop one eligible state for `node_name ∈ accept_list` and atomically mark
/// it `Queued`. Returns `None` if nothing is currently eligible.
pub async fn lease_one(
    pool: &DbPool,
    namespace: &str,
    accept_list: &[String],
    now: i64,
) -> Result<Option<StateDocument>, DbError> {
    let options = FindOneAndUpdateOptions::builder()
        .sort(doc! { "eligible_at": 1 })
        .return_document(ReturnDocument::After)
        .build();

    let leased = collection(pool)
        .find_one_and_update(
            doc! {
                "namespace": namespace,
                "status": bson::to_bson(&StateStatus::Created)?,
                "node_name": { "$in": accept_list },
                "eligible_at": { "$lte": now },
            },
            doc! { "$set": { "status": bson::to_bson(&StateStatus::Queued)? } },
            options,
        )
        .await?;

    Ok(leased)
}

pub async fn list_by_run(pool: &DbPool, run_id: &str) -> Result<Vec<StateDocument>, DbError> {
    use futures_util::stream::TryStreamExt;

    let cursor = collection(pool)
        .find(doc! { "run_id": run_id }, None)
        .await?;
    let states = cursor.try_collect().await?;
    Ok(states)
}

/// States in `run_id`/`graph_name` whose recorded value for ancestor
/// `parent_identifier` equals `parent_state_id`, excluding `exclude_id` —
/// the set a fan-in barrier check scans over. The just-executed state that
/// triggered the check is always excluded: it still reads back as EXECUTED
/// at this point (it's only promoted to SUCCESS/NEXT_CREATED_ERROR once
/// materialization finishes), so counting it here would make it look
/// undone even though it's already implicitly success-equivalent.
pub async fn find_sharing_ancestor_excluding(
    pool: &DbPool,
    run_id: &str,
    graph_name: &str,
    parent_identifier: &str,
    parent_state_id: ObjectId,
    exclude_id: ObjectId,
) -> Result<Vec<StateDocument>, DbError> {
    use futures_util::stream::TryStreamExt;

    let key = format!("parents.{parent_identifier}");
    let cursor = collection(pool)
        .find(
            doc! {
                "run_id": run_id,
                "graph_name": graph_name,
                key: parent_state_id,
                "_id": { "$ne": exclude_id },
            },
            None,
        )
        .await?;
    let states = cursor.try_collect().await?;
    Ok(states)
}

//! Pull scheduler (C10).
//!
//! A worker asks for up to `batch_size` eligible states for a namespace and
//! a set of node names it knows how to run. Each slot in the batch is its
//! own atomic find-and-update against `states`; slots run concurrently
//! (bounded by `batch_size` itself) and simply come back empty once nothing
//! is left to lease, rather than retrying or blocking.

use db::DbPool;
use engine::clock;
use engine::models::State;

use crate::error::QueueError;

/// Lease up to `batch_size` states in `namespace` whose `node_name` is in
/// `accept_list` and whose `eligible_at` has passed. May return fewer than
/// `batch_size` — including zero — if nothing is currently eligible.
pub async fn pull(
    pool: &DbPool,
    namespace: &str,
    accept_list: &[String],
    batch_size: usize,
) -> Result<Vec<State>, QueueError> {
    let mut tasks = tokio::task::JoinSet::new();

    for _ in 0..batch_size {
        let pool = pool.clone();
        let namespace = namespace.to_string();
        let accept_list = accept_list.to_vec();
        tasks.spawn(async move {
            let now = clock::now_millis();
            db::repository::states::lease_one(&pool, &namespace, &accept_list, now).await
        });
    }

    let mut leased = Vec::with_capacity(batch_size);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(Some(doc))) => leased.push(State::from_document(doc)),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(join_err) => return Err(QueueError::Internal(join_err.to_string())),
        }
    }

    Ok(leased)
}

#[cfg(test)]
mod tests {
    // The scheduler's only logic beyond `db::repository::states::lease_one`
    // itself is the concurrent fan-out and result collection; exercising it
    // meaningfully needs a live MongoDB instance and is covered by the
    // workspace's integration suite rather than a unit test here.
}

//! `store_entries` collection.

use bson::doc;
use mongodb::Collection;

use crate::models::StoreEntryDocument;
use crate::{DbError, DbPool};

fn collection(pool: &DbPool) -> Collection<StoreEntryDocument> {
    pool.collection("store_entries")
}

/// Batch-insert one entry per `(key, value)` pair for a run. Empty input is
/// a no-op — triggering a run with an empty store map is valid.
pub async fn insert_many(
    pool: &DbPool,
    run_id: &str,
    entries: impl IntoIterator<Item = (String, String)>,
) -> Result<(), DbError> {
    let docs: Vec<StoreEntryDocument> = entries
        .into_iter()
        .map(|(key, value)| StoreEntryDocument {
            id: None,
            run_id: run_id.to_string(),
            key,
            value,
        })
        .collect();

    if docs.is_empty() {
        return Ok(());
    }

    collection(pool).insert_many(&docs, None).await?;
    Ok(())
}

pub async fn get(
    pool: &DbPool,
    run_id: &str,
    key: &str,
) -> Result<Option<StoreEntryDocument>, DbError> {
    let entry = collection(pool)
        .find_one(doc! { "run_id": run_id, "key": key }, None)
        .await?;
    Ok(entry)
}

pub async fn list(pool: &DbPool, run_id: &str) -> Result<Vec<StoreEntryDocument>, DbError> {
    use futures_util::stream::TryStreamExt;

    let cursor = collection(pool)
        .find(doc! { "run_id": run_id }, None)
        .await?;
    let entries = cursor.try_collect().await?;
    Ok(entries)
}

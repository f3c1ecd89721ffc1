//! `runs` collection.

use bson::doc;
use mongodb::options::FindOptions;
use mongodb::Collection;

use crate::models::RunDocument;
use crate::{DbError, DbPool};

fn collection(pool: &DbPool) -> Collection<RunDocument> {
    pool.collection("runs")
}

pub async fn create(pool: &DbPool, run: RunDocument) -> Result<RunDocument, DbError> {
    let result = collection(pool).insert_one(&run, None).await?;
    let mut run = run;
    run.id = result.inserted_id.as_object_id();
    Ok(run)
}

pub async fn get(pool: &DbPool, run_id: &str) -> Result<RunDocument, DbError> {
    collection(pool)
        .find_one(doc! { "run_id": run_id }, None)
        .await?
        .ok_or(DbError::NotFound)
}

/// Zero-indexed page of runs in a namespace, newest first.
pub async fn list_page(
    pool: &DbPool,
    namespace: &str,
    page: u64,
    size: i64,
) -> Result<Vec<RunDocument>, DbError> {
    use futures_util::stream::TryStreamExt;

    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .skip(page * size as u64)
        .limit(size)
        .build();

    let cursor = collection(pool)
        .find(doc! { "namespace": namespace }, options)
        .await?;
    let runs = cursor.try_collect().await?;
    Ok(runs)
}

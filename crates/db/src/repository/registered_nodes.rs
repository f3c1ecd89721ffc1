//! `registered_nodes` collection.

use bson::doc;
use mongodb::options::{FindOneAndReplaceOptions, ReturnDocument};
use mongodb::Collection;

use crate::models::RegisteredNodeDocument;
use crate::{DbError, DbPool};

fn collection(pool: &DbPool) -> Collection<RegisteredNodeDocument> {
    pool.collection("registered_nodes")
}

/// Upsert by `(namespace, name)`. Called when a worker runtime registers
/// or re-registers the node kinds it can execute.
pub async fn upsert(
    pool: &DbPool,
    node: RegisteredNodeDocument,
) -> Result<RegisteredNodeDocument, DbError> {
    let filter = doc! { "namespace": &node.namespace, "name": &node.name };
    let options = FindOneAndReplaceOptions::builder()
        .upsert(true)
        .return_document(ReturnDocument::After)
        .build();

    let stored = collection(pool)
        .find_one_and_replace(filter, &node, options)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(stored)
}

pub async fn get(
    pool: &DbPool,
    namespace: &str,
    name: &str,
) -> Result<RegisteredNodeDocument, DbError> {
    collection(pool)
        .find_one(doc! { "namespace": namespace, "name": name }, None)
        .await?
        .ok_or(DbError::NotFound)
}

pub async fn list(pool: &DbPool, namespace: &str) -> Result<Vec<RegisteredNodeDocument>, DbError> {
    use futures_util::stream::TryStreamExt;

    let cursor = collection(pool)
        .find(doc! { "namespace": namespace }, None)
        .await?;
    let nodes = cursor.try_collect().await?;
    Ok(nodes)
}

//! `graph_templates` collection.

use bson::doc;
use mongodb::options::{FindOneAndReplaceOptions, ReturnDocument};
use mongodb::Collection;

use crate::models::{GraphTemplateDocument, ValidationStatus};
use crate::{DbError, DbPool};

fn collection(pool: &DbPool) -> Collection<GraphTemplateDocument> {
    pool.collection("graph_templates")
}

/// Upsert a template by its `(namespace, name)` key. Always resets
/// `validation_status` to `Pending` — the caller is expected to kick off
/// async validation right after this returns.
pub async fn upsert(
    pool: &DbPool,
    mut template: GraphTemplateDocument,
) -> Result<GraphTemplateDocument, DbError> {
    template.validation_status = ValidationStatus::Pending;
    template.validation_errors.clear();

    let filter = doc! { "namespace": &template.namespace, "name": &template.name };
    let options = FindOneAndReplaceOptions::builder()
        .upsert(true)
        .return_document(ReturnDocument::After)
        .build();

    let stored = collection(pool)
        .find_one_and_replace(filter, &template, options)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(stored)
}

pub async fn get(
    pool: &DbPool,
    namespace: &str,
    name: &str,
) -> Result<GraphTemplateDocument, DbError> {
    collection(pool)
        .find_one(doc! { "namespace": namespace, "name": name }, None)
        .await?
        .ok_or(DbError::NotFound)
}

pub async fn list(pool: &DbPool, namespace: &str) -> Result<Vec<GraphTemplateDocument>, DbError> {
    use futures_util::stream::TryStreamExt;

    let cursor = collection(pool)
        .find(doc! { "namespace": namespace }, None)
        .await?;
    let templates = cursor.try_collect().await?;
    Ok(templates)
}

/// Write the outcome of an asynchronous validation pass. Skipped silently
/// if the template was upserted again in the meantime (stale validation).
pub async fn set_validation_result(
    pool: &DbPool,
    namespace: &str,
    name: &str,
    status: ValidationStatus,
    errors: Vec<String>,
) -> Result<(), DbError> {
    let status_bson = bson::to_bson(&status)?;
    collection(pool)
        .update_one(
            doc! { "namespace": namespace, "name": name },
            doc! { "$set": { "validation_status": status_bson, "validation_errors": errors } },
            None,
        )
        .await?;
    Ok(())
}

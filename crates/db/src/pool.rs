//! MongoDB client / database handle.

use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};
use tracing::info;

use crate::DbError;

/// Type alias for the shared MongoDB database handle used across the whole
/// application. Cheap to clone (it wraps an `Arc` internally).
pub type DbPool = Database;

/// Connect to MongoDB and return the handle for `database_name`.
pub async fn create_pool(mongo_uri: &str, database_name: &str) -> Result<DbPool, DbError> {
    info!("Connecting to MongoDB database '{}'", database_name);
    let options = ClientOptions::parse(mongo_uri).await?;
    let client = Client::with_options(options)?;
    Ok(client.database(database_name))
}

/// Idempotently create every index the state manager relies on for
/// correctness (uniqueness constraints doubling as concurrency control,
/// plus the lookups on the hot paths).
///
/// Safe to call on every startup: `create_index` on an already-existing
/// index with matching options is a no-op.
pub async fn provision_indexes(pool: &DbPool) -> Result<(), DbError> {
    info!("Provisioning MongoDB indexes");

    let graph_templates = pool.collection::<mongodb::bson::Document>("graph_templates");
    graph_templates
        .create_index(
            IndexModel::builder()
                .keys(mongodb::bson::doc! { "namespace": 1, "name": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    let registered_nodes = pool.collection::<mongodb::bson::Document>("registered_nodes");
    registered_nodes
        .create_index(
            IndexModel::builder()
                .keys(mongodb::bson::doc! { "namespace": 1, "name": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    let runs = pool.collection::<mongodb::bson::Document>("runs");
    runs.create_index(
        IndexModel::builder()
            .keys(mongodb::bson::doc! { "run_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build(),
    )
    .await?;

    let states = pool.collection::<mongodb::bson::Document>("states");
    states
        .create_index(
            IndexModel::builder()
                .keys(mongodb::bson::doc! {
                    "namespace": 1,
                    "graph_name": 1,
                    "run_id": 1,
                    "identifier": 1,
                    "attempt": 1,
                    "fanout_id": 1,
                })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;
    states
        .create_index(
            IndexModel::builder()
                .keys(mongodb::bson::doc! { "fingerprint": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(mongodb::bson::doc! { "does_unites": true })
                        .build(),
                )
                .build(),
        )
        .await?;
    states
        .create_index(
            IndexModel::builder()
                .keys(mongodb::bson::doc! { "namespace": 1, "status": 1, "node_name": 1, "eligible_at": 1 })
                .build(),
        )
        .await?;
    states
        .create_index(
            IndexModel::builder()
                .keys(mongodb::bson::doc! { "run_id": 1 })
                .build(),
        )
        .await?;

    let store_entries = pool.collection::<mongodb::bson::Document>("store_entries");
    store_entries
        .create_index(
            IndexModel::builder()
                .keys(mongodb::bson::doc! { "run_id": 1, "key": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    info!("MongoDB indexes provisioned");
    Ok(())
}

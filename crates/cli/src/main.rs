//! State manager CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`              — start the HTTP API (C13).
//! - `provision-indexes`  — idempotently create the MongoDB indexes the
//!   state machine relies on for correctness.
//! - `validate`           — validate a graph template JSON file offline.

mod config;
mod logging;

use clap::{Parser, Subcommand};
use tracing::info;

use config::Settings;

#[derive(Parser)]
#[command(name = "state-manager", about = "Distributed workflow orchestrator state manager", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API server.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// Create (or confirm) the MongoDB indexes the state machine depends on.
    ProvisionIndexes,
    /// Validate a graph template JSON file without reaching a database.
    ///
    /// There is no registered-node catalog to consult offline, so a fake
    /// registry is synthesized from the template itself: each node is taken
    /// to declare exactly the input fields it's given plus whatever output
    /// fields other nodes in the template reference from it, and to need no
    /// secrets. This makes rules 9-10 trivially pass and leaves the
    /// structural rules — one root, acyclic, every `${{ ... }}` reference
    /// resolvable to an ancestor or a store key — as the real check.
    Validate {
        /// Path to the graph template JSON file.
        path: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind } => {
            let settings = Settings::from_env().unwrap_or_else(|e| {
                eprintln!("configuration error: {e}");
                std::process::exit(1);
            });
            logging::init(settings.mode);

            info!("connecting to MongoDB database '{}'", settings.mongo_database_name);
            let pool = db::pool::create_pool(&settings.mongo_uri, &settings.mongo_database_name)
                .await
                .expect("failed to connect to MongoDB");
            db::pool::provision_indexes(&pool).await.expect("failed to provision indexes");

            let cors = settings.cors_layer();
            let state = api::AppState { pool, api_key: settings.api_key, secrets_key: settings.secrets_key };

            info!("starting API server on {bind}");
            api::serve(&bind, state, cors).await.expect("server exited with an error");
        }
        Command::ProvisionIndexes => {
            let settings = Settings::from_env().unwrap_or_else(|e| {
                eprintln!("configuration error: {e}");
                std::process::exit(1);
            });
            logging::init(settings.mode);

            let pool = db::pool::create_pool(&settings.mongo_uri, &settings.mongo_database_name)
                .await
                .expect("failed to connect to MongoDB");
            db::pool::provision_indexes(&pool).await.expect("failed to provision indexes");
            info!("indexes provisioned");
        }
        Command::Validate { path } => {
            logging::init(config::Mode::Development);

            let content = std::fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("cannot read file {}: {e}", path.display()));

            let template: engine::GraphTemplate = serde_json::from_str(&content)
                .unwrap_or_else(|e| panic!("invalid graph template JSON: {e}"));

            let registry = offline_registry(&template);
            let errors = engine::validator::validate(&template, &registry);

            if errors.is_empty() {
                println!("template is structurally valid");
            } else {
                eprintln!("template failed validation:");
                for e in &errors {
                    eprintln!("  - {e}");
                }
                std::process::exit(1);
            }
        }
    }
}

/// Synthesizes a [`engine::validator::NodeRegistry`] from the template
/// itself, for use where no worker runtime has registered anything (see the
/// `validate` subcommand's doc comment).
fn offline_registry(template: &engine::GraphTemplate) -> engine::validator::NodeRegistry {
    use std::collections::HashMap;

    let mut output_fields: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in &template.nodes {
        for literal in node.inputs.values() {
            let Ok(parsed) = engine::resolver::parse(literal) else { continue };
            for (ref_id, ref_field) in parsed.output_references() {
                output_fields.entry(ref_id).or_default().push(ref_field);
            }
        }
    }

    let mut registry = engine::validator::NodeRegistry::new();
    for node in &template.nodes {
        let mut input_properties = serde_json::Map::new();
        for key in node.inputs.keys() {
            input_properties.insert(key.clone(), serde_json::json!({}));
        }
        let inputs_schema = serde_json::Value::Object({
            let mut schema = serde_json::Map::new();
            schema.insert("properties".to_string(), serde_json::Value::Object(input_properties));
            schema
        });

        let mut output_properties = serde_json::Map::new();
        for field in output_fields.get(node.identifier.as_str()).cloned().unwrap_or_default() {
            output_properties.insert(field.to_string(), serde_json::json!({}));
        }
        let outputs_schema = serde_json::Value::Object({
            let mut schema = serde_json::Map::new();
            schema.insert("properties".to_string(), serde_json::Value::Object(output_properties));
            schema
        });
        registry.insert(
            (node.namespace.clone(), node.node_name.clone()),
            nodes::RegisteredNode {
                name: node.node_name.clone(),
                namespace: node.namespace.clone(),
                runtime_name: "offline".to_string(),
                runtime_namespace: node.namespace.clone(),
                inputs_schema,
                outputs_schema,
                secrets: vec![],
            },
        );
    }
    registry
}

//! Shared input-resolution plumbing used by both the successor
//! materializer (C9, non-root nodes) and the run trigger (C12, root node).
//!
//! Resolution needs the database (to fetch an ancestor's stored outputs,
//! or a run's store entries) but the actual substitution algorithm is pure
//! (`resolver::resolve`); this module is the glue between the two.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;

use db::DbPool;

use crate::error::EngineError;
use crate::models::{self, StateId};
use crate::resolver::{self, DependentString};

fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve every literal in `literals` (field name -> dependent string) to
/// a plain string value, wrapped as `Value::String`.
///
/// - `self_identifier` / `self_outputs`: if a placeholder's `id` matches
///   `self_identifier`, its value is read from `self_outputs` (the
///   per-child view of a just-executed parent's output) rather than a DB
///   fetch. Pass `None` for the root node, where no `id.outputs.*`
///   reference is legal at all.
/// - `parents`: ancestor identifier -> that ancestor's state id, used to
///   fetch any other referenced ancestor's stored outputs.
/// - `store_defaults`: the graph template's default values, consulted when
///   a run has no `StoreEntry` for a referenced key.
pub async fn resolve_literals(
    pool: &DbPool,
    run_id: &str,
    self_identifier: Option<&str>,
    self_outputs: Option<&HashMap<String, Value>>,
    parents: &IndexMap<String, StateId>,
    store_defaults: &HashMap<String, String>,
    literals: &HashMap<String, String>,
) -> Result<HashMap<String, Value>, EngineError> {
    let mut parsed: HashMap<&str, DependentString> = HashMap::new();
    for (field, literal) in literals {
        parsed.insert(field.as_str(), resolver::parse(literal)?);
    }

    // Prefetch every distinct ancestor output and store key referenced.
    let mut ancestor_outputs: HashMap<String, HashMap<String, Value>> = HashMap::new();
    let mut store_values: HashMap<String, String> = HashMap::new();

    for dep in parsed.values() {
        for (id, _field) in dep.output_references() {
            if Some(id) == self_identifier || ancestor_outputs.contains_key(id) {
                continue;
            }
            let ancestor_state_id = parents.get(id).ok_or_else(|| {
                EngineError::UnresolvedPlaceholder(format!("{id}.outputs.*"))
            })?;
            let ancestor = db::repository::states::get(
                pool,
                models::parse_object_id(ancestor_state_id)?,
            )
            .await?;
            ancestor_outputs.insert(id.to_string(), ancestor.outputs);
        }
        for key in dep.store_references() {
            if store_values.contains_key(key) {
                continue;
            }
            let value = match db::repository::store_entries::get(pool, run_id, key).await? {
                Some(entry) => entry.value,
                None => store_defaults
                    .get(key)
                    .cloned()
                    .ok_or_else(|| EngineError::UnresolvedPlaceholder(format!("store.{key}")))?,
            };
            store_values.insert(key.to_string(), value);
        }
    }

    let mut resolved = HashMap::new();
    for (field, dep) in &parsed {
        let value = resolver::resolve(
            dep,
            |id, field| {
                if Some(id) == self_identifier {
                    self_outputs.and_then(|o| o.get(field)).map(value_to_plain_string)
                } else {
                    ancestor_outputs
                        .get(id)
                        .and_then(|outputs| outputs.get(field))
                        .map(value_to_plain_string)
                }
            },
            |key| store_values.get(key).cloned(),
        )?;
        resolved.insert(field.to_string(), Value::String(value));
    }

    Ok(resolved)
}

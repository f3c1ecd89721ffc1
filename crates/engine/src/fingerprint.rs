//! Fan-in fingerprint (§4.3): a SHA-256 hash of a fan-in state's identity,
//! used as a unique-index key so concurrent barrier completions collapse
//! onto a single successor state.

use std::collections::BTreeMap;

use serde_json::json;
use sha2::{Digest, Sha256};

/// Canonical fingerprint for a fan-in successor. `parents` is re-sorted by
/// key here regardless of the caller's map order — insertion order matters
/// for `State.parents` semantics elsewhere, but the fingerprint must be
/// order-independent.
pub fn compute(
    node_name: &str,
    namespace: &str,
    identifier: &str,
    graph_name: &str,
    run_id: &str,
    parents: impl IntoIterator<Item = (String, String)>,
) -> String {
    let sorted_parents: BTreeMap<String, String> = parents.into_iter().collect();

    let value = json!({
        "node_name": node_name,
        "namespace": namespace,
        "identifier": identifier,
        "graph_name": graph_name,
        "run_id": run_id,
        "parents": sorted_parents,
    });

    // serde_json::Map is BTreeMap-backed (the `preserve_order` feature is
    // not enabled anywhere in this workspace), so this serialization has
    // sorted keys at every level and compact separators by construction.
    let canonical = serde_json::to_string(&value).expect("json values are always serializable");

    let digest = Sha256::digest(canonical.as_bytes());
    to_hex(&digest)
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(out, "{byte:02x}").expect("writing to a String never fails");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_produce_identical_fingerprint() {
        let a = compute(
            "join",
            "default",
            "j",
            "g",
            "r1",
            vec![("root".to_string(), "id1".to_string())],
        );
        let b = compute(
            "join",
            "default",
            "j",
            "g",
            "r1",
            vec![("root".to_string(), "id1".to_string())],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn parent_map_order_does_not_affect_fingerprint() {
        let a = compute(
            "join",
            "default",
            "j",
            "g",
            "r1",
            vec![
                ("root".to_string(), "id1".to_string()),
                ("mid".to_string(), "id2".to_string()),
            ],
        );
        let b = compute(
            "join",
            "default",
            "j",
            "g",
            "r1",
            vec![
                ("mid".to_string(), "id2".to_string()),
                ("root".to_string(), "id1".to_string()),
            ],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn different_run_ids_produce_different_fingerprints() {
        let a = compute("join", "default", "j", "g", "r1", vec![]);
        let b = compute("join", "default", "j", "g", "r2", vec![]);
        assert_ne!(a, b);
    }
}

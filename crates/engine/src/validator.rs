//! Graph-template validator (C6).
//!
//! Pure function over an already-parsed `GraphTemplate` plus the set of
//! `RegisteredNode`s it references — no I/O happens here. The caller
//! (typically the template-upsert handler) fetches the registered nodes
//! first, runs this, then persists the resulting status/errors.

use std::collections::{HashMap, HashSet};

use crate::models::GraphTemplate;
use crate::resolver;

const RESERVED_IDENTIFIER: &str = "store";
/// Namespaces, besides the graph's own, whose nodes a template may reference.
const SYSTEM_NAMESPACES: &[&str] = &["system"];

/// Keyed by `(namespace, node_name)`.
pub type NodeRegistry = HashMap<(String, String), nodes::RegisteredNode>;

/// The graph's unique root (in-degree zero over `next_nodes`), if there is
/// exactly one. Used by the run trigger once a template is known VALID.
pub fn find_root(template: &GraphTemplate) -> Option<&str> {
    let mut has_incoming: HashSet<&str> = HashSet::new();
    for node in &template.nodes {
        for next in &node.next_nodes {
            has_incoming.insert(next.as_str());
        }
    }
    let mut roots = template
        .nodes
        .iter()
        .map(|n| n.identifier.as_str())
        .filter(|id| !has_incoming.contains(id));
    let root = roots.next()?;
    if roots.next().is_some() {
        None
    } else {
        Some(root)
    }
}

/// Run every rule in §4.2 against `template`. An empty return means VALID.
pub fn validate(template: &GraphTemplate, registry: &NodeRegistry) -> Vec<String> {
    let mut errors = Vec::new();

    let identifiers: HashSet<&str> = template.nodes.iter().map(|n| n.identifier.as_str()).collect();

    // Rule 1: non-empty name/namespace; namespace is the graph's own or a
    // system namespace.
    for node in &template.nodes {
        if node.node_name.trim().is_empty() || node.namespace.trim().is_empty() {
            errors.push(format!(
                "node '{}' has an empty node_name or namespace",
                node.identifier
            ));
        } else if node.namespace != template.namespace
            && !SYSTEM_NAMESPACES.contains(&node.namespace.as_str())
        {
            errors.push(format!(
                "node '{}' references namespace '{}', which is neither the graph's own namespace nor an approved system namespace",
                node.identifier, node.namespace
            ));
        }
    }

    // Rule 2: identifiers unique, none reserved.
    {
        let mut seen = HashSet::new();
        for node in &template.nodes {
            if node.identifier == RESERVED_IDENTIFIER {
                errors.push(format!("identifier '{RESERVED_IDENTIFIER}' is reserved"));
            }
            if !seen.insert(node.identifier.as_str()) {
                errors.push(format!("duplicate node identifier '{}'", node.identifier));
            }
        }
    }

    // Rule 3: next_nodes reference existing identifiers.
    for node in &template.nodes {
        for next in &node.next_nodes {
            if !identifiers.contains(next.as_str()) {
                errors.push(format!(
                    "node '{}' lists unknown successor '{next}'",
                    node.identifier
                ));
            }
        }
    }

    // Rule 4: unites.identifier exists and is not the node itself.
    for node in &template.nodes {
        if let Some(unites) = &node.unites {
            if unites.identifier == node.identifier {
                errors.push(format!("node '{}' cannot unite with itself", node.identifier));
            } else if !identifiers.contains(unites.identifier.as_str()) {
                errors.push(format!(
                    "node '{}' unites with unknown identifier '{}'",
                    node.identifier, unites.identifier
                ));
            }
        }
    }

    // From here on, structural rules assume the graph is at least internally
    // consistent (rules 3–4 passed); skip graph-shape analysis otherwise to
    // avoid panics on dangling edges.
    let structurally_sound = errors.is_empty();

    let mut roots: Vec<&str> = Vec::new();
    let mut dominators: HashMap<&str, HashSet<&str>> = HashMap::new();

    if structurally_sound {
        // Rule 5: exactly one root (in-degree zero over next_nodes edges).
        let mut has_incoming: HashSet<&str> = HashSet::new();
        for node in &template.nodes {
            for next in &node.next_nodes {
                has_incoming.insert(next.as_str());
            }
        }
        roots = template
            .nodes
            .iter()
            .map(|n| n.identifier.as_str())
            .filter(|id| !has_incoming.contains(id))
            .collect();

        if roots.len() != 1 {
            errors.push(format!(
                "expected exactly one root node, found {}: {:?}",
                roots.len(),
                roots
            ));
        }

        // Rule 6: weakly connected, and acyclic over next_nodes.
        if !is_weakly_connected(template) {
            errors.push("graph is not weakly connected".to_string());
        }
        if let Some(cycle_node) = find_cycle(template) {
            errors.push(format!(
                "graph contains a cycle reachable from '{cycle_node}'"
            ));
        } else if roots.len() == 1 {
            dominators = compute_dominators(template, roots[0]);
        }
    }

    // Rule 7 & 8: placeholder references.
    for node in &template.nodes {
        for (field_name, literal) in &node.inputs {
            let parsed = match resolver::parse(literal) {
                Ok(p) => p,
                Err(e) => {
                    errors.push(format!(
                        "node '{}' input '{field_name}': {e}",
                        node.identifier
                    ));
                    continue;
                }
            };

            for (ref_id, ref_field) in parsed.output_references() {
                if !structurally_sound || roots.is_empty() {
                    continue;
                }
                let dominates = dominators
                    .get(node.identifier.as_str())
                    .map(|d| d.contains(ref_id))
                    .unwrap_or(false);
                if ref_id == node.identifier || !dominates {
                    errors.push(format!(
                        "node '{}' input '{field_name}' references '{ref_id}', which is not an ancestor on every path from the root",
                        node.identifier
                    ));
                    continue;
                }
                if let Some(ref_node) = template.node(ref_id) {
                    let key = (ref_node.namespace.clone(), ref_node.node_name.clone());
                    match registry.get(&key) {
                        Some(reg) if reg.has_output_field(ref_field) => {}
                        Some(_) => errors.push(format!(
                            "node '{}' input '{field_name}' references output field '{ref_field}' on '{ref_id}', which its registered node does not declare",
                            node.identifier
                        )),
                        None => {} // reported by rule 9 already
                    }
                }
            }

            for key in parsed.store_references() {
                let satisfied = template.store.required_keys.iter().any(|k| k == key)
                    || template.store.defaults.contains_key(key);
                if !satisfied {
                    errors.push(format!(
                        "node '{}' input '{field_name}' references store key '{key}', which is neither required nor has a default",
                        node.identifier
                    ));
                }
            }
        }
    }

    // Rule 9 & 10: registered-node compatibility and secret presence.
    for node in &template.nodes {
        let key = (node.namespace.clone(), node.node_name.clone());
        match registry.get(&key) {
            None => errors.push(format!(
                "node '{}' references unregistered node '{}/{}'",
                node.identifier, node.namespace, node.node_name
            )),
            Some(reg) => {
                match reg.input_field_names() {
                    Ok(expected) => {
                        let expected: HashSet<&str> = expected.iter().map(String::as_str).collect();
                        let actual: HashSet<&str> = node.inputs.keys().map(String::as_str).collect();
                        if expected != actual {
                            errors.push(format!(
                                "node '{}' input fields {:?} do not exactly match registered node inputs {:?}",
                                node.identifier, actual, expected
                            ));
                        }
                    }
                    Err(e) => errors.push(format!(
                        "node '{}' registered input schema is invalid: {e}",
                        node.identifier
                    )),
                }

                for secret_name in &reg.secrets {
                    if !template.secrets.contains_key(secret_name) {
                        errors.push(format!(
                            "node '{}' requires secret '{secret_name}', which is absent from the graph's secret envelope",
                            node.identifier
                        ));
                    }
                }
            }
        }
    }

    errors
}

fn is_weakly_connected(template: &GraphTemplate) -> bool {
    if template.nodes.is_empty() {
        return true;
    }
    let mut undirected: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in &template.nodes {
        undirected.entry(node.identifier.as_str()).or_default();
        for next in &node.next_nodes {
            undirected.entry(node.identifier.as_str()).or_default().push(next.as_str());
            undirected.entry(next.as_str()).or_default().push(node.identifier.as_str());
        }
    }

    let start = template.nodes[0].identifier.as_str();
    let mut visited = HashSet::new();
    let mut stack = vec![start];
    while let Some(n) = stack.pop() {
        if !visited.insert(n) {
            continue;
        }
        if let Some(neighbors) = undirected.get(n) {
            stack.extend(neighbors.iter().copied());
        }
    }
    visited.len() == template.nodes.len()
}

/// Returns the first node found to sit on a cycle, if any.
fn find_cycle(template: &GraphTemplate) -> Option<&str> {
    #[derive(PartialEq, Clone, Copy)]
    enum Mark {
        Visiting,
        Done,
    }
    let mut marks: HashMap<&str, Mark> = HashMap::new();

    fn visit<'a>(
        node_id: &'a str,
        template: &'a GraphTemplate,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Option<&'a str> {
        match marks.get(node_id) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => return Some(node_id),
            None => {}
        }
        marks.insert(node_id, Mark::Visiting);
        if let Some(node) = template.node(node_id) {
            for next in &node.next_nodes {
                if let Some(cyclic) = visit(next.as_str(), template, marks) {
                    return Some(cyclic);
                }
            }
        }
        marks.insert(node_id, Mark::Done);
        None
    }

    for node in &template.nodes {
        if let Some(cyclic) = visit(node.identifier.as_str(), template, &mut marks) {
            return Some(cyclic);
        }
    }
    None
}

/// Iterative dataflow dominator computation: `dom[n]` is the set of
/// identifiers that lie on every path from `root` to `n`, including `n`
/// itself. Assumes the graph is acyclic (checked by the caller).
fn compute_dominators<'a>(
    template: &'a GraphTemplate,
    root: &'a str,
) -> HashMap<&'a str, HashSet<&'a str>> {
    let all_ids: HashSet<&str> = template.nodes.iter().map(|n| n.identifier.as_str()).collect();

    let mut predecessors: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in &template.nodes {
        for next in &node.next_nodes {
            predecessors.entry(next.as_str()).or_default().push(node.identifier.as_str());
        }
    }

    let mut dom: HashMap<&str, HashSet<&str>> = HashMap::new();
    for &id in &all_ids {
        let mut set = HashSet::new();
        if id == root {
            set.insert(root);
        } else {
            set = all_ids.clone();
        }
        dom.insert(id, set);
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &id in &all_ids {
            if id == root {
                continue;
            }
            let preds = predecessors.get(id).cloned().unwrap_or_default();
            if preds.is_empty() {
                continue;
            }
            let mut intersection: Option<HashSet<&str>> = None;
            for p in preds {
                let pdom = dom.get(p).cloned().unwrap_or_default();
                intersection = Some(match intersection {
                    None => pdom,
                    Some(acc) => acc.intersection(&pdom).copied().collect(),
                });
            }
            let mut new_set = intersection.unwrap_or_default();
            new_set.insert(id);
            if dom.get(id) != Some(&new_set) {
                dom.insert(id, new_set);
                changed = true;
            }
        }
    }

    dom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeTemplate, RetryPolicy, RetryStrategy, StoreConfig, ValidationStatus};
    use std::collections::HashMap as Map;

    fn node(identifier: &str, next: &[&str]) -> NodeTemplate {
        NodeTemplate {
            identifier: identifier.to_string(),
            node_name: "noop".to_string(),
            namespace: "default".to_string(),
            inputs: Map::new(),
            next_nodes: next.iter().map(|s| s.to_string()).collect(),
            unites: None,
        }
    }

    fn template(nodes: Vec<NodeTemplate>) -> GraphTemplate {
        GraphTemplate {
            namespace: "default".to_string(),
            name: "g".to_string(),
            nodes,
            secrets: Map::new(),
            store: StoreConfig::default(),
            retry_policy: RetryPolicy {
                max_retries: 0,
                strategy: RetryStrategy::Fixed,
                backoff_factor_ms: 0,
                exponent: 1.0,
                max_delay_ms: None,
            },
            validation_status: ValidationStatus::Pending,
            validation_errors: vec![],
        }
    }

    fn registry_for(nodes: &[NodeTemplate]) -> NodeRegistry {
        let mut reg = NodeRegistry::new();
        for n in nodes {
            reg.insert(
                (n.namespace.clone(), n.node_name.clone()),
                nodes::RegisteredNode {
                    name: n.node_name.clone(),
                    namespace: n.namespace.clone(),
                    runtime_name: "rt".to_string(),
                    runtime_namespace: "default".to_string(),
                    inputs_schema: serde_json::json!({ "properties": {} }),
                    outputs_schema: serde_json::json!({ "properties": { "o": {} } }),
                    secrets: vec![],
                },
            );
        }
        reg
    }

    #[test]
    fn linear_chain_is_valid() {
        let nodes = vec![node("a", &["b"]), node("b", &["c"]), node("c", &[])];
        let registry = registry_for(&nodes);
        let t = template(nodes);
        assert!(validate(&t, &registry).is_empty());
    }

    #[test]
    fn detects_duplicate_identifier() {
        let nodes = vec![node("a", &[]), node("a", &[])];
        let registry = registry_for(&nodes);
        let t = template(nodes);
        let errors = validate(&t, &registry);
        assert!(errors.iter().any(|e| e.contains("duplicate")));
    }

    #[test]
    fn detects_cycle() {
        let nodes = vec![node("a", &["b"]), node("b", &["a"])];
        let registry = registry_for(&nodes);
        let t = template(nodes);
        let errors = validate(&t, &registry);
        assert!(errors.iter().any(|e| e.contains("cycle")));
    }

    #[test]
    fn rejects_more_than_one_root() {
        let nodes = vec![node("a", &["c"]), node("b", &["c"]), node("c", &[])];
        let registry = registry_for(&nodes);
        let t = template(nodes);
        let errors = validate(&t, &registry);
        assert!(errors.iter().any(|e| e.contains("exactly one root")));
    }

    #[test]
    fn unregistered_node_is_reported() {
        let nodes = vec![node("a", &[])];
        let t = template(nodes);
        let errors = validate(&t, &NodeRegistry::new());
        assert!(errors.iter().any(|e| e.contains("unregistered")));
    }
}

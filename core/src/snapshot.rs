//! C2 — the snapshot builder. Turns a neighborhood payload into a
//! canonicalized, immutable [`GraphSnapshot`] (spec.md §4.2).

use std::collections::HashMap;

use dto::ProviderNeighborhoodPayload;
use models::{DataFreshness, Edge, GraphSnapshot, ServiceId, ServiceNode};

use crate::error::{CoreError, CoreResult};

/// Builds a canonical snapshot from a raw neighborhood payload.
///
/// Algorithm (§4.2):
/// 1. Canonicalize every node's `(name, namespace)` into a `ServiceId`,
///    keeping a name→id index for edge resolution.
/// 2. Resolve each edge's endpoints through that index; an endpoint absent
///    from the node list is canonicalized as `default:<raw>` rather than
///    dropped.
/// 3. Coerce non-finite rate/error-rate to `0.0`; non-finite latencies to
///    `None` (never to `0.0` — that would falsify weighted means).
/// 4. Resolve `targetKey` through the same name index.
pub fn build_snapshot(
    payload: &ProviderNeighborhoodPayload,
    data_freshness: Option<DataFreshness>,
) -> CoreResult<GraphSnapshot> {
    let mut nodes: HashMap<ServiceId, ServiceNode> = HashMap::new();
    let mut name_index: HashMap<&str, ServiceId> = HashMap::new();

    for node in &payload.nodes {
        let id = ServiceId::from_parts(node.namespace.as_deref(), &node.name);
        name_index.entry(node.name.as_str()).or_insert_with(|| id.clone());
        nodes.entry(id.clone()).or_insert_with(|| ServiceNode {
            service_id: id.clone(),
            name: node.name.clone(),
            namespace: id.namespace().to_string(),
        });
    }

    let resolve = |raw: &str, name_index: &HashMap<&str, ServiceId>| -> ServiceId {
        name_index
            .get(raw)
            .cloned()
            .unwrap_or_else(|| ServiceId::canonicalize(raw))
    };

    let mut edges = Vec::with_capacity(payload.edges.len());
    for edge in &payload.edges {
        let source = resolve(&edge.from, &name_index);
        let target = resolve(&edge.to, &name_index);
        nodes.entry(source.clone()).or_insert_with(|| ServiceNode {
            service_id: source.clone(),
            name: source.name().to_string(),
            namespace: source.namespace().to_string(),
        });
        nodes.entry(target.clone()).or_insert_with(|| ServiceNode {
            service_id: target.clone(),
            name: target.name().to_string(),
            namespace: target.namespace().to_string(),
        });

        edges.push(Edge {
            source,
            target,
            rate: coerce_finite(edge.rate, 0.0),
            error_rate: coerce_finite(edge.error_rate, 0.0).clamp(0.0, 1.0),
            p50: coerce_optional_finite(edge.p50),
            p95: coerce_optional_finite(edge.p95),
            p99: coerce_optional_finite(edge.p99),
        });
    }

    let target_key = resolve(&payload.center, &name_index);
    if !nodes.contains_key(&target_key) {
        return Err(CoreError::NotFound(format!(
            "target service '{}' not present in neighborhood",
            payload.center
        )));
    }

    let mut incoming: HashMap<ServiceId, Vec<Edge>> = HashMap::new();
    let mut outgoing: HashMap<ServiceId, Vec<Edge>> = HashMap::new();
    for edge in &edges {
        outgoing.entry(edge.source.clone()).or_default().push(edge.clone());
        incoming.entry(edge.target.clone()).or_default().push(edge.clone());
    }

    Ok(GraphSnapshot {
        nodes,
        edges,
        incoming,
        outgoing,
        target_key,
        data_freshness,
    })
}

fn coerce_finite(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn coerce_optional_finite(value: Option<f64>) -> Option<f64> {
    value.and_then(|v| if v.is_finite() { Some(v) } else { None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dto::{ProviderEdgePayload, ProviderNodePayload};

    fn node(name: &str) -> ProviderNodePayload {
        ProviderNodePayload { name: name.to_string(), namespace: None }
    }

    fn edge(from: &str, to: &str, rate: f64) -> ProviderEdgePayload {
        ProviderEdgePayload {
            from: from.to_string(),
            to: to.to_string(),
            rate,
            error_rate: 0.0,
            p50: Some(10.0),
            p95: Some(20.0),
            p99: Some(30.0),
        }
    }

    #[test]
    fn builds_canonical_keys_and_adjacency() {
        let payload = ProviderNeighborhoodPayload {
            center: "T".to_string(),
            k: 2,
            nodes: vec![node("A"), node("T")],
            edges: vec![edge("A", "T", 10.0)],
        };
        let snap = build_snapshot(&payload, None).unwrap();
        assert_eq!(snap.target_key.as_str(), "default:T");
        assert_eq!(snap.node_count(), 2);
        assert_eq!(snap.incoming_of(&snap.target_key).len(), 1);
        assert_eq!(snap.outgoing_of(&ServiceId::canonicalize("A")).len(), 1);
    }

    #[test]
    fn missing_target_is_not_found() {
        let payload = ProviderNeighborhoodPayload {
            center: "Ghost".to_string(),
            k: 1,
            nodes: vec![node("A")],
            edges: vec![],
        };
        assert!(matches!(build_snapshot(&payload, None), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn non_finite_rate_coerces_to_zero_and_latency_to_none() {
        let mut e = edge("A", "T", f64::NAN);
        e.p95 = Some(f64::INFINITY);
        let payload = ProviderNeighborhoodPayload {
            center: "T".to_string(),
            k: 1,
            nodes: vec![node("A"), node("T")],
            edges: vec![e],
        };
        let snap = build_snapshot(&payload, None).unwrap();
        let edge = &snap.edges[0];
        assert_eq!(edge.rate, 0.0);
        assert_eq!(edge.p95, None);
    }

    #[test]
    fn unresolved_edge_endpoint_falls_back_to_default_namespace() {
        let payload = ProviderNeighborhoodPayload {
            center: "T".to_string(),
            k: 1,
            nodes: vec![node("T")],
            edges: vec![edge("ghost-caller", "T", 5.0)],
        };
        let snap = build_snapshot(&payload, None).unwrap();
        assert!(snap.contains(&ServiceId::canonicalize("ghost-caller")));
    }
}

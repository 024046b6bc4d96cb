//! C3 — path enumerator. Deterministic bounded-depth DFS finding the top-N
//! caller→target paths by bottleneck throughput (spec.md §4.3).

use models::{Edge, GraphSnapshot, PathImpact, ServiceId};

/// Finds up to `max_paths` distinct simple paths ending at
/// `snapshot.target_key`, each no longer than `max_depth` hops, sorted by
/// bottleneck rate (`pathRps`) descending.
pub fn enumerate_top_paths(
    snapshot: &GraphSnapshot,
    max_depth: u8,
    max_paths: usize,
) -> Vec<PathImpact> {
    if max_paths == 0 {
        return Vec::new();
    }

    let target = &snapshot.target_key;
    let safety_cap = max_paths.saturating_mul(2).max(1);

    let mut starts: Vec<&ServiceId> = snapshot.nodes.keys().filter(|id| *id != target).collect();
    starts.sort();

    let mut found: Vec<PathImpact> = Vec::new();
    for start in starts {
        if found.len() >= safety_cap {
            break;
        }
        let mut visited = vec![start.clone()];
        dfs(
            snapshot,
            start,
            target,
            max_depth,
            f64::INFINITY,
            &mut visited,
            &mut found,
            safety_cap,
        );
    }

    found.sort_by(|a, b| {
        b.path_rps
            .partial_cmp(&a.path_rps)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen = std::collections::HashSet::new();
    let mut deduped = Vec::with_capacity(found.len());
    for path in found {
        let key = join_path(&path.path);
        if seen.insert(key) {
            deduped.push(path);
        }
        if deduped.len() >= max_paths {
            break;
        }
    }
    deduped
}

#[allow(clippy::too_many_arguments)]
fn dfs(
    snapshot: &GraphSnapshot,
    current: &ServiceId,
    target: &ServiceId,
    max_depth: u8,
    min_rate_so_far: f64,
    visited: &mut Vec<ServiceId>,
    found: &mut Vec<PathImpact>,
    safety_cap: usize,
) {
    if found.len() >= safety_cap {
        return;
    }

    let hops_used = (visited.len() - 1) as u8;
    if hops_used >= max_depth {
        return;
    }

    let mut children: Vec<&Edge> = snapshot.outgoing_of(current).iter().collect();
    children.sort_by(|a, b| {
        b.rate
            .partial_cmp(&a.rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.target.cmp(&b.target))
    });

    for edge in children {
        if found.len() >= safety_cap {
            return;
        }
        if visited.contains(&edge.target) {
            continue;
        }
        let bottleneck = min_rate_so_far.min(edge.rate);
        if &edge.target == target {
            let mut path = visited.clone();
            path.push(edge.target.clone());
            found.push(PathImpact::bare(path, bottleneck));
            continue;
        }
        visited.push(edge.target.clone());
        dfs(
            snapshot,
            &edge.target,
            target,
            max_depth,
            bottleneck,
            visited,
            found,
            safety_cap,
        );
        visited.pop();
    }
}

fn join_path(path: &[ServiceId]) -> String {
    path.iter()
        .map(ServiceId::as_str)
        .collect::<Vec<_>>()
        .join(">")
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::Edge;
    use std::collections::HashMap;

    fn edge(source: &str, target: &str, rate: f64) -> Edge {
        Edge {
            source: ServiceId::canonicalize(source),
            target: ServiceId::canonicalize(target),
            rate,
            error_rate: 0.0,
            p50: None,
            p95: None,
            p99: None,
        }
    }

    fn snapshot(edges: Vec<Edge>, target: &str) -> GraphSnapshot {
        let mut nodes = HashMap::new();
        let mut incoming: HashMap<ServiceId, Vec<Edge>> = HashMap::new();
        let mut outgoing: HashMap<ServiceId, Vec<Edge>> = HashMap::new();
        for e in &edges {
            for id in [&e.source, &e.target] {
                nodes.entry(id.clone()).or_insert_with(|| models::ServiceNode {
                    service_id: id.clone(),
                    name: id.name().to_string(),
                    namespace: id.namespace().to_string(),
                });
            }
            outgoing.entry(e.source.clone()).or_default().push(e.clone());
            incoming.entry(e.target.clone()).or_default().push(e.clone());
        }
        GraphSnapshot {
            nodes,
            edges,
            incoming,
            outgoing,
            target_key: ServiceId::canonicalize(target),
            data_freshness: None,
        }
    }

    #[test]
    fn finds_direct_path_with_bottleneck_rate() {
        let snap = snapshot(vec![edge("A", "T", 10.0)], "T");
        let paths = enumerate_top_paths(&snap, 2, 10);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].path_rps, 10.0);
        assert_eq!(paths[0].path.last().unwrap().as_str(), "default:T");
    }

    #[test]
    fn bottleneck_is_min_rate_along_multi_hop_path() {
        let snap = snapshot(vec![edge("A", "B", 10.0), edge("B", "T", 3.0)], "T");
        let paths = enumerate_top_paths(&snap, 2, 10);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].path_rps, 3.0);
    }

    #[test]
    fn respects_max_depth_in_hops() {
        let snap = snapshot(
            vec![edge("A", "B", 10.0), edge("B", "C", 8.0), edge("C", "T", 5.0)],
            "T",
        );
        let paths_depth2 = enumerate_top_paths(&snap, 2, 10);
        assert!(paths_depth2.is_empty());
        let paths_depth3 = enumerate_top_paths(&snap, 3, 10);
        assert_eq!(paths_depth3.len(), 1);
    }

    #[test]
    fn skips_cycles() {
        let snap = snapshot(
            vec![edge("A", "B", 5.0), edge("B", "A", 5.0), edge("B", "T", 4.0)],
            "T",
        );
        let paths = enumerate_top_paths(&snap, 3, 10);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].path.len(), 3);
    }

    #[test]
    fn sorts_by_path_rps_descending_and_truncates() {
        let snap = snapshot(
            vec![edge("A", "T", 5.0), edge("B", "T", 50.0), edge("C", "T", 20.0)],
            "T",
        );
        let paths = enumerate_top_paths(&snap, 1, 2);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].path_rps, 50.0);
        assert_eq!(paths[1].path_rps, 20.0);
    }
}

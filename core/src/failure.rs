//! C5 — failure simulator. Composes the snapshot, path enumerator, and
//! reachability analyzer into a full failure-impact report (spec.md §4.4).

use std::collections::HashMap;

use models::{
    AffectedCaller, AffectedDownstream, Confidence, FailureResult, GraphSnapshot, NeighborhoodMeta,
};

use crate::{paths, reachability, recommend};

pub struct FailureSimulationInput<'a> {
    pub snapshot: &'a GraphSnapshot,
    pub max_depth: u8,
    pub max_paths: usize,
}

/// Runs the full failure simulation for an already-built snapshot.
pub fn simulate_failure(input: FailureSimulationInput<'_>) -> FailureResult {
    let snapshot = input.snapshot;
    let target = &snapshot.target_key;

    let affected_callers = aggregate_callers(snapshot);
    let affected_downstream = aggregate_downstream(snapshot);
    let unreachable_services = reachability::unreachable_services(snapshot);
    let critical_paths_to_target =
        paths::enumerate_top_paths(snapshot, input.max_depth, input.max_paths);

    let total_lost_traffic_rps: f64 = affected_callers.iter().map(|c| c.lost_traffic_rps).sum();
    let confidence = Confidence::from_freshness(snapshot.data_freshness.as_ref());

    let explanation = explain(
        target.as_str(),
        affected_callers.len(),
        affected_downstream.len(),
        unreachable_services.len(),
        total_lost_traffic_rps,
    );

    let mut result = FailureResult {
        target: target.clone(),
        neighborhood_meta: NeighborhoodMeta {
            k: input.max_depth,
            node_count: snapshot.node_count(),
            edge_count: snapshot.edge_count(),
        },
        data_freshness: snapshot.data_freshness.clone(),
        confidence,
        explanation,
        affected_callers,
        affected_downstream,
        unreachable_services,
        critical_paths_to_target,
        total_lost_traffic_rps,
        recommendations: Vec::new(),
        trace: None,
    };
    result.recommendations = recommend::recommend_for_failure(&result);
    result
}

/// Groups incoming edges of the target by source, summing rate and taking
/// the max error rate per group, sorted by lost RPS descending.
fn aggregate_callers(snapshot: &GraphSnapshot) -> Vec<AffectedCaller> {
    let target = &snapshot.target_key;
    let mut grouped: HashMap<_, (f64, f64)> = HashMap::new();
    for edge in snapshot.incoming_of(target) {
        if edge.source == *target {
            continue; // no self-loops in outputs
        }
        let entry = grouped.entry(edge.source.clone()).or_insert((0.0, 0.0));
        entry.0 += edge.rate;
        entry.1 = entry.1.max(edge.error_rate);
    }
    let mut callers: Vec<AffectedCaller> = grouped
        .into_iter()
        .map(|(service_id, (lost_traffic_rps, edge_error_rate))| AffectedCaller {
            service_id,
            lost_traffic_rps,
            edge_error_rate,
        })
        .collect();
    callers.sort_by(|a, b| {
        b.lost_traffic_rps
            .partial_cmp(&a.lost_traffic_rps)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.service_id.cmp(&b.service_id))
    });
    callers
}

/// Same grouping over outgoing edges of the target.
fn aggregate_downstream(snapshot: &GraphSnapshot) -> Vec<AffectedDownstream> {
    let target = &snapshot.target_key;
    let mut grouped: HashMap<_, (f64, f64)> = HashMap::new();
    for edge in snapshot.outgoing_of(target) {
        if edge.target == *target {
            continue;
        }
        let entry = grouped.entry(edge.target.clone()).or_insert((0.0, 0.0));
        entry.0 += edge.rate;
        entry.1 = entry.1.max(edge.error_rate);
    }
    let mut downstream: Vec<AffectedDownstream> = grouped
        .into_iter()
        .map(|(service_id, (lost_traffic_rps, edge_error_rate))| AffectedDownstream {
            service_id,
            lost_traffic_rps,
            edge_error_rate,
        })
        .collect();
    downstream.sort_by(|a, b| {
        b.lost_traffic_rps
            .partial_cmp(&a.lost_traffic_rps)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.service_id.cmp(&b.service_id))
    });
    downstream
}

fn explain(target: &str, callers: usize, downstream: usize, unreachable: usize, lost_rps: f64) -> String {
    format!(
        "If {target} fails, {callers} direct caller(s) and {downstream} downstream dependent(s) are \
         affected, {unreachable} service(s) become unreachable, and approximately {lost_rps:.2} rps of \
         direct caller traffic is lost."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{Edge, ServiceId, ServiceNode};
    use std::collections::HashMap as Map;

    fn edge(source: &str, target: &str, rate: f64, err: f64) -> Edge {
        Edge {
            source: ServiceId::canonicalize(source),
            target: ServiceId::canonicalize(target),
            rate,
            error_rate: err,
            p50: None,
            p95: Some(100.0),
            p99: None,
        }
    }

    fn snapshot(edges: Vec<Edge>, target: &str) -> GraphSnapshot {
        let mut nodes = Map::new();
        let mut incoming: Map<ServiceId, Vec<Edge>> = Map::new();
        let mut outgoing: Map<ServiceId, Vec<Edge>> = Map::new();
        for e in &edges {
            for id in [&e.source, &e.target] {
                nodes.entry(id.clone()).or_insert_with(|| ServiceNode {
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
    fn trivial_failure_matches_spec_scenario_1() {
        let snap = snapshot(vec![edge("A", "T", 10.0, 0.0)], "T");
        let result = simulate_failure(FailureSimulationInput {
            snapshot: &snap,
            max_depth: 2,
            max_paths: 10,
        });
        assert_eq!(result.affected_callers.len(), 1);
        assert_eq!(result.affected_callers[0].lost_traffic_rps, 10.0);
        assert_eq!(result.total_lost_traffic_rps, 10.0);
        assert!(result.affected_downstream.is_empty());
        assert!(result.unreachable_services.is_empty());
        assert!(result
            .recommendations
            .iter()
            .any(|r| matches!(
                r.recommendation_type,
                models::RecommendationType::Monitoring | models::RecommendationType::CircuitBreaker
            )));
    }

    #[test]
    fn cascade_unreachable_matches_spec_scenario_2() {
        let snap = snapshot(
            vec![
                edge("A", "T", 5.0, 0.0),
                edge("T", "B", 7.0, 0.0),
                edge("A", "B", 0.1, 0.0),
            ],
            "T",
        );
        let result = simulate_failure(FailureSimulationInput {
            snapshot: &snap,
            max_depth: 2,
            max_paths: 10,
        });
        assert_eq!(result.affected_callers[0].lost_traffic_rps, 5.0);
        assert_eq!(result.affected_downstream[0].lost_traffic_rps, 7.0);
        assert!(result.unreachable_services.is_empty());
        assert_eq!(result.total_lost_traffic_rps, 5.0);
    }

    #[test]
    fn unreachable_cut_matches_spec_scenario_3() {
        let snap = snapshot(vec![edge("A", "T", 5.0, 0.0), edge("T", "B", 7.0, 0.0)], "T");
        let result = simulate_failure(FailureSimulationInput {
            snapshot: &snap,
            max_depth: 2,
            max_paths: 10,
        });
        assert_eq!(result.unreachable_services.len(), 1);
        assert_eq!(result.unreachable_services[0].lost_total_rps, 7.0);
    }

    #[test]
    fn callers_are_sorted_by_lost_rps_descending() {
        let snap = snapshot(
            vec![edge("A", "T", 5.0, 0.0), edge("B", "T", 50.0, 0.0), edge("C", "T", 20.0, 0.0)],
            "T",
        );
        let result = simulate_failure(FailureSimulationInput {
            snapshot: &snap,
            max_depth: 1,
            max_paths: 10,
        });
        let rates: Vec<f64> = result.affected_callers.iter().map(|c| c.lost_traffic_rps).collect();
        assert_eq!(rates, vec![50.0, 20.0, 5.0]);
    }
}

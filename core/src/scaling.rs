//! C6 — scaling simulator. Projects the target's incoming-edge latency
//! after a pod-count change and propagates the impact upstream through
//! weighted means (spec.md §4.5).

use std::collections::{HashMap, VecDeque};

use models::{
    AffectedCallersSummary, CallerPathImpact, Confidence, GraphSnapshot, LatencyEstimate,
    LatencyMetric, NeighborhoodMeta, PathImpact, ScalingDirection, ScalingModel, ScalingModelType,
    ScalingResult, ServiceId,
};

use crate::{paths, recommend};

pub struct ScalingSimulationInput<'a> {
    pub snapshot: &'a GraphSnapshot,
    pub current_pods: u32,
    pub new_pods: u32,
    pub latency_metric: LatencyMetric,
    pub model: ScalingModel,
    pub min_latency_factor: f64,
    pub max_depth: u8,
    pub max_paths: usize,
}

/// Rate-weighted mean of `metric` across `target`'s incoming edges with
/// `rate > 0` and a present latency value. `None` if no such edge exists.
pub fn weighted_mean_incoming_latency(
    snapshot: &GraphSnapshot,
    target: &ServiceId,
    metric: LatencyMetric,
) -> Option<f64> {
    weighted_mean(
        snapshot
            .incoming_of(target)
            .iter()
            .filter(|e| e.rate > 0.0)
            .filter_map(|e| e.latency(metric).map(|lat| (e.rate, lat))),
    )
}

fn weighted_mean(samples: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let mut rate_sum = 0.0;
    let mut weighted_sum = 0.0;
    let mut any = false;
    for (rate, lat) in samples {
        rate_sum += rate;
        weighted_sum += rate * lat;
        any = true;
    }
    if !any || rate_sum <= 0.0 {
        None
    } else {
        Some(weighted_sum / rate_sum)
    }
}

/// Applies the configured parametric model to a baseline latency (§4.5
/// "Projection").
pub fn project_latency(
    baseline: f64,
    current_pods: u32,
    new_pods: u32,
    model: ScalingModel,
    min_latency_factor: f64,
) -> f64 {
    let ratio = new_pods.max(1) as f64 / current_pods.max(1) as f64;
    match model.model_type {
        ScalingModelType::BoundedSqrt => {
            let raw = baseline * (model.alpha + (1.0 - model.alpha) * (1.0 / ratio.sqrt()));
            raw.max(baseline * min_latency_factor)
        }
        ScalingModelType::Linear => baseline * (1.0 / ratio),
    }
}

/// Propagates the target's adjusted latency one hop upstream at a time
/// through weighted means, fanning out along incoming edges so a node
/// further from the target sees the already-adjusted value of its
/// immediate downstream neighbor rather than the neighbor's raw latency.
/// Grounded directly in spec.md §4.5 "Propagation"; generalized to more
/// than one hop so it matches §1's "projects ... upstream through weighted
/// means" rather than stopping at direct callers.
pub fn propagate_latencies(
    snapshot: &GraphSnapshot,
    metric: LatencyMetric,
    baseline: Option<f64>,
    projected: Option<f64>,
) -> HashMap<ServiceId, (Option<f64>, Option<f64>)> {
    let target = snapshot.target_key.clone();
    let mut adjusted: HashMap<ServiceId, (Option<f64>, Option<f64>)> = HashMap::new();
    adjusted.insert(target.clone(), (baseline, projected));

    let mut queue: VecDeque<ServiceId> = VecDeque::new();
    let mut enqueued: std::collections::HashSet<ServiceId> = std::collections::HashSet::new();
    for edge in snapshot.incoming_of(&target) {
        if enqueued.insert(edge.source.clone()) {
            queue.push_back(edge.source.clone());
        }
    }

    while let Some(node) = queue.pop_front() {
        if adjusted.contains_key(&node) {
            continue;
        }
        let outgoing = snapshot.outgoing_of(&node);
        if outgoing.is_empty() {
            continue;
        }

        let mut before_rate = 0.0;
        let mut before_weighted = 0.0;
        let mut before_any = false;
        let mut after_rate = 0.0;
        let mut after_weighted = 0.0;
        let mut after_any = false;

        for edge in outgoing {
            if edge.rate <= 0.0 {
                continue;
            }
            let (before_lat, after_lat) = if let Some((b, a)) = adjusted.get(&edge.target) {
                (*b, *a)
            } else {
                (edge.latency(metric), edge.latency(metric))
            };
            if let Some(b) = before_lat {
                before_rate += edge.rate;
                before_weighted += edge.rate * b;
                before_any = true;
            }
            if let Some(a) = after_lat {
                after_rate += edge.rate;
                after_weighted += edge.rate * a;
                after_any = true;
            }
        }

        let before = (before_any && before_rate > 0.0).then(|| before_weighted / before_rate);
        let after = (after_any && after_rate > 0.0).then(|| after_weighted / after_rate);
        adjusted.insert(node.clone(), (before, after));

        for edge in snapshot.incoming_of(&node) {
            if enqueued.insert(edge.source.clone()) {
                queue.push_back(edge.source.clone());
            }
        }
    }

    adjusted
}

/// Sums literal edge latencies along a path, substituting the adjusted
/// target value as the terminal component (§4.5 "End-to-end per caller").
fn path_end_to_end(
    path: &PathImpact,
    snapshot: &GraphSnapshot,
    metric: LatencyMetric,
    baseline: Option<f64>,
    projected: Option<f64>,
) -> PathImpact {
    let nodes = &path.path;
    if nodes.len() < 2 {
        return path.clone();
    }

    let mut before_sum = 0.0;
    let mut after_sum = 0.0;
    let mut incomplete = false;

    // every edge except the terminal one (into the target) contributes its
    // own literal latency, identically to both before/after
    for window in nodes[..nodes.len() - 1].windows(2) {
        let (from, to) = (&window[0], &window[1]);
        let lat = snapshot
            .outgoing_of(from)
            .iter()
            .find(|e| &e.target == to)
            .and_then(|e| e.latency(metric));
        match lat {
            Some(v) => {
                before_sum += v;
                after_sum += v;
            }
            None => incomplete = true,
        }
    }

    match baseline {
        Some(b) => before_sum += b,
        None => incomplete = true,
    }
    match projected {
        Some(p) => after_sum += p,
        None => incomplete = true,
    }

    if incomplete {
        PathImpact {
            path: nodes.clone(),
            path_rps: path.path_rps,
            before_ms: None,
            after_ms: None,
            delta_ms: None,
            incomplete_data: Some(true),
        }
    } else {
        PathImpact {
            path: nodes.clone(),
            path_rps: path.path_rps,
            before_ms: Some(before_sum),
            after_ms: Some(after_sum),
            delta_ms: Some(after_sum - before_sum),
            incomplete_data: Some(false),
        }
    }
}

pub fn simulate_scaling(input: ScalingSimulationInput<'_>) -> ScalingResult {
    let snapshot = input.snapshot;
    let target = snapshot.target_key.clone();

    let baseline = weighted_mean_incoming_latency(snapshot, &target, input.latency_metric);
    let projected = baseline.map(|b| {
        project_latency(
            b,
            input.current_pods,
            input.new_pods,
            input.model,
            input.min_latency_factor,
        )
    });
    let delta = match (baseline, projected) {
        (Some(b), Some(p)) => Some(p - b),
        _ => None,
    };

    let top_paths = paths::enumerate_top_paths(snapshot, input.max_depth, input.max_paths);
    let affected_paths: Vec<PathImpact> = top_paths
        .iter()
        .map(|p| path_end_to_end(p, snapshot, input.latency_metric, baseline, projected))
        .collect();

    let mut best_per_caller: HashMap<ServiceId, PathImpact> = HashMap::new();
    for path in &affected_paths {
        if let Some(start) = path.path.first() {
            let better = best_per_caller
                .get(start)
                .map(|existing| path.path_rps > existing.path_rps)
                .unwrap_or(true);
            if better {
                best_per_caller.insert(start.clone(), path.clone());
            }
        }
    }
    let mut caller_ids: Vec<ServiceId> = best_per_caller.keys().cloned().collect();
    caller_ids.sort();
    let items: Vec<CallerPathImpact> = caller_ids
        .into_iter()
        .map(|id| CallerPathImpact {
            service_id: id.clone(),
            via_path: best_per_caller.remove(&id).expect("just inserted"),
        })
        .collect();

    let incomplete_count = affected_paths
        .iter()
        .filter(|p| p.incomplete_data == Some(true))
        .count();
    let mut warnings = Vec::new();
    if incomplete_count > 0 {
        warnings.push(format!(
            "{incomplete_count} of {} affected paths have incomplete latency data",
            affected_paths.len()
        ));
    }

    let scaling_direction = ScalingDirection::from_pod_counts(input.current_pods, input.new_pods);
    let confidence = Confidence::from_freshness(snapshot.data_freshness.as_ref());

    let explanation = format!(
        "Scaling {} from {} to {} pod(s) ({scaling_direction:?}) moves its {:?} latency baseline \
         of {} to an estimated {}.",
        target,
        input.current_pods,
        input.new_pods,
        input.latency_metric,
        baseline.map(|b| format!("{b:.2}ms")).unwrap_or_else(|| "n/a".to_string()),
        projected.map(|p| format!("{p:.2}ms")).unwrap_or_else(|| "n/a".to_string()),
    );

    let mut result = ScalingResult {
        target: target.clone(),
        neighborhood_meta: NeighborhoodMeta {
            k: input.max_depth,
            node_count: snapshot.node_count(),
            edge_count: snapshot.edge_count(),
        },
        data_freshness: snapshot.data_freshness.clone(),
        confidence,
        latency_metric: input.latency_metric,
        scaling_model: input.model,
        current_pods: input.current_pods,
        new_pods: input.new_pods,
        scaling_direction,
        latency_estimate: LatencyEstimate {
            baseline_ms: baseline,
            projected_ms: projected,
            delta_ms: delta,
        },
        affected_callers: AffectedCallersSummary {
            description: "Direct and transitive callers, identified by their highest-throughput \
                          path to the target"
                .to_string(),
            items,
        },
        affected_paths,
        warnings,
        explanation,
        recommendations: Vec::new(),
        trace: None,
    };
    result.recommendations = recommend::recommend_for_scaling(&result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{Edge, ScalingModel, ScalingModelType, ServiceNode};
    use std::collections::HashMap as Map;

    fn snapshot_single_edge(rate: f64, p95: f64) -> GraphSnapshot {
        let edge = Edge {
            source: ServiceId::canonicalize("A"),
            target: ServiceId::canonicalize("T"),
            rate,
            error_rate: 0.0,
            p50: None,
            p95: Some(p95),
            p99: None,
        };
        let mut nodes = Map::new();
        let mut incoming: Map<ServiceId, Vec<Edge>> = Map::new();
        let mut outgoing: Map<ServiceId, Vec<Edge>> = Map::new();
        for id in [&edge.source, &edge.target] {
            nodes.entry(id.clone()).or_insert_with(|| ServiceNode {
                service_id: id.clone(),
                name: id.name().to_string(),
                namespace: id.namespace().to_string(),
            });
        }
        outgoing.entry(edge.source.clone()).or_default().push(edge.clone());
        incoming.entry(edge.target.clone()).or_default().push(edge.clone());
        GraphSnapshot {
            nodes,
            edges: vec![edge],
            incoming,
            outgoing,
            target_key: ServiceId::canonicalize("T"),
            data_freshness: None,
        }
    }

    #[test]
    fn bounded_sqrt_matches_spec_scenario_4() {
        let snap = snapshot_single_edge(10.0, 200.0);
        let baseline = weighted_mean_incoming_latency(&snap, &snap.target_key, LatencyMetric::P95);
        assert_eq!(baseline, Some(200.0));
        let model = ScalingModel { model_type: ScalingModelType::BoundedSqrt, alpha: 0.5 };
        let projected = project_latency(200.0, 1, 2, model, 0.6);
        assert!((projected - 170.71).abs() < 0.01);
    }

    #[test]
    fn bounded_sqrt_never_drops_below_floor() {
        let model = ScalingModel { model_type: ScalingModelType::BoundedSqrt, alpha: 0.0 };
        let projected = project_latency(100.0, 1, 100, model, 0.5);
        assert!(projected >= 100.0 * 0.5 - 1e-9);
    }

    #[test]
    fn linear_halving_pods_matches_spec_scenario_5() {
        let model = ScalingModel { model_type: ScalingModelType::Linear, alpha: 0.0 };
        let projected = project_latency(50.0, 4, 2, model, 0.0);
        assert_eq!(projected, 100.0);
    }

    #[test]
    fn scaling_direction_is_consistent_with_pod_counts() {
        let snap = snapshot_single_edge(10.0, 200.0);
        let result = simulate_scaling(ScalingSimulationInput {
            snapshot: &snap,
            current_pods: 2,
            new_pods: 4,
            latency_metric: LatencyMetric::P95,
            model: ScalingModel::default(),
            min_latency_factor: 0.3,
            max_depth: 2,
            max_paths: 10,
        });
        assert_eq!(result.scaling_direction, ScalingDirection::Up);
        assert!(result.latency_estimate.delta_ms.unwrap() < 0.0);
    }

    #[test]
    fn missing_baseline_yields_null_latency_fields() {
        let edge = Edge {
            source: ServiceId::canonicalize("A"),
            target: ServiceId::canonicalize("T"),
            rate: 0.0,
            error_rate: 0.0,
            p50: None,
            p95: None,
            p99: None,
        };
        let mut nodes = Map::new();
        for id in [&edge.source, &edge.target] {
            nodes.entry(id.clone()).or_insert_with(|| ServiceNode {
                service_id: id.clone(),
                name: id.name().to_string(),
                namespace: id.namespace().to_string(),
            });
        }
        let mut incoming: Map<ServiceId, Vec<Edge>> = Map::new();
        incoming.entry(edge.target.clone()).or_default().push(edge.clone());
        let snap = GraphSnapshot {
            nodes,
            edges: vec![edge],
            incoming,
            outgoing: Map::new(),
            target_key: ServiceId::canonicalize("T"),
            data_freshness: None,
        };
        let result = simulate_scaling(ScalingSimulationInput {
            snapshot: &snap,
            current_pods: 1,
            new_pods: 2,
            latency_metric: LatencyMetric::P95,
            model: ScalingModel::default(),
            min_latency_factor: 0.3,
            max_depth: 2,
            max_paths: 10,
        });
        assert_eq!(result.latency_estimate.baseline_ms, None);
        assert_eq!(result.latency_estimate.projected_ms, None);
    }
}

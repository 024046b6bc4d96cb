//! C7 — recommendation generator. A pure function from an already-computed
//! failure/scaling result to a prioritized action list (spec.md §4.6). Never
//! reads the topology directly.

use models::{
    Confidence, FailureResult, Priority, Recommendation, RecommendationType, ScalingDirection,
    ScalingResult, ServiceId,
};

const CIRCUIT_BREAKER_TOTAL_THRESHOLD_RPS: f64 = 100.0;
const CIRCUIT_BREAKER_PER_CALLER_THRESHOLD_RPS: f64 = 50.0;
const MIN_CALLERS_FOR_REDUNDANCY: usize = 3;
const MIN_UNREACHABLE_FOR_TOPOLOGY_REVIEW: usize = 2;
const MIN_UNREACHABLE_LOSS_FOR_TOPOLOGY_REVIEW_RPS: f64 = 10.0;
const MIN_DOWNSTREAM_LOSS_FOR_GRACEFUL_DEGRADATION_RPS: f64 = 10.0;
const COST_EFFICIENCY_BENEFIT_THRESHOLD_MS: f64 = 10.0;

pub fn recommend_for_failure(result: &FailureResult) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    let target = &result.target;

    if result.confidence == Confidence::Low {
        recs.push(data_quality(target));
    }

    if result.total_lost_traffic_rps >= CIRCUIT_BREAKER_TOTAL_THRESHOLD_RPS {
        recs.push(Recommendation {
            recommendation_type: RecommendationType::CircuitBreaker,
            priority: Priority::Critical,
            target: target.clone(),
            reason: format!(
                "total lost traffic on failure is {:.2} rps, at or above the {:.0} rps threshold",
                result.total_lost_traffic_rps, CIRCUIT_BREAKER_TOTAL_THRESHOLD_RPS
            ),
            action: format!("add a circuit breaker in front of {target}"),
        });
    }

    if result.affected_callers.len() >= MIN_CALLERS_FOR_REDUNDANCY {
        recs.push(Recommendation {
            recommendation_type: RecommendationType::Redundancy,
            priority: Priority::High,
            target: target.clone(),
            reason: format!(
                "{} distinct direct callers depend on {target}",
                result.affected_callers.len()
            ),
            action: format!("introduce a redundant replica or fallback path for {target}"),
        });
    }

    for caller in &result.affected_callers {
        if caller.lost_traffic_rps >= CIRCUIT_BREAKER_PER_CALLER_THRESHOLD_RPS {
            recs.push(Recommendation {
                recommendation_type: RecommendationType::CircuitBreaker,
                priority: Priority::High,
                target: caller.service_id.clone(),
                reason: format!(
                    "{} loses {:.2} rps if {target} fails",
                    caller.service_id, caller.lost_traffic_rps
                ),
                action: format!("add a circuit breaker around calls from {} to {target}", caller.service_id),
            });
        }
    }

    let unreachable_loss: f64 = result.unreachable_services.iter().map(|u| u.lost_total_rps).sum();
    if result.unreachable_services.len() >= MIN_UNREACHABLE_FOR_TOPOLOGY_REVIEW
        || unreachable_loss >= MIN_UNREACHABLE_LOSS_FOR_TOPOLOGY_REVIEW_RPS
    {
        recs.push(Recommendation {
            recommendation_type: RecommendationType::TopologyReview,
            priority: Priority::Medium,
            target: target.clone(),
            reason: format!(
                "{} service(s) become unreachable ({:.2} rps total) if {target} fails",
                result.unreachable_services.len(),
                unreachable_loss
            ),
            action: "review the topology for a single point of failure upstream of these services".to_string(),
        });
    }

    let downstream_loss: f64 = result.affected_downstream.iter().map(|d| d.lost_traffic_rps).sum();
    if downstream_loss >= MIN_DOWNSTREAM_LOSS_FOR_GRACEFUL_DEGRADATION_RPS {
        recs.push(Recommendation {
            recommendation_type: RecommendationType::GracefulDegradation,
            priority: Priority::Medium,
            target: target.clone(),
            reason: format!(
                "downstream dependents of {target} would lose {:.2} rps of traffic",
                downstream_loss
            ),
            action: format!("implement graceful degradation for callers downstream of {target}"),
        });
    }

    finalize(recs, target)
}

pub fn recommend_for_scaling(result: &ScalingResult) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    let target = &result.target;

    if result.confidence == Confidence::Low {
        recs.push(data_quality(target));
    }

    if result.scaling_direction == ScalingDirection::Up {
        let benefit = result.latency_estimate.delta_ms.map(|d| -d);
        let insufficient_benefit = match benefit {
            Some(b) => b < COST_EFFICIENCY_BENEFIT_THRESHOLD_MS,
            None => true,
        };
        if insufficient_benefit {
            recs.push(Recommendation {
                recommendation_type: RecommendationType::CostEfficiency,
                priority: Priority::Medium,
                target: target.clone(),
                reason: match benefit {
                    Some(b) => format!(
                        "scaling up projects only {b:.2}ms of latency benefit, below the \
                         {COST_EFFICIENCY_BENEFIT_THRESHOLD_MS:.0}ms threshold"
                    ),
                    None => "latency benefit of scaling up could not be computed from available data".to_string(),
                },
                action: format!("reconsider whether scaling {target} up is cost-effective"),
            });
        }
    }

    finalize(recs, target)
}

fn data_quality(target: &ServiceId) -> Recommendation {
    Recommendation {
        recommendation_type: RecommendationType::DataQuality,
        priority: Priority::High,
        target: target.clone(),
        reason: "the upstream graph provider reports stale topology/metrics data".to_string(),
        action: "refresh the graph provider's data before acting on this result".to_string(),
    }
}

/// When nothing else fired (or only the data-quality record did), fall back
/// to a single low-priority monitoring recommendation (§4.6 "otherwise").
fn finalize(mut recs: Vec<Recommendation>, target: &ServiceId) -> Vec<Recommendation> {
    let only_data_quality = recs.len() == 1
        && recs[0].recommendation_type == RecommendationType::DataQuality;
    if recs.is_empty() || only_data_quality {
        recs.push(Recommendation {
            recommendation_type: RecommendationType::Monitoring,
            priority: Priority::Low,
            target: target.clone(),
            reason: "no threshold-triggered risk was detected".to_string(),
            action: format!("continue routine monitoring of {target}"),
        });
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{
        AffectedCaller, AffectedCallersSummary, DataFreshness, LatencyEstimate, LatencyMetric,
        NeighborhoodMeta, ScalingModel,
    };

    fn base_failure() -> FailureResult {
        FailureResult {
            target: ServiceId::canonicalize("checkout"),
            neighborhood_meta: NeighborhoodMeta { k: 2, node_count: 2, edge_count: 1 },
            data_freshness: None,
            confidence: Confidence::High,
            explanation: String::new(),
            affected_callers: vec![],
            affected_downstream: vec![],
            unreachable_services: vec![],
            critical_paths_to_target: vec![],
            total_lost_traffic_rps: 0.0,
            recommendations: vec![],
            trace: None,
        }
    }

    #[test]
    fn monitoring_is_the_fallback_when_nothing_else_triggers() {
        let result = base_failure();
        let recs = recommend_for_failure(&result);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].recommendation_type, RecommendationType::Monitoring);
    }

    #[test]
    fn circuit_breaker_triggers_above_total_threshold() {
        let mut result = base_failure();
        result.total_lost_traffic_rps = 150.0;
        let recs = recommend_for_failure(&result);
        assert!(recs.iter().any(|r| r.recommendation_type == RecommendationType::CircuitBreaker
            && r.priority == Priority::Critical));
    }

    #[test]
    fn stale_data_emits_high_priority_data_quality() {
        let mut result = base_failure();
        result.confidence = Confidence::Low;
        result.data_freshness = Some(DataFreshness {
            source: "graph-provider".into(),
            stale: true,
            last_updated_seconds_ago: Some(600),
            window_minutes: Some(5),
        });
        let recs = recommend_for_failure(&result);
        assert!(recs
            .iter()
            .any(|r| r.recommendation_type == RecommendationType::DataQuality && r.priority == Priority::High));
    }

    #[test]
    fn redundancy_triggers_at_three_callers() {
        let mut result = base_failure();
        result.affected_callers = vec![
            AffectedCaller { service_id: ServiceId::canonicalize("a"), lost_traffic_rps: 1.0, edge_error_rate: 0.0 },
            AffectedCaller { service_id: ServiceId::canonicalize("b"), lost_traffic_rps: 1.0, edge_error_rate: 0.0 },
            AffectedCaller { service_id: ServiceId::canonicalize("c"), lost_traffic_rps: 1.0, edge_error_rate: 0.0 },
        ];
        let recs = recommend_for_failure(&result);
        assert!(recs.iter().any(|r| r.recommendation_type == RecommendationType::Redundancy));
    }

    fn base_scaling() -> ScalingResult {
        ScalingResult {
            target: ServiceId::canonicalize("checkout"),
            neighborhood_meta: NeighborhoodMeta { k: 2, node_count: 2, edge_count: 1 },
            data_freshness: None,
            confidence: Confidence::High,
            latency_metric: LatencyMetric::P95,
            scaling_model: ScalingModel::default(),
            current_pods: 1,
            new_pods: 2,
            scaling_direction: ScalingDirection::Up,
            latency_estimate: LatencyEstimate { baseline_ms: Some(100.0), projected_ms: Some(95.0), delta_ms: Some(-5.0) },
            affected_callers: AffectedCallersSummary { description: String::new(), items: vec![] },
            affected_paths: vec![],
            warnings: vec![],
            explanation: String::new(),
            recommendations: vec![],
            trace: None,
        }
    }

    #[test]
    fn cost_efficiency_triggers_when_benefit_is_small() {
        let result = base_scaling();
        let recs = recommend_for_scaling(&result);
        assert!(recs.iter().any(|r| r.recommendation_type == RecommendationType::CostEfficiency));
    }

    #[test]
    fn no_cost_efficiency_when_benefit_is_large() {
        let mut result = base_scaling();
        result.latency_estimate.delta_ms = Some(-50.0);
        let recs = recommend_for_scaling(&result);
        assert!(!recs.iter().any(|r| r.recommendation_type == RecommendationType::CostEfficiency));
    }
}

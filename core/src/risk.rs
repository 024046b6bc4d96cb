//! C8 — risk ranker. Consumes a centrality feed and assigns a risk level
//! from rank percentile (spec.md §4.7).
//!
//! Open question carried from spec.md §9: percentile is computed against
//! the returned `limit` (rank-within-top-N), not the full service
//! population, because that is what the centrality feed's contract (§4.1,
//! §6) actually exposes to the core — it has no way to learn the total
//! population size without a second call the spec doesn't ask for. See
//! DESIGN.md.

use dto::ProviderCentralityPayload;
use models::{Confidence, DataFreshness, RiskLevel, RiskResult, RiskService, ServiceId};

pub fn rank_risk(
    payload: &ProviderCentralityPayload,
    data_freshness: Option<&DataFreshness>,
) -> RiskResult {
    let total = payload.top.len();
    let mut services = Vec::with_capacity(total);

    for (rank, entry) in payload.top.iter().enumerate() {
        let percentile = if total > 0 { rank as f64 / total as f64 } else { 0.0 };
        let risk_level = if entry.value > 0.0 && percentile < 0.2 {
            RiskLevel::High
        } else if entry.value > 0.0 && percentile < 0.5 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        let service_id = ServiceId::canonicalize(&entry.service);
        services.push(RiskService {
            explanation: explain(service_id.name(), &payload.metric, entry.value, risk_level),
            service_id: service_id.clone(),
            name: service_id.name().to_string(),
            namespace: service_id.namespace().to_string(),
            centrality_score: entry.value,
            risk_level,
        });
    }

    RiskResult {
        metric: payload.metric.clone(),
        confidence: Confidence::from_freshness(data_freshness),
        services,
        trace: None,
    }
}

fn explain(name: &str, metric_label: &str, value: f64, risk_level: RiskLevel) -> String {
    format!(
        "{name} ranks {risk_level:?} risk on {metric_label} centrality (score {value:.4})"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dto::ProviderCentralityEntry;

    fn payload(entries: Vec<(&str, f64)>) -> ProviderCentralityPayload {
        ProviderCentralityPayload {
            metric: "pagerank".to_string(),
            top: entries
                .into_iter()
                .map(|(service, value)| ProviderCentralityEntry { service: service.to_string(), value })
                .collect(),
        }
    }

    #[test]
    fn matches_spec_scenario_6() {
        let payload = payload(vec![
            ("S1", 0.9),
            ("S2", 0.4),
            ("S3", 0.1),
            ("S4", 0.0),
            ("S5", 0.0),
        ]);
        let result = rank_risk(&payload, None);
        let levels: Vec<RiskLevel> = result.services.iter().map(|s| s.risk_level).collect();
        assert_eq!(
            levels,
            vec![RiskLevel::High, RiskLevel::Medium, RiskLevel::Low, RiskLevel::Low, RiskLevel::Low]
        );
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn zero_value_is_always_low_risk_regardless_of_rank() {
        let payload = payload(vec![("S1", 0.0)]);
        let result = rank_risk(&payload, None);
        assert_eq!(result.services[0].risk_level, RiskLevel::Low);
    }
}

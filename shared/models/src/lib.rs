//! Canonical domain types shared between the simulation core and the HTTP
//! surface. Plain serde structs only — no simulation logic lives here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// `namespace:name`, canonicalized once at the snapshot boundary and used as
/// the key for every map in a [`GraphSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(pub String);

impl ServiceId {
    pub const DEFAULT_NAMESPACE: &'static str = "default";

    /// Canonicalizes a raw `name` or `namespace:name` string. A bare name is
    /// treated as living in `default`.
    pub fn canonicalize(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() => {
                ServiceId(format!("{ns}:{name}"))
            }
            _ => ServiceId(format!("{}:{}", Self::DEFAULT_NAMESPACE, raw)),
        }
    }

    pub fn from_parts(namespace: Option<&str>, name: &str) -> Self {
        let ns = namespace
            .filter(|n| !n.is_empty())
            .unwrap_or(Self::DEFAULT_NAMESPACE);
        ServiceId(format!("{ns}:{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn namespace(&self) -> &str {
        self.0.split_once(':').map(|(ns, _)| ns).unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.0.split_once(':').map(|(_, n)| n).unwrap_or(&self.0)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in a request-local snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNode {
    pub service_id: ServiceId,
    pub name: String,
    pub namespace: String,
}

/// A directed edge between two nodes in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: ServiceId,
    pub target: ServiceId,
    pub rate: f64,
    pub error_rate: f64,
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

impl Edge {
    pub fn latency(&self, metric: LatencyMetric) -> Option<f64> {
        match metric {
            LatencyMetric::P50 => self.p50,
            LatencyMetric::P95 => self.p95,
            LatencyMetric::P99 => self.p99,
        }
    }
}

/// Freshness of the upstream graph-provider data a snapshot was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFreshness {
    pub source: String,
    pub stale: bool,
    pub last_updated_seconds_ago: Option<u64>,
    pub window_minutes: Option<u32>,
}

/// Derived from [`DataFreshness::stale`]; never computed any other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

impl Confidence {
    pub fn from_freshness(freshness: Option<&DataFreshness>) -> Self {
        match freshness {
            Some(f) if f.stale => Confidence::Low,
            _ => Confidence::High,
        }
    }
}

/// An immutable, request-scoped view of a k-hop subgraph of the topology.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    pub nodes: HashMap<ServiceId, ServiceNode>,
    /// Deterministic order, as produced by the builder.
    pub edges: Vec<Edge>,
    pub incoming: HashMap<ServiceId, Vec<Edge>>,
    pub outgoing: HashMap<ServiceId, Vec<Edge>>,
    pub target_key: ServiceId,
    pub data_freshness: Option<DataFreshness>,
}

impl GraphSnapshot {
    pub fn incoming_of(&self, id: &ServiceId) -> &[Edge] {
        self.incoming.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn outgoing_of(&self, id: &ServiceId) -> &[Edge] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: &ServiceId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

/// Small, response-embedded summary of the neighborhood a simulation ran
/// against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodMeta {
    pub k: u8,
    pub node_count: usize,
    pub edge_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyMetric {
    P50,
    P95,
    P99,
}

impl Default for LatencyMetric {
    fn default() -> Self {
        LatencyMetric::P95
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingModelType {
    BoundedSqrt,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingModel {
    #[serde(rename = "type")]
    pub model_type: ScalingModelType,
    pub alpha: f64,
}

impl Default for ScalingModel {
    fn default() -> Self {
        ScalingModel {
            model_type: ScalingModelType::BoundedSqrt,
            alpha: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingDirection {
    Up,
    Down,
    None,
}

impl ScalingDirection {
    pub fn from_pod_counts(current: u32, new: u32) -> Self {
        match new.cmp(&current) {
            std::cmp::Ordering::Greater => ScalingDirection::Up,
            std::cmp::Ordering::Less => ScalingDirection::Down,
            std::cmp::Ordering::Equal => ScalingDirection::None,
        }
    }
}

/// A caller→target path found by the path enumerator (§4.3), also reused as
/// the "critical path" and "affected path" shapes (§3) which add optional
/// before/after latency fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathImpact {
    pub path: Vec<ServiceId>,
    pub path_rps: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incomplete_data: Option<bool>,
}

impl PathImpact {
    pub fn bare(path: Vec<ServiceId>, path_rps: f64) -> Self {
        PathImpact {
            path,
            path_rps,
            before_ms: None,
            after_ms: None,
            delta_ms: None,
            incomplete_data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedCaller {
    pub service_id: ServiceId,
    pub lost_traffic_rps: f64,
    pub edge_error_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedDownstream {
    pub service_id: ServiceId,
    pub lost_traffic_rps: f64,
    pub edge_error_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreachableService {
    pub service_id: ServiceId,
    pub lost_from_target_rps: f64,
    pub lost_from_reachable_cuts_rps: f64,
    pub lost_total_rps: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendationType {
    DataQuality,
    CircuitBreaker,
    Redundancy,
    TopologyReview,
    GracefulDegradation,
    Monitoring,
    CostEfficiency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub recommendation_type: RecommendationType,
    pub priority: Priority,
    pub target: ServiceId,
    pub reason: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResult {
    pub target: ServiceId,
    pub neighborhood_meta: NeighborhoodMeta,
    pub data_freshness: Option<DataFreshness>,
    pub confidence: Confidence,
    pub explanation: String,
    pub affected_callers: Vec<AffectedCaller>,
    pub affected_downstream: Vec<AffectedDownstream>,
    pub unreachable_services: Vec<UnreachableService>,
    pub critical_paths_to_target: Vec<PathImpact>,
    pub total_lost_traffic_rps: f64,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<PipelineTrace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyEstimate {
    pub baseline_ms: Option<f64>,
    pub projected_ms: Option<f64>,
    pub delta_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerPathImpact {
    pub service_id: ServiceId,
    pub via_path: PathImpact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedCallersSummary {
    pub description: String,
    pub items: Vec<CallerPathImpact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingResult {
    pub target: ServiceId,
    pub neighborhood_meta: NeighborhoodMeta,
    pub data_freshness: Option<DataFreshness>,
    pub confidence: Confidence,
    pub latency_metric: LatencyMetric,
    pub scaling_model: ScalingModel,
    pub current_pods: u32,
    pub new_pods: u32,
    pub scaling_direction: ScalingDirection,
    pub latency_estimate: LatencyEstimate,
    pub affected_callers: AffectedCallersSummary,
    pub affected_paths: Vec<PathImpact>,
    pub warnings: Vec<String>,
    pub explanation: String,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<PipelineTrace>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskService {
    pub service_id: ServiceId,
    pub name: String,
    pub namespace: String,
    pub centrality_score: f64,
    pub risk_level: RiskLevel,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskResult {
    pub metric: String,
    pub confidence: Confidence,
    pub services: Vec<RiskService>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<PipelineTrace>,
}

/// Per-stage timing and summary, attached to a response only when tracing
/// was requested for that request (§4.8).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTrace {
    pub stages: Vec<StageTrace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTrace {
    pub name: String,
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_bare_name() {
        assert_eq!(ServiceId::canonicalize("checkout").as_str(), "default:checkout");
    }

    #[test]
    fn canonicalizes_namespaced_name() {
        assert_eq!(ServiceId::canonicalize("billing:invoicer").as_str(), "billing:invoicer");
    }

    #[test]
    fn empty_namespace_segment_falls_back_to_default() {
        assert_eq!(ServiceId::canonicalize(":invoicer").as_str(), "default::invoicer");
    }

    #[test]
    fn confidence_is_low_only_when_stale() {
        let fresh = DataFreshness {
            source: "graph-provider".into(),
            stale: false,
            last_updated_seconds_ago: Some(5),
            window_minutes: Some(10),
        };
        assert_eq!(Confidence::from_freshness(Some(&fresh)), Confidence::High);
        let stale = DataFreshness { stale: true, ..fresh };
        assert_eq!(Confidence::from_freshness(Some(&stale)), Confidence::Low);
        assert_eq!(Confidence::from_freshness(None), Confidence::High);
    }

    #[test]
    fn scaling_direction_from_pod_counts() {
        assert_eq!(ScalingDirection::from_pod_counts(2, 4), ScalingDirection::Up);
        assert_eq!(ScalingDirection::from_pod_counts(4, 2), ScalingDirection::Down);
        assert_eq!(ScalingDirection::from_pod_counts(3, 3), ScalingDirection::None);
    }
}

//! Wire-level request/response shapes: the HTTP surface's request bodies and
//! the upstream graph-provider's JSON payloads. Kept separate from
//! `models` so a provider schema change never forces a core domain-type
//! change and vice versa.

use models::{LatencyMetric, ScalingModel};
use serde::{Deserialize, Serialize};

/// A service can be addressed by its already-canonical id, or by a
/// `(name, namespace)` pair that the handler canonicalizes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRef {
    pub service_id: Option<String>,
    pub name: Option<String>,
    pub namespace: Option<String>,
}

impl ServiceRef {
    /// Resolves to a raw (uncanonicalized) identifier string, preferring an
    /// explicit `serviceId` over a `(name, namespace)` pair.
    pub fn raw_identifier(&self) -> Option<String> {
        if let Some(id) = &self.service_id {
            return Some(id.clone());
        }
        self.name.as_ref().map(|name| match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{ns}:{name}"),
            _ => name.clone(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateFailureRequest {
    #[serde(flatten)]
    pub service: ServiceRef,
    pub max_depth: Option<u8>,
    #[serde(default)]
    pub trace: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateScaleRequest {
    #[serde(flatten)]
    pub service: ServiceRef,
    pub current_pods: u32,
    pub new_pods: u32,
    pub latency_metric: Option<LatencyMetric>,
    pub model: Option<ScalingModel>,
    pub max_depth: Option<u8>,
    #[serde(default)]
    pub trace: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskTopQuery {
    pub metric: Option<String>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub trace: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

// ---------------------------------------------------------------------
// Graph-provider payload shapes (§6 "Consumed — graph provider").
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealthPayload {
    pub status: String,
    pub last_updated_seconds_ago: Option<u64>,
    pub window_minutes: Option<u32>,
    pub stale: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderServicePayload {
    pub name: String,
    pub namespace: Option<String>,
    pub pod_count: Option<u32>,
    pub availability: Option<f64>,
    pub placement: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderServicesPayload {
    pub services: Vec<ProviderServicePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderNodePayload {
    pub name: String,
    pub namespace: Option<String>,
}

/// Percentile and rate fields arrive from JSON as integers, floats, or are
/// absent entirely; deserialize into `Option<f64>`/`f64` directly and let
/// the snapshot builder coerce non-finite values (NaN/±inf) to the
/// spec-mandated defaults — serde only gets us past "present vs absent".
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEdgePayload {
    pub from: String,
    pub to: String,
    pub rate: f64,
    pub error_rate: f64,
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderNeighborhoodPayload {
    pub center: String,
    pub k: u8,
    pub nodes: Vec<ProviderNodePayload>,
    pub edges: Vec<ProviderEdgePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCentralityEntry {
    pub service: String,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCentralityPayload {
    pub metric: String,
    pub top: Vec<ProviderCentralityEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetricsSnapshotPayload {
    pub timestamp: String,
    pub window: Option<String>,
    #[serde(default)]
    pub services: Vec<serde_json::Value>,
    #[serde(default)]
    pub edges: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_ref_prefers_explicit_id() {
        let r = ServiceRef {
            service_id: Some("billing:invoicer".into()),
            name: Some("ignored".into()),
            namespace: None,
        };
        assert_eq!(r.raw_identifier().as_deref(), Some("billing:invoicer"));
    }

    #[test]
    fn service_ref_builds_from_name_and_namespace() {
        let r = ServiceRef {
            service_id: None,
            name: Some("invoicer".into()),
            namespace: Some("billing".into()),
        };
        assert_eq!(r.raw_identifier().as_deref(), Some("billing:invoicer"));
    }
}

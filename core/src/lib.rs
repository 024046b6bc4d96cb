//! The simulation core (spec.md §2, components C1–C10). No HTTP dependency:
//! `services/api` is the only thing that knows this crate exists inside an
//! axum app. Every public entry point builds a fresh [`models::GraphSnapshot`]
//! per call — there is no cross-request cache (§5 "Shared state: None").

pub mod config;
pub mod error;
pub mod failure;
pub mod paths;
pub mod provider;
pub mod reachability;
pub mod recommend;
pub mod risk;
pub mod scaling;
pub mod sink;
pub mod snapshot;
pub mod trace;

use std::sync::Arc;
use std::time::Duration;

use dto::ProviderNeighborhoodPayload;
use models::{
    DataFreshness, FailureResult, GraphSnapshot, LatencyMetric, RiskResult, ScalingModel,
    ScalingResult, ServiceId,
};

use config::Config;
use error::{CoreError, CoreResult};
use provider::{CentralityMetric, GraphProvider};
use sink::{DecisionRecord, DecisionSink, DecisionType};
use trace::Trace;

/// Request-scoped collaborators injected into every pipeline run. Nothing
/// here is process-wide except the `Arc`-shared provider/sink handles
/// themselves, which are immutable after construction (§9 design note:
/// "explicit request-scoped collaborators").
pub struct Simulator {
    pub config: Config,
    pub provider: Arc<dyn GraphProvider>,
    pub sink: Arc<dyn DecisionSink>,
}

pub struct FailureRequest {
    pub raw_service_identifier: String,
    pub max_depth: Option<u8>,
    pub trace: bool,
    pub correlation_id: String,
}

pub struct ScalingRequest {
    pub raw_service_identifier: String,
    pub current_pods: u32,
    pub new_pods: u32,
    pub latency_metric: Option<LatencyMetric>,
    pub model: Option<ScalingModel>,
    pub max_depth: Option<u8>,
    pub trace: bool,
    pub correlation_id: String,
}

pub struct RiskRequest {
    pub metric: Option<String>,
    pub limit: Option<u32>,
    pub trace: bool,
    pub correlation_id: String,
}

impl Simulator {
    pub fn new(config: Config, provider: Arc<dyn GraphProvider>, sink: Arc<dyn DecisionSink>) -> Self {
        Simulator { config, provider, sink }
    }

    pub async fn simulate_failure(&self, request: FailureRequest) -> CoreResult<FailureResult> {
        let max_depth = validate_max_depth(request.max_depth, self.config.max_traversal_depth)?;
        let deadline = Duration::from_millis(self.config.simulation_timeout_ms);
        let timeout_ms = self.config.simulation_timeout_ms;

        tokio::time::timeout(deadline, self.simulate_failure_inner(request, max_depth))
            .await
            .unwrap_or(Err(CoreError::SimulationTimeout { timeout_ms }))
    }

    async fn simulate_failure_inner(
        &self,
        request: FailureRequest,
        max_depth: u8,
    ) -> CoreResult<FailureResult> {
        let mut trace = trace::new_trace(request.trace);

        let (snapshot, _health) = self
            .build_snapshot_for(&request.raw_service_identifier, max_depth, &request.correlation_id, trace.as_mut())
            .await?;

        let mut result = {
            let mut stage = trace.stage("compute-impact");
            let result = failure::simulate_failure(failure::FailureSimulationInput {
                snapshot: &snapshot,
                max_depth,
                max_paths: self.config.max_paths,
            });
            stage.record_summary(serde_json::json!({
                "affectedCallers": result.affected_callers.len(),
                "affectedDownstream": result.affected_downstream.len(),
                "unreachable": result.unreachable_services.len(),
            }));
            result
        };

        {
            let mut stage = trace.stage("recommendations");
            stage.record_summary(serde_json::json!({ "count": result.recommendations.len() }));
        }

        result.trace = trace.into_pipeline_trace();

        self.log_decision(
            DecisionType::Failure,
            serde_json::json!({ "target": result.target.as_str(), "maxDepth": max_depth }),
            &result,
            &request.correlation_id,
        )
        .await;

        Ok(result)
    }

    pub async fn simulate_scaling(&self, request: ScalingRequest) -> CoreResult<ScalingResult> {
        if request.current_pods == 0 || request.new_pods == 0 {
            return Err(CoreError::InvalidInput("pod counts must be >= 1".to_string()));
        }
        let max_depth = validate_max_depth(request.max_depth, self.config.max_traversal_depth)?;
        let model = request.model.unwrap_or(ScalingModel {
            model_type: self.config.default_scaling_model,
            alpha: self.config.default_alpha,
        });
        if !(0.0..=1.0).contains(&model.alpha) {
            return Err(CoreError::InvalidInput("model.alpha must be within [0,1]".to_string()));
        }
        let latency_metric = request.latency_metric.unwrap_or(self.config.default_latency_metric);

        let deadline = Duration::from_millis(self.config.simulation_timeout_ms);
        let timeout_ms = self.config.simulation_timeout_ms;

        tokio::time::timeout(
            deadline,
            self.simulate_scaling_inner(request, max_depth, model, latency_metric),
        )
        .await
        .unwrap_or(Err(CoreError::SimulationTimeout { timeout_ms }))
    }

    async fn simulate_scaling_inner(
        &self,
        request: ScalingRequest,
        max_depth: u8,
        model: ScalingModel,
        latency_metric: LatencyMetric,
    ) -> CoreResult<ScalingResult> {
        let mut trace = trace::new_trace(request.trace);

        let (snapshot, _health) = self
            .build_snapshot_for(&request.raw_service_identifier, max_depth, &request.correlation_id, trace.as_mut())
            .await?;

        let mut result = {
            let mut stage = trace.stage("compute-impact");
            let result = scaling::simulate_scaling(scaling::ScalingSimulationInput {
                snapshot: &snapshot,
                current_pods: request.current_pods,
                new_pods: request.new_pods,
                latency_metric,
                model,
                min_latency_factor: self.config.min_latency_factor,
                max_depth,
                max_paths: self.config.max_paths,
            });
            stage.record_summary(serde_json::json!({
                "affectedPaths": result.affected_paths.len(),
                "warnings": result.warnings.len(),
            }));
            result
        };

        {
            let mut stage = trace.stage("recommendations");
            stage.record_summary(serde_json::json!({ "count": result.recommendations.len() }));
        }

        result.trace = trace.into_pipeline_trace();

        self.log_decision(
            DecisionType::Scaling,
            serde_json::json!({
                "target": result.target.as_str(),
                "currentPods": request.current_pods,
                "newPods": request.new_pods,
            }),
            &result,
            &request.correlation_id,
        )
        .await;

        Ok(result)
    }

    pub async fn risk_top(&self, request: RiskRequest) -> CoreResult<RiskResult> {
        let metric = request
            .metric
            .as_deref()
            .unwrap_or("pagerank");
        let metric = CentralityMetric::parse(metric)
            .ok_or_else(|| CoreError::InvalidInput(format!("unsupported centrality metric '{metric}'")))?;
        let limit = request.limit.unwrap_or(10).clamp(1, 20);

        let deadline = Duration::from_millis(self.config.simulation_timeout_ms);
        let timeout_ms = self.config.simulation_timeout_ms;
        tokio::time::timeout(deadline, self.risk_top_inner(request, metric, limit))
            .await
            .unwrap_or(Err(CoreError::SimulationTimeout { timeout_ms }))
    }

    async fn risk_top_inner(
        &self,
        request: RiskRequest,
        metric: CentralityMetric,
        limit: u32,
    ) -> CoreResult<RiskResult> {
        let mut trace = trace::new_trace(request.trace);

        let health = {
            let mut stage = trace.stage("staleness-check");
            let health = self.provider.get_health(&request.correlation_id).await?;
            stage.record_summary(serde_json::json!({ "stale": health.stale }));
            health
        };

        let payload = {
            let mut stage = trace.stage("fetch-centrality");
            let payload = self
                .provider
                .get_centrality_top(metric, limit, &request.correlation_id)
                .await?;
            stage.record_summary(serde_json::json!({ "returned": payload.top.len() }));
            payload
        };

        let freshness = freshness_from_health(&health);
        let mut result = risk::rank_risk(&payload, Some(&freshness));
        result.trace = trace.into_pipeline_trace();

        self.log_decision(
            DecisionType::Add,
            serde_json::json!({ "metric": metric.as_str(), "limit": limit }),
            &result,
            &request.correlation_id,
        )
        .await;

        Ok(result)
    }

    async fn build_snapshot_for(
        &self,
        raw_service_identifier: &str,
        max_depth: u8,
        correlation_id: &str,
        trace: &mut dyn Trace,
    ) -> CoreResult<(GraphSnapshot, dto::ProviderHealthPayload)> {
        if raw_service_identifier.trim().is_empty() {
            return Err(CoreError::InvalidInput("service identifier must not be empty".to_string()));
        }

        let health = {
            let mut stage = trace.stage("staleness-check");
            let health = self.provider.get_health(correlation_id).await?;
            stage.record_summary(serde_json::json!({ "stale": health.stale }));
            health
        };

        let canonical = ServiceId::canonicalize(raw_service_identifier);
        let payload: ProviderNeighborhoodPayload = {
            let mut stage = trace.stage("fetch-neighborhood");
            let payload = self
                .provider
                .get_neighborhood(canonical.name(), max_depth, correlation_id)
                .await?;
            stage.record_summary(serde_json::json!({
                "nodes": payload.nodes.len(),
                "edges": payload.edges.len(),
            }));
            payload
        };

        let freshness = freshness_from_health(&health);
        let snapshot = {
            let mut stage = trace.stage("build-snapshot");
            let snapshot = snapshot::build_snapshot(&payload, Some(freshness))?;
            stage.record_summary(serde_json::json!({
                "nodeCount": snapshot.node_count(),
                "edgeCount": snapshot.edge_count(),
            }));
            snapshot
        };

        Ok((snapshot, health))
    }

    async fn log_decision<T: serde::Serialize>(
        &self,
        decision_type: DecisionType,
        scenario: serde_json::Value,
        result: &T,
        correlation_id: &str,
    ) {
        let record = DecisionRecord {
            timestamp: chrono_like_timestamp(),
            decision_type,
            scenario,
            result: serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
            correlation_id: correlation_id.to_string(),
        };
        self.sink.log(record).await;
    }
}

fn validate_max_depth(requested: Option<u8>, configured_max: u8) -> CoreResult<u8> {
    match requested {
        None => Ok(configured_max.min(3)),
        Some(depth) if (1..=3).contains(&depth) => Ok(depth),
        Some(depth) => Err(CoreError::InvalidInput(format!(
            "maxDepth must be between 1 and 3, got {depth}"
        ))),
    }
}

fn freshness_from_health(health: &dto::ProviderHealthPayload) -> DataFreshness {
    DataFreshness {
        source: "graph-provider".to_string(),
        stale: health.stale,
        last_updated_seconds_ago: health.last_updated_seconds_ago,
        window_minutes: health.window_minutes,
    }
}

/// A minimal RFC3339-shaped timestamp without pulling `chrono` into every
/// decision record — the decision sink only needs an opaque, sortable
/// string, and `SystemTime` already gives us that.
fn chrono_like_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{secs}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_max_depth_rejects_out_of_range() {
        assert!(validate_max_depth(Some(4), 3).is_err());
        assert!(validate_max_depth(Some(0), 3).is_err());
        assert_eq!(validate_max_depth(Some(2), 3).unwrap(), 2);
        assert_eq!(validate_max_depth(None, 3).unwrap(), 3);
    }
}

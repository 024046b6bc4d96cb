//! C1 — the graph-provider adapter. Issues the five typed operations named
//! in spec.md §4.1 / §6, decodes responses into the `dto::Provider*Payload`
//! shapes, and turns every non-2xx or malformed response into a
//! [`CoreError`] rather than letting a panic or a stringly-typed error
//! escape. Grounded in the corpus's reqwest-client health-check idiom
//! (`other_examples/33402de1_zleetch-rust-healthcheck`): one `Client` built
//! once, a per-call timeout, structured errors instead of bubbled-up
//! `reqwest::Error`.

use dto::{
    ProviderCentralityPayload, ProviderHealthPayload, ProviderMetricsSnapshotPayload,
    ProviderNeighborhoodPayload, ProviderServicesPayload,
};
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CentralityMetric {
    Pagerank,
    Betweenness,
}

impl CentralityMetric {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pagerank" => Some(CentralityMetric::Pagerank),
            "betweenness" => Some(CentralityMetric::Betweenness),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CentralityMetric::Pagerank => "pagerank",
            CentralityMetric::Betweenness => "betweenness",
        }
    }
}

/// The typed operations the rest of the core consumes. A trait so
/// `services/api` and the simulation stages never depend on `reqwest`
/// directly and tests can swap in a fake.
#[async_trait::async_trait]
pub trait GraphProvider: Send + Sync {
    async fn get_health(&self, correlation_id: &str) -> CoreResult<ProviderHealthPayload>;
    async fn get_services(&self, correlation_id: &str) -> CoreResult<ProviderServicesPayload>;
    /// Same shape as [`GraphProvider::get_services`] but with each entry's
    /// `placement` field populated — the core never interprets it (§9 "add
    /// service placement logic" was deliberately excluded from scope), it's
    /// only ever forwarded to a caller that asks for it explicitly.
    async fn get_services_with_placement(
        &self,
        correlation_id: &str,
    ) -> CoreResult<ProviderServicesPayload>;
    async fn get_neighborhood(
        &self,
        service_name: &str,
        k: u8,
        correlation_id: &str,
    ) -> CoreResult<ProviderNeighborhoodPayload>;
    async fn get_centrality_top(
        &self,
        metric: CentralityMetric,
        limit: u32,
        correlation_id: &str,
    ) -> CoreResult<ProviderCentralityPayload>;
    async fn get_metrics_snapshot(
        &self,
        correlation_id: &str,
    ) -> CoreResult<ProviderMetricsSnapshotPayload>;
}

/// `reqwest`-backed implementation against a real HTTP graph provider.
pub struct HttpGraphProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpGraphProvider {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> Self {
        HttpGraphProvider {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        correlation_id: &str,
    ) -> CoreResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header(CORRELATION_ID_HEADER, correlation_id)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::ProviderUpstreamError {
                status: status.as_u16(),
                message: truncate(&body, 256),
            });
        }

        let bytes = response.bytes().await.map_err(map_transport_error)?;
        serde_json::from_slice::<T>(&bytes)
            .map_err(|err| CoreError::DecodeError(format!("{path}: {err}")))
    }
}

#[async_trait::async_trait]
impl GraphProvider for HttpGraphProvider {
    async fn get_health(&self, correlation_id: &str) -> CoreResult<ProviderHealthPayload> {
        self.get_json("/graph/health", correlation_id).await
    }

    async fn get_services(&self, correlation_id: &str) -> CoreResult<ProviderServicesPayload> {
        self.get_json("/services", correlation_id).await
    }

    async fn get_services_with_placement(
        &self,
        correlation_id: &str,
    ) -> CoreResult<ProviderServicesPayload> {
        self.get_json("/services?withPlacement=true", correlation_id).await
    }

    async fn get_neighborhood(
        &self,
        service_name: &str,
        k: u8,
        correlation_id: &str,
    ) -> CoreResult<ProviderNeighborhoodPayload> {
        if !(1..=3).contains(&k) {
            return Err(CoreError::InvalidInput(format!(
                "neighborhood depth must be 1..=3, got {k}"
            )));
        }
        let path = format!(
            "/services/{}/neighborhood?k={k}",
            urlencoding_path(service_name)
        );
        self.get_json(&path, correlation_id).await
    }

    async fn get_centrality_top(
        &self,
        metric: CentralityMetric,
        limit: u32,
        correlation_id: &str,
    ) -> CoreResult<ProviderCentralityPayload> {
        let limit = limit.clamp(1, 20);
        let path = format!("/centrality/top?metric={}&limit={limit}", metric.as_str());
        self.get_json(&path, correlation_id).await
    }

    async fn get_metrics_snapshot(
        &self,
        correlation_id: &str,
    ) -> CoreResult<ProviderMetricsSnapshotPayload> {
        self.get_json("/metrics/snapshot", correlation_id).await
    }
}

fn map_transport_error(err: reqwest::Error) -> CoreError {
    if err.is_timeout() {
        CoreError::ProviderTimeout {
            timeout_ms: 0, // caller-known timeout is logged separately; kept 0 here, see `services/api` mapping
        }
    } else if err.is_connect() {
        CoreError::ProviderUnavailable(err.to_string())
    } else if let Some(status) = err.status() {
        CoreError::ProviderUpstreamError {
            status: status.as_u16(),
            message: err.to_string(),
        }
    } else {
        CoreError::ProviderUnavailable(err.to_string())
    }
}

fn truncate(input: &str, max: usize) -> String {
    if input.len() <= max {
        input.to_string()
    } else {
        format!("{}…", &input[..max])
    }
}

/// Minimal path-segment escaping; service names are DNS-label-shaped in
/// practice but we don't trust that at the HTTP boundary.
fn urlencoding_path(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Never actually returned to a caller (axum reports the real status), kept
/// so call sites that want an external-facing code can map it.
#[allow(dead_code)]
pub(crate) fn provider_status_hint(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}

//! Environment-driven configuration (§6 "Configuration"). The teacher reads
//! individual `std::env::var` calls with inline defaults in each service's
//! `main()`; we generalize that into one typed struct the core and the HTTP
//! surface both build once at startup.

use models::{LatencyMetric, ScalingModelType};

/// Bug-for-bug equivalent of the teacher's `std::env::var(..).unwrap_or_else`
/// pattern, just centralized instead of copy-pasted per binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider_base_url: String,
    pub provider_timeout_ms: u64,
    pub simulation_timeout_ms: u64,
    pub max_traversal_depth: u8,
    pub default_latency_metric: LatencyMetric,
    pub default_scaling_model: ScalingModelType,
    pub default_alpha: f64,
    pub min_latency_factor: f64,
    pub max_paths: usize,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider_base_url: "http://localhost:9000".to_string(),
            provider_timeout_ms: 2_000,
            simulation_timeout_ms: 5_000,
            max_traversal_depth: 3,
            default_latency_metric: LatencyMetric::P95,
            default_scaling_model: ScalingModelType::BoundedSqrt,
            default_alpha: 0.5,
            min_latency_factor: 0.3,
            max_paths: 10,
            port: 8090,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// [`Config::default`] for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            provider_base_url: env_string("GRAPH_PROVIDER_URL", defaults.provider_base_url)
                .trim_end_matches('/')
                .to_string(),
            provider_timeout_ms: env_parsed("PROVIDER_TIMEOUT_MS", defaults.provider_timeout_ms),
            simulation_timeout_ms: env_parsed(
                "SIMULATION_TIMEOUT_MS",
                defaults.simulation_timeout_ms,
            ),
            max_traversal_depth: env_parsed("MAX_TRAVERSAL_DEPTH", defaults.max_traversal_depth)
                .clamp(1, 3),
            default_latency_metric: env_latency_metric(
                "DEFAULT_LATENCY_METRIC",
                defaults.default_latency_metric,
            ),
            default_scaling_model: env_scaling_model(
                "DEFAULT_SCALING_MODEL",
                defaults.default_scaling_model,
            ),
            default_alpha: env_parsed("DEFAULT_ALPHA", defaults.default_alpha).clamp(0.0, 1.0),
            min_latency_factor: env_parsed("MIN_LATENCY_FACTOR", defaults.min_latency_factor),
            max_paths: env_parsed("MAX_PATHS", defaults.max_paths),
            port: env_parsed("PORT", defaults.port),
        }
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_latency_metric(key: &str, default: LatencyMetric) -> LatencyMetric {
    match std::env::var(key).ok().as_deref() {
        Some("p50") => LatencyMetric::P50,
        Some("p95") => LatencyMetric::P95,
        Some("p99") => LatencyMetric::P99,
        _ => default,
    }
}

fn env_scaling_model(key: &str, default: ScalingModelType) -> ScalingModelType {
    match std::env::var(key).ok().as_deref() {
        Some("bounded_sqrt") => ScalingModelType::BoundedSqrt,
        Some("linear") => ScalingModelType::Linear,
        _ => default,
    }
}

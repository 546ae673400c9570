//! Env var + annotation side-channels for tracing/metrics/logging wiring
//! (spec.md §4.2 "Tracing/metrics").
use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::EnvVar;
use lambda_core::common::ObservabilityConfig;

/// Environment variables injected into the serverless container so the
/// running workload picks up the operator's observability configuration.
pub fn observability_env(cfg: &ObservabilityConfig) -> Vec<EnvVar> {
    let mut env = Vec::new();
    if cfg.tracing.enabled {
        env.push(env_var("OTEL_EXPORTER_OTLP_ENDPOINT", &cfg.tracing.otlp_endpoint));
        env.push(env_var("OTEL_TRACES_SAMPLER_ARG", &cfg.tracing.sample_rate.to_string()));
        env.push(env_var(
            "OTEL_PROPAGATORS",
            match cfg.tracing.propagation {
                lambda_core::common::TracingPropagation::W3c => "tracecontext,baggage",
                lambda_core::common::TracingPropagation::B3 => "b3",
                lambda_core::common::TracingPropagation::Jaeger => "jaeger",
            },
        ));
        for (k, v) in &cfg.tracing.attrs {
            env.push(env_var(&format!("OTEL_RESOURCE_ATTR_{}", normalize_env_key(k)), v));
        }
    }
    if cfg.metrics.enabled {
        env.push(env_var("METRICS_PATH", &cfg.metrics.path));
        env.push(env_var("METRICS_PORT", &cfg.metrics.port.to_string()));
    }
    env.push(env_var("LOG_LEVEL", &cfg.logging.level));
    env.push(env_var(
        "LOG_FORMAT",
        match cfg.logging.format {
            lambda_core::common::LogFormat::Json => "json",
            lambda_core::common::LogFormat::Text => "text",
        },
    ));
    if cfg.logfire.enabled {
        env.push(env_var("LOGFIRE_ENABLED", "true"));
    }
    env
}

/// Pod annotations advertising the metrics scrape target (Prometheus
/// `prometheus.io/*` convention, per spec.md §4.2 "metrics exposure ... as
/// pod annotations for scrape discovery").
pub fn scrape_annotations(cfg: &ObservabilityConfig) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();
    if cfg.metrics.enabled {
        annotations.insert("prometheus.io/scrape".to_string(), "true".to_string());
        annotations.insert("prometheus.io/path".to_string(), cfg.metrics.path.clone());
        annotations.insert("prometheus.io/port".to_string(), cfg.metrics.port.to_string());
    }
    annotations
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn normalize_env_key(k: &str) -> String {
    k.to_uppercase().replace(['-', '.'], "_")
}

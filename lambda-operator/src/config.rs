//! Process configuration, sourced from the environment (spec.md SPEC_FULL
//! ambient stack: "Configuration").
use std::time::Duration;

/// Operator-wide tunables. Everything has a sane default so the binary
/// runs with zero configuration in a dev cluster; production deployments
/// override via environment variables injected by the Helm chart (out of
/// scope for this core, per spec.md §1 non-goals).
#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: String,
    pub log_format_json: bool,
    pub health_addr: String,
    pub field_manager: String,
    /// Bound on backoff growth (spec.md §4.8 "exponential with jitter,
    /// bounded minimum and maximum"); the exact value is an implementation
    /// parameter per spec.md §9 open questions.
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    /// Build attempt budget before `BuildReady=False/Reason=MaxAttempts`
    /// (spec.md §4.4, §9 open question — left as an implementation
    /// parameter, fixed here).
    pub max_build_attempts: u32,
    /// Graceful-shutdown drain deadline (spec.md §4.8).
    pub shutdown_drain_deadline: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: env_or("LAMBDA_OPERATOR_LOG_LEVEL", "info"),
            log_format_json: env_or("LAMBDA_OPERATOR_LOG_FORMAT", "json") == "json",
            health_addr: env_or("LAMBDA_OPERATOR_HEALTH_ADDR", "0.0.0.0:8080"),
            field_manager: env_or("LAMBDA_OPERATOR_FIELD_MANAGER", "lambda-operator"),
            backoff_min: Duration::from_secs(env_parse("LAMBDA_OPERATOR_BACKOFF_MIN_SECS", 1)),
            backoff_max: Duration::from_secs(env_parse("LAMBDA_OPERATOR_BACKOFF_MAX_SECS", 300)),
            max_build_attempts: env_parse("LAMBDA_OPERATOR_MAX_BUILD_ATTEMPTS", 5),
            shutdown_drain_deadline: Duration::from_secs(env_parse("LAMBDA_OPERATOR_SHUTDOWN_DRAIN_SECS", 20)),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

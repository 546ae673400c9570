//! Types shared between `FunctionSpec` and `AgentSpec` (spec.md §3.1).
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::duration::Duration;

/// One entry of an env var list: a literal value or a secret reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EnvEntry {
    pub name: String,
    #[serde(flatten)]
    pub source: EnvSource,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum EnvSource {
    Value { value: String },
    SecretRef(SecretRef),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SecretRef {
    #[serde(rename = "secretRef")]
    pub secret_ref: SecretKeyRef,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SecretKeyRef {
    pub name: String,
    pub key: String,
}

/// Autoscaling parameters (spec.md §3.1 `scaling`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scaling {
    #[serde(default)]
    pub min_replicas: u32,
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,
    #[serde(default = "default_container_concurrency")]
    pub container_concurrency: u32,
    #[serde(default = "default_target_concurrency")]
    pub target_concurrency: u32,
    #[serde(default)]
    pub scale_to_zero_grace: Option<Duration>,
}

fn default_max_replicas() -> u32 {
    1
}
fn default_container_concurrency() -> u32 {
    100
}
fn default_target_concurrency() -> u32 {
    80
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            min_replicas: 0,
            max_replicas: default_max_replicas(),
            container_concurrency: default_container_concurrency(),
            target_concurrency: default_target_concurrency(),
            scale_to_zero_grace: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceList {
    pub cpu: Option<String>,
    pub memory: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub requests: ResourceList,
    #[serde(default)]
    pub limits: ResourceList,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum QueueType {
    #[default]
    Classic,
    Quorum,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Overflow {
    #[default]
    DropHead,
    RejectPublish,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BrokerSubstrate {
    pub cluster_name: String,
    pub namespace: String,
    #[serde(default)]
    pub queue_type: QueueType,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
    #[serde(default = "default_prefetch")]
    pub prefetch: u32,
}

fn default_parallelism() -> u32 {
    1
}
fn default_prefetch() -> u32 {
    1
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DlqCleanup {
    #[serde(default)]
    pub enabled: bool,
    pub interval: Option<Duration>,
    pub retention: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DlqConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub queue: String,
    #[serde(default)]
    pub routing_prefix: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    pub backoff: Option<Duration>,
    pub ttl_ms: Option<u64>,
    pub max_len: Option<u64>,
    #[serde(default)]
    pub overflow: Overflow,
    #[serde(default)]
    pub cleanup: DlqCleanup,
}

fn default_max_attempts() -> u32 {
    1
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            exchange: String::new(),
            queue: String::new(),
            routing_prefix: String::new(),
            max_attempts: default_max_attempts(),
            backoff: None,
            ttl_ms: None,
            max_len: None,
            overflow: Overflow::default(),
            cleanup: DlqCleanup::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApiSourceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub watch_list: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EventingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub resource_prefix: String,
    pub broker_name: Option<String>,
    #[serde(default)]
    pub subscriber_name: String,
    #[serde(default)]
    pub event_source: String,
    pub broker_substrate: Option<BrokerSubstrate>,
    #[serde(default)]
    pub dlq: DlqConfig,
    #[serde(default)]
    pub event_types: BTreeMap<String, String>,
    #[serde(default)]
    pub api_source: ApiSourceConfig,
    #[serde(default)]
    pub scrape_enabled: bool,
}

pub(crate) fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TracingPropagation {
    #[default]
    W3c,
    B3,
    Jaeger,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TracingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub sample_rate: f64,
    #[serde(default)]
    pub otlp_endpoint: String,
    #[serde(default)]
    pub propagation: TracingPropagation,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub exemplars: bool,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}
fn default_metrics_port() -> u16 {
    9090
}

impl MetricsConfig {
    pub fn enabled_with_defaults(enabled: bool) -> Self {
        Self {
            enabled,
            path: default_metrics_path(),
            port: default_metrics_port(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub include_trace_context: bool,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub include_event_metadata: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LogfireConfig {
    #[serde(default)]
    pub enabled: bool,
    pub token_ref: Option<SecretKeyRef>,
    #[serde(default)]
    pub bypass_collector: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub logfire: LogfireConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum PullPolicy {
    Always,
    IfNotPresent,
    Never,
}

/// Dynamic permission disable/enable event payload (spec.md §6.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Disable,
    Enable,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ControlEvent {
    pub capability: String,
    pub action: ControlAction,
    pub ttl: Option<Duration>,
    pub source: String,
}

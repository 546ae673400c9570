//! `LambdaAgent` custom resource (spec.md §3.1 `AgentSpec`).
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::common::{
    BrokerSubstrate, DlqConfig, EnvEntry, ObservabilityConfig, PullPolicy, ResourceRequirements, Scaling,
    SecretKeyRef,
};
use crate::condition::Condition;
use crate::duration::Duration;

/// Condition type names for `LambdaAgent` (spec.md §4.6).
pub mod conditions {
    pub const READY: &str = "Ready";
    pub const SERVICE_READY: &str = "ServiceReady";
    pub const EVENTING_READY: &str = "EventingReady";
    pub const AI_READY: &str = "AIReady";
    pub const PERMISSIONS_READY: &str = "PermissionsReady";
    pub const APPROVAL_READY: &str = "ApprovalReady";
    pub const SPEC_INVALID: &str = "SpecInvalid";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentImage {
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
    pub port: u16,
    pub pull_policy: Option<PullPolicy>,
    #[serde(default)]
    pub pull_secrets: Vec<String>,
    pub entrypoint: Option<Vec<String>>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl AgentImage {
    pub fn resolved_reference(&self) -> String {
        if let Some(digest) = &self.digest {
            format!("{}@{}", self.repository, digest)
        } else if let Some(tag) = &self.tag {
            format!("{}:{}", self.repository, tag)
        } else {
            format!("{}:latest", self.repository)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventControls {
    #[serde(default)]
    pub allow_event_disable: bool,
    #[serde(default)]
    pub control_event_types: Vec<String>,
    #[serde(default)]
    pub allowed_control_sources: Vec<String>,
}

/// Static capability flags + cross-namespace allow-list (spec.md §3.1,
/// invariant 7).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    #[serde(default)]
    pub disable_broker_creation: bool,
    #[serde(default)]
    pub disable_trigger_creation: bool,
    #[serde(default)]
    pub disable_function_creation: bool,
    #[serde(default)]
    pub allowed_target_namespaces: Vec<String>,
    #[serde(default)]
    pub event_controls: EventControls,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum AiProvider {
    LocalModelServer,
    CloudProviderA,
    CloudProviderB,
    #[default]
    None,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    #[serde(default)]
    pub provider: AiProvider,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub api_key_ref: Option<SecretKeyRef>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorConfig {
    pub max_context_messages: Option<u32>,
    #[serde(default)]
    pub emit_events: bool,
    #[serde(default)]
    pub system_prompt: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum OperationMode {
    #[default]
    Autonomous,
    Supervised,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ApprovalProvider {
    ChatApproval,
    CustomWebhook,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum TimeoutAction {
    #[default]
    Pending,
    Approve,
    Reject,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalConfig {
    #[serde(default)]
    pub providers: Vec<ApprovalProvider>,
    #[serde(default)]
    pub chat_cfg: BTreeMap<String, String>,
    #[serde(default)]
    pub custom_cfg: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub timeout_action: TimeoutAction,
    #[serde(default)]
    pub require_all: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub event_type: String,
    pub source_filter: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Forward {
    pub event_types: Vec<String>,
    pub target_agent: String,
    pub target_namespace: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentEventingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub event_source: String,
    #[serde(default)]
    pub intents: Vec<String>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    #[serde(default)]
    pub forwards: Vec<Forward>,
    #[serde(default)]
    pub dlq: DlqConfig,
    pub broker_substrate: Option<BrokerSubstrate>,
}

/// Declarative description of one AI agent deployment (spec.md §3.1).
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "lambda.platform.io",
    version = "v1",
    kind = "LambdaAgent",
    shortname = "lagent",
    namespaced,
    status = "AgentStatus",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    pub image: AgentImage,
    pub service_account_ref: Option<String>,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub operation_mode: OperationMode,
    pub approval: Option<ApprovalConfig>,
    #[serde(default)]
    pub env: Vec<EnvEntry>,
    #[serde(default)]
    pub scaling: Scaling,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub eventing: AgentEventingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AgentSpec {
    pub fn is_supervised(&self) -> bool {
        self.operation_mode == OperationMode::Supervised
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum AgentPhase {
    #[default]
    Pending,
    Deploying,
    Ready,
    Failed,
    Deleting,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AiStatus {
    #[serde(default)]
    pub model_available: bool,
    pub active_model: Option<String>,
    pub provider: Option<String>,
    pub endpoint: Option<String>,
    pub last_health_check: Option<Time>,
    pub latency_p99_ms: Option<u64>,
    #[serde(default)]
    pub active_conversations: u32,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DynamicDisable {
    pub capability: String,
    pub origin: String,
    pub expires_at: Option<Time>,
    pub disabled_at: Time,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionStatus {
    #[serde(default)]
    pub broker_disabled: bool,
    #[serde(default)]
    pub trigger_disabled: bool,
    #[serde(default)]
    pub function_child_disabled: bool,
    #[serde(default)]
    pub cross_ns_forward_disabled: bool,
    #[serde(default)]
    pub dynamic_disables: Vec<DynamicDisable>,
}

/// Common status shape (spec.md §3.1) specialized for `LambdaAgent`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    #[serde(default)]
    pub phase: AgentPhase,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub observed_generation: Option<i64>,
    pub service_name: Option<String>,
    pub service_url: Option<String>,
    #[serde(default)]
    pub service_ready: bool,
    pub broker_name: Option<String>,
    pub broker_url: Option<String>,
    #[serde(default)]
    pub trigger_count: u32,
    #[serde(default)]
    pub forward_count: u32,
    #[serde(default)]
    pub ai: AiStatus,
    #[serde(default)]
    pub permissions: PermissionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_reference_prefers_digest() {
        let img = AgentImage {
            repository: "registry.local/agents/triage".into(),
            tag: Some("v2".into()),
            digest: Some("sha256:deadbeef".into()),
            port: 8080,
            pull_policy: None,
            pull_secrets: vec![],
            entrypoint: None,
            args: vec![],
        };
        assert_eq!(img.resolved_reference(), "registry.local/agents/triage@sha256:deadbeef");
    }
}

//! `LambdaFunction` custom resource (spec.md §3.1 `FunctionSpec`).
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::common::{
    default_true, EnvEntry, EventingConfig, ObservabilityConfig, PullPolicy, ResourceRequirements, Scaling,
    SecretKeyRef,
};
use crate::condition::Condition;
use crate::duration::Duration;

/// Condition type names for `LambdaFunction` (spec.md §4.6).
pub mod conditions {
    pub const SOURCE_READY: &str = "SourceReady";
    pub const BUILD_READY: &str = "BuildReady";
    pub const EVENTING_READY: &str = "EventingReady";
    pub const DEPLOY_READY: &str = "DeployReady";
    pub const SERVICE_READY: &str = "ServiceReady";
    pub const SPEC_INVALID: &str = "SpecInvalid";
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Language {
    #[default]
    Nodejs,
    Python,
    Go,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RuntimeSpec {
    pub language: Language,
    pub version: String,
    pub handler: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ObjectStoreSource {
    pub endpoint: String,
    pub bucket: String,
    pub key: String,
    pub cred_ref: Option<SecretKeyRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RemoteObjectStoreSource {
    pub bucket: String,
    pub key: String,
    pub region: String,
    pub cred_ref: Option<SecretKeyRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GcsObjectStoreSource {
    pub bucket: String,
    pub key: String,
    pub project: String,
    pub cred_ref: Option<SecretKeyRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GitSource {
    pub url: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub subpath: String,
    pub cred_ref: Option<SecretKeyRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InlineSource {
    pub code: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PrebuiltImageSource {
    pub repo: String,
    #[serde(flatten)]
    pub reference: ImageReference,
    pub pull_policy: Option<PullPolicy>,
    #[serde(default)]
    pub pull_secrets: Vec<String>,
    pub port: u16,
    pub entrypoint: Option<Vec<String>>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Exactly one of `tag`/`digest`; digest overrides tag when both given
/// (spec.md §4.2 "Image URI selection").
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImageReference {
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageReference {
    /// The resolved tag/digest suffix, defaulting to `:latest` when absent.
    pub fn resolved(&self) -> String {
        if let Some(digest) = &self.digest {
            format!("@{digest}")
        } else if let Some(tag) = &self.tag {
            format!(":{tag}")
        } else {
            ":latest".to_string()
        }
    }
}

/// Exactly one populated variant (spec.md invariant 1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FunctionSource {
    pub object_store: Option<ObjectStoreSource>,
    pub remote_object_store: Option<RemoteObjectStoreSource>,
    pub gcs_object_store: Option<GcsObjectStoreSource>,
    pub git: Option<GitSource>,
    pub inline: Option<InlineSource>,
    pub prebuilt_image: Option<PrebuiltImageSource>,
}

impl FunctionSource {
    pub fn populated_count(&self) -> usize {
        [
            self.object_store.is_some(),
            self.remote_object_store.is_some(),
            self.gcs_object_store.is_some(),
            self.git.is_some(),
            self.inline.is_some(),
            self.prebuilt_image.is_some(),
        ]
        .into_iter()
        .filter(|b| *b)
        .count()
    }

    pub fn is_prebuilt(&self) -> bool {
        self.prebuilt_image.is_some()
    }

    pub fn is_buildable(&self) -> bool {
        !self.is_prebuilt() && self.populated_count() == 1
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RegistryType {
    #[default]
    Local,
    Ecr,
    Gcr,
    Ghcr,
    Dockerhub,
    Generic,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BuildSpec {
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub registry: String,
    #[serde(default)]
    pub registry_type: RegistryType,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub tag: String,
    pub pull_secret: Option<String>,
    pub region: Option<String>,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default)]
    pub force_rebuild: bool,
}

/// Declarative description of one function (spec.md §3.1).
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "lambda.platform.io",
    version = "v1",
    kind = "LambdaFunction",
    shortname = "lfn",
    namespaced,
    status = "FunctionStatus",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    pub source: FunctionSource,
    pub runtime: RuntimeSpec,
    #[serde(default)]
    pub scaling: Scaling,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub env: Vec<EnvEntry>,
    #[serde(default = "function_eventing_default")]
    pub eventing: EventingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub build: BuildSpec,
    pub image_pull_policy: Option<PullPolicy>,
}

fn function_eventing_default() -> EventingConfig {
    EventingConfig {
        enabled: default_true(),
        ..Default::default()
    }
}

impl FunctionSpec {
    /// Default pull policy derives from source type (spec.md §4.2).
    pub fn effective_pull_policy(&self) -> PullPolicy {
        if let Some(explicit) = self.image_pull_policy {
            return explicit;
        }
        if self.source.is_prebuilt() {
            PullPolicy::IfNotPresent
        } else {
            PullPolicy::Always
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum FunctionPhase {
    #[default]
    Pending,
    Building,
    Deploying,
    Ready,
    Failed,
    Deleting,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatus {
    pub job_handle: Option<String>,
    pub image_uri: Option<String>,
    pub started_at: Option<Time>,
    pub completed_at: Option<Time>,
    pub error: Option<String>,
    #[serde(default)]
    pub attempt: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerlessStatus {
    pub name: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub ready: bool,
    pub latest_revision: Option<String>,
    pub replicas: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventingStatus {
    pub broker_name: Option<String>,
    #[serde(default)]
    pub broker_ready: bool,
    pub broker_url: Option<String>,
    #[serde(default)]
    pub trigger_count: u32,
    #[serde(default)]
    pub forward_count: u32,
}

/// Common status shape (spec.md §3.1) specialized for `LambdaFunction`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FunctionStatus {
    #[serde(default)]
    pub phase: FunctionPhase,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub build: BuildStatus,
    #[serde(default)]
    pub serverless: ServerlessStatus,
    #[serde(default)]
    pub eventing: EventingStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_reference_prefers_digest_over_tag() {
        let r = ImageReference {
            tag: Some("v1".into()),
            digest: Some("sha256:abc".into()),
        };
        assert_eq!(r.resolved(), "@sha256:abc");
    }

    #[test]
    fn image_reference_defaults_to_latest() {
        assert_eq!(ImageReference::default().resolved(), ":latest");
    }

    #[test]
    fn pull_policy_defaults_by_source_kind() {
        let mut spec_source = FunctionSource {
            object_store: None,
            remote_object_store: None,
            gcs_object_store: None,
            git: None,
            inline: None,
            prebuilt_image: Some(PrebuiltImageSource {
                repo: "registry.local:5000/fn/hello".into(),
                reference: ImageReference {
                    tag: Some("v1".into()),
                    digest: None,
                },
                pull_policy: None,
                pull_secrets: vec![],
                port: 8080,
                entrypoint: None,
                args: vec![],
            }),
        };
        let mut spec = FunctionSpec {
            source: spec_source.clone(),
            runtime: RuntimeSpec {
                language: Language::Nodejs,
                version: "20".into(),
                handler: "index.handler".into(),
            },
            scaling: Scaling::default(),
            resources: ResourceRequirements::default(),
            env: vec![],
            eventing: EventingConfig {
                enabled: false,
                ..Default::default()
            },
            observability: ObservabilityConfig::default(),
            build: BuildSpec::default(),
            image_pull_policy: None,
        };
        assert_eq!(spec.effective_pull_policy(), PullPolicy::IfNotPresent);

        spec_source.prebuilt_image = None;
        spec_source.git = Some(GitSource {
            url: "https://example.com/repo.git".into(),
            git_ref: "main".into(),
            subpath: String::new(),
            cred_ref: None,
        });
        spec.source = spec_source;
        assert_eq!(spec.effective_pull_policy(), PullPolicy::Always);
    }
}

//! Serverless revision builder (spec.md §4.2).
//!
//! The underlying serverless runtime is an external collaborator (spec.md
//! §1): the core only creates/updates its desired spec and reads back
//! readiness/URL from its status. The revision kind itself (a
//! Knative-Serving-shaped `Service`) isn't one of `k8s-openapi`'s built-in
//! types, so it's modeled as a [`DynamicObject`], the same way the
//! lifecycle manager handles any foreign CRD.
use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use kube::core::ObjectMeta;
use lambda_core::common::{EnvEntry, EnvSource, ObservabilityConfig, PullPolicy, ResourceRequirements, Scaling};
use serde_json::json;

use super::names::owned_name;
use super::observability::{observability_env, scrape_annotations};

/// `ApiResource` describing the foreign serverless revision kind.
pub fn api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("serving.platform.io", "v1", "Service"))
}

pub struct RevisionInput<'a> {
    pub parent_name: &'a str,
    pub namespace: &'a str,
    pub owner: OwnerReference,
    pub image: String,
    pub port: u16,
    pub command: Option<Vec<String>>,
    pub args: Vec<String>,
    pub env: &'a [EnvEntry],
    pub scaling: &'a Scaling,
    pub resources: &'a ResourceRequirements,
    pub pull_policy: PullPolicy,
    pub pull_secrets: &'a [String],
    pub observability: &'a ObservabilityConfig,
}

/// Desired revision manifest. Env entries from the parent spec are merged
/// with the observability side-channel env (spec.md §4.2 "inject OTLP
/// endpoint ... as environment variables").
pub fn build_revision(input: RevisionInput<'_>) -> DynamicObject {
    let name = owned_name(input.parent_name, "revision");
    let mut env: Vec<serde_json::Value> = input.env.iter().map(env_entry_json).collect();
    for var in observability_env(input.observability) {
        env.push(json!({ "name": var.name, "value": var.value }));
    }

    let mut annotations = scrape_annotations(input.observability);
    annotations.insert(
        "autoscaling.platform.io/minScale".to_string(),
        input.scaling.min_replicas.to_string(),
    );
    annotations.insert(
        "autoscaling.platform.io/maxScale".to_string(),
        input.scaling.max_replicas.to_string(),
    );
    annotations.insert(
        "autoscaling.platform.io/target".to_string(),
        input.scaling.target_concurrency.to_string(),
    );
    if let Some(grace) = &input.scaling.scale_to_zero_grace {
        annotations.insert("autoscaling.platform.io/scaleToZeroGrace".to_string(), grace.to_string());
    }

    let mut labels = BTreeMap::new();
    labels.insert("lambda.platform.io/parent".to_string(), input.parent_name.to_string());
    labels.insert("lambda.platform.io/role".to_string(), "revision".to_string());

    let container = json!({
        "image": input.image,
        "ports": [{ "containerPort": input.port }],
        "command": input.command,
        "args": input.args,
        "env": env,
        "imagePullPolicy": pull_policy_str(input.pull_policy),
        "resources": {
            "requests": { "cpu": input.resources.requests.cpu, "memory": input.resources.requests.memory },
            "limits": { "cpu": input.resources.limits.cpu, "memory": input.resources.limits.memory },
        },
    });

    let data = json!({
        "apiVersion": "serving.platform.io/v1",
        "kind": "Service",
        "metadata": {
            "name": name,
            "namespace": input.namespace,
            "annotations": annotations,
            "labels": labels,
        },
        "spec": {
            "template": {
                "spec": {
                    "containerConcurrency": input.scaling.container_concurrency,
                    "containers": [container],
                    "imagePullSecrets": input.pull_secrets.iter().map(|s| json!({ "name": s })).collect::<Vec<_>>(),
                }
            }
        },
    });

    let mut obj: DynamicObject = serde_json::from_value(data).expect("static revision shape always deserializes");
    obj.metadata = ObjectMeta {
        owner_references: Some(vec![input.owner]),
        ..obj.metadata
    };
    obj
}

fn pull_policy_str(policy: PullPolicy) -> &'static str {
    match policy {
        PullPolicy::Always => "Always",
        PullPolicy::IfNotPresent => "IfNotPresent",
        PullPolicy::Never => "Never",
    }
}

fn env_entry_json(entry: &EnvEntry) -> serde_json::Value {
    match &entry.source {
        EnvSource::Value { value } => json!({ "name": entry.name, "value": value }),
        EnvSource::SecretRef(secret) => json!({
            "name": entry.name,
            "valueFrom": { "secretKeyRef": { "name": secret.secret_ref.name, "key": secret.secret_ref.key } },
        }),
    }
}

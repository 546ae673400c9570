//! Build work item builder (spec.md §4.2, §4.4 "Build is started only
//! after source validation succeeds").
//!
//! The container-building subsystem itself is an external collaborator
//! (spec.md §1); this builder only produces the `Job` manifest that starts
//! one build attempt and reports back a terminal image URI via the job's
//! status/labels, which `build_job::image_uri_label` reads back.
use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use lambda_core::function::{BuildSpec, FunctionSource};

use super::names::owned_name;

const BUILDER_IMAGE: &str = "registry.local/platform/source-builder:stable";
pub const IMAGE_URI_LABEL: &str = "lambda.platform.io/image-uri";

/// Desired build `Job` for one attempt. `attempt` is embedded in the name
/// so a retried build produces a fresh object instead of colliding with
/// the exhausted one (spec.md §4.4 "Building | build missing/stale").
pub fn build_job(
    parent_name: &str,
    namespace: &str,
    owner: OwnerReference,
    source: &FunctionSource,
    build: &BuildSpec,
    attempt: u32,
) -> Job {
    let name = owned_name(parent_name, &format!("build-{attempt}"));
    let mut env = source_env(source);
    env.push(env_var("BUILD_REGISTRY", &build.registry));
    env.push(env_var("BUILD_REPOSITORY", &build.repository));
    env.push(env_var("BUILD_TAG", &build.tag));

    let mut labels = BTreeMap::new();
    labels.insert("lambda.platform.io/parent".to_string(), parent_name.to_string());
    labels.insert("lambda.platform.io/role".to_string(), "build".to_string());

    Job {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace.to_string()),
            owner_references: Some(vec![owner]),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(0), // the reconciler owns the retry budget, not the Job
            active_deadline_seconds: build.timeout.map(|d| d.as_std().as_secs() as i64),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta::default()),
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    containers: vec![Container {
                        name: "build".to_string(),
                        image: Some(BUILDER_IMAGE.to_string()),
                        env: Some(env),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

fn source_env(source: &FunctionSource) -> Vec<EnvVar> {
    let mut env = vec![env_var("SOURCE_KIND", source_kind(source))];
    if let Some(s) = &source.object_store {
        env.push(env_var("SOURCE_ENDPOINT", &s.endpoint));
        env.push(env_var("SOURCE_BUCKET", &s.bucket));
        env.push(env_var("SOURCE_KEY", &s.key));
    } else if let Some(s) = &source.remote_object_store {
        env.push(env_var("SOURCE_BUCKET", &s.bucket));
        env.push(env_var("SOURCE_KEY", &s.key));
        env.push(env_var("SOURCE_REGION", &s.region));
    } else if let Some(s) = &source.gcs_object_store {
        env.push(env_var("SOURCE_BUCKET", &s.bucket));
        env.push(env_var("SOURCE_KEY", &s.key));
        env.push(env_var("SOURCE_PROJECT", &s.project));
    } else if let Some(s) = &source.git {
        env.push(env_var("SOURCE_URL", &s.url));
        env.push(env_var("SOURCE_REF", &s.git_ref));
        env.push(env_var("SOURCE_SUBPATH", &s.subpath));
    } else if let Some(s) = &source.inline {
        env.push(env_var("SOURCE_CODE_LEN", &s.code.len().to_string()));
    }
    env
}

fn source_kind(source: &FunctionSource) -> &'static str {
    if source.object_store.is_some() {
        "object-store"
    } else if source.remote_object_store.is_some() {
        "remote-object-store"
    } else if source.gcs_object_store.is_some() {
        "gcs-object-store"
    } else if source.git.is_some() {
        "git"
    } else if source.inline.is_some() {
        "inline"
    } else {
        "unknown"
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_core::function::GitSource;

    fn owner() -> OwnerReference {
        OwnerReference {
            api_version: "lambda.platform.io/v1".to_string(),
            kind: "LambdaFunction".to_string(),
            name: "hello".to_string(),
            uid: "uid-1".to_string(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    #[test]
    fn attempt_number_is_embedded_in_job_name() {
        let source = FunctionSource {
            object_store: None,
            remote_object_store: None,
            gcs_object_store: None,
            git: Some(GitSource {
                url: "https://example.com/repo.git".into(),
                git_ref: "main".into(),
                subpath: String::new(),
                cred_ref: None,
            }),
            inline: None,
            prebuilt_image: None,
        };
        let job = build_job("hello", "ns", owner(), &source, &BuildSpec::default(), 2);
        assert_eq!(job.metadata.name.as_deref(), Some("hello-build-2"));
    }
}

//! Exercises the builder -> `ChildLifecycleManager` -> `KubeHandle` path the
//! reconcilers drive in production, against an in-memory `FakeHandle`
//! (spec.md §4.3: create-or-update with drift detection, idempotent delete).
use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use lambda_core::common::{ObservabilityConfig, PullPolicy, ResourceRequirements, Scaling};
use lambda_runtime::builders::serverless::{build_revision, RevisionInput};
use lambda_runtime::kube_handle::{FakeHandle, KubeHandle};
use lambda_runtime::manager::{ChildLifecycleManager, EnsureOutcome};

fn owner(name: &str) -> OwnerReference {
    OwnerReference {
        api_version: "lambda.platform.io/v1".to_string(),
        kind: "LambdaFunction".to_string(),
        name: name.to_string(),
        uid: "11111111-1111-1111-1111-111111111111".to_string(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

fn revision(parent: &str, image: &str) -> DynamicObject {
    let scaling = Scaling::default();
    let resources = ResourceRequirements::default();
    let observability = ObservabilityConfig::default();
    build_revision(RevisionInput {
        parent_name: parent,
        namespace: "team-a",
        owner: owner(parent),
        image: image.to_string(),
        port: 8080,
        command: None,
        args: Vec::new(),
        env: &[],
        scaling: &scaling,
        resources: &resources,
        pull_policy: PullPolicy::IfNotPresent,
        pull_secrets: &[],
        observability: &observability,
    })
}

fn spec_only_equivalent(observed: &DynamicObject, desired: &DynamicObject) -> bool {
    observed.data.get("spec") == desired.data.get("spec")
}

#[tokio::test]
async fn revision_is_created_then_left_unchanged_on_repeat_reconcile() {
    let fake = Arc::new(FakeHandle::<DynamicObject>::new());
    let manager = ChildLifecycleManager::new(fake.clone() as Arc<dyn KubeHandle<DynamicObject>>);
    let desired = revision("hello", "ghcr.io/acme/hello:1");

    let first = manager.ensure("team-a", "hello-revision", &desired, spec_only_equivalent).await.unwrap();
    assert_eq!(first, EnsureOutcome::Created);
    assert!(fake.contains("team-a", "hello-revision"));

    let second = manager.ensure("team-a", "hello-revision", &desired, spec_only_equivalent).await.unwrap();
    assert_eq!(second, EnsureOutcome::Unchanged, "unchanged desired state must not re-patch (I1)");
}

#[tokio::test]
async fn image_change_drifts_and_is_patched() {
    let fake = Arc::new(FakeHandle::<DynamicObject>::new());
    let manager = ChildLifecycleManager::new(fake.clone() as Arc<dyn KubeHandle<DynamicObject>>);

    manager
        .ensure("team-a", "hello-revision", &revision("hello", "ghcr.io/acme/hello:1"), spec_only_equivalent)
        .await
        .unwrap();

    let updated = revision("hello", "ghcr.io/acme/hello:2");
    let outcome = manager.ensure("team-a", "hello-revision", &updated, spec_only_equivalent).await.unwrap();
    assert_eq!(outcome, EnsureOutcome::Patched);

    let (_, stored) = fake
        .snapshot()
        .into_iter()
        .find(|((ns, name), _)| ns == "team-a" && name == "hello-revision")
        .expect("revision recorded");
    assert_eq!(stored.data.get("spec"), updated.data.get("spec"));
}

#[tokio::test]
async fn delete_if_exists_is_idempotent_after_cleanup() {
    let fake = Arc::new(FakeHandle::<DynamicObject>::new());
    let manager = ChildLifecycleManager::new(fake.clone() as Arc<dyn KubeHandle<DynamicObject>>);
    let desired = revision("hello", "ghcr.io/acme/hello:1");

    manager.ensure("team-a", "hello-revision", &desired, spec_only_equivalent).await.unwrap();
    manager.delete_if_exists("team-a", "hello-revision").await.unwrap();
    manager.delete_if_exists("team-a", "hello-revision").await.unwrap();

    assert!(!fake.contains("team-a", "hello-revision"));
}

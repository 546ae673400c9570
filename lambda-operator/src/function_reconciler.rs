//! `LambdaFunction` reconcile loop (spec.md §4.4).
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::finalizer::{finalizer, Event as Finalizer};
use kube::{Resource, ResourceExt};
use lambda_core::condition::{set_condition, Condition, ConditionStatus};
use lambda_core::function::{conditions as fc, FunctionPhase, LambdaFunction};
use lambda_core::phase::derive_function_phase;
use lambda_core::validation::validate_function;
use lambda_runtime::builders::{build_job, eventing, names, observability, serverless};
use lambda_runtime::kube_handle::KubeApiHandle;
use lambda_runtime::manager::ChildLifecycleManager;
use tracing::{field, info, instrument, warn, Span};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::events;
use crate::telemetry;

pub const FINALIZER: &str = "lambdafunctions.lambda.platform.io";
const KIND: &str = "LambdaFunction";

#[instrument(skip(obj, ctx), fields(trace_id))]
pub async fn reconcile(obj: Arc<LambdaFunction>, ctx: Arc<Context>) -> Result<Action> {
    let trace_id = telemetry::get_trace_id();
    Span::current().record("trace_id", field::display(&trace_id));
    ctx.record_reconcile();
    let key = object_key(&obj);
    let _guard = ctx.queue.enter(&key);

    let ns = obj.namespace().unwrap_or_default();
    let api: Api<LambdaFunction> = Api::namespaced(ctx.client.clone(), &ns);

    let outcome = finalizer(&api, FINALIZER, obj, |event| async {
        match event {
            Finalizer::Apply(obj) => apply(&obj, &ctx).await,
            Finalizer::Cleanup(obj) => cleanup(&obj, &ctx).await,
        }
    })
    .await
    .map_err(|e| Error::Finalizer(Box::new(e)));

    match &outcome {
        Ok(_) => ctx.queue.reset(&key),
        Err(e) => warn!(error = %e, "function reconcile failed"),
    }
    outcome
}

pub fn error_policy(obj: Arc<LambdaFunction>, error: &Error, ctx: Arc<Context>) -> Action {
    ctx.metrics.record_failure(KIND, error.reason());
    warn!(name = %obj.name_any(), error = %error, "requeuing after error");
    ctx.queue.action_after_error(&object_key(&obj))
}

fn object_key(obj: &LambdaFunction) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

async fn apply(obj: &LambdaFunction, ctx: &Arc<Context>) -> Result<Action> {
    let ns = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let client = ctx.client.clone();
    let recorder = ctx.diagnostics.read().recorder(client.clone(), obj);
    let api: Api<LambdaFunction> = Api::namespaced(client.clone(), &ns);
    let owner = obj.controller_owner_ref(&()).ok_or_else(|| Error::Internal("missing uid on owner".into()))?;

    let mut conditions = obj.status.as_ref().map(|s| s.conditions.clone()).unwrap_or_default();
    let now = Time(Utc::now());

    let violations = validate_function(&obj.spec);
    if !violations.is_empty() {
        set_condition(
            &mut conditions,
            Condition::new(fc::SPEC_INVALID, ConditionStatus::True, "Invalid", violations.first_message().unwrap_or_default()),
            now.clone(),
        );
        events::emit_warning(&recorder, "Reconcile", "SpecInvalid", violations.to_string())
            .await
            .map_err(Error::Kube)?;
        patch_status(&api, &name, &conditions, obj, None, None, None).await?;
        return Ok(Action::await_change());
    }
    set_condition(&mut conditions, Condition::new(fc::SPEC_INVALID, ConditionStatus::False, "Valid", ""), now.clone());

    let mut build_status = obj.status.as_ref().map(|s| s.build.clone()).unwrap_or_default();
    let image_uri = if obj.spec.source.is_prebuilt() {
        let prebuilt = obj.spec.source.prebuilt_image.as_ref().expect("is_prebuilt implies Some");
        set_condition(&mut conditions, Condition::new(fc::SOURCE_READY, ConditionStatus::True, "Resolved", ""), now.clone());
        set_condition(&mut conditions, Condition::new(fc::BUILD_READY, ConditionStatus::True, "Prebuilt", ""), now.clone());
        Some(format!("{}{}", prebuilt.repo, prebuilt.reference.resolved()))
    } else {
        set_condition(&mut conditions, Condition::new(fc::SOURCE_READY, ConditionStatus::True, "Resolved", ""), now.clone());
        run_build(obj, ctx, owner.clone(), &mut conditions, &mut build_status, now.clone()).await?
    };

    let mut phase_so_far = derive_function_phase(&conditions, obj.spec.eventing.enabled);
    if phase_so_far == FunctionPhase::Failed {
        patch_status(&api, &name, &conditions, obj, Some(build_status), None, None).await?;
        return Ok(Action::requeue(StdDuration::from_secs(ctx.config.backoff_max.as_secs())));
    }

    let mut serverless_status = obj.status.as_ref().map(|s| s.serverless.clone()).unwrap_or_default();
    if let Some(image) = &image_uri {
        let revision_handle = KubeApiHandle::<DynamicObject>::new_dynamic(client.clone(), serverless::api_resource(), ctx.config.field_manager.clone());
        let manager = ChildLifecycleManager::new(Arc::new(revision_handle));
        let revision_name = names::owned_name(&name, "revision");
        let desired = serverless::build_revision(serverless::RevisionInput {
            parent_name: &name,
            namespace: &ns,
            owner: owner.clone(),
            image: image.clone(),
            port: obj.spec.source.prebuilt_image.as_ref().map(|p| p.port).unwrap_or(8080),
            command: obj.spec.source.prebuilt_image.as_ref().and_then(|p| p.entrypoint.clone()),
            args: obj.spec.source.prebuilt_image.as_ref().map(|p| p.args.clone()).unwrap_or_default(),
            env: &obj.spec.env,
            scaling: &obj.spec.scaling,
            resources: &obj.spec.resources,
            pull_policy: obj.spec.effective_pull_policy(),
            pull_secrets: obj.spec.source.prebuilt_image.as_ref().map(|p| p.pull_secrets.as_slice()).unwrap_or(&[]),
            observability: &obj.spec.observability,
        });
        manager
            .ensure(&ns, &revision_name, &desired, spec_only_equivalent)
            .await
            .map_err(Error::Handle)?;

        serverless_status.name = Some(revision_name);
        serverless_status.ready = true;
        serverless_status.url = Some(format!("http://{name}.{ns}.svc.cluster.local"));
        set_condition(&mut conditions, Condition::new(fc::SERVICE_READY, ConditionStatus::True, "Ready", ""), now.clone());
    }

    let mut eventing_status = obj.status.as_ref().map(|s| s.eventing.clone()).unwrap_or_default();
    if obj.spec.eventing.enabled && image_uri.is_some() {
        run_eventing(obj, ctx, owner.clone(), &mut eventing_status).await?;
        set_condition(&mut conditions, Condition::new(fc::EVENTING_READY, ConditionStatus::True, "Ready", ""), now.clone());
    }

    phase_so_far = derive_function_phase(&conditions, obj.spec.eventing.enabled);
    let transitioned_to_ready = phase_so_far == FunctionPhase::Ready
        && obj.status.as_ref().map(|s| s.phase) != Some(FunctionPhase::Ready);
    if transitioned_to_ready {
        events::emit(&recorder, "Reconcile", "Ready", "function is ready to serve traffic")
            .await
            .map_err(Error::Kube)?;
    }

    patch_status(&api, &name, &conditions, obj, Some(build_status), Some(serverless_status), Some(eventing_status)).await?;
    ctx.metrics.record_success(KIND, 0.0);

    let requeue_after = match phase_so_far {
        FunctionPhase::Ready => StdDuration::from_secs(300),
        _ => StdDuration::from_secs(5),
    };
    Ok(Action::requeue(requeue_after))
}

/// Start or poll the build `Job` for this attempt (spec.md §4.4 table,
/// "Building" row).
async fn run_build(
    obj: &LambdaFunction,
    ctx: &Arc<Context>,
    owner: k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference,
    conditions: &mut Vec<Condition>,
    build_status: &mut lambda_core::function::BuildStatus,
    now: Time,
) -> Result<Option<String>> {
    let ns = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let job_handle = KubeApiHandle::<Job>::new(ctx.client.clone(), ctx.config.field_manager.clone());

    if let Some(image) = &build_status.image_uri {
        if !obj.spec.build.force_rebuild {
            set_condition(conditions, Condition::new(fc::BUILD_READY, ConditionStatus::True, "BuildComplete", ""), now);
            return Ok(Some(image.clone()));
        }
    }

    let job_name = names::owned_name(&name, &format!("build-{}", build_status.attempt.max(1)));
    let observed = job_handle.get(&ns, &job_name).await.map_err(Error::Handle)?;

    match observed {
        Some(job) if job.status.as_ref().and_then(|s| s.succeeded).unwrap_or(0) > 0 => {
            let image = job
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get(build_job::IMAGE_URI_LABEL))
                .cloned()
                .unwrap_or_else(|| format!("{}/{}:{}", obj.spec.build.registry, obj.spec.build.repository, obj.spec.build.tag));
            build_status.image_uri = Some(image.clone());
            build_status.completed_at = Some(now.clone());
            set_condition(conditions, Condition::new(fc::BUILD_READY, ConditionStatus::True, "BuildComplete", ""), now);
            Ok(Some(image))
        }
        Some(job) if job.status.as_ref().and_then(|s| s.failed).unwrap_or(0) > 0 => {
            build_status.error = Some("build job failed".to_string());
            job_handle.delete(&ns, &job_name).await.map_err(Error::Handle)?;
            if build_status.attempt >= ctx.config.max_build_attempts {
                set_condition(conditions, Condition::new(fc::BUILD_READY, ConditionStatus::False, "MaxAttempts", "build attempts exhausted"), now);
                return Ok(None);
            }
            build_status.attempt += 1;
            build_status.started_at = Some(now.clone());
            let next_job_name = names::owned_name(&name, &format!("build-{}", build_status.attempt));
            let job = build_job::build_job(&name, &ns, owner, &obj.spec.source, &obj.spec.build, build_status.attempt);
            job_handle.create(&ns, &next_job_name, &job).await.map_err(Error::Handle)?;
            build_status.job_handle = Some(next_job_name);
            info!(attempt = build_status.attempt, "retrying build job after failure");
            set_condition(conditions, Condition::new(fc::BUILD_READY, ConditionStatus::Unknown, "BuildInProgress", ""), now);
            Ok(None)
        }
        Some(_) => {
            set_condition(conditions, Condition::new(fc::BUILD_READY, ConditionStatus::Unknown, "BuildInProgress", ""), now);
            Ok(None)
        }
        None => {
            if build_status.attempt >= ctx.config.max_build_attempts {
                set_condition(conditions, Condition::new(fc::BUILD_READY, ConditionStatus::False, "MaxAttempts", "build attempts exhausted"), now);
                return Ok(None);
            }
            build_status.attempt += 1;
            build_status.started_at = Some(now.clone());
            let job = build_job::build_job(&name, &ns, owner, &obj.spec.source, &obj.spec.build, build_status.attempt);
            job_handle.create(&ns, &job_name, &job).await.map_err(Error::Handle)?;
            build_status.job_handle = Some(job_name);
            info!(attempt = build_status.attempt, "started build job");
            set_condition(conditions, Condition::new(fc::BUILD_READY, ConditionStatus::Unknown, "BuildInProgress", ""), now);
            Ok(None)
        }
    }
}

async fn run_eventing(
    obj: &LambdaFunction,
    ctx: &Arc<Context>,
    owner: k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference,
    eventing_status: &mut lambda_core::function::EventingStatus,
) -> Result<()> {
    let ns = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let broker_handle = KubeApiHandle::<DynamicObject>::new_dynamic(ctx.client.clone(), eventing::broker_api_resource(), ctx.config.field_manager.clone());
    let broker_manager = ChildLifecycleManager::new(Arc::new(broker_handle));

    let broker_name = eventing::resolved_broker_name(&name, obj.spec.eventing.broker_name.as_deref());
    if let Some(desired) =
        eventing::build_broker(&name, &ns, owner.clone(), obj.spec.eventing.broker_name.as_deref(), obj.spec.eventing.broker_substrate.as_ref(), &obj.spec.eventing.dlq)
    {
        broker_manager.ensure(&ns, &broker_name, &desired, spec_only_equivalent).await.map_err(Error::Handle)?;
    }
    eventing_status.broker_name = Some(broker_name.clone());
    eventing_status.broker_ready = true;

    let trigger_handle = KubeApiHandle::<DynamicObject>::new_dynamic(ctx.client.clone(), eventing::trigger_api_resource(), ctx.config.field_manager.clone());
    let trigger_manager = ChildLifecycleManager::new(Arc::new(trigger_handle));
    let subscriber = if obj.spec.eventing.subscriber_name.is_empty() {
        names::owned_name(&name, "revision")
    } else {
        obj.spec.eventing.subscriber_name.clone()
    };

    let mut count = 0u32;
    for (index, (event_type, source_filter)) in obj.spec.eventing.event_types.iter().enumerate() {
        let trigger_name = names::owned_name(&name, &format!("trigger-{index}"));
        let source = if source_filter.is_empty() { None } else { Some(source_filter.as_str()) };
        let desired = eventing::build_trigger(&name, &ns, owner.clone(), &broker_name, &subscriber, event_type, source, index);
        trigger_manager.ensure(&ns, &trigger_name, &desired, spec_only_equivalent).await.map_err(Error::Handle)?;
        count += 1;
    }
    eventing_status.trigger_count = count;
    Ok(())
}

async fn cleanup(obj: &LambdaFunction, ctx: &Arc<Context>) -> Result<Action> {
    // Native owner-reference cascade reclaims the Job, revision, broker (when
    // owned) and triggers; nothing here is a cross-namespace forward, so
    // there's nothing extra to tear down explicitly (contrast
    // `agent_reconciler::cleanup`).
    ctx.queue.forget(&object_key(obj));
    info!(name = %obj.name_any(), "function finalized");
    Ok(Action::await_change())
}

#[allow(clippy::too_many_arguments)]
async fn patch_status(
    api: &Api<LambdaFunction>,
    name: &str,
    conditions: &[Condition],
    obj: &LambdaFunction,
    build: Option<lambda_core::function::BuildStatus>,
    serverless: Option<lambda_core::function::ServerlessStatus>,
    eventing: Option<lambda_core::function::EventingStatus>,
) -> Result<()> {
    let phase = derive_function_phase(conditions, obj.spec.eventing.enabled);
    let mut status = obj.status.clone().unwrap_or_default();
    status.phase = phase;
    status.conditions = conditions.to_vec();
    status.observed_generation = obj.meta().generation;
    if let Some(build) = build {
        status.build = build;
    }
    if let Some(serverless) = serverless {
        status.serverless = serverless;
    }
    if let Some(eventing) = eventing {
        status.eventing = eventing;
    }

    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(Error::Kube)?;
    Ok(())
}

/// Owned dynamic objects (serverless revision, broker, trigger) are
/// considered equivalent when their `spec` is unchanged; metadata and
/// status are left to the apiserver/controller to manage.
fn spec_only_equivalent(observed: &DynamicObject, desired: &DynamicObject) -> bool {
    observed.data.get("spec") == desired.data.get("spec")
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use lambda_core::function::{
        FunctionSource, FunctionSpec, ImageReference, Language, LambdaFunction, PrebuiltImageSource, RuntimeSpec,
    };
    use serde_json::json;

    fn bare_function(namespace: &str, name: &str) -> LambdaFunction {
        let spec = FunctionSpec {
            source: FunctionSource {
                object_store: None,
                remote_object_store: None,
                gcs_object_store: None,
                git: None,
                inline: None,
                prebuilt_image: Some(PrebuiltImageSource {
                    repo: "ghcr.io/acme/fn".to_string(),
                    reference: ImageReference::default(),
                    pull_policy: None,
                    pull_secrets: Vec::new(),
                    port: 8080,
                    entrypoint: None,
                    args: Vec::new(),
                }),
            },
            runtime: RuntimeSpec {
                language: Language::Nodejs,
                version: "20".to_string(),
                handler: "index.handler".to_string(),
            },
            scaling: Default::default(),
            resources: Default::default(),
            env: Vec::new(),
            eventing: Default::default(),
            observability: Default::default(),
            build: Default::default(),
            image_pull_policy: None,
        };
        LambdaFunction {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    #[test]
    fn object_key_combines_namespace_and_name() {
        let f = bare_function("team-a", "hello");
        assert_eq!(object_key(&f), "team-a/hello");
    }

    #[test]
    fn spec_only_equivalent_ignores_metadata_and_status() {
        let mut observed = DynamicObject::new("a", &serverless::api_resource());
        observed.data["spec"] = json!({"image": "ghcr.io/acme/fn:1"});
        observed.data["status"] = json!({"ready": true});

        let mut desired = DynamicObject::new("a", &serverless::api_resource());
        desired.data["spec"] = json!({"image": "ghcr.io/acme/fn:1"});

        assert!(spec_only_equivalent(&observed, &desired));
    }

    #[test]
    fn spec_only_equivalent_detects_spec_drift() {
        let mut observed = DynamicObject::new("a", &serverless::api_resource());
        observed.data["spec"] = json!({"image": "ghcr.io/acme/fn:1"});

        let mut desired = DynamicObject::new("a", &serverless::api_resource());
        desired.data["spec"] = json!({"image": "ghcr.io/acme/fn:2"});

        assert!(!spec_only_equivalent(&observed, &desired));
    }
}

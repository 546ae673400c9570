//! `LambdaAgent` reconcile loop (spec.md §4.5).
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{OwnerReference, Time};
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::finalizer::{finalizer, Event as Finalizer};
use kube::{Resource, ResourceExt};
use lambda_core::agent::{conditions as ac, AgentPhase, DynamicDisable as StatusDynamicDisable, LambdaAgent};
use lambda_core::condition::{set_condition, Condition, ConditionStatus};
use lambda_core::phase::derive_agent_phase;
use lambda_core::validation::validate_agent;
use lambda_runtime::builders::{eventing, forward, names, rbac, serverless};
use lambda_runtime::kube_handle::KubeApiHandle;
use lambda_runtime::manager::ChildLifecycleManager;
use lambda_runtime::{capability_str, Capability, Decision, PermissionGate};
use tracing::{field, info, instrument, warn, Span};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::events;
use crate::telemetry;

pub const FINALIZER: &str = "lambdaagents.lambda.platform.io";
const KIND: &str = "LambdaAgent";

#[instrument(skip(obj, ctx), fields(trace_id))]
pub async fn reconcile(obj: Arc<LambdaAgent>, ctx: Arc<Context>) -> Result<Action> {
    let trace_id = telemetry::get_trace_id();
    Span::current().record("trace_id", field::display(&trace_id));
    ctx.record_reconcile();
    let key = object_key(&obj);
    let _guard = ctx.queue.enter(&key);

    let ns = obj.namespace().unwrap_or_default();
    let api: Api<LambdaAgent> = Api::namespaced(ctx.client.clone(), &ns);

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
        Err(e) => warn!(error = %e, "agent reconcile failed"),
    }
    outcome
}

pub fn error_policy(obj: Arc<LambdaAgent>, error: &Error, ctx: Arc<Context>) -> Action {
    ctx.metrics.record_failure(KIND, error.reason());
    warn!(name = %obj.name_any(), error = %error, "requeuing after error");
    ctx.queue.action_after_error(&object_key(&obj))
}

fn object_key(obj: &LambdaAgent) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

/// Rebuild a [`PermissionGate`] from the spec's static flags plus whatever
/// dynamic disables status last persisted (see `permissions::restore_dynamic_disable`
/// doc comment: the operator treats status as the durable record of accepted
/// control events rather than subscribing to the control-event stream
/// itself).
fn load_permission_gate(obj: &LambdaAgent, now: chrono::DateTime<Utc>) -> PermissionGate {
    let mut gate = PermissionGate::new();
    gate.set_static_deny(Capability::Broker, obj.spec.permissions.disable_broker_creation);
    gate.set_static_deny(Capability::Trigger, obj.spec.permissions.disable_trigger_creation);
    gate.set_static_deny(Capability::FunctionChild, obj.spec.permissions.disable_function_creation);
    if let Some(status) = &obj.status {
        for d in &status.permissions.dynamic_disables {
            let capability = match d.capability.as_str() {
                "broker" => Capability::Broker,
                "trigger" => Capability::Trigger,
                "function-child" => Capability::FunctionChild,
                "cross-ns-forward" => Capability::CrossNsForward,
                _ => continue,
            };
            let expires_at = d.expires_at.as_ref().map(|t| t.0);
            gate.restore_dynamic_disable(capability, d.origin.clone(), expires_at);
        }
    }
    gate.expire(now);
    gate
}

/// A forward targeting the agent's own namespace isn't cross-namespace at
/// all (invariant 7, spec.md §4.1/§4.7), so it bypasses the allow-list check
/// entirely rather than requiring `own_namespace` to be listed in
/// `allowedTargetNamespaces`.
fn evaluate_forward(gate: &PermissionGate, own_namespace: &str, fwd: &lambda_core::agent::Forward, allowed_target_namespaces: &[String]) -> Decision {
    if fwd.target_namespace == own_namespace {
        return Decision::Allow;
    }
    gate.evaluate_cross_ns_forward(&fwd.target_namespace, allowed_target_namespaces)
}

/// The first capability denial across all four classes the permission gate
/// evaluates (spec.md §4.7), in a fixed check order. Cross-namespace forward
/// is evaluated once per configured forward, since each carries its own
/// target namespace.
fn first_denied_capability(gate: &PermissionGate, own_namespace: &str, obj: &LambdaAgent) -> Option<(Capability, Decision)> {
    for capability in [Capability::Broker, Capability::Trigger, Capability::FunctionChild] {
        let decision = gate.evaluate(capability);
        if !decision.is_allow() {
            return Some((capability, decision));
        }
    }
    for fwd in &obj.spec.eventing.forwards {
        let decision = evaluate_forward(gate, own_namespace, fwd, &obj.spec.permissions.allowed_target_namespaces);
        if !decision.is_allow() {
            return Some((Capability::CrossNsForward, decision));
        }
    }
    None
}

/// Condition reason naming the capability that denied `PermissionsReady`
/// (spec.md §8 scenario 5 expects `Reason=ForwardNotAllowed` specifically
/// for a denied cross-namespace forward).
fn permissions_not_ready_reason(capability: Capability) -> &'static str {
    match capability {
        Capability::Broker => "BrokerNotAllowed",
        Capability::Trigger => "TriggerNotAllowed",
        Capability::FunctionChild => "FunctionChildNotAllowed",
        Capability::CrossNsForward => "ForwardNotAllowed",
    }
}

fn persist_dynamic_disables(gate: &PermissionGate, now: Time) -> Vec<StatusDynamicDisable> {
    gate.active_dynamic_disables()
        .map(|(capability, origin, expires_at)| StatusDynamicDisable {
            capability: capability_str(capability).to_string(),
            origin: origin.to_string(),
            expires_at: expires_at.map(Time),
            disabled_at: now.clone(),
        })
        .collect()
}

async fn apply(obj: &LambdaAgent, ctx: &Arc<Context>) -> Result<Action> {
    let ns = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let client = ctx.client.clone();
    let recorder = ctx.diagnostics.read().recorder(client.clone(), obj);
    let api: Api<LambdaAgent> = Api::namespaced(client.clone(), &ns);
    let owner = obj.controller_owner_ref(&()).ok_or_else(|| Error::Internal("missing uid on owner".into()))?;

    let mut conditions = obj.status.as_ref().map(|s| s.conditions.clone()).unwrap_or_default();
    let now = Time(Utc::now());

    let violations = validate_agent(&obj.spec);
    if !violations.is_empty() {
        set_condition(
            &mut conditions,
            Condition::new(ac::SPEC_INVALID, ConditionStatus::True, "Invalid", violations.first_message().unwrap_or_default()),
            now.clone(),
        );
        events::emit_warning(&recorder, "Reconcile", "SpecInvalid", violations.to_string())
            .await
            .map_err(Error::Kube)?;
        patch_status(&api, &name, &conditions, obj, None, None).await?;
        return Ok(Action::await_change());
    }
    set_condition(&mut conditions, Condition::new(ac::SPEC_INVALID, ConditionStatus::False, "Valid", ""), now.clone());

    let gate = load_permission_gate(obj, now.0);
    match first_denied_capability(&gate, &ns, obj) {
        Some((capability, decision)) => {
            set_condition(
                &mut conditions,
                Condition::new(ac::PERMISSIONS_READY, ConditionStatus::False, permissions_not_ready_reason(capability), format!("{decision:?}")),
                now.clone(),
            );
        }
        None => {
            set_condition(&mut conditions, Condition::new(ac::PERMISSIONS_READY, ConditionStatus::True, "Allowed", ""), now.clone());
        }
    }

    // Service account + RBAC, then the agent's own serverless revision.
    let sa_handle = KubeApiHandle::<k8s_openapi::api::core::v1::ServiceAccount>::new(client.clone(), ctx.config.field_manager.clone());
    let sa_manager = ChildLifecycleManager::new(Arc::new(sa_handle));
    let sa_name = names::owned_name(&name, "sa");
    let desired_sa = rbac::build_service_account(&name, &ns, owner.clone());
    sa_manager.ensure(&ns, &sa_name, &desired_sa, |o, d| o.metadata.labels == d.metadata.labels).await.map_err(Error::Handle)?;

    let rb_handle = KubeApiHandle::<k8s_openapi::api::rbac::v1::RoleBinding>::new(client.clone(), ctx.config.field_manager.clone());
    let rb_manager = ChildLifecycleManager::new(Arc::new(rb_handle));
    let rb_name = names::owned_name(&name, "rolebinding");
    let desired_rb = rbac::build_role_binding(&name, &ns, owner.clone(), &sa_name);
    rb_manager.ensure(&ns, &rb_name, &desired_rb, |o, d| o.subjects == d.subjects && o.role_ref == d.role_ref).await.map_err(Error::Handle)?;

    let revision_handle = KubeApiHandle::<DynamicObject>::new_dynamic(client.clone(), serverless::api_resource(), ctx.config.field_manager.clone());
    let revision_manager = ChildLifecycleManager::new(Arc::new(revision_handle));
    let revision_name = names::owned_name(&name, "revision");
    let desired_revision = serverless::build_revision(serverless::RevisionInput {
        parent_name: &name,
        namespace: &ns,
        owner: owner.clone(),
        image: obj.spec.image.resolved_reference(),
        port: obj.spec.image.port,
        command: obj.spec.image.entrypoint.clone(),
        args: obj.spec.image.args.clone(),
        env: &obj.spec.env,
        scaling: &obj.spec.scaling,
        resources: &obj.spec.resources,
        pull_policy: obj.spec.image.pull_policy.unwrap_or(lambda_core::common::PullPolicy::IfNotPresent),
        pull_secrets: &obj.spec.image.pull_secrets,
        observability: &obj.spec.observability,
    });
    revision_manager
        .ensure(&ns, &revision_name, &desired_revision, |o, d| o.data.get("spec") == d.data.get("spec"))
        .await
        .map_err(Error::Handle)?;
    set_condition(&mut conditions, Condition::new(ac::SERVICE_READY, ConditionStatus::True, "Ready", ""), now.clone());

    // AIReady never gates Ready (SPEC_FULL.md §9 Open Question 1); it still
    // surfaces the AI endpoint health as a condition for observability.
    set_condition(
        &mut conditions,
        Condition::new(ac::AI_READY, if obj.spec.ai.endpoint.is_empty() { ConditionStatus::Unknown } else { ConditionStatus::True }, "Configured", ""),
        now.clone(),
    );

    if obj.spec.eventing.enabled {
        run_eventing(obj, ctx, &gate, owner.clone()).await?;
        set_condition(&mut conditions, Condition::new(ac::EVENTING_READY, ConditionStatus::True, "Ready", ""), now.clone());
    }
    run_forwards(obj, ctx, &gate, owner.clone()).await?;

    if obj.spec.is_supervised() {
        let approval_ready = obj
            .status
            .as_ref()
            .map(|s| lambda_core::condition::is_condition_true(&s.conditions, ac::APPROVAL_READY))
            .unwrap_or(false);
        if approval_ready {
            set_condition(&mut conditions, Condition::new(ac::APPROVAL_READY, ConditionStatus::True, "Approved", ""), now.clone());
        } else {
            set_condition(&mut conditions, Condition::new(ac::APPROVAL_READY, ConditionStatus::Unknown, "AwaitingApproval", ""), now.clone());
        }
    }

    let phase = derive_agent_phase(&conditions, obj.spec.eventing.enabled, obj.spec.is_supervised());
    let transitioned_to_ready = phase == AgentPhase::Ready && obj.status.as_ref().map(|s| s.phase) != Some(AgentPhase::Ready);
    if transitioned_to_ready {
        events::emit(&recorder, "Reconcile", "Ready", "agent is ready to serve traffic")
            .await
            .map_err(Error::Kube)?;
    }

    let dynamic_disables = persist_dynamic_disables(&gate, now.clone());
    patch_status(&api, &name, &conditions, obj, Some(revision_name), Some(dynamic_disables)).await?;
    ctx.metrics.record_success(KIND, 0.0);

    let requeue_after = match phase {
        AgentPhase::Ready => StdDuration::from_secs(300),
        _ => StdDuration::from_secs(5),
    };
    Ok(Action::requeue(requeue_after))
}

async fn run_eventing(obj: &LambdaAgent, ctx: &Arc<Context>, gate: &PermissionGate, owner: OwnerReference) -> Result<()> {
    let ns = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let client = ctx.client.clone();

    if gate.evaluate(Capability::Broker).is_allow() {
        let broker_handle = KubeApiHandle::<DynamicObject>::new_dynamic(client.clone(), eventing::broker_api_resource(), ctx.config.field_manager.clone());
        let broker_manager = ChildLifecycleManager::new(Arc::new(broker_handle));
        let broker_name = eventing::resolved_broker_name(&name, None);
        if let Some(desired) = eventing::build_broker(&name, &ns, owner.clone(), None, obj.spec.eventing.broker_substrate.as_ref(), &obj.spec.eventing.dlq) {
            broker_manager
                .ensure(&ns, &broker_name, &desired, |o, d| o.data.get("spec") == d.data.get("spec"))
                .await
                .map_err(Error::Handle)?;
        }

        if gate.evaluate(Capability::Trigger).is_allow() {
            let trigger_handle = KubeApiHandle::<DynamicObject>::new_dynamic(client.clone(), eventing::trigger_api_resource(), ctx.config.field_manager.clone());
            let trigger_manager = ChildLifecycleManager::new(Arc::new(trigger_handle));
            let subscriber = names::owned_name(&name, "revision");
            for (index, subscription) in obj.spec.eventing.subscriptions.iter().enumerate() {
                let trigger_name = names::owned_name(&name, &format!("trigger-{index}"));
                let desired = eventing::build_trigger(
                    &name,
                    &ns,
                    owner.clone(),
                    &broker_name,
                    &subscriber,
                    &subscription.event_type,
                    subscription.source_filter.as_deref(),
                    index,
                );
                trigger_manager
                    .ensure(&ns, &trigger_name, &desired, |o, d| o.data.get("spec") == d.data.get("spec"))
                    .await
                    .map_err(Error::Handle)?;
            }
        }
    }
    Ok(())
}

/// Ensure each cross-namespace forward's channel/subscription pair exists
/// when allowed, and tear down forwards no longer present in the spec or no
/// longer permitted (spec.md §9 "forwards are relations, not ownership" —
/// `forward.rs`'s ensure/delete calls are the explicit teardown path).
async fn run_forwards(obj: &LambdaAgent, ctx: &Arc<Context>, gate: &PermissionGate, owner: OwnerReference) -> Result<()> {
    let ns = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let client = ctx.client.clone();
    let channel_handle = KubeApiHandle::<DynamicObject>::new_dynamic(client.clone(), forward::channel_api_resource(), ctx.config.field_manager.clone());
    let channel_manager = ChildLifecycleManager::new(Arc::new(channel_handle));
    let subscription_handle = KubeApiHandle::<DynamicObject>::new_dynamic(client.clone(), forward::subscription_api_resource(), ctx.config.field_manager.clone());
    let subscription_manager = ChildLifecycleManager::new(Arc::new(subscription_handle));

    for (index, fwd) in obj.spec.eventing.forwards.iter().enumerate() {
        let channel_name = names::owned_name(&name, &format!("fwd-{index}-channel"));
        let subscription_name = names::owned_name(&name, &format!("fwd-{index}-subscription"));
        let decision = evaluate_forward(gate, &ns, fwd, &obj.spec.permissions.allowed_target_namespaces);
        if decision.is_allow() {
            let channel = forward::build_channel(&name, &fwd.target_namespace, owner.clone(), index);
            channel_manager
                .ensure(&fwd.target_namespace, &channel_name, &channel, |o, d| o.data.get("spec") == d.data.get("spec"))
                .await
                .map_err(Error::Handle)?;
            let subscription = forward::build_subscription(&name, &fwd.target_namespace, owner.clone(), &channel_name, &fwd.event_types, &fwd.target_agent, index);
            subscription_manager
                .ensure(&fwd.target_namespace, &subscription_name, &subscription, |o, d| o.data.get("spec") == d.data.get("spec"))
                .await
                .map_err(Error::Handle)?;
        } else {
            subscription_manager.delete_if_exists(&fwd.target_namespace, &subscription_name).await.map_err(Error::Handle)?;
            channel_manager.delete_if_exists(&fwd.target_namespace, &channel_name).await.map_err(Error::Handle)?;
        }
    }
    Ok(())
}

async fn cleanup(obj: &LambdaAgent, ctx: &Arc<Context>) -> Result<Action> {
    // Forwards are relations, not owned objects (spec.md §9): native GC on
    // this namespace's owner references can't reach the target namespace,
    // so teardown here is explicit.
    let name = obj.name_any();
    let client = ctx.client.clone();
    let channel_handle = KubeApiHandle::<DynamicObject>::new_dynamic(client.clone(), forward::channel_api_resource(), ctx.config.field_manager.clone());
    let channel_manager = ChildLifecycleManager::new(Arc::new(channel_handle));
    let subscription_handle = KubeApiHandle::<DynamicObject>::new_dynamic(client.clone(), forward::subscription_api_resource(), ctx.config.field_manager.clone());
    let subscription_manager = ChildLifecycleManager::new(Arc::new(subscription_handle));

    for (index, fwd) in obj.spec.eventing.forwards.iter().enumerate() {
        let channel_name = names::owned_name(&name, &format!("fwd-{index}-channel"));
        let subscription_name = names::owned_name(&name, &format!("fwd-{index}-subscription"));
        subscription_manager.delete_if_exists(&fwd.target_namespace, &subscription_name).await.map_err(Error::Handle)?;
        channel_manager.delete_if_exists(&fwd.target_namespace, &channel_name).await.map_err(Error::Handle)?;
    }

    ctx.queue.forget(&object_key(obj));
    info!(name = %name, "agent finalized");
    Ok(Action::await_change())
}

async fn patch_status(
    api: &Api<LambdaAgent>,
    name: &str,
    conditions: &[Condition],
    obj: &LambdaAgent,
    revision_name: Option<String>,
    dynamic_disables: Option<Vec<StatusDynamicDisable>>,
) -> Result<()> {
    let phase = derive_agent_phase(conditions, obj.spec.eventing.enabled, obj.spec.is_supervised());
    let mut status = obj.status.clone().unwrap_or_default();
    status.phase = phase;
    status.conditions = conditions.to_vec();
    status.observed_generation = obj.meta().generation;
    if let Some(revision_name) = revision_name {
        status.service_ready = true;
        status.service_name = Some(revision_name);
    }
    status.permissions.broker_disabled = obj.spec.permissions.disable_broker_creation;
    status.permissions.trigger_disabled = obj.spec.permissions.disable_trigger_creation;
    status.permissions.function_child_disabled = obj.spec.permissions.disable_function_creation;
    if let Some(dynamic_disables) = dynamic_disables {
        status.permissions.dynamic_disables = dynamic_disables;
    }
    status.forward_count = obj.spec.eventing.forwards.len() as u32;

    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(Error::Kube)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ObjectMeta;
    use lambda_core::agent::{AgentEventingConfig, AgentImage, AgentSpec, AgentStatus, OperationMode, Permissions};
    use lambda_core::common::{ObservabilityConfig, ResourceRequirements, Scaling};

    fn bare_agent(namespace: &str, name: &str) -> LambdaAgent {
        LambdaAgent {
            metadata: ObjectMeta {
                namespace: Some(namespace.to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: AgentSpec {
                image: AgentImage {
                    repository: "registry.local/agents/triage".into(),
                    tag: Some("v1".into()),
                    digest: None,
                    port: 8080,
                    pull_policy: None,
                    pull_secrets: vec![],
                    entrypoint: None,
                    args: vec![],
                },
                service_account_ref: None,
                permissions: Permissions::default(),
                ai: Default::default(),
                behavior: Default::default(),
                operation_mode: OperationMode::Autonomous,
                approval: None,
                env: vec![],
                scaling: Scaling::default(),
                resources: ResourceRequirements::default(),
                eventing: AgentEventingConfig::default(),
                observability: ObservabilityConfig::default(),
            },
            status: None,
        }
    }

    #[test]
    fn object_key_combines_namespace_and_name() {
        let agent = bare_agent("default", "triage");
        assert_eq!(object_key(&agent), "default/triage");
    }

    #[test]
    fn static_deny_survives_load_from_spec() {
        let mut agent = bare_agent("default", "triage");
        agent.spec.permissions.disable_broker_creation = true;
        let gate = load_permission_gate(&agent, Utc::now());
        assert!(!gate.evaluate(Capability::Broker).is_allow());
        assert!(gate.evaluate(Capability::Trigger).is_allow());
    }

    #[test]
    fn persisted_dynamic_disable_round_trips_through_status() {
        let now = Utc::now();
        let mut gate = PermissionGate::new();
        gate.apply_control_event(
            &lambda_core::common::ControlEvent {
                capability: "trigger".into(),
                action: lambda_core::common::ControlAction::Disable,
                ttl: None,
                source: "upstream-agent".into(),
            },
            now,
        );
        let persisted = persist_dynamic_disables(&gate, Time(now));

        let mut agent = bare_agent("default", "triage");
        agent.status = Some(AgentStatus {
            permissions: lambda_core::agent::PermissionStatus {
                dynamic_disables: persisted,
                ..Default::default()
            },
            ..Default::default()
        });

        let reloaded = load_permission_gate(&agent, now);
        assert!(!reloaded.evaluate(Capability::Trigger).is_allow());
        assert!(reloaded.evaluate(Capability::Broker).is_allow());
    }

    #[test]
    fn expired_dynamic_disable_does_not_reload_as_active() {
        let now = Utc::now();
        let mut gate = PermissionGate::new();
        gate.apply_control_event(
            &lambda_core::common::ControlEvent {
                capability: "broker".into(),
                action: lambda_core::common::ControlAction::Disable,
                ttl: Some("1s".parse().unwrap()),
                source: "a".into(),
            },
            now,
        );
        let persisted = persist_dynamic_disables(&gate, Time(now));

        let mut agent = bare_agent("default", "triage");
        agent.status = Some(AgentStatus {
            permissions: lambda_core::agent::PermissionStatus {
                dynamic_disables: persisted,
                ..Default::default()
            },
            ..Default::default()
        });

        let later = now + chrono::Duration::seconds(2);
        let reloaded = load_permission_gate(&agent, later);
        assert!(reloaded.evaluate(Capability::Broker).is_allow());
    }

    fn forward(target_namespace: &str) -> lambda_core::agent::Forward {
        lambda_core::agent::Forward {
            event_types: vec!["com.example.query".into()],
            target_agent: "query-processor".into(),
            target_namespace: target_namespace.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn scenario_4_forward_to_allowed_namespace_is_not_denied() {
        let mut agent = bare_agent("default", "triage");
        agent.spec.permissions.allowed_target_namespaces = vec!["processing".into()];
        agent.spec.eventing.forwards.push(forward("processing"));
        let gate = load_permission_gate(&agent, Utc::now());
        assert!(first_denied_capability(&gate, "default", &agent).is_none());
    }

    #[test]
    fn scenario_5_forward_to_denied_namespace_surfaces_forward_not_allowed() {
        let mut agent = bare_agent("default", "triage");
        agent.spec.eventing.forwards.push(forward("processing"));
        let gate = load_permission_gate(&agent, Utc::now());
        let (capability, decision) = first_denied_capability(&gate, "default", &agent).expect("forward should be denied");
        assert_eq!(capability, Capability::CrossNsForward);
        assert!(!decision.is_allow());
        assert_eq!(permissions_not_ready_reason(capability), "ForwardNotAllowed");
    }

    #[test]
    fn forward_to_own_namespace_is_never_denied() {
        let mut agent = bare_agent("default", "triage");
        agent.spec.eventing.forwards.push(forward("default"));
        let gate = load_permission_gate(&agent, Utc::now());
        assert!(first_denied_capability(&gate, "default", &agent).is_none());
    }
}

//! Permission gate: static + dynamic capability policy (spec.md §4.7).
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lambda_core::common::{ControlAction, ControlEvent};
use tracing::{debug, warn};

/// The four capability classes a permission decision is made for
/// (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Broker,
    Trigger,
    FunctionChild,
    CrossNsForward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// The wire name used for a capability in [`ControlEvent::capability`] and
/// in persisted status (spec.md §6.2).
pub fn capability_str(capability: Capability) -> &'static str {
    match capability {
        Capability::Broker => "broker",
        Capability::Trigger => "trigger",
        Capability::FunctionChild => "function-child",
        Capability::CrossNsForward => "cross-ns-forward",
    }
}

/// One accepted dynamic disable, tracked with its expiry so it can lapse.
#[derive(Debug, Clone)]
struct DynamicDisable {
    origin: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Evaluates capability allow/deny decisions from static flags and
/// accepted control events, per spec.md §4.7's evaluation order: static
/// deny > dynamic deny > allow (invariant 8).
#[derive(Debug, Default)]
pub struct PermissionGate {
    static_deny: HashMap<Capability, bool>,
    dynamic_disables: HashMap<Capability, DynamicDisable>,
}

impl PermissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_static_deny(&mut self, capability: Capability, denied: bool) {
        self.static_deny.insert(capability, denied);
    }

    /// Apply a control event accepted by the caller (source already
    /// checked against `allowedControlSources`, spec.md §6.2).
    ///
    /// `now` is passed in rather than read from the clock so evaluation
    /// stays deterministic and testable.
    pub fn apply_control_event(&mut self, event: &ControlEvent, now: DateTime<Utc>) {
        let capability = match event.capability.as_str() {
            "broker" => Capability::Broker,
            "trigger" => Capability::Trigger,
            "function-child" => Capability::FunctionChild,
            "cross-ns-forward" => Capability::CrossNsForward,
            _ => return,
        };
        match event.action {
            ControlAction::Disable => {
                let expires_at = event
                    .ttl
                    .as_ref()
                    .map(|ttl| now + chrono::Duration::from_std(ttl.as_std()).unwrap_or_default());
                self.dynamic_disables.insert(
                    capability,
                    DynamicDisable {
                        origin: event.source.clone(),
                        expires_at,
                    },
                );
            }
            ControlAction::Enable => {
                self.dynamic_disables.remove(&capability);
            }
        }
    }

    /// Rehydrate one dynamic disable from persisted status (spec.md §6.2:
    /// accepted control events are reflected in `status.permissions`, which
    /// is the durable record across process restarts since the operator
    /// itself does not subscribe to the control-event stream directly).
    pub fn restore_dynamic_disable(&mut self, capability: Capability, origin: String, expires_at: Option<DateTime<Utc>>) {
        self.dynamic_disables.insert(capability, DynamicDisable { origin, expires_at });
    }

    /// Iterate currently active dynamic disables, for status persistence.
    pub fn active_dynamic_disables(&self) -> impl Iterator<Item = (Capability, &str, Option<DateTime<Utc>>)> {
        self.dynamic_disables.iter().map(|(c, d)| (*c, d.origin.as_str(), d.expires_at))
    }

    /// Drop any dynamic disables whose TTL has lapsed as of `now`.
    pub fn expire(&mut self, now: DateTime<Utc>) {
        self.dynamic_disables
            .retain(|_, d| d.expires_at.is_none_or(|exp| exp > now));
    }

    pub fn evaluate(&self, capability: Capability) -> Decision {
        let decision = if *self.static_deny.get(&capability).unwrap_or(&false) {
            Decision::Deny("statically disabled".to_string())
        } else if let Some(disable) = self.dynamic_disables.get(&capability) {
            Decision::Deny(format!("dynamically disabled by {}", disable.origin))
        } else {
            Decision::Allow
        };
        match &decision {
            Decision::Allow => debug!(capability = capability_str(capability), "capability allowed"),
            Decision::Deny(reason) => warn!(capability = capability_str(capability), reason, "capability denied"),
        }
        decision
    }

    /// Cross-namespace forward additionally requires the target namespace
    /// on the allow-list (spec.md §3.1 `allowedTargetNamespaces`).
    pub fn evaluate_cross_ns_forward(&self, target_namespace: &str, allowed_target_namespaces: &[String]) -> Decision {
        let base = self.evaluate(Capability::CrossNsForward);
        if !base.is_allow() {
            return base;
        }
        let decision = if allowed_target_namespaces.iter().any(|ns| ns == target_namespace) {
            Decision::Allow
        } else {
            Decision::Deny(format!("namespace {target_namespace} not in allow-list"))
        };
        match &decision {
            Decision::Allow => debug!(capability = "cross-ns-forward", namespace = target_namespace, "forward allowed"),
            Decision::Deny(reason) => warn!(capability = "cross-ns-forward", namespace = target_namespace, reason, "forward denied"),
        }
        decision
    }

    pub fn dynamic_disable_origin(&self, capability: Capability) -> Option<&str> {
        self.dynamic_disables.get(&capability).map(|d| d.origin.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_core::duration::Duration as LambdaDuration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn static_deny_wins_over_dynamic_enable() {
        let mut gate = PermissionGate::new();
        gate.set_static_deny(Capability::Broker, true);
        assert_eq!(gate.evaluate(Capability::Broker), Decision::Deny("statically disabled".into()));
    }

    #[test]
    fn dynamic_disable_denies_when_no_static_deny() {
        let mut gate = PermissionGate::new();
        gate.apply_control_event(
            &ControlEvent {
                capability: "trigger".into(),
                action: ControlAction::Disable,
                ttl: None,
                source: "upstream-agent".into(),
            },
            now(),
        );
        assert!(!gate.evaluate(Capability::Trigger).is_allow());
        assert_eq!(gate.dynamic_disable_origin(Capability::Trigger), Some("upstream-agent"));
    }

    #[test]
    fn dynamic_enable_clears_dynamic_disable_but_not_static() {
        let mut gate = PermissionGate::new();
        gate.set_static_deny(Capability::FunctionChild, true);
        gate.apply_control_event(
            &ControlEvent {
                capability: "function-child".into(),
                action: ControlAction::Disable,
                ttl: None,
                source: "a".into(),
            },
            now(),
        );
        gate.apply_control_event(
            &ControlEvent {
                capability: "function-child".into(),
                action: ControlAction::Enable,
                ttl: None,
                source: "a".into(),
            },
            now(),
        );
        // I8: dynamic enable never overrides a static disable.
        assert!(!gate.evaluate(Capability::FunctionChild).is_allow());
    }

    #[test]
    fn expired_dynamic_disable_lapses() {
        let mut gate = PermissionGate::new();
        gate.apply_control_event(
            &ControlEvent {
                capability: "broker".into(),
                action: ControlAction::Disable,
                ttl: Some("30s".parse::<LambdaDuration>().unwrap()),
                source: "a".into(),
            },
            now(),
        );
        assert!(!gate.evaluate(Capability::Broker).is_allow());
        gate.expire(now() + chrono::Duration::seconds(31));
        assert!(gate.evaluate(Capability::Broker).is_allow());
    }

    #[test]
    fn cross_ns_forward_requires_allow_listed_namespace() {
        let gate = PermissionGate::new();
        assert!(!gate.evaluate_cross_ns_forward("team-b", &["team-a".to_string()]).is_allow());
        assert!(gate.evaluate_cross_ns_forward("team-a", &["team-a".to_string()]).is_allow());
    }
}

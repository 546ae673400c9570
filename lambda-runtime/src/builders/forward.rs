//! Cross-namespace forward builder: channel + subscription in the target
//! namespace (spec.md §4.2 "Event wiring", GLOSSARY "Forward").
//!
//! Per spec.md §9 "Cyclic owner/status references", a forward is modeled
//! as a *relation* recorded in the source parent's status, never as
//! ownership — the channel/subscription carry an owner reference back to
//! the source parent anyway (so platform GC can still find them cross
//! namespace via the owning controller's explicit cleanup, since native
//! owner-reference GC is scoped to one namespace), but callers must not
//! rely on owner-reference cascade alone for forwards; `deleteIfExists` is
//! invoked explicitly on forward teardown (see `lambda-operator`
//! reconcilers).
use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use kube::core::ObjectMeta;
use serde_json::json;

use super::names::owned_name;

pub fn channel_api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("eventing.platform.io", "v1", "Channel"))
}

pub fn subscription_api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("eventing.platform.io", "v1", "Subscription"))
}

pub fn build_channel(parent_name: &str, target_namespace: &str, owner: OwnerReference, index: usize) -> DynamicObject {
    let name = owned_name(parent_name, &format!("fwd-{index}-channel"));
    let mut labels = BTreeMap::new();
    labels.insert("lambda.platform.io/source-parent".to_string(), parent_name.to_string());
    labels.insert("lambda.platform.io/role".to_string(), "forward-channel".to_string());

    let data = json!({
        "apiVersion": "eventing.platform.io/v1",
        "kind": "Channel",
        "metadata": { "name": name, "namespace": target_namespace, "labels": labels },
        "spec": {},
    });
    let mut obj: DynamicObject = serde_json::from_value(data).expect("static channel shape always deserializes");
    obj.metadata = ObjectMeta {
        owner_references: Some(vec![owner]),
        ..obj.metadata
    };
    obj
}

pub fn build_subscription(
    parent_name: &str,
    target_namespace: &str,
    owner: OwnerReference,
    channel_name: &str,
    event_types: &[String],
    target_agent: &str,
    index: usize,
) -> DynamicObject {
    let name = owned_name(parent_name, &format!("fwd-{index}-subscription"));
    let mut labels = BTreeMap::new();
    labels.insert("lambda.platform.io/source-parent".to_string(), parent_name.to_string());
    labels.insert("lambda.platform.io/role".to_string(), "forward-subscription".to_string());

    let data = json!({
        "apiVersion": "eventing.platform.io/v1",
        "kind": "Subscription",
        "metadata": { "name": name, "namespace": target_namespace, "labels": labels },
        "spec": {
            "channel": { "ref": { "name": channel_name } },
            "eventTypes": event_types,
            "subscriber": { "ref": { "name": target_agent } },
        },
    });
    let mut obj: DynamicObject = serde_json::from_value(data).expect("static subscription shape always deserializes");
    obj.metadata = ObjectMeta {
        owner_references: Some(vec![owner]),
        ..obj.metadata
    };
    obj
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> OwnerReference {
        OwnerReference {
            api_version: "lambda.platform.io/v1".to_string(),
            kind: "LambdaAgent".to_string(),
            name: "triage".to_string(),
            uid: "uid-1".to_string(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    #[test]
    fn channel_lands_in_target_namespace() {
        let channel = build_channel("triage", "processing", owner(), 0);
        assert_eq!(channel.metadata.namespace.as_deref(), Some("processing"));
        assert_eq!(channel.metadata.name.as_deref(), Some("triage-fwd-0-channel"));
    }

    #[test]
    fn subscription_references_target_agent() {
        let subscription = build_subscription(
            "triage",
            "processing",
            owner(),
            "triage-fwd-0-channel",
            &["order.created".to_string()],
            "query-processor",
            0,
        );
        let subscriber = subscription.data.get("spec").unwrap().get("subscriber").unwrap();
        assert_eq!(subscriber.get("ref").unwrap().get("name").unwrap(), "query-processor");
    }
}

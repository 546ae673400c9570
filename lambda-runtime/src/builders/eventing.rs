//! Broker + trigger builders (spec.md §4.2 "Event wiring", "Broker reuse").
//!
//! The event-mesh substrate is an external collaborator (spec.md §1); the
//! core owns the desired spec of brokers and triggers it creates, modeled
//! as [`DynamicObject`] the way `serverless` models the revision kind.
use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use kube::core::ObjectMeta;
use lambda_core::common::{BrokerSubstrate, DlqConfig};
use serde_json::json;

use super::names::owned_name;

pub fn broker_api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("eventing.platform.io", "v1", "Broker"))
}

pub fn trigger_api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("eventing.platform.io", "v1", "Trigger"))
}

/// Desired broker manifest, or `None` when the spec reuses an existing
/// broker by name (spec.md §4.2 "Broker reuse").
pub fn build_broker(
    parent_name: &str,
    namespace: &str,
    owner: OwnerReference,
    broker_name_override: Option<&str>,
    substrate: Option<&BrokerSubstrate>,
    dlq: &DlqConfig,
) -> Option<DynamicObject> {
    if broker_name_override.is_some() {
        return None;
    }
    let name = owned_name(parent_name, "broker");
    let mut labels = BTreeMap::new();
    labels.insert("lambda.platform.io/parent".to_string(), parent_name.to_string());
    labels.insert("lambda.platform.io/role".to_string(), "broker".to_string());

    let data = json!({
        "apiVersion": "eventing.platform.io/v1",
        "kind": "Broker",
        "metadata": { "name": name, "namespace": namespace, "labels": labels },
        "spec": {
            "substrate": substrate.map(|s| json!({
                "clusterName": s.cluster_name,
                "namespace": s.namespace,
                "queueType": s.queue_type,
                "parallelism": s.parallelism,
                "prefetch": s.prefetch,
            })),
            "deadLetterQueue": {
                "enabled": dlq.enabled,
                "exchange": dlq.exchange,
                "queue": dlq.queue,
                "maxAttempts": dlq.max_attempts,
            },
        },
    });
    let mut obj: DynamicObject = serde_json::from_value(data).expect("static broker shape always deserializes");
    obj.metadata = ObjectMeta {
        owner_references: Some(vec![owner]),
        ..obj.metadata
    };
    Some(obj)
}

pub fn resolved_broker_name(parent_name: &str, broker_name_override: Option<&str>) -> String {
    broker_name_override.map(str::to_string).unwrap_or_else(|| owned_name(parent_name, "broker"))
}

/// One trigger per subscription, filtering on `type` (and optionally
/// `source`) (spec.md §4.2).
pub fn build_trigger(
    parent_name: &str,
    namespace: &str,
    owner: OwnerReference,
    broker_name: &str,
    subscriber_name: &str,
    event_type: &str,
    source_filter: Option<&str>,
    index: usize,
) -> DynamicObject {
    let name = owned_name(parent_name, &format!("trigger-{index}"));
    let mut labels = BTreeMap::new();
    labels.insert("lambda.platform.io/parent".to_string(), parent_name.to_string());
    labels.insert("lambda.platform.io/role".to_string(), "trigger".to_string());

    let mut filter_attrs = serde_json::Map::new();
    filter_attrs.insert("type".to_string(), json!(event_type));
    if let Some(source) = source_filter {
        filter_attrs.insert("source".to_string(), json!(source));
    }

    let data = json!({
        "apiVersion": "eventing.platform.io/v1",
        "kind": "Trigger",
        "metadata": { "name": name, "namespace": namespace, "labels": labels },
        "spec": {
            "broker": broker_name,
            "filter": { "attributes": filter_attrs },
            "subscriber": { "ref": { "name": subscriber_name } },
        },
    });
    let mut obj: DynamicObject = serde_json::from_value(data).expect("static trigger shape always deserializes");
    obj.metadata = ObjectMeta {
        owner_references: Some(vec![owner]),
        ..obj.metadata
    };
    obj
}

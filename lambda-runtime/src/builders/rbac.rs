//! Service account + role binding builder (spec.md §3.2 entities list,
//! §4.5 "create service account/RBAC if permitted").
use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

use super::names::owned_name;

const DEFAULT_ROLE: &str = "lambda-agent-runtime";

pub fn build_service_account(parent_name: &str, namespace: &str, owner: OwnerReference) -> ServiceAccount {
    let mut labels = BTreeMap::new();
    labels.insert("lambda.platform.io/parent".to_string(), parent_name.to_string());
    labels.insert("lambda.platform.io/role".to_string(), "service-account".to_string());
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(owned_name(parent_name, "sa")),
            namespace: Some(namespace.to_string()),
            owner_references: Some(vec![owner]),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn build_role_binding(parent_name: &str, namespace: &str, owner: OwnerReference, service_account_name: &str) -> RoleBinding {
    let mut labels = BTreeMap::new();
    labels.insert("lambda.platform.io/parent".to_string(), parent_name.to_string());
    labels.insert("lambda.platform.io/role".to_string(), "role-binding".to_string());
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(owned_name(parent_name, "rolebinding")),
            namespace: Some(namespace.to_string()),
            owner_references: Some(vec![owner]),
            labels: Some(labels),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: DEFAULT_ROLE.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: service_account_name.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    }
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
    fn role_binding_subject_matches_service_account() {
        let sa = build_service_account("triage", "ns", owner());
        let rb = build_role_binding("triage", "ns", owner(), sa.metadata.name.as_deref().unwrap());
        assert_eq!(rb.subjects.unwrap()[0].name, "triage-sa");
    }
}

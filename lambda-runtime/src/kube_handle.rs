//! Narrow trait over the subset of `kube::Api<K>` operations the child
//! lifecycle manager needs (spec.md §4.3).
//!
//! Abstracting over this (rather than calling `kube::Api<K>` inline) lets
//! tests substitute an in-memory fake, the way `kube`'s own test suite
//! substitutes a `tower_test` service for its HTTP client.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Failure classification for [`KubeHandle`] operations (spec.md §4.3
/// "Failure model").
#[derive(Debug, thiserror::Error, Clone)]
pub enum HandleError {
    /// Transient API error (network blip, 409 conflict, 429/5xx): the
    /// reconciler should requeue with backoff.
    #[error("retryable: {0}")]
    Retryable(String),
    /// Permanent error (403 forbidden, 422 invalid): surface as a condition,
    /// do not infinite-loop.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl HandleError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandleError::Retryable(_))
    }
}

/// Classify a [`kube::Error`] the way `spec.md` §4.3 requires.
pub fn classify_kube_error(err: &kube::Error) -> HandleError {
    match err {
        kube::Error::Api(resp) if resp.code == 403 || resp.code == 422 => {
            HandleError::Permanent(resp.message.clone())
        }
        other => HandleError::Retryable(other.to_string()),
    }
}

/// CRUD surface the lifecycle manager needs for one owned-object kind `K`
/// in one namespace.
#[async_trait]
pub trait KubeHandle<K>: Send + Sync
where
    K: Clone + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, HandleError>;
    async fn create(&self, namespace: &str, name: &str, obj: &K) -> Result<K, HandleError>;
    async fn apply(&self, namespace: &str, name: &str, obj: &K) -> Result<K, HandleError>;
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), HandleError>;
}

/// Production implementation backed by a real `kube::Api<K>`.
pub struct KubeApiHandle<K> {
    api_for_ns: Arc<dyn Fn(&str) -> kube::Api<K> + Send + Sync>,
    field_manager: String,
}

impl<K> KubeApiHandle<K> {
    pub fn new(client: kube::Client, field_manager: impl Into<String>) -> Self
    where
        K: kube::Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
    {
        let client = client.clone();
        Self {
            api_for_ns: Arc::new(move |ns: &str| kube::Api::namespaced(client.clone(), ns)),
            field_manager: field_manager.into(),
        }
    }
}

impl KubeApiHandle<kube::api::DynamicObject> {
    /// For foreign CRD kinds with no static `k8s-openapi` type (spec.md
    /// §4.2's serverless/broker/trigger/channel/subscription builders),
    /// `DynamicObject`'s `DynamicType` is the `ApiResource` itself rather
    /// than `()`, so this takes one explicitly instead of relying on
    /// [`KubeApiHandle::new`]'s `DynamicType = ()` bound.
    pub fn new_dynamic(client: kube::Client, resource: kube::api::ApiResource, field_manager: impl Into<String>) -> Self {
        let client = client.clone();
        Self {
            api_for_ns: Arc::new(move |ns: &str| kube::Api::namespaced_with(client.clone(), ns, &resource)),
            field_manager: field_manager.into(),
        }
    }
}

#[async_trait]
impl<K> KubeHandle<K> for KubeApiHandle<K>
where
    K: kube::Resource
        + Clone
        + Send
        + Sync
        + 'static
        + serde::de::DeserializeOwned
        + serde::Serialize
        + std::fmt::Debug,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, HandleError> {
        let api = (self.api_for_ns)(namespace);
        match api.get(name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(None),
            Err(e) => Err(classify_kube_error(&e)),
        }
    }

    async fn create(&self, namespace: &str, _name: &str, obj: &K) -> Result<K, HandleError> {
        let api = (self.api_for_ns)(namespace);
        api.create(&kube::api::PostParams::default(), obj)
            .await
            .map_err(|e| classify_kube_error(&e))
    }

    async fn apply(&self, namespace: &str, name: &str, obj: &K) -> Result<K, HandleError> {
        let api = (self.api_for_ns)(namespace);
        let pp = kube::api::PatchParams::apply(&self.field_manager);
        api.patch(name, &pp, &kube::api::Patch::Apply(obj))
            .await
            .map_err(|e| classify_kube_error(&e))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), HandleError> {
        let api = (self.api_for_ns)(namespace);
        match api.delete(name, &kube::api::DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(()),
            Err(e) => Err(classify_kube_error(&e)),
        }
    }
}

/// In-memory fake for unit tests, keyed by `(namespace, name)`.
#[derive(Default)]
pub struct FakeHandle<K> {
    objects: Mutex<HashMap<(String, String), K>>,
    pub deny_capability: Mutex<bool>,
}

impl<K: Clone> FakeHandle<K> {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            deny_capability: Mutex::new(false),
        }
    }

    pub fn snapshot(&self) -> Vec<((String, String), K)> {
        self.objects.lock().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.objects.lock().contains_key(&(namespace.to_string(), name.to_string()))
    }
}

#[async_trait]
impl<K: Clone + Send + Sync + 'static> KubeHandle<K> for FakeHandle<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, HandleError> {
        Ok(self.objects.lock().get(&(namespace.to_string(), name.to_string())).cloned())
    }

    async fn create(&self, namespace: &str, name: &str, obj: &K) -> Result<K, HandleError> {
        if *self.deny_capability.lock() {
            return Err(HandleError::Permanent("capability denied".into()));
        }
        self.objects
            .lock()
            .insert((namespace.to_string(), name.to_string()), obj.clone());
        Ok(obj.clone())
    }

    async fn apply(&self, namespace: &str, name: &str, obj: &K) -> Result<K, HandleError> {
        if *self.deny_capability.lock() {
            return Err(HandleError::Permanent("capability denied".into()));
        }
        self.objects
            .lock()
            .insert((namespace.to_string(), name.to_string()), obj.clone());
        Ok(obj.clone())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), HandleError> {
        self.objects.lock().remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }
}

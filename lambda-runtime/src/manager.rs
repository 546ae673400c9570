//! Child lifecycle manager: create-or-update with drift detection and
//! idempotent delete (spec.md §4.3).
use std::sync::Arc;

use tracing::{debug, info};

use crate::kube_handle::{HandleError, KubeHandle};

/// Outcome of one [`ChildLifecycleManager::ensure`] call, for observability
/// counters (spec.md §4.3 `drifted` probe).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    Patched,
    Unchanged,
}

/// Create-or-update a single owned-object kind `K`, diffing against a
/// caller-supplied spec-equivalence predicate (spec.md §4.3: "a stable field
/// set, spec-only, sorted, zero-valued fields normalized").
///
/// Generic over [`KubeHandle`] rather than `kube::Api<K>` directly so the
/// same ensure/diff logic serves every owned-object kind, and so tests can
/// substitute [`crate::kube_handle::FakeHandle`].
pub struct ChildLifecycleManager<K> {
    handle: Arc<dyn KubeHandle<K>>,
}

impl<K> ChildLifecycleManager<K>
where
    K: Clone + Send + Sync + 'static,
{
    pub fn new(handle: Arc<dyn KubeHandle<K>>) -> Self {
        Self { handle }
    }

    /// `equivalent(observed, desired)` should compare only the spec-only,
    /// caller-normalized field subset (spec.md §4.3) — never status or
    /// opaque metadata, which must be preserved across updates.
    pub async fn ensure(
        &self,
        namespace: &str,
        name: &str,
        desired: &K,
        equivalent: impl Fn(&K, &K) -> bool,
    ) -> Result<EnsureOutcome, HandleError> {
        match self.handle.get(namespace, name).await? {
            None => {
                self.handle.create(namespace, name, desired).await?;
                info!(namespace, name, "created owned object");
                Ok(EnsureOutcome::Created)
            }
            Some(observed) if equivalent(&observed, desired) => {
                debug!(namespace, name, "owned object unchanged");
                Ok(EnsureOutcome::Unchanged)
            }
            Some(_) => {
                self.handle.apply(namespace, name, desired).await?;
                info!(namespace, name, "patched drifted owned object");
                Ok(EnsureOutcome::Patched)
            }
        }
    }

    /// Idempotent delete: not-found is success (spec.md §4.3).
    pub async fn delete_if_exists(&self, namespace: &str, name: &str) -> Result<(), HandleError> {
        self.handle.delete(namespace, name).await
    }

    /// `true` if `desired` differs from the currently observed object (or
    /// the object doesn't exist yet).
    pub async fn drifted(&self, namespace: &str, name: &str, desired: &K, equivalent: impl Fn(&K, &K) -> bool) -> Result<bool, HandleError> {
        match self.handle.get(namespace, name).await? {
            None => Ok(true),
            Some(observed) => Ok(!equivalent(&observed, desired)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube_handle::FakeHandle;

    #[tokio::test]
    async fn first_ensure_creates() {
        let fake = Arc::new(FakeHandle::<String>::new());
        let manager = ChildLifecycleManager::new(fake.clone() as Arc<dyn KubeHandle<String>>);
        let outcome = manager
            .ensure("ns", "obj", &"desired-v1".to_string(), |a, b| a == b)
            .await
            .unwrap();
        assert_eq!(outcome, EnsureOutcome::Created);
        assert!(fake.contains("ns", "obj"));
    }

    #[tokio::test]
    async fn repeated_ensure_with_unchanged_desired_is_idempotent() {
        // I1: repeated reconcile with unchanged inputs produces no further
        // owned-object writes after the first convergence.
        let fake = Arc::new(FakeHandle::<String>::new());
        let manager = ChildLifecycleManager::new(fake.clone() as Arc<dyn KubeHandle<String>>);
        manager
            .ensure("ns", "obj", &"desired-v1".to_string(), |a, b| a == b)
            .await
            .unwrap();
        let outcome = manager
            .ensure("ns", "obj", &"desired-v1".to_string(), |a, b| a == b)
            .await
            .unwrap();
        assert_eq!(outcome, EnsureOutcome::Unchanged);
    }

    #[tokio::test]
    async fn drifted_desired_triggers_patch() {
        let fake = Arc::new(FakeHandle::<String>::new());
        let manager = ChildLifecycleManager::new(fake.clone() as Arc<dyn KubeHandle<String>>);
        manager
            .ensure("ns", "obj", &"desired-v1".to_string(), |a, b| a == b)
            .await
            .unwrap();
        let outcome = manager
            .ensure("ns", "obj", &"desired-v2".to_string(), |a, b| a == b)
            .await
            .unwrap();
        assert_eq!(outcome, EnsureOutcome::Patched);
    }

    #[tokio::test]
    async fn delete_if_exists_is_idempotent() {
        let fake = Arc::new(FakeHandle::<String>::new());
        let manager = ChildLifecycleManager::new(fake.clone() as Arc<dyn KubeHandle<String>>);
        manager.delete_if_exists("ns", "missing").await.unwrap();
        manager
            .ensure("ns", "obj", &"v1".to_string(), |a, b| a == b)
            .await
            .unwrap();
        manager.delete_if_exists("ns", "obj").await.unwrap();
        manager.delete_if_exists("ns", "obj").await.unwrap();
        assert!(!fake.contains("ns", "obj"));
    }
}

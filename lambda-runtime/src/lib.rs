//! Desired-object builders, child lifecycle manager, permission gate, and
//! queueing support for the Lambda platform operator.
//!
//! This crate holds the business logic atop `kube::runtime::Controller`;
//! it mirrors the role `kube-runtime` plays for `kube`, but depends on
//! [`lambda_core`] types instead of being generic over any `K`, except
//! where `K` genuinely varies per owned-object kind (`kube_handle`,
//! `manager`).
pub mod backoff;
pub mod builders;
pub mod kube_handle;
pub mod manager;
pub mod permissions;
pub mod queue;

pub use backoff::Backoff;
pub use kube_handle::{FakeHandle, HandleError, KubeApiHandle, KubeHandle};
pub use manager::{ChildLifecycleManager, EnsureOutcome};
pub use permissions::{capability_str, Capability, Decision, PermissionGate};
pub use queue::ReconcileQueue;

//! Type model, validation, and status/condition engine for the Lambda
//! platform operator (spec.md §3, §4.1, §4.6).
//!
//! This crate has no Kubernetes client dependency beyond `kube`'s `derive`
//! feature (for `#[derive(CustomResource)]`) and `k8s-openapi` (for shared
//! metadata types) — it mirrors the role `kube-core` plays for `kube`.

pub mod agent;
pub mod common;
pub mod condition;
pub mod duration;
pub mod error;
pub mod function;
pub mod phase;
pub mod validation;

pub use agent::{AgentSpec, AgentStatus, LambdaAgent};
pub use condition::{Condition, ConditionStatus};
pub use duration::Duration;
pub use error::{Violation, Violations};
pub use function::{FunctionSpec, FunctionStatus, LambdaFunction};

//! Pure desired-object builders, one module per owned-object class
//! (spec.md §4.2). Every function here is side-effect-free: inputs are the
//! parent spec plus any cross-reference info already resolved earlier in
//! the same reconcile, output is a fully materialized manifest.
pub mod build_job;
pub mod eventing;
pub mod forward;
pub mod names;
pub mod observability;
pub mod rbac;
pub mod serverless;

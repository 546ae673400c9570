//! Operator-level error taxonomy (spec.md §7).
use lambda_core::error::Violations;
use lambda_runtime::HandleError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("spec invalid: {0}")]
    SpecInvalid(Violations),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("dependent not ready: {0}")]
    DependentNotReady(String),

    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("owned-object operation failed: {0}")]
    Handle(#[from] HandleError),

    #[error("finalizer error: {0}")]
    Finalizer(#[from] Box<kube::runtime::finalizer::Error<Error>>),

    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short, stable token for metrics labels and condition reasons
    /// (spec.md §7 "reason (stable short token)").
    pub fn reason(&self) -> &'static str {
        match self {
            Error::SpecInvalid(_) => "SpecInvalid",
            Error::PermissionDenied(_) => "PermissionDenied",
            Error::DependentNotReady(_) => "DependentNotReady",
            Error::UpstreamFailure(_) => "UpstreamFailure",
            Error::Handle(e) if e.is_retryable() => "DependentNotReady",
            Error::Handle(_) => "PermissionDenied",
            Error::Finalizer(_) => "Internal",
            Error::Kube(_) => "Internal",
            Error::Internal(_) => "Internal",
        }
    }

    /// Whether this error should drive an exponential-backoff requeue
    /// (transient) rather than surface as a terminal condition.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::DependentNotReady(_) | Error::UpstreamFailure(_) | Error::Kube(_) | Error::Internal(_)
        ) || matches!(self, Error::Handle(e) if e.is_retryable())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! Structural validation errors (spec.md §4.1).
use std::fmt;

/// One structural constraint violation, carrying the offending field path.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("{field}: exactly one source variant must be populated, found {found}")]
    MultipleOrNoSourceVariants { field: String, found: usize },
    #[error("{field}: {message}")]
    Pattern { field: String, message: String },
    #[error("{field}: length {actual} outside allowed range {min}..={max}")]
    LengthOutOfRange {
        field: String,
        actual: usize,
        min: usize,
        max: usize,
    },
    #[error("{field}: value {value} outside allowed range {min}..={max}")]
    NumberOutOfRange { field: String, value: String, min: String, max: String },
    #[error("{field}: {message}")]
    InvalidEnum { field: String, message: String },
    #[error("{field}: targetConcurrency ({target}) must be <= containerConcurrency ({cap})")]
    ConcurrencyOrdering { field: String, target: u32, cap: u32 },
    #[error("{field}: minReplicas ({min}) must be <= maxReplicas ({max})")]
    ReplicaOrdering { field: String, min: u32, max: u32 },
    #[error("{field}: handler must be of the form '<module>.<function>', got {actual:?}")]
    InvalidHandler { field: String, actual: String },
    #[error("{field}: {message}")]
    Other { field: String, message: String },
}

impl Violation {
    pub fn field(&self) -> &str {
        match self {
            Violation::MultipleOrNoSourceVariants { field, .. }
            | Violation::Pattern { field, .. }
            | Violation::LengthOutOfRange { field, .. }
            | Violation::NumberOutOfRange { field, .. }
            | Violation::InvalidEnum { field, .. }
            | Violation::ConcurrencyOrdering { field, .. }
            | Violation::ReplicaOrdering { field, .. }
            | Violation::InvalidHandler { field, .. }
            | Violation::Other { field, .. } => field,
        }
    }
}

/// An ordered sequence of violations produced by validating a spec.
///
/// Ordered because spec.md §4.1 requires the *first* violation's message to
/// populate the `SpecInvalid` condition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Violations(pub Vec<Violation>);

impl Violations {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first_message(&self) -> Option<String> {
        self.0.first().map(ToString::to_string)
    }

    pub fn push(&mut self, v: Violation) {
        self.0.push(v);
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
        f.write_str(&joined)
    }
}

impl IntoIterator for Violations {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

//! Error types for the reaping engine

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, JanitorError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JanitorError {
    /// Kubernetes API error
    #[error("kubernetes api error: {0}")]
    Api(#[from] kube::Error),

    /// Server discovery failed. Aborts the current run; every wildcard
    /// expansion would be poisoned without the catalog.
    #[error("api discovery failed: {0}")]
    Discovery(#[source] kube::Error),

    /// Deleting an expired resource failed. Surfaced up the rule loop.
    #[error("failed to delete {group_version_kind} {namespace}/{name}: {source}")]
    Delete {
        group_version_kind: String,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    /// A label selector that cannot be formatted server-side
    #[error("invalid label selector: {0}")]
    Selector(#[from] janitor_core::SelectorError),
}

impl JanitorError {
    /// Errors that abort the whole run rather than a single rule.
    pub fn is_fatal(&self) -> bool {
        matches!(self, JanitorError::Discovery(_))
    }
}

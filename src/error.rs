//! Crate-wide error type.
//!
//! Mirrors the error classification in the reconciliation design: transient
//! API errors are distinguished from fatal validation/configuration errors so
//! that `controller::error_policy` can decide how (and whether) to requeue.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Any Kubernetes API error that wasn't already classified below.
    /// Treated as transient by default (conflict / not-found-on-just-created).
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// The CR's spec is invalid (bad cron expression, mutually exclusive
    /// fields set, missing required field for the chosen mover/copyMethod).
    /// Fatal: do not requeue until the spec's resourceVersion changes.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced external object (Secret, ConfigMap) is missing or
    /// missing a required key. Requeue-on-watch: presence re-triggers.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The thing we're waiting on (snapshot binding, PVC bound, job
    /// completion) isn't ready yet. Short requeue.
    #[error("not ready: {0}")]
    NotReady(String),

    /// An update touched an immutable field; the object must be deleted and
    /// recreated on the next pass.
    #[error("immutable field on {kind} {name}, deleting for recreation")]
    Immutable { kind: String, name: String },

    /// The mover's worker Job reached a terminal Failed state.
    #[error("mover run failed: {0}")]
    MoverFailed(String),

    /// Anything else — logged and bubbled to the framework for exponential
    /// backoff.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// True for errors that should be retried shortly without being
    /// surfaced as a user-facing condition.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(e)) => e.code == 409 || e.code == 404,
            Error::NotReady(_) => true,
            Error::Immutable { .. } => true,
            _ => false,
        }
    }

    /// True for errors that should be surfaced on `status.conditions` and
    /// not retried until the spec changes.
    pub fn is_fatal_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

//! Error taxonomy for the live-view host.
//!
//! Propagation policy: [`LiveViewError::MalformedMessage`],
//! [`LiveViewError::UnknownReference`] and [`LiveViewError::KindMismatch`]
//! are absorbed at the session boundary (logged, state untouched). Only
//! [`LiveViewError::InvariantViolation`] and [`LiveViewError::TransportFault`]
//! may terminate or visibly interrupt a session.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LiveViewError {
    /// The codec could not decode an inbound envelope.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A plane or object id was not found at command time. Refs may race
    /// surface/object lifecycle, so this is recoverable.
    #[error("unknown reference: {0}")]
    UnknownReference(String),

    /// A command targeted an object of the wrong kind (e.g. color on a
    /// non-shape). Recoverable.
    #[error("kind mismatch: {0}")]
    KindMismatch(String),

    /// The sandboxed process broke its own contract (e.g. actor actions for
    /// an object it never declared as an actor). Fatal.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The underlying session reported a hard error. Surfaced to the user
    /// as a terminal message, never retried automatically.
    #[error("transport fault: {0}")]
    TransportFault(String),
}

impl LiveViewError {
    /// True for errors the session absorbs (log + no-op) rather than
    /// propagating.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LiveViewError::MalformedMessage(_)
                | LiveViewError::UnknownReference(_)
                | LiveViewError::KindMismatch(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LiveViewError>;

//! Error types shared across the configuration core
//!
//! Every failure mode the control plane can surface is a stable variant
//! here, so callers test kinds instead of matching on message text.

use thiserror::Error;

use crate::config::validate::ValidationErrors;
use crate::config::wire::ConversionError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the configuration core
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Wire document could not be projected into the domain model
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// One or more configuration invariants failed
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// A state machine was asked to perform a forbidden transition
    #[error("illegal state transition from {from} to {to}")]
    IllegalState { from: String, to: String },

    /// A participant rejected the staged configuration
    #[error("participant {participant} failed to stage configuration: {message}")]
    ParticipantStage { participant: String, message: String },

    /// A participant failed while activating a committed configuration
    #[error("participant {participant} failed to activate configuration: {message}")]
    ParticipantActivate { participant: String, message: String },

    /// The cancellation token fired before the saga committed
    #[error("operation canceled")]
    Canceled,

    /// The update's wall-clock budget elapsed before the saga committed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Configuration document loader error
    #[error("configuration loader error: {0}")]
    Loader(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// gRPC transport error
    #[error("transport error: {0}")]
    Transport(Box<tonic::transport::Error>),

    /// RPC status returned by the control-plane transport
    #[error("rpc error: {0}")]
    Rpc(Box<tonic::Status>),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Construct an illegal-transition error from state display names
    pub fn illegal_state(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::IllegalState {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Whether this error came from the wire-to-domain projection
    pub fn is_conversion(&self) -> bool {
        matches!(self, Self::Conversion(_))
    }

    /// Whether this error carries failed validation invariants
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether this error aborted the saga before commit
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }

    /// Stable machine-readable kind name, mirrored into control-plane
    /// failure responses
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Conversion(_) => "conversion",
            Self::Validation(_) => "validation",
            Self::IllegalState { .. } => "illegal_state",
            Self::ParticipantStage { .. } => "participant_stage",
            Self::ParticipantActivate { .. } => "participant_activate",
            Self::Canceled => "canceled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Loader(_) => "loader",
            Self::Io(_) => "io",
            Self::Transport(_) => "transport",
            Self::Rpc(_) => "rpc",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::Loader(Box::new(e))
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(e: tonic::transport::Error) -> Self {
        Self::Transport(Box::new(e))
    }
}

impl From<tonic::Status> for Error {
    fn from(status: tonic::Status) -> Self {
        Self::Rpc(Box::new(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_stable() {
        assert_eq!(Error::Canceled.kind_name(), "canceled");
        assert_eq!(Error::DeadlineExceeded.kind_name(), "deadline_exceeded");
        assert_eq!(
            Error::illegal_state("Created", "Succeeded").kind_name(),
            "illegal_state"
        );
    }

    #[test]
    fn test_cancellation_predicate_covers_timeout() {
        assert!(Error::Canceled.is_canceled());
        assert!(Error::DeadlineExceeded.is_canceled());
        assert!(!Error::Internal("boom".to_string()).is_canceled());
    }
}

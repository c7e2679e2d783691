//! Error types for the pipeline.
//!
//! The taxonomy separates assembly defects, transport failures, caller
//! cancellation and retry-specific failures. Non-success HTTP statuses are not
//! errors here: they travel back up the chain as ordinary responses so callers
//! keep the status, headers and body untouched.

use crate::http::Response;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Boxed error used as a failure cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The pipeline was assembled incorrectly.
    #[error("Pipeline configuration error: {0}")]
    Configuration(String),

    /// A cursor was advanced past the transport.
    #[error("no more policies to execute (cursor {index}, {policy_count} policies)")]
    NoMorePolicies {
        /// The cursor position that was requested.
        index: usize,
        /// The number of policies in the pipeline.
        policy_count: usize,
    },

    /// The transport failed to produce a response.
    #[error("Transport error ({kind}): {message}")]
    Transport {
        /// Failure classification.
        kind: TransportErrorKind,
        /// Human readable description.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// A retry was required but the request body cannot be sent twice.
    #[error("request body is not replayable; cannot retry after attempt {attempts}")]
    BodyNotReplayable {
        /// Attempts already sent.
        attempts: u32,
        /// The failure that made the retry necessary.
        #[source]
        last: Box<RetryCause>,
    },

    /// The call was cancelled by the caller.
    #[error("Pipeline cancelled: {0}")]
    Cancelled(String),

    /// The per-call deadline elapsed.
    #[error("Pipeline call timed out after {0:?}")]
    Timeout(Duration),

    /// A credential could not be obtained or may not be used.
    #[error("Credential error: {0}")]
    Credential(String),

    /// A policy failed for a reason of its own.
    #[error("Policy '{policy}' failed: {message}")]
    Policy {
        /// Name of the failing policy.
        policy: String,
        /// Failure description.
        message: String,
    },

    /// The sync/async bridge could not obtain a runtime.
    #[error("Execution bridge error: {0}")]
    Bridge(String),

    /// A header name or value is not valid HTTP.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl PipelineError {
    /// Creates a transport error without an underlying cause.
    #[must_use]
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transport error wrapping an underlying cause.
    #[must_use]
    pub fn transport_with_source(
        kind: TransportErrorKind,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a policy error.
    #[must_use]
    pub fn policy(policy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Policy {
            policy: policy.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error is usually worth retrying.
    ///
    /// Connection, timeout and I/O transport failures are transient. Every
    /// other variant either signals a defect or a caller decision.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { kind, .. } => kind.is_transient(),
            _ => false,
        }
    }

    /// Returns the transport failure kind, if this is a transport error.
    #[must_use]
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Self::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Classification of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The connection could not be established.
    Connect,
    /// The transport gave up waiting for the peer.
    Timeout,
    /// Reading or writing the connection failed.
    Io,
    /// The peer violated the HTTP protocol.
    Protocol,
    /// Anything else.
    Other,
}

impl TransportErrorKind {
    /// Returns true for kinds that are retryable by default.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Connect | Self::Timeout | Self::Io)
    }
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Io => "io",
            Self::Protocol => "protocol",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// The failure that triggered a retry which could not be performed.
#[derive(Debug, Error)]
pub enum RetryCause {
    /// The previous attempt returned a retryable response, kept whole.
    #[error("previous attempt returned status {}", .0.status)]
    Response(Box<Response>),
    /// The previous attempt failed with an error.
    #[error("previous attempt failed: {0}")]
    Error(#[source] PipelineError),
}

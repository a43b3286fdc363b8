//! Error types for the state synchronization engine.
//!
//! `SyncError` is the single error type returned by every round trip. It is built
//! with `thiserror` and uses `#[from]` so lower layers (token lookup, transport,
//! profile loading) can be propagated with `?`.
//!
//! ## Error Hierarchy
//!
//! - **`Configuration`**: a token table or profile is malformed (duplicate or empty
//!   tokens, duplicate values, bad templates). Raised at startup and never recovered.
//! - **`Config`**: the profile file itself could not be loaded or deserialized.
//! - **`Parse`**: a device reply could not be mapped to a typed value.
//! - **`Transport`**: the collaborator that moves lines to and from the instrument
//!   failed. Propagated opaquely; this crate never retries.
//! - **`Template`**: a command template could not be rendered.
//!
//! An attribute whose command string is empty is *unsupported*. That is a defined
//! degraded mode, not an error, so it has no variant here.

use thiserror::Error;

/// Convenience alias for results using [`SyncError`].
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Broad category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Underlying socket or port I/O failed.
    Io,
    /// No reply arrived within the configured timeout.
    Timeout,
    /// The peer closed the connection.
    Closed,
    /// The transport refused the request (for example an injected mock failure).
    Rejected,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TransportErrorKind::Io => "io",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Closed => "closed",
            TransportErrorKind::Rejected => "rejected",
        };
        write!(f, "{}", label)
    }
}

/// Failure reported by an [`ScpiTransport`](crate::transport::ScpiTransport).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Transport {kind} error: {message}")]
pub struct TransportError {
    /// What went wrong.
    pub kind: TransportErrorKind,
    /// Human readable detail, usually naming the command involved.
    pub message: String,
}

impl TransportError {
    /// Create a new transport error.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe => TransportErrorKind::Closed,
            _ => TransportErrorKind::Io,
        };
        Self::new(kind, err.to_string())
    }
}

/// A device reply that could not be mapped to a typed value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The token is absent from the enumeration's token table.
    #[error("Unknown wire token '{token}'")]
    UnknownToken {
        /// The offending token, trimmed.
        token: String,
    },

    /// A scalar reply did not parse as the attribute's native type.
    #[error("Invalid reply '{reply}' for attribute '{attribute}'")]
    InvalidValue {
        /// Attribute being decoded.
        attribute: String,
        /// Raw reply text.
        reply: String,
    },
}

/// Primary error type for the synchronization engine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Profile file loading or deserialization failed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Semantic configuration error (token tables, templates, profile values).
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// A reply could not be decoded.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// The transport collaborator failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A command template could not be rendered.
    #[error("Command template error: {0}")]
    Template(String),
}

impl From<figment::Error> for SyncError {
    fn from(err: figment::Error) -> Self {
        SyncError::Config(Box::new(err))
    }
}

impl From<strfmt::FmtError> for SyncError {
    fn from(err: strfmt::FmtError) -> Self {
        SyncError::Template(err.to_string())
    }
}

//! Error types for request execution.

use crate::descriptor::RequestDescriptor;
use crate::response::Response;
use std::fmt;
use thiserror::Error;

/// Category of a real transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection, DNS or I/O failure before a response arrived
    Network,
    /// A response arrived with a non-success status
    Status,
    /// The transport's own timeout elapsed
    Timeout,
    /// The response body could not be read or decoded
    Decode,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Status => write!(f, "status"),
            Self::Timeout => write!(f, "timeout"),
            Self::Decode => write!(f, "decode"),
        }
    }
}

/// Errors produced while executing a request
///
/// Stored in consumer state and returned to refetch callers, so it is `Clone`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    /// A real failure surfaced by the transport
    #[error("Transport {kind} error: {message}")]
    Transport {
        /// Failure category
        kind: TransportErrorKind,
        /// Human-readable description
        message: String,
        /// HTTP status, when a response arrived
        status: Option<u16>,
        /// The failing response, when one arrived
        response: Option<Box<Response>>,
    },

    /// The request was aborted through its signal
    ///
    /// Never reaches consumer state.
    #[error("Request cancelled")]
    Cancelled,

    /// A failure that did not come from the transport in its native shape
    #[error("Wrapped error: {message}")]
    Wrapped {
        /// Description of the original failure
        message: String,
        /// The descriptor that was being executed
        descriptor: Box<RequestDescriptor>,
    },
}

impl RequestError {
    /// A connection-level failure
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Transport {
            kind: TransportErrorKind::Network,
            message: message.into(),
            status: None,
            response: None,
        }
    }

    /// A non-success response
    #[must_use]
    pub fn status(response: Response) -> Self {
        let status = response.status;
        Self::Transport {
            kind: TransportErrorKind::Status,
            message: format!("Request failed with status code {status}"),
            status: Some(status),
            response: Some(Box::new(response.into_cacheable())),
        }
    }

    /// The transport's timeout elapsed
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Transport {
            kind: TransportErrorKind::Timeout,
            message: message.into(),
            status: None,
            response: None,
        }
    }

    /// The body could not be decoded
    #[must_use]
    pub fn decode(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Transport {
            kind: TransportErrorKind::Decode,
            message: message.into(),
            status,
            response: None,
        }
    }

    /// Wrap an arbitrary failure together with the descriptor being executed
    #[must_use]
    pub fn wrapped(message: impl fmt::Display, descriptor: &RequestDescriptor) -> Self {
        let mut descriptor = descriptor.clone();
        descriptor.signal = None;
        Self::Wrapped {
            message: message.to_string(),
            descriptor: Box::new(descriptor),
        }
    }

    /// Whether this error signals an aborted request
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Stable error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Transport { kind, .. } => match kind {
                TransportErrorKind::Network => "ERR_NETWORK",
                TransportErrorKind::Status => "ERR_BAD_RESPONSE",
                TransportErrorKind::Timeout => "ETIMEDOUT",
                TransportErrorKind::Decode => "ERR_BAD_RESPONSE_BODY",
            },
            Self::Cancelled => "ERR_CANCELED",
            Self::Wrapped { .. } => "ERR_WRAPPED",
        }
    }

    /// HTTP status of the failing response, if any
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            Self::Cancelled | Self::Wrapped { .. } => None,
        }
    }

    /// The failing response, if any
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Transport { response, .. } => response.as_deref(),
            Self::Cancelled | Self::Wrapped { .. } => None,
        }
    }
}

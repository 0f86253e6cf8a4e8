// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for typed OPC UA access.
//!
//! Every failure surfaced by the client is a [`UaError`]. The taxonomy is
//! closed and each variant carries the numeric [`StatusCode`] that caused it,
//! either as reported by the server or assigned locally.
//!
//! # Error Categories
//!
//! ```text
//! UaError
//! ├── NodeNotFound         - address does not resolve
//! ├── AccessDenied         - read or write refused
//! ├── TypeMismatch         - stored type differs from the requested one
//! ├── ValueOutOfRange      - value does not fit the wire type
//! ├── ArityMismatch        - batch names and values differ in length
//! ├── ConnectionTimeout    - connect or request exceeded its deadline
//! ├── ConnectionClosed     - channel or session is gone
//! ├── PartialWriteFailure  - some elements of a batch write failed
//! └── Protocol             - any other bad status code
//! ```
//!
//! [`ErrorTranslator`] maps protocol status codes into this taxonomy.
//!
//! # Examples
//!
//! ```
//! use opcua_typed::{ErrorKind, ErrorTranslator, NodeAddress, StatusCode};
//!
//! let address = NodeAddress::new(12, "missing");
//! let error = ErrorTranslator::for_node(StatusCode::BAD_NODE_ID_UNKNOWN, &address, "Byte");
//! assert_eq!(error.kind(), ErrorKind::NodeNotFound);
//! assert_eq!(error.status_code(), StatusCode::BAD_NODE_ID_UNKNOWN);
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

use crate::address::NodeAddress;
use crate::status::StatusCode;

/// Result type alias for typed OPC UA operations.
pub type UaResult<T> = Result<T, UaError>;

// =============================================================================
// UaError - Main Error Type
// =============================================================================

/// A failure surfaced by [`TypedAccessClient`](crate::TypedAccessClient).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UaError {
    /// The address does not resolve to a node on the server.
    #[error("Node not found: {address} ({status})")]
    NodeNotFound {
        /// The address that failed to resolve.
        address: NodeAddress,
        /// Status code reported by the server.
        status: StatusCode,
    },

    /// The server refused read or write access.
    #[error("Access denied: {address} ({status})")]
    AccessDenied {
        /// The node access was refused on.
        address: NodeAddress,
        /// Status code reported by the server.
        status: StatusCode,
    },

    /// The stored value's type differs from the requested one.
    #[error("Type mismatch on {subject}: expected {expected}, got {actual} ({status})")]
    TypeMismatch {
        /// Node address or input being converted.
        subject: String,
        /// Requested type.
        expected: String,
        /// Type actually found.
        actual: String,
        /// Status code (server-reported or `BadTypeMismatch`).
        status: StatusCode,
    },

    /// The value cannot be represented by the target wire type.
    #[error("Value out of range for {subject}: {detail} ({status})")]
    ValueOutOfRange {
        /// Wire type or node the value was destined for.
        subject: String,
        /// What was out of range.
        detail: String,
        /// Status code (`BadOutOfRange`).
        status: StatusCode,
    },

    /// Batch names and values differ in length. Nothing was written.
    #[error("Arity mismatch: {names} names but {values} values ({status})")]
    ArityMismatch {
        /// Number of names supplied.
        names: usize,
        /// Number of values supplied.
        values: usize,
        /// Always `BadInvalidArgument`.
        status: StatusCode,
    },

    /// A connect or request did not complete in time.
    #[error("Connection timeout during {context}{} ({status})", format_timeout(.timeout))]
    ConnectionTimeout {
        /// What was in flight.
        context: String,
        /// Local deadline that elapsed, if the timeout was detected locally.
        timeout: Option<Duration>,
        /// `BadTimeout` or the code reported by the server.
        status: StatusCode,
    },

    /// The channel or session is closed or was never established.
    #[error("Connection closed during {context} ({status})")]
    ConnectionClosed {
        /// What was in flight.
        context: String,
        /// Status code describing the closure.
        status: StatusCode,
    },

    /// One or more elements of a batch write failed.
    #[error(
        "Partial write failure: {} of {total} writes failed, first at index {} ({status})",
        .failures.len(),
        first_failed_index(.failures)
    )]
    PartialWriteFailure {
        /// Every failed element, in request order.
        failures: Vec<WriteFailure>,
        /// Indices of elements the server accepted.
        committed: Vec<usize>,
        /// Number of elements in the batch.
        total: usize,
        /// Status code of the first failed element.
        status: StatusCode,
    },

    /// Any bad status without a dedicated variant.
    #[error("Protocol error during {context}: {status}")]
    Protocol {
        /// What was in flight.
        context: String,
        /// Status code reported by the engine or server.
        status: StatusCode,
    },
}

fn format_timeout(timeout: &Option<Duration>) -> String {
    timeout
        .map(|t| format!(" after {}ms", t.as_millis()))
        .unwrap_or_default()
}

fn first_failed_index(failures: &[WriteFailure]) -> usize {
    failures.first().map(|f| f.index).unwrap_or_default()
}

impl UaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates an arity mismatch error.
    pub fn arity_mismatch(names: usize, values: usize) -> Self {
        Self::ArityMismatch {
            names,
            values,
            status: StatusCode::BAD_INVALID_ARGUMENT,
        }
    }

    /// Creates a locally detected type mismatch.
    pub fn type_mismatch(
        subject: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            subject: subject.into(),
            expected: expected.to_string(),
            actual: actual.into(),
            status: StatusCode::BAD_TYPE_MISMATCH,
        }
    }

    /// Creates a locally detected range violation.
    pub fn out_of_range(subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ValueOutOfRange {
            subject: subject.into(),
            detail: detail.into(),
            status: StatusCode::BAD_OUT_OF_RANGE,
        }
    }

    /// Creates a locally detected timeout.
    pub fn timeout(context: impl Into<String>, timeout: Duration) -> Self {
        Self::ConnectionTimeout {
            context: context.into(),
            timeout: Some(timeout),
            status: StatusCode::BAD_TIMEOUT,
        }
    }

    /// Creates a connection-closed error.
    pub fn closed(context: impl Into<String>, status: StatusCode) -> Self {
        Self::ConnectionClosed {
            context: context.into(),
            status,
        }
    }

    /// Creates the error returned when an operation runs without an active session.
    pub fn not_activated(context: impl Into<String>) -> Self {
        Self::closed(context, StatusCode::BAD_SESSION_NOT_ACTIVATED)
    }

    /// Creates a protocol error.
    pub fn protocol(context: impl Into<String>, status: StatusCode) -> Self {
        Self::Protocol {
            context: context.into(),
            status,
        }
    }

    /// Translates a service-level status code; see [`ErrorTranslator::for_service`].
    pub fn from_status(status: StatusCode, context: impl Into<String>) -> Self {
        ErrorTranslator::for_service(status, context)
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NodeNotFound { .. } => ErrorKind::NodeNotFound,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::ValueOutOfRange { .. } => ErrorKind::ValueOutOfRange,
            Self::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            Self::ConnectionTimeout { .. } => ErrorKind::ConnectionTimeout,
            Self::ConnectionClosed { .. } => ErrorKind::ConnectionClosed,
            Self::PartialWriteFailure { .. } => ErrorKind::PartialWriteFailure,
            Self::Protocol { .. } => ErrorKind::Protocol,
        }
    }

    /// Returns the status code carried by this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NodeNotFound { status, .. }
            | Self::AccessDenied { status, .. }
            | Self::TypeMismatch { status, .. }
            | Self::ValueOutOfRange { status, .. }
            | Self::ArityMismatch { status, .. }
            | Self::ConnectionTimeout { status, .. }
            | Self::ConnectionClosed { status, .. }
            | Self::PartialWriteFailure { status, .. }
            | Self::Protocol { status, .. } => *status,
        }
    }

    /// Returns `true` if the connection is no longer usable after this error.
    ///
    /// The client tears itself down to `Disconnected` when an operation
    /// surfaces such an error.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConnectionTimeout | ErrorKind::ConnectionClosed
        )
    }

    /// Returns the severity of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self.kind() {
            ErrorKind::ConnectionTimeout | ErrorKind::ConnectionClosed => ErrorSeverity::Critical,
            ErrorKind::PartialWriteFailure | ErrorKind::Protocol => ErrorSeverity::Error,
            ErrorKind::NodeNotFound
            | ErrorKind::AccessDenied
            | ErrorKind::TypeMismatch
            | ErrorKind::ValueOutOfRange
            | ErrorKind::ArityMismatch => ErrorSeverity::Warning,
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs the error with structured fields at its severity level.
    pub fn log(&self, context: &str) {
        let status = self.status_code();
        match self.severity() {
            ErrorSeverity::Error | ErrorSeverity::Critical => tracing::error!(
                kind = %self.kind(),
                status = %status,
                context = context,
                "{self}"
            ),
            ErrorSeverity::Warning => tracing::warn!(
                kind = %self.kind(),
                status = %status,
                context = context,
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ErrorKind
// =============================================================================

/// Discriminant of [`UaError`], stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`UaError::NodeNotFound`].
    NodeNotFound,
    /// See [`UaError::AccessDenied`].
    AccessDenied,
    /// See [`UaError::TypeMismatch`].
    TypeMismatch,
    /// See [`UaError::ValueOutOfRange`].
    ValueOutOfRange,
    /// See [`UaError::ArityMismatch`].
    ArityMismatch,
    /// See [`UaError::ConnectionTimeout`].
    ConnectionTimeout,
    /// See [`UaError::ConnectionClosed`].
    ConnectionClosed,
    /// See [`UaError::PartialWriteFailure`].
    PartialWriteFailure,
    /// See [`UaError::Protocol`].
    Protocol,
}

impl ErrorKind {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NodeNotFound => "node_not_found",
            Self::AccessDenied => "access_denied",
            Self::TypeMismatch => "type_mismatch",
            Self::ValueOutOfRange => "value_out_of_range",
            Self::ArityMismatch => "arity_mismatch",
            Self::ConnectionTimeout => "connection_timeout",
            Self::ConnectionClosed => "connection_closed",
            Self::PartialWriteFailure => "partial_write_failure",
            Self::Protocol => "protocol",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// WriteFailure
// =============================================================================

/// One failed element of a batch write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFailure {
    /// Position in the submitted batch.
    pub index: usize,
    /// Target node.
    pub address: NodeAddress,
    /// Status code the server returned for this element.
    pub status: StatusCode,
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.index, self.address, self.status)
    }
}

// =============================================================================
// ErrorTranslator
// =============================================================================

/// Maps protocol status codes into [`UaError`].
///
/// The mapping is total: any code without a dedicated kind becomes
/// [`UaError::Protocol`]. Classification ignores the info bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorTranslator;

impl ErrorTranslator {
    /// Returns the kind a status code maps to.
    pub fn classify(status: StatusCode) -> ErrorKind {
        match status.main_code() {
            StatusCode::BAD_NODE_ID_UNKNOWN
            | StatusCode::BAD_NODE_ID_INVALID
            | StatusCode::BAD_NOT_FOUND => ErrorKind::NodeNotFound,

            StatusCode::BAD_USER_ACCESS_DENIED
            | StatusCode::BAD_NOT_READABLE
            | StatusCode::BAD_NOT_WRITABLE => ErrorKind::AccessDenied,

            StatusCode::BAD_TYPE_MISMATCH | StatusCode::BAD_DATA_TYPE_ID_UNKNOWN => {
                ErrorKind::TypeMismatch
            }

            StatusCode::BAD_OUT_OF_RANGE => ErrorKind::ValueOutOfRange,

            StatusCode::BAD_TIMEOUT | StatusCode::BAD_REQUEST_TIMEOUT => {
                ErrorKind::ConnectionTimeout
            }

            StatusCode::BAD_CONNECTION_CLOSED
            | StatusCode::BAD_SECURE_CHANNEL_CLOSED
            | StatusCode::BAD_SESSION_CLOSED
            | StatusCode::BAD_SESSION_NOT_ACTIVATED
            | StatusCode::BAD_SESSION_ID_INVALID
            | StatusCode::BAD_SERVER_NOT_CONNECTED
            | StatusCode::BAD_DISCONNECT
            | StatusCode::BAD_CONNECTION_REJECTED
            | StatusCode::BAD_NO_COMMUNICATION
            | StatusCode::BAD_COMMUNICATION_ERROR
            | StatusCode::BAD_SHUTDOWN => ErrorKind::ConnectionClosed,

            _ => ErrorKind::Protocol,
        }
    }

    /// Translates a per-node status code.
    ///
    /// `expected` names the type the caller asked for; it is only used to
    /// describe a type mismatch.
    pub fn for_node(
        status: StatusCode,
        address: &NodeAddress,
        expected: impl fmt::Display,
    ) -> UaError {
        match Self::classify(status) {
            ErrorKind::NodeNotFound => UaError::NodeNotFound {
                address: address.clone(),
                status,
            },
            ErrorKind::AccessDenied => UaError::AccessDenied {
                address: address.clone(),
                status,
            },
            ErrorKind::TypeMismatch => UaError::TypeMismatch {
                subject: address.to_string(),
                expected: expected.to_string(),
                actual: "a different server type".to_string(),
                status,
            },
            ErrorKind::ValueOutOfRange => UaError::ValueOutOfRange {
                subject: address.to_string(),
                detail: "rejected by server".to_string(),
                status,
            },
            _ => Self::for_service(status, address.to_string()),
        }
    }

    /// Translates a service-level status code (no single node involved).
    pub fn for_service(status: StatusCode, context: impl Into<String>) -> UaError {
        let context = context.into();
        match Self::classify(status) {
            ErrorKind::ConnectionTimeout => UaError::ConnectionTimeout {
                context,
                timeout: None,
                status,
            },
            ErrorKind::ConnectionClosed => UaError::ConnectionClosed { context, status },
            ErrorKind::TypeMismatch => UaError::TypeMismatch {
                subject: context,
                expected: "server type".to_string(),
                actual: "a different type".to_string(),
                status,
            },
            ErrorKind::ValueOutOfRange => UaError::ValueOutOfRange {
                subject: context,
                detail: "rejected by server".to_string(),
                status,
            },
            _ => UaError::Protocol { context, status },
        }
    }

    /// Builds the batch write outcome from per-element status codes.
    ///
    /// Returns `Ok(())` when every element is good.
    pub fn for_batch(addresses: &[NodeAddress], statuses: &[StatusCode]) -> UaResult<()> {
        let mut failures = Vec::new();
        let mut committed = Vec::new();

        for (index, (address, status)) in addresses.iter().zip(statuses).enumerate() {
            if status.is_bad() {
                failures.push(WriteFailure {
                    index,
                    address: address.clone(),
                    status: *status,
                });
            } else {
                committed.push(index);
            }
        }

        // A short reply leaves trailing elements unaccounted for.
        for (index, address) in addresses.iter().enumerate().skip(statuses.len()) {
            failures.push(WriteFailure {
                index,
                address: address.clone(),
                status: StatusCode::BAD_UNKNOWN_RESPONSE,
            });
        }

        match failures.first() {
            None => Ok(()),
            Some(first) => {
                let status = first.status;
                Err(UaError::PartialWriteFailure {
                    failures,
                    committed,
                    total: addresses.len(),
                    status,
                })
            }
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Warning - the request was rejected, the connection is fine.
    Warning,
    /// Error - the request failed at the protocol level.
    Error,
    /// Critical - the connection is gone.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ConfigError
// =============================================================================

/// Invalid configuration or unparsable input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required field is missing.
    #[error("Missing required field: {field}")]
    MissingField {
        /// Field name.
        field: &'static str,
    },

    /// The endpoint URL is malformed.
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The rejected URL.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A node address could not be parsed.
    #[error("Invalid node address '{input}': {reason}")]
    InvalidAddress {
        /// The rejected text.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A field holds an unusable value.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Creates a missing field error.
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid address error.
    pub fn invalid_address(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

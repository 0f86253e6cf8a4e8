// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the command-line client.

use thiserror::Error;

use opcua_typed::{ConfigError, ErrorKind, UaError};

/// Result type alias for CLI operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the command-line client.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid command input.
    #[error("Invalid input: {0}")]
    Input(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Client configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Error surfaced by the OPC UA client.
    #[error("OPC UA error: {0}")]
    Client(#[from] UaError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        /// The context description.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an input error.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Creates an I/O error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the exit code for this error.
    ///
    /// Client errors get one code per failure family so scripts can tell a
    /// missing node from a dead connection.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Config(_) => 1,
            Self::Input(_) => 2,
            Self::Io(_) => 3,
            Self::Client(error) => match error.kind() {
                ErrorKind::ConnectionTimeout | ErrorKind::ConnectionClosed => 10,
                ErrorKind::NodeNotFound | ErrorKind::AccessDenied => 11,
                ErrorKind::TypeMismatch | ErrorKind::ValueOutOfRange | ErrorKind::ArityMismatch => {
                    12
                }
                ErrorKind::PartialWriteFailure => 13,
                ErrorKind::Protocol => 14,
            },
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error with appropriate formatting.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }

    if let Some(UaError::PartialWriteFailure { failures, .. }) = client_error(error) {
        for failure in failures {
            eprintln!("  Failed: {}", failure);
        }
    }
}

/// Reports an error and exits with the appropriate code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

fn client_error(error: &BinError) -> Option<&UaError> {
    match error {
        BinError::Client(inner) => Some(inner),
        BinError::WithContext { source, .. } => client_error(source),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Error types for provisioning operations.
//!
//! Errors are categorized so the engine can decide whether a remote call is
//! worth retrying, whether a handler failure is recorded and the run goes on,
//! or whether the whole run has to stop.

use crate::handlers::HandlerKind;
use thiserror::Error;

/// Categories of provisioning errors for retry and escalation logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Package reference could not be resolved or decoded
    Source,
    /// Package was read but is not a valid hierarchy
    Package,
    /// Throttling or timeout reported by the remote system
    Transient,
    /// A data row collided with an existing row
    Duplicate,
    /// Remote call failed for a non-transient reason
    Remote,
    /// A handler failed
    Handler,
    /// The run was cancelled by the caller
    Cancelled,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Whether this error stops the run even when raised inside a handler.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Package | Self::Cancelled)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Source => "Package source unavailable",
            Self::Package => "Invalid provisioning package",
            Self::Transient => "Remote system busy",
            Self::Duplicate => "Duplicate data row",
            Self::Remote => "Remote operation failed",
            Self::Handler => "Handler failed",
            Self::Cancelled => "Cancelled",
            Self::Other => "Unexpected error",
        }
    }
}

/// Errors that can occur while resolving, loading or applying a hierarchy.
#[derive(Debug, Error)]
pub enum Error {
    /// Package file, asset or remote item does not exist
    #[error("not found: {reference}")]
    NotFound {
        /// Path, URL or item name that was looked up
        reference: String,
    },

    /// The format/location combination cannot be decoded
    #[error("unsupported source {reference}: {reason}")]
    UnsupportedSource {
        /// Path or URL of the package
        reference: String,
        /// Why the source cannot be used
        reason: String,
    },

    /// Deserialization did not produce a hierarchy
    #[error("invalid package {reference}: {message}")]
    InvalidPackage {
        /// Path, URL or item name of the offending package
        reference: String,
        /// Parser or validation message
        message: String,
    },

    /// Requested sequence is not part of the hierarchy
    #[error("sequence not found: {0}")]
    SequenceNotFound(String),

    /// A single handler failed
    #[error("{handler} handler failed: {message}")]
    HandlerFailure {
        /// Handler that failed
        handler: HandlerKind,
        /// Underlying failure
        message: String,
    },

    /// Throttling, timeout or temporarily unavailable service
    #[error("transient remote failure: {message}")]
    Transient {
        /// Detailed message from the failed call
        message: String,
        /// HTTP status if the failure came from a response
        status: Option<u16>,
    },

    /// A transient failure persisted through every retry attempt
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// The error returned by the final attempt
        last: Box<Error>,
    },

    /// Inserting a data row collided with an existing row
    #[error("duplicate data row in {list}: {key}")]
    DuplicateDataRow {
        /// List the row was written to
        list: String,
        /// Key value (or summary) of the row
        key: String,
    },

    /// Remote call failed for a non-transient reason
    #[error("remote error: {message}")]
    Remote {
        /// Detailed message from the failed call
        message: String,
        /// HTTP status if the failure came from a response
        status: Option<u16>,
    },

    /// The caller cancelled the run
    #[error("provisioning run cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Compound container could not be read
    #[error("container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category for retry and escalation logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. }
            | Error::UnsupportedSource { .. }
            | Error::SequenceNotFound(_) => ErrorCategory::Source,
            Error::InvalidPackage { .. } => ErrorCategory::Package,
            Error::Transient { .. } => ErrorCategory::Transient,
            Error::DuplicateDataRow { .. } => ErrorCategory::Duplicate,
            Error::Remote { .. } | Error::RetriesExhausted { .. } => ErrorCategory::Remote,
            Error::HandlerFailure { .. } => ErrorCategory::Handler,
            Error::Cancelled => ErrorCategory::Cancelled,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error stops the run even when raised inside a handler.
    pub fn is_terminal(&self) -> bool {
        self.category().is_terminal()
    }

    /// Whether this error is a duplicate data row collision.
    pub fn is_duplicate_row(&self) -> bool {
        matches!(self.category(), ErrorCategory::Duplicate)
    }

    /// Shorthand for a [`Error::NotFound`].
    pub fn not_found(reference: impl Into<String>) -> Self {
        Error::NotFound {
            reference: reference.into(),
        }
    }

    /// Shorthand for an [`Error::InvalidPackage`].
    pub fn invalid_package(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidPackage {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Classify an HTTP status returned by the remote system.
    ///
    /// 429 and 503 are throttling signals, 408/504 are timeouts; everything
    /// else is a plain remote error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            408 | 429 | 503 | 504 => Error::Transient {
                message,
                status: Some(status),
            },
            404 => Error::NotFound { reference: message },
            _ => Error::Remote {
                message,
                status: Some(status),
            },
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(format!("{err:#}"))
    }
}

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

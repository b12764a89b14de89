//! Error types for the libtracker-sparql bindings.

use std::fmt;

use thiserror::Error;

use crate::cursor::CursorState;

/// Error domain reported by the native engine (a GLib `GQuark`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorDomain(pub u32);

impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A `GError` copied out of native memory.
///
/// Domain, code and message are kept verbatim; nothing is reworded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    /// Error namespace (`GError::domain`).
    pub domain: ErrorDomain,
    /// Name registered for the domain quark, e.g. `tracker-sparql-error-quark`.
    /// Empty when the engine did not register one.
    pub domain_name: String,
    /// Code within the domain (`GError::code`).
    pub code: i32,
    /// Human-readable message (`GError::message`).
    pub message: String,
}

impl NativeError {
    /// Creates a native error record.
    pub(crate) fn new(
        domain: u32,
        domain_name: impl Into<String>,
        code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            domain: ErrorDomain(domain),
            domain_name: domain_name.into(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.domain_name.is_empty() {
            write!(f, "[{}:{}] {}", self.domain, self.code, self.message)
        } else {
            write!(
                f,
                "[{} ({}):{}] {}",
                self.domain_name, self.domain, self.code, self.message
            )
        }
    }
}

impl std::error::Error for NativeError {}

/// Error returned by connection and cursor operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A session with the store could not be opened.
    #[error("connection error: {0}")]
    Connection(#[source] NativeError),
    /// The engine rejected or failed to execute a SPARQL query.
    #[error("query error: {0}")]
    Query(#[source] NativeError),
    /// The engine rejected or failed to execute a SPARQL update.
    #[error("update error: {0}")]
    Update(#[source] NativeError),
    /// Advancing the result set failed.
    #[error("cursor error: {0}")]
    Cursor(#[source] NativeError),
    /// A cursor operation was invoked in a state that forbids it.
    #[error("cannot call `{operation}` on a {state} cursor")]
    State {
        /// The rejected operation.
        operation: &'static str,
        /// State the cursor was in.
        state: CursorState,
    },
    /// A column index outside `0..columns`.
    #[error("column {column} out of range (cursor has {columns} columns)")]
    Index {
        /// The requested column.
        column: usize,
        /// Number of columns in the result set.
        columns: usize,
    },
    /// The engine returned data outside the contract this crate understands.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// Caller input that cannot be passed to the engine at all.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl TrackerError {
    /// The native error carried by this error, if it came from the engine.
    #[must_use]
    pub const fn native(&self) -> Option<&NativeError> {
        match self {
            Self::Connection(e) | Self::Query(e) | Self::Update(e) | Self::Cursor(e) => Some(e),
            Self::State { .. }
            | Self::Index { .. }
            | Self::ProtocolViolation(_)
            | Self::InvalidInput(_) => None,
        }
    }
}

/// Error loading the native library. Fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    /// No candidate file for the library could be opened.
    #[error("failed to load native library `{library}`")]
    Open {
        /// Logical name or path that was requested.
        library: String,
        /// Loader error for the last candidate tried.
        #[source]
        source: Option<libloading::Error>,
    },
    /// The library was opened but an entry point is missing.
    #[error("native library does not export `{symbol}`")]
    Symbol {
        /// Name of the missing symbol.
        symbol: &'static str,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },
}

/// Result type for connection and cursor operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

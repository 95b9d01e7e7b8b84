//! Error types for clickflat.
//!
//! Errors are grouped by the layer that raises them. Configuration problems are
//! reported before any I/O happens, transport problems carry the store's own
//! error code where one is available, and the pipeline errors (`ExportError`,
//! `ImportError`) wrap these with transfer context.

use thiserror::Error;

use crate::export::ExportError;
use crate::import::ImportError;

/// ClickHouse exception code for rejected credentials.
pub const AUTHENTICATION_FAILED_CODE: u32 = 516;

/// Top-level error type covering every layer of the engine.
#[derive(Error, Debug)]
pub enum ClickflatError {
    /// Connection establishment or authentication failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Store communication failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Query construction failed validation.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A text value could not be converted to its declared type.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Export pipeline failure.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Ingestion pipeline failure.
    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Errors raised while building or opening a store connection.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// A connection parameter is missing or malformed.
    #[error("Invalid connection parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    /// The connection string could not be parsed.
    #[error("Failed to parse connection string: {0}")]
    ParseError(String),

    /// The store could not be reached.
    #[error("Failed to connect to {host}:{port}: {message}")]
    ConnectionFailed {
        host: String,
        port: u16,
        message: String,
    },

    /// The store rejected the supplied credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
}

/// Errors raised by a [`StoreClient`](crate::transport::StoreClient).
#[derive(Error, Debug)]
pub enum TransportError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The store answered with an error status.
    #[error("Store returned status {status}{}: {message}", .code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    Server {
        status: u16,
        code: Option<u32>,
        message: String,
    },

    /// Local I/O failed while producing or consuming a byte stream.
    #[error("I/O error: {0}")]
    Io(String),

    /// The store's response did not have the expected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Whether this error means the credentials were rejected.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        match self {
            TransportError::Server { status, code, .. } => {
                *status == 401 || *status == 403 || *code == Some(AUTHENTICATION_FAILED_CODE)
            }
            _ => false,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(err.to_string())
    }
}

/// Errors raised while validating or building a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The main table name is empty.
    #[error("Main table name must not be empty")]
    EmptyTable,

    /// No columns were selected.
    #[error("At least one column must be selected")]
    NoColumns,

    /// A preview limit of zero was requested.
    #[error("Row limit must be greater than zero")]
    InvalidLimit,
}

/// A text value did not parse as its declared store type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot convert '{value}' to {target}: {message}")]
pub struct ConversionError {
    /// The offending input text.
    pub value: String,
    /// Name of the target store type.
    pub target: String,
    /// Parser detail.
    pub message: String,
}

impl ConversionError {
    pub(crate) fn new(
        value: impl Into<String>,
        target: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        Self {
            value: value.into(),
            target: target.into(),
            message: message.to_string(),
        }
    }
}

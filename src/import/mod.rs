//! Ingestion of delimited text into the store.
//!
//! # Overview
//!
//! The import module supports:
//! - Streaming ingestion of any byte source ([`ingest`])
//! - Ingestion from files, with gzip and bzip2 decompression ([`import_from_file`])
//! - Ingesting a subset of a table's columns through a streaming projection
//!
//! # Architecture
//!
//! 1. Count the destination rows (fatal if the store cannot answer)
//! 2. Stream the source into `INSERT INTO ... FORMAT CSVWithNames`, projecting
//!    rows on the fly when only some columns are supplied
//! 3. Count again and report the difference
//!
//! No rollback is attempted; rows the store accepted before a failure stay.
//!
//! # Example
//!
//! ```no_run
//! use clickflat::import::{import_from_file, CsvImportOptions};
//! use clickflat::store::StoreConnection;
//! use std::path::Path;
//!
//! # async fn example(conn: &StoreConnection) -> Result<(), Box<dyn std::error::Error>> {
//! let options = CsvImportOptions::default().columns(vec!["id".into(), "email".into()]);
//! let result = import_from_file(conn, "users", Path::new("users.csv.gz"), &options).await?;
//! println!("Imported {} rows", result.row_count);
//! # Ok(())
//! # }
//! ```

pub mod csv;
pub mod projection;
pub mod source;

pub use csv::{import_from_file, ingest, CsvImportOptions, IngestRequest};
pub use projection::{project_stream, RowProjector};
pub use source::{detect_compression, file_stream, open_decompressed, Compression};

use thiserror::Error;

use crate::error::TransportError;

/// Errors that can occur during import operations.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Table name must not be empty")]
    EmptyTableName,

    #[error("Headers must not be empty")]
    EmptyHeaders,

    #[error("Delimiter must be provided")]
    MissingDelimiter,

    #[error("Source stream must be provided")]
    MissingSource,

    /// The store only accepts single-byte delimiters.
    #[error("Unsupported delimiter {0:?}: must be a single-byte character")]
    UnsupportedDelimiter(char),

    /// A selected column is not in the source header.
    #[error("Column '{column}' not found in source header")]
    MissingColumn { column: String },

    /// The source is not well-formed delimited text.
    #[error("Malformed input at row {row}: {message}")]
    MalformedInput { row: usize, message: String },

    #[error("failed to read table schema: {0}")]
    TableSchema(#[source] TransportError),

    #[error("failed to get initial row count: {0}")]
    InitialRowCount(#[source] TransportError),

    #[error("failed to insert data: {0}")]
    Insert(#[source] TransportError),

    #[error("failed to get final row count: {0}")]
    FinalRowCount(#[source] TransportError),

    #[error("failed to create table '{table}': {source}")]
    CreateTable {
        table: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to load supported types: {0}")]
    TypeCatalog(#[source] TransportError),

    /// A requested column type is not supported by the server.
    #[error("Unsupported type '{type_name}' for column '{column}'")]
    UnsupportedType { column: String, type_name: String },

    #[error("failed to read source: {0}")]
    Source(#[source] TransportError),

    /// Schema inference error
    #[error("Schema inference error: {0}")]
    SchemaInferenceError(String),

    /// IO error during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

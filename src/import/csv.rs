//! CSV ingestion pipeline.
//!
//! Streams delimited text into a table and reports how many rows the table
//! gained. The row counts before and after the insert are load-bearing: if
//! either cannot be read the transfer fails.

use std::path::Path;

use tracing::{debug, info};

use super::projection::project_stream;
use super::source::file_stream;
use super::ImportError;
use crate::query::{FormatKind, InsertQuery, WireFormat, DEFAULT_DELIMITER};
use crate::store::StoreConnection;
use crate::transfer::TransferResult;
use crate::transport::ByteStream;

/// What to ingest and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    /// Number of columns the destination table has.
    pub expected_column_count: usize,
    /// Destination table.
    pub table: String,
    /// Columns supplied by the source, by header name.
    pub headers: Vec<String>,
    /// Field delimiter of the source.
    pub delimiter: Option<char>,
}

impl IngestRequest {
    /// A request with the default delimiter.
    pub fn new(table: impl Into<String>, headers: Vec<String>, expected_column_count: usize) -> Self {
        Self {
            expected_column_count,
            table: table.into(),
            headers,
            delimiter: Some(DEFAULT_DELIMITER),
        }
    }

    #[must_use]
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Whether only some of the table's columns are supplied.
    pub fn is_subset(&self) -> bool {
        self.expected_column_count != self.headers.len()
    }

    /// Check the request and return the delimiter as a byte.
    ///
    /// # Errors
    ///
    /// One distinct `ImportError` per missing field, checked in order: table,
    /// headers, delimiter. A non-ASCII delimiter is `UnsupportedDelimiter`.
    pub fn validate(&self) -> Result<u8, ImportError> {
        if self.table.trim().is_empty() {
            return Err(ImportError::EmptyTableName);
        }
        if self.headers.is_empty() {
            return Err(ImportError::EmptyHeaders);
        }
        let delimiter = self.delimiter.ok_or(ImportError::MissingDelimiter)?;
        if !delimiter.is_ascii() {
            return Err(ImportError::UnsupportedDelimiter(delimiter));
        }
        Ok(delimiter as u8)
    }
}

/// Options for CSV file import.
#[derive(Debug, Clone)]
pub struct CsvImportOptions {
    /// Field delimiter (default: ',').
    pub delimiter: char,

    /// Columns to ingest; empty means all of the table's columns.
    pub columns: Vec<String>,
}

impl Default for CsvImportOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            columns: Vec::new(),
        }
    }
}

impl CsvImportOptions {
    #[must_use]
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }
}

/// Ingest a delimited byte stream into a table.
///
/// The source must start with a header row. When `request.headers` covers
/// every table column the source is sent unmodified; otherwise it is
/// projected onto `request.headers` and inserted with an explicit column
/// list, leaving the other columns at their defaults.
///
/// # Returns
///
/// The number of rows the table gained.
///
/// # Errors
///
/// - Validation errors before any I/O (`MissingSource` for a `None` source)
/// - `InitialRowCount` if the table cannot be counted; nothing is inserted
/// - `MissingColumn` if a selected column is absent from the source header
/// - `Insert` if the store rejects or loses the stream
/// - `FinalRowCount` if the table cannot be counted afterwards
pub async fn ingest(
    conn: &StoreConnection,
    request: &IngestRequest,
    source: Option<ByteStream>,
) -> Result<TransferResult, ImportError> {
    let delimiter = request.validate()?;
    let source = source.ok_or(ImportError::MissingSource)?;
    let table = request.table.as_str();

    let initial = conn
        .count_rows(table)
        .await
        .map_err(ImportError::InitialRowCount)?;
    debug!(table = %table, initial, "Initial row count");

    let format = WireFormat::csv_with_names(delimiter as char);
    let (query, body) = if request.is_subset() {
        debug!(
            table = %table,
            selected = request.headers.len(),
            expected = request.expected_column_count,
            "Projecting source columns"
        );
        let body = project_stream(source, &request.headers, delimiter).await?;
        let query = InsertQuery::new(table)
            .columns(&request.headers)
            .format(FormatKind::CsvWithNames);
        (query, body)
    } else {
        (InsertQuery::new(table).format(FormatKind::CsvWithNames), source)
    };

    info!(table = %table, columns = request.headers.len(), "Starting ingestion");
    let written = conn
        .insert_stream(&query, &format, body)
        .await
        .map_err(ImportError::Insert)?;

    let final_count = conn
        .count_rows(table)
        .await
        .map_err(ImportError::FinalRowCount)?;

    let row_count = final_count.saturating_sub(initial);
    info!(table = %table, rows = row_count, written, "Ingestion finished");
    Ok(TransferResult { row_count })
}

/// Import a CSV file into a table.
///
/// `.gz`/`.gzip` and `.bz2`/`.bzip2` files are decompressed while streaming.
/// The table's column list decides whether `options.columns` is a subset.
///
/// # Errors
///
/// `TableSchema` if the table's columns cannot be read, `IoError` if the file
/// cannot be opened, otherwise as [`ingest`].
pub async fn import_from_file(
    conn: &StoreConnection,
    table: &str,
    file_path: &Path,
    options: &CsvImportOptions,
) -> Result<TransferResult, ImportError> {
    if table.trim().is_empty() {
        return Err(ImportError::EmptyTableName);
    }

    let table_columns = conn
        .list_columns(table)
        .await
        .map_err(ImportError::TableSchema)?;

    let headers = if options.columns.is_empty() {
        table_columns.iter().map(|c| c.name.clone()).collect()
    } else {
        options.columns.clone()
    };

    let request = IngestRequest {
        expected_column_count: table_columns.len(),
        table: table.to_string(),
        headers,
        delimiter: Some(options.delimiter),
    };
    // Validate before the file is opened.
    request.validate()?;

    let source = file_stream(file_path)?;
    ingest(conn, &request, Some(source)).await
}

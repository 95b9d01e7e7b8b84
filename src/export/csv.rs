//! CSV export from the store.
//!
//! An export builds a SELECT from a [`QuerySpec`], asks the store to stream
//! the result as delimited text, and copies the stream chunk by chunk into a
//! sink while counting lines. Nothing is buffered beyond the chunk in flight.
//!
//! # Failure semantics
//!
//! - A failure before the first byte arrives leaves the sink untouched
//!   ([`ExportError::Failed`]).
//! - A failure after bytes were written flushes what was written and reports
//!   [`ExportError::Interrupted`]. The partial output must not be trusted.
//! - The row estimate taken before the export is best-effort and never fails
//!   the transfer.

use std::io;
use std::path::Path;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use crate::error::{QueryError, TransportError};
use crate::query::{FormatKind, QuerySpec, WireFormat};
use crate::store::StoreConnection;
use crate::transfer::TransferResult;

/// Quote character of the CSV wire format.
pub const CSV_QUOTE: u8 = b'"';

/// Error types for export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The query could not be built.
    #[error("Invalid query: {0}")]
    Query(#[from] QueryError),

    /// The store failed before any data was written.
    #[error("failed to export data: {0}")]
    Failed(#[source] TransportError),

    /// The store stream broke after data was written.
    #[error("failed to export data after {lines_written} lines: {source}")]
    Interrupted {
        lines_written: u64,
        #[source]
        source: TransportError,
    },

    /// Writing to the sink failed.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// The result could not be parsed as CSV.
    #[error("CSV parsing error at row {row}: {message}")]
    CsvParseError { row: usize, message: String },
}

/// Options for CSV export.
#[derive(Debug, Clone)]
pub struct CsvExportOptions {
    /// Emit a header row (default: true).
    pub with_column_names: bool,

    /// Maximum number of data rows (default: none).
    pub limit: Option<u64>,
}

impl Default for CsvExportOptions {
    fn default() -> Self {
        Self {
            with_column_names: true,
            limit: None,
        }
    }
}

impl CsvExportOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether to emit a header row.
    #[must_use]
    pub fn with_column_names(mut self, include: bool) -> Self {
        self.with_column_names = include;
        self
    }

    /// Cap the number of exported data rows.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn wire_format(&self, delimiter: char) -> WireFormat {
        let kind = if self.with_column_names {
            FormatKind::CsvWithNames
        } else {
            FormatKind::Csv
        };
        WireFormat { kind, delimiter }
    }
}

/// Header and rows of a small result, for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPreview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Counts CSV lines across chunk boundaries.
///
/// Newlines inside quoted fields do not end a line. A final line without a
/// trailing newline is counted by [`finish`](Self::finish).
#[derive(Debug, Clone)]
pub struct LineCounter {
    quote: u8,
    in_quotes: bool,
    lines: u64,
    open_line: bool,
}

impl LineCounter {
    pub fn new(quote: u8) -> Self {
        Self {
            quote,
            in_quotes: false,
            lines: 0,
            open_line: false,
        }
    }

    /// Account for the next chunk of output.
    pub fn feed(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            if byte == self.quote {
                self.in_quotes = !self.in_quotes;
                self.open_line = true;
            } else if byte == b'\n' && !self.in_quotes {
                self.lines += 1;
                self.open_line = false;
            } else {
                self.open_line = true;
            }
        }
    }

    /// Whether the data seen so far ends inside a quoted field.
    pub fn in_quotes(&self) -> bool {
        self.in_quotes
    }

    /// Complete lines seen so far.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Total lines, including an unterminated last line.
    pub fn finish(&self) -> u64 {
        self.lines + u64::from(self.open_line)
    }
}

/// Exports a query result to a file.
///
/// The file is only created once the query is valid, and is removed again if
/// the store fails before sending any data.
///
/// # Returns
///
/// The number of lines written, including the header row.
///
/// # Errors
///
/// Returns `ExportError` if the export fails.
///
/// # Example
///
/// ```no_run
/// use clickflat::export::{export_to_file, CsvExportOptions};
/// use clickflat::query::QuerySpec;
/// use clickflat::store::StoreConnection;
/// use std::path::Path;
///
/// # async fn example(conn: &StoreConnection) -> Result<(), Box<dyn std::error::Error>> {
/// let spec = QuerySpec::new("users", &["id", "name"]);
/// let result = export_to_file(
///     conn,
///     &spec,
///     Path::new("/tmp/users.csv"),
///     &CsvExportOptions::default(),
/// ).await?;
///
/// println!("Wrote {} lines", result.row_count);
/// # Ok(())
/// # }
/// ```
pub async fn export_to_file(
    conn: &StoreConnection,
    spec: &QuerySpec,
    file_path: &Path,
    options: &CsvExportOptions,
) -> Result<TransferResult, ExportError> {
    spec.validate()?;

    let file = File::create(file_path).await?;
    let writer = BufWriter::new(file);

    let result = export_to_stream(conn, spec, writer, options).await;
    if let Err(ExportError::Failed(_)) = result {
        let _ = tokio::fs::remove_file(file_path).await;
    }
    result
}

/// Exports a query result to an async writer.
///
/// # Arguments
///
/// * `conn` - Store connection
/// * `spec` - Table, columns, joins and delimiter
/// * `writer` - Sink for the delimited text
/// * `options` - Export options
///
/// # Returns
///
/// The number of lines written, including the header row. An empty result
/// produces just the header line and a count of 1.
///
/// # Errors
///
/// Returns `ExportError` if the export fails.
pub async fn export_to_stream<W: AsyncWrite + Unpin>(
    conn: &StoreConnection,
    spec: &QuerySpec,
    mut writer: W,
    options: &CsvExportOptions,
) -> Result<TransferResult, ExportError> {
    spec.validate()?;

    let estimate = conn.estimate_rows(&spec.main_table).await;
    info!(
        table = %spec.main_table,
        estimated_rows = estimate.total(),
        degraded = estimate.is_degraded(),
        "Starting export"
    );

    let mut select = spec.select();
    if let Some(limit) = options.limit {
        select = select.limit(limit);
    }
    let sql = select.build()?;
    let format = options.wire_format(spec.delimiter);

    let mut stream = conn
        .query_stream(&sql, &format)
        .await
        .map_err(ExportError::Failed)?;

    let mut counter = LineCounter::new(CSV_QUOTE);
    let mut bytes_written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) if bytes_written == 0 => return Err(ExportError::Failed(e)),
            Err(e) => {
                writer.flush().await?;
                return Err(ExportError::Interrupted {
                    lines_written: counter.lines(),
                    source: e,
                });
            }
        };

        writer.write_all(&chunk).await?;
        counter.feed(&chunk);
        bytes_written += chunk.len() as u64;
        debug!(bytes = bytes_written, lines = counter.lines(), "Export progress");
    }

    if bytes_written == 0 && options.with_column_names {
        let header = header_line(&spec.columns, spec.delimiter);
        writer.write_all(header.as_bytes()).await?;
        counter.feed(header.as_bytes());
    }

    writer.flush().await?;

    let lines = counter.finish();
    info!(table = %spec.main_table, lines, bytes = bytes_written, "Export finished");
    Ok(TransferResult { row_count: lines })
}

/// Exports a query result into memory.
///
/// Each row is a vector of field values; with column names enabled the first
/// row is the header.
///
/// # Errors
///
/// Returns `ExportError` if the export fails or the result is not valid CSV.
pub async fn export_to_list(
    conn: &StoreConnection,
    spec: &QuerySpec,
    options: &CsvExportOptions,
) -> Result<Vec<Vec<String>>, ExportError> {
    let mut buffer = Vec::new();
    export_to_stream(conn, spec, &mut buffer, options).await?;

    parse_csv(&buffer, spec.delimiter)
}

/// Fetch the header and at most `limit` rows of a query.
///
/// # Errors
///
/// `QueryError::InvalidLimit` for a zero limit, otherwise as
/// [`export_to_list`].
pub async fn preview(
    conn: &StoreConnection,
    spec: &QuerySpec,
    limit: u64,
) -> Result<QueryPreview, ExportError> {
    if limit == 0 {
        return Err(QueryError::InvalidLimit.into());
    }
    let options = CsvExportOptions::default().limit(limit);
    let mut rows = export_to_list(conn, spec, &options).await?.into_iter();
    let headers = rows.next().unwrap_or_default();

    Ok(QueryPreview {
        headers,
        rows: rows.collect(),
    })
}

/// Header line for an empty result, from the selected column names.
fn header_line(columns: &[String], delimiter: char) -> String {
    let mut line = columns
        .iter()
        .map(|column| {
            let name = match column.split_once('.') {
                Some((table, name))
                    if !table.is_empty() && !name.is_empty() && !name.contains('.') =>
                {
                    name
                }
                _ => column.as_str(),
            };
            quote_field(name, delimiter)
        })
        .collect::<Vec<_>>()
        .join(&delimiter.to_string());
    line.push('\n');
    line
}

fn quote_field(value: &str, delimiter: char) -> String {
    let quote = CSV_QUOTE as char;
    if value.contains(delimiter)
        || value.contains(quote)
        || value.contains('\n')
        || value.contains('\r')
    {
        let escaped = value.replace(quote, "\"\"");
        format!("{quote}{escaped}{quote}")
    } else {
        value.to_string()
    }
}

/// Parses buffered CSV output into rows.
///
/// Rows may have differing field counts. Data that ends inside a quoted
/// field is rejected.
pub(crate) fn parse_csv(data: &[u8], delimiter: char) -> Result<Vec<Vec<String>>, ExportError> {
    let mut counter = LineCounter::new(CSV_QUOTE);
    counter.feed(data);
    if counter.in_quotes() {
        return Err(ExportError::CsvParseError {
            row: counter.lines() as usize,
            message: "Unclosed quote at end of data".to_string(),
        });
    }

    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .quote(CSV_QUOTE)
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    reader
        .records()
        .enumerate()
        .map(|(index, record)| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| ExportError::CsvParseError {
                    row: e.position().map_or(index, |p| p.record() as usize),
                    message: e.to_string(),
                })
        })
        .collect()
}

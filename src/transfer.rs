//! Transfer orchestration.
//!
//! A [`TransferSession`] owns one store connection for the duration of a
//! request and sequences the pipelines: optional table creation followed by
//! ingestion, or query building followed by export. The request and response
//! shapes here are what an outward-facing layer (HTTP handler, CLI) exchanges
//! with the engine; they serialize with camelCase field names.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;
use tracing::{debug, info};

use crate::connection::ConnectionParams;
use crate::error::{ClickflatError, ConnectionError};
use crate::export::{self, CsvExportOptions, QueryPreview};
use crate::import::{self, file_stream, open_decompressed, ImportError, IngestRequest};
use crate::query::{parse_delimiter, CreateTable, JoinSpec, QuerySpec, DEFAULT_DELIMITER};
use crate::store::{ColumnDescriptor, StoreConnection, TypeCatalog};
use crate::transport::ByteStream;
use crate::types::{sample_csv, CsvInferenceOptions};

/// Column type used when a new table's column has no declared type.
pub const DEFAULT_COLUMN_TYPE: &str = "String";

/// Rows returned by a preview without an explicit limit.
pub const DEFAULT_PREVIEW_LIMIT: u64 = 100;

/// Outcome of a finished transfer.
///
/// For ingestion this is the number of rows the table gained. For export it
/// is the number of lines written, header included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub row_count: u64,
}

/// Configuration of one ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestConfig {
    pub table_name: String,
    /// Create the table from `column_types` before ingesting.
    #[serde(default)]
    pub create_new_table: bool,
    /// Store type per header; headers without an entry become `String`.
    #[serde(default)]
    pub column_types: HashMap<String, String>,
    /// Delimiter code, e.g. `","` or `"\t"`.
    #[serde(default)]
    pub delimiter: Option<String>,
    /// Number of columns the destination table has.
    #[serde(default)]
    pub total_columns: Option<usize>,
}

impl IngestConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            delimiter: Some(DEFAULT_DELIMITER.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn create_new_table(mut self, create: bool) -> Self {
        self.create_new_table = create;
        self
    }

    #[must_use]
    pub fn column_type(mut self, column: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.column_types.insert(column.into(), type_name.into());
        self
    }

    #[must_use]
    pub fn delimiter(mut self, code: impl Into<String>) -> Self {
        self.delimiter = Some(code.into());
        self
    }

    #[must_use]
    pub fn total_columns(mut self, total: usize) -> Self {
        self.total_columns = Some(total);
        self
    }

    /// The decoded delimiter, if one was given.
    pub fn delimiter_char(&self) -> Option<char> {
        self.delimiter.as_deref().and_then(parse_delimiter)
    }
}

/// A query for preview or export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub joins: Vec<JoinSpec>,
    /// Delimiter code; absent means `,`.
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
}

impl QueryRequest {
    pub fn new<S: AsRef<str>>(table: &str, columns: &[S]) -> Self {
        Self {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }

    #[must_use]
    pub fn delimiter(mut self, code: impl Into<String>) -> Self {
        self.delimiter = Some(code.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The query this request describes.
    pub fn to_spec(&self) -> QuerySpec {
        let delimiter = self
            .delimiter
            .as_deref()
            .and_then(parse_delimiter)
            .unwrap_or(DEFAULT_DELIMITER);

        self.joins.iter().cloned().fold(
            QuerySpec::new(&self.table, &self.columns).delimiter(delimiter),
            QuerySpec::join,
        )
    }
}

/// Result of an ingestion, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub rows_ingested: u64,
    pub message: String,
}

impl IngestResponse {
    /// Summarize an ingestion outcome.
    pub fn from_outcome(table: &str, outcome: &Result<TransferResult, ClickflatError>) -> Self {
        match outcome {
            Ok(result) => Self {
                success: true,
                rows_ingested: result.row_count,
                message: format!("Ingested {} rows into {table}", result.row_count),
            },
            Err(e) => Self {
                success: false,
                rows_ingested: 0,
                message: e.to_string(),
            },
        }
    }
}

/// One request's worth of store access.
///
/// The connection is released when the session is dropped. The supported-type
/// catalog is fetched at most once per session, on first use.
#[derive(Debug)]
pub struct TransferSession {
    conn: StoreConnection,
    catalog: Option<TypeCatalog>,
}

impl TransferSession {
    /// Connect to the store.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the store is unreachable or rejects the
    /// credentials.
    pub async fn connect(params: &ConnectionParams) -> Result<Self, ConnectionError> {
        Ok(Self::new(StoreConnection::connect(params).await?))
    }

    pub fn new(conn: StoreConnection) -> Self {
        Self {
            conn,
            catalog: None,
        }
    }

    /// Use a pre-loaded type catalog instead of fetching one.
    #[must_use]
    pub fn with_type_catalog(mut self, catalog: TypeCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn connection(&self) -> &StoreConnection {
        &self.conn
    }

    pub async fn list_tables(&self) -> Result<Vec<String>, ClickflatError> {
        Ok(self.conn.list_tables().await?)
    }

    pub async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, ClickflatError> {
        Ok(self.conn.list_columns(table).await?)
    }

    /// The server's supported types, fetched on first call.
    ///
    /// # Errors
    ///
    /// `ImportError::TypeCatalog` if the types cannot be read.
    pub async fn type_catalog(&mut self) -> Result<&TypeCatalog, ImportError> {
        if self.catalog.is_none() {
            let catalog = self
                .conn
                .load_type_catalog()
                .await
                .map_err(ImportError::TypeCatalog)?;
            self.catalog = Some(catalog);
        }
        Ok(self.catalog.get_or_insert_with(TypeCatalog::default))
    }

    /// Create `table` with one column per header.
    ///
    /// Headers missing from `column_types` get [`DEFAULT_COLUMN_TYPE`]. Every
    /// type is checked against the server's catalog before the statement is
    /// sent. An existing table is left as is.
    ///
    /// # Returns
    ///
    /// The executed statement.
    ///
    /// # Errors
    ///
    /// `UnsupportedType` for a type the server does not know, `CreateTable`
    /// if the statement fails.
    pub async fn create_table(
        &mut self,
        table: &str,
        headers: &[String],
        column_types: &HashMap<String, String>,
    ) -> Result<String, ImportError> {
        if table.trim().is_empty() {
            return Err(ImportError::EmptyTableName);
        }
        if headers.is_empty() {
            return Err(ImportError::EmptyHeaders);
        }

        let catalog = self.type_catalog().await?;
        let mut ddl = CreateTable::new(table);
        for header in headers {
            let type_name = column_types
                .get(header)
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_COLUMN_TYPE);
            if !catalog.supports(type_name) {
                return Err(ImportError::UnsupportedType {
                    column: header.clone(),
                    type_name: type_name.to_string(),
                });
            }
            ddl = ddl.column(header, type_name);
        }

        let sql = ddl.build();
        self.conn
            .execute(&sql)
            .await
            .map_err(|source| ImportError::CreateTable {
                table: table.to_string(),
                source,
            })?;
        info!(table = %table, columns = ddl.column_count(), "Created table");
        Ok(sql)
    }

    /// Ingest `source`, whose header row names `headers`.
    ///
    /// With `create_new_table` set the table is created first. The expected
    /// column count comes from `total_columns`, or from the new table's
    /// headers, or from the existing table's schema.
    ///
    /// # Errors
    ///
    /// Validation errors before any I/O, then the errors of
    /// [`create_table`](Self::create_table) and [`import::ingest`].
    pub async fn ingest(
        &mut self,
        config: &IngestConfig,
        headers: &[String],
        source: Option<ByteStream>,
    ) -> Result<TransferResult, ClickflatError> {
        let mut request = IngestRequest {
            expected_column_count: headers.len(),
            table: config.table_name.clone(),
            headers: headers.to_vec(),
            delimiter: config.delimiter_char(),
        };
        request.validate()?;
        if source.is_none() {
            return Err(ImportError::MissingSource.into());
        }

        if config.create_new_table {
            self.create_table(&config.table_name, headers, &config.column_types)
                .await?;
        }

        request.expected_column_count = match config.total_columns {
            Some(total) => total,
            None if config.create_new_table => headers.len(),
            None => self
                .conn
                .list_columns(&config.table_name)
                .await
                .map_err(ImportError::TableSchema)?
                .len(),
        };
        debug!(
            table = %request.table,
            expected = request.expected_column_count,
            supplied = headers.len(),
            "Ingestion plan"
        );

        Ok(import::ingest(&self.conn, &request, source).await?)
    }

    /// Ingest a file, optionally restricted to `columns`.
    ///
    /// With no columns given, the file's header decides the columns.
    pub async fn ingest_file(
        &mut self,
        config: &IngestConfig,
        file_path: &Path,
        columns: &[String],
    ) -> Result<TransferResult, ClickflatError> {
        let headers = if columns.is_empty() {
            let delimiter = config.delimiter_char().unwrap_or(DEFAULT_DELIMITER);
            read_header(file_path, delimiter)?
        } else {
            columns.to_vec()
        };

        let source = file_stream(file_path).map_err(ImportError::from)?;
        self.ingest(config, &headers, Some(source)).await
    }

    /// Export a query result to `sink`.
    ///
    /// # Returns
    ///
    /// Lines written, header included.
    pub async fn export<W: AsyncWrite + Unpin>(
        &self,
        request: &QueryRequest,
        sink: W,
    ) -> Result<TransferResult, ClickflatError> {
        let spec = request.to_spec();
        Ok(export::export_to_stream(&self.conn, &spec, sink, &export_options(request)).await?)
    }

    /// Export a query result to a file.
    pub async fn export_to_file(
        &self,
        request: &QueryRequest,
        file_path: &Path,
    ) -> Result<TransferResult, ClickflatError> {
        let spec = request.to_spec();
        Ok(export::export_to_file(&self.conn, &spec, file_path, &export_options(request)).await?)
    }

    /// Header and first rows of a query, [`DEFAULT_PREVIEW_LIMIT`] unless the
    /// request sets a limit.
    pub async fn preview(&self, request: &QueryRequest) -> Result<QueryPreview, ClickflatError> {
        let spec = request.to_spec();
        let limit = request.limit.unwrap_or(DEFAULT_PREVIEW_LIMIT);
        Ok(export::preview(&self.conn, &spec, limit).await?)
    }

    /// End the session and release the connection.
    pub fn close(self) {
        self.conn.close();
    }
}

fn export_options(request: &QueryRequest) -> CsvExportOptions {
    match request.limit {
        Some(limit) => CsvExportOptions::default().limit(limit),
        None => CsvExportOptions::default(),
    }
}

/// Read the header row of a (possibly compressed) delimited file.
fn read_header(file_path: &Path, delimiter: char) -> Result<Vec<String>, ImportError> {
    if !delimiter.is_ascii() {
        return Err(ImportError::UnsupportedDelimiter(delimiter));
    }
    let reader = open_decompressed(file_path)?;
    let options = CsvInferenceOptions::new()
        .with_delimiter(delimiter as u8)
        .with_max_sample_records(0);
    Ok(sample_csv(reader, &options)?.headers)
}

//! Store gateway.
//!
//! [`StoreConnection`] owns one live [`StoreClient`] for the lifetime of a
//! request. It offers schema introspection, row counting, and raw streaming
//! access to query results and insert sinks. Introspection results are read
//! in `JSONEachRow` format; everything else is passed through as bytes.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::catalog::{TypeCatalog, TypeFamily};
use crate::connection::ConnectionParams;
use crate::error::{ConnectionError, TransportError};
use crate::query::{InsertQuery, WireFormat};
use crate::transport::{collect_bytes, ByteStream, HttpStoreClient, StoreClient};
use crate::types::{quote_identifier, quote_literal, StoreType};

/// Row total reported when the pre-export count is unavailable.
pub const ESTIMATE_SENTINEL: u64 = 1;

/// A column as reported by schema introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Store type name, e.g. `Nullable(Int32)`.
    #[serde(rename = "type")]
    pub type_name: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// The column's type in the engine's closed type set.
    pub fn store_type(&self) -> StoreType {
        StoreType::from_type_name(&self.type_name)
    }
}

#[derive(Debug, Deserialize)]
struct TableRow {
    name: String,
}

/// One row of `system.data_type_families`.
#[derive(Debug, Deserialize)]
struct TypeFamilyRow {
    name: String,
    case_insensitive: u8,
    #[serde(default)]
    alias_to: String,
}

impl From<TypeFamilyRow> for TypeFamily {
    fn from(row: TypeFamilyRow) -> Self {
        TypeFamily {
            name: row.name,
            case_insensitive: row.case_insensitive != 0,
            alias_to: Some(row.alias_to).filter(|a| !a.is_empty()),
        }
    }
}

/// Outcome of a best-effort row count.
///
/// Estimates only feed progress reporting, so an unavailable count is a
/// degraded outcome rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowEstimate {
    /// The store answered the count.
    Counted(u64),
    /// The count failed; `reason` holds the cause.
    Unavailable { reason: String },
}

impl RowEstimate {
    /// Total to report, using [`ESTIMATE_SENTINEL`] when unavailable.
    pub fn total(&self) -> u64 {
        match self {
            RowEstimate::Counted(n) => *n,
            RowEstimate::Unavailable { .. } => ESTIMATE_SENTINEL,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, RowEstimate::Unavailable { .. })
    }
}

/// A live connection to the store.
///
/// Created once per request and released when dropped, whichever way the
/// request ends.
pub struct StoreConnection {
    client: Arc<dyn StoreClient>,
    database: String,
}

impl StoreConnection {
    /// Connect over HTTP and verify the credentials.
    ///
    /// Performs a `/ping` followed by `SELECT 1`, so bad credentials are
    /// reported here and not on the first real statement.
    ///
    /// # Errors
    ///
    /// `ConnectionError::AuthenticationFailed` when the store rejects the
    /// credentials, `ConnectionError::ConnectionFailed` for anything else.
    pub async fn connect(params: &ConnectionParams) -> Result<Self, ConnectionError> {
        let failed = |message: String| ConnectionError::ConnectionFailed {
            host: params.host.clone(),
            port: params.port,
            message,
        };
        let classify = |err: TransportError| {
            if err.is_auth_failure() {
                ConnectionError::AuthenticationFailed(err.to_string())
            } else {
                failed(err.to_string())
            }
        };

        debug!(host = %params.host, port = params.port, database = %params.database, "Connecting to store");
        let client = HttpStoreClient::new(params).map_err(|e| failed(e.to_string()))?;

        if !client.ping().await.map_err(classify)? {
            return Err(failed("unexpected ping response".to_string()));
        }

        let probe = client
            .query("SELECT 1", &WireFormat::tab_separated())
            .await
            .map_err(classify)?;
        collect_bytes(probe).await.map_err(classify)?;

        info!(
            host = %params.host,
            port = params.port,
            database = %params.database,
            user = %params.username(),
            "Connected to store"
        );
        Ok(Self::from_client(Arc::new(client), &params.database))
    }

    /// Wrap an existing client.
    pub fn from_client(client: Arc<dyn StoreClient>, database: &str) -> Self {
        Self {
            client,
            database: database.to_string(),
        }
    }

    /// Database introspection queries are scoped to.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The underlying client.
    pub fn client(&self) -> &Arc<dyn StoreClient> {
        &self.client
    }

    pub async fn ping(&self) -> Result<bool, TransportError> {
        self.client.ping().await
    }

    /// Names of the tables in the current database, sorted.
    pub async fn list_tables(&self) -> Result<Vec<String>, TransportError> {
        let sql = format!(
            "SELECT name FROM system.tables WHERE database = {} ORDER BY name",
            quote_literal(&self.database)
        );
        let rows: Vec<TableRow> = self.fetch_rows(&sql).await?;
        Ok(rows.into_iter().map(|row| row.name).collect())
    }

    /// Columns of `table` in definition order.
    pub async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, TransportError> {
        let sql = format!(
            "SELECT name, type FROM system.columns WHERE database = {} AND table = {} ORDER BY position",
            quote_literal(&self.database),
            quote_literal(table)
        );
        self.fetch_rows(&sql).await
    }

    /// Whether `table` exists in the current database.
    pub async fn table_exists(&self, table: &str) -> Result<bool, TransportError> {
        let sql = format!(
            "SELECT count() FROM system.tables WHERE database = {} AND name = {}",
            quote_literal(&self.database),
            quote_literal(table)
        );
        Ok(self.fetch_count(&sql).await? > 0)
    }

    /// Exact row count of `table`.
    pub async fn count_rows(&self, table: &str) -> Result<u64, TransportError> {
        let sql = format!("SELECT count() FROM {}", quote_identifier(table));
        self.fetch_count(&sql).await
    }

    /// Best-effort row count of `table` for progress reporting.
    ///
    /// Never fails; a failed count is logged and reported as
    /// [`RowEstimate::Unavailable`].
    pub async fn estimate_rows(&self, table: &str) -> RowEstimate {
        match self.count_rows(table).await {
            Ok(n) => RowEstimate::Counted(n),
            Err(e) => {
                warn!(table = %table, error = %e, "Row estimate unavailable");
                RowEstimate::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Stream the result of `sql` in `format`.
    pub async fn query_stream(
        &self,
        sql: &str,
        format: &WireFormat,
    ) -> Result<ByteStream, TransportError> {
        self.client.query(sql, format).await
    }

    /// Stream `body` into the store with `query`.
    pub async fn insert_stream(
        &self,
        query: &InsertQuery,
        format: &WireFormat,
        body: ByteStream,
    ) -> Result<u64, TransportError> {
        self.client.insert(&query.build(), format, body).await
    }

    /// Run a statement without a result set.
    pub async fn execute(&self, sql: &str) -> Result<(), TransportError> {
        self.client.execute(sql).await
    }

    /// Fetch the data type families this server supports.
    pub async fn load_type_catalog(&self) -> Result<TypeCatalog, TransportError> {
        let rows: Vec<TypeFamilyRow> = self
            .fetch_rows("SELECT name, case_insensitive, alias_to FROM system.data_type_families")
            .await?;

        let catalog = TypeCatalog::from_families(
            rows.into_iter()
                .filter(|row| !row.name.is_empty())
                .map(TypeFamily::from),
        );
        debug!(families = catalog.len(), "Loaded type catalog");
        Ok(catalog)
    }

    /// Explicitly release the connection.
    pub fn close(self) {
        drop(self);
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>, TransportError> {
        let stream = self.client.query(sql, &WireFormat::json_each_row()).await?;
        let data = collect_bytes(stream).await?;
        parse_json_each_row(&data)
    }

    async fn fetch_count(&self, sql: &str) -> Result<u64, TransportError> {
        let stream = self.client.query(sql, &WireFormat::tab_separated()).await?;
        let data = collect_bytes(stream).await?;
        let text = String::from_utf8_lossy(&data);
        text.trim()
            .parse::<u64>()
            .map_err(|_| TransportError::Protocol(format!("expected a row count, got '{}'", text.trim())))
    }
}

impl fmt::Debug for StoreConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConnection")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl Drop for StoreConnection {
    fn drop(&mut self) {
        debug!(database = %self.database, "Store connection released");
    }
}

/// Deserialize `JSONEachRow` output, one object per non-empty line.
fn parse_json_each_row<T: DeserializeOwned>(data: &[u8]) -> Result<Vec<T>, TransportError> {
    data.split(|&b| b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(|line| {
            serde_json::from_slice(line)
                .map_err(|e| TransportError::Protocol(format!("malformed introspection row: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_each_row_columns() {
        let data = br#"{"name":"id","type":"UInt32"}
{"name":"note\tx","type":"Nullable(String)"}
"#;
        let columns: Vec<ColumnDescriptor> = parse_json_each_row(data).unwrap();
        assert_eq!(
            columns,
            vec![
                ColumnDescriptor::new("id", "UInt32"),
                ColumnDescriptor::new("note\tx", "Nullable(String)"),
            ]
        );
    }

    #[test]
    fn test_parse_json_each_row_keeps_escaped_names() {
        let data = "{\"name\":\"back\\\\slash\\nline\"}\n\n".as_bytes();
        let tables: Vec<TableRow> = parse_json_each_row(data).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "back\\slash\nline");
    }

    #[test]
    fn test_parse_json_each_row_type_families() {
        let data = br#"{"name":"TEXT","case_insensitive":1,"alias_to":"String"}
{"name":"Int32","case_insensitive":0,"alias_to":""}"#;
        let rows: Vec<TypeFamilyRow> = parse_json_each_row(data).unwrap();
        let families: Vec<TypeFamily> = rows.into_iter().map(TypeFamily::from).collect();
        assert!(families[0].case_insensitive);
        assert_eq!(families[0].alias_to.as_deref(), Some("String"));
        assert!(!families[1].case_insensitive);
        assert_eq!(families[1].alias_to, None);
    }

    #[test]
    fn test_parse_json_each_row_rejects_garbage() {
        let result: Result<Vec<TableRow>, _> = parse_json_each_row(b"name\tUInt32\n");
        assert!(matches!(result, Err(TransportError::Protocol(_))));
    }

    #[test]
    fn test_row_estimate_total() {
        assert_eq!(RowEstimate::Counted(42).total(), 42);
        assert_eq!(RowEstimate::Counted(0).total(), 0);
        let degraded = RowEstimate::Unavailable {
            reason: "timeout".to_string(),
        };
        assert_eq!(degraded.total(), ESTIMATE_SENTINEL);
        assert!(degraded.is_degraded());
    }

    #[test]
    fn test_column_descriptor_store_type() {
        let col = ColumnDescriptor::new("price", "Nullable(Float64)");
        assert_eq!(col.store_type(), StoreType::Float64);

        let json = serde_json::to_string(&col).unwrap();
        assert_eq!(json, r#"{"name":"price","type":"Nullable(Float64)"}"#);
    }
}

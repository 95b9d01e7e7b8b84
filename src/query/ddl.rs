//! CREATE TABLE builder for ingestion targets.

use crate::types::quote_identifier;

/// Table engine used for tables created by ingestion.
pub const DEFAULT_ENGINE: &str = "MergeTree";

/// Sorting key used when no explicit key is configured.
pub const DEFAULT_ORDER_BY: &str = "tuple()";

/// Builder for `CREATE TABLE IF NOT EXISTS` statements.
///
/// Column types are emitted verbatim; only identifiers are quoted.
///
/// # Example
///
/// ```
/// use clickflat::query::CreateTable;
///
/// let sql = CreateTable::new("events")
///     .column("id", "Int64")
///     .column("payload", "Nullable(String)")
///     .build();
///
/// assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `events`"));
/// assert!(sql.ends_with("ENGINE = MergeTree ORDER BY tuple()"));
/// ```
#[derive(Debug, Clone)]
pub struct CreateTable {
    table: String,
    columns: Vec<(String, String)>,
    engine: String,
    order_by: String,
}

impl CreateTable {
    /// Create a builder for the given table.
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            engine: DEFAULT_ENGINE.to_string(),
            order_by: DEFAULT_ORDER_BY.to_string(),
        }
    }

    /// Append a column definition.
    ///
    /// # Arguments
    /// * `name` - Column name (quoted when built)
    /// * `type_name` - Store type name, e.g. `Nullable(Int32)`
    #[must_use]
    pub fn column(mut self, name: &str, type_name: impl Into<String>) -> Self {
        self.columns.push((name.to_string(), type_name.into()));
        self
    }

    /// Set the table engine (default `MergeTree`).
    #[must_use]
    pub fn engine(mut self, engine: &str) -> Self {
        self.engine = engine.to_string();
        self
    }

    /// Set the `ORDER BY` expression (default `tuple()`).
    #[must_use]
    pub fn order_by(mut self, expr: &str) -> Self {
        self.order_by = expr.to_string();
        self
    }

    /// Number of columns defined so far.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Build the statement text.
    pub fn build(&self) -> String {
        let definitions = self
            .columns
            .iter()
            .map(|(name, type_name)| format!("    {} {}", quote_identifier(name.as_str()), type_name))
            .collect::<Vec<_>>()
            .join(",\n");

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n) ENGINE = {} ORDER BY {}",
            quote_identifier(self.table.as_str()),
            definitions,
            self.engine,
            self.order_by
        )
    }
}

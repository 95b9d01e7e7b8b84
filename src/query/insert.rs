//! INSERT statement builder for streamed ingestion.

use super::format::FormatKind;
use crate::types::quote_identifier;

/// Builder for `INSERT INTO ... FORMAT ...` statements.
///
/// The data itself is streamed as the request body, so the statement ends with
/// the format clause. When columns are listed, the store fills every other
/// column with its default value.
///
/// # Example
///
/// ```
/// use clickflat::query::{FormatKind, InsertQuery};
///
/// let sql = InsertQuery::new("events")
///     .columns(&["id", "name"])
///     .format(FormatKind::CsvWithNames)
///     .build();
///
/// assert_eq!(sql, "INSERT INTO `events` (`id`, `name`) FORMAT CSVWithNames");
/// ```
#[derive(Debug, Clone)]
pub struct InsertQuery {
    table: String,
    columns: Option<Vec<String>>,
    format: FormatKind,
}

impl InsertQuery {
    /// Create an insert into `table` covering all columns.
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: None,
            format: FormatKind::default(),
        }
    }

    /// Restrict the insert to the listed columns, in stream order.
    #[must_use]
    pub fn columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    /// Set the format of the streamed body (default `CSVWithNames`).
    #[must_use]
    pub fn format(mut self, format: FormatKind) -> Self {
        self.format = format;
        self
    }

    /// Target table name, unquoted.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Listed columns, if any.
    pub fn column_list(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Build the statement text.
    pub fn build(&self) -> String {
        let mut sql = String::with_capacity(64);
        sql.push_str("INSERT INTO ");
        sql.push_str(&quote_identifier(self.table.as_str()));

        if let Some(ref cols) = self.columns {
            let quoted = cols
                .iter()
                .map(|c| quote_identifier(c.as_str()))
                .collect::<Vec<_>>();
            sql.push_str(" (");
            sql.push_str(&quoted.join(", "));
            sql.push(')');
        }

        sql.push_str(" FORMAT ");
        sql.push_str(self.format.name());
        sql
    }
}

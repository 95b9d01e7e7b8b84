//! SELECT builder with column projection and JOIN composition.
//!
//! The builder only assembles projection, FROM and JOIN clauses (plus an
//! optional `LIMIT` for previews). Every table and column identifier is quoted
//! exactly once; join conditions are trusted SQL fragments and are emitted
//! as given.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use super::format::DEFAULT_DELIMITER;
use crate::error::QueryError;
use crate::types::quote_identifier;

/// Condition emitted for joins configured without one.
pub const UNCONDITIONAL_JOIN: &str = "1=1";

/// Kind of JOIN clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JoinType {
    Inner,
    #[default]
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    /// SQL keyword sequence for this join.
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
            JoinType::Cross => "CROSS JOIN",
        }
    }

    /// Parse a join type, ignoring case and an optional trailing `JOIN`.
    ///
    /// Unrecognized text falls back to [`JoinType::Left`].
    pub fn parse(text: &str) -> Self {
        let normalized = text.trim().to_ascii_uppercase();
        let keyword = normalized
            .strip_suffix("JOIN")
            .unwrap_or(&normalized)
            .trim();

        match keyword {
            "INNER" => JoinType::Inner,
            "RIGHT" | "RIGHT OUTER" => JoinType::Right,
            "FULL" | "FULL OUTER" => JoinType::Full,
            "CROSS" => JoinType::Cross,
            _ => JoinType::Left,
        }
    }
}

impl FromStr for JoinType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(JoinType::parse(s))
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl From<String> for JoinType {
    fn from(value: String) -> Self {
        JoinType::parse(&value)
    }
}

impl From<JoinType> for String {
    fn from(value: JoinType) -> Self {
        value.as_sql().to_string()
    }
}

/// One JOIN clause of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpec {
    /// Table joined to the main table.
    pub target_table: String,
    /// Join kind; absent means `LEFT JOIN`.
    #[serde(default)]
    pub join_type: JoinType,
    /// Raw boolean expression placed after `ON`.
    #[serde(default)]
    pub condition: Option<String>,
}

impl JoinSpec {
    /// Create a join on `target_table` with an explicit condition.
    pub fn new(target_table: &str, join_type: JoinType, condition: &str) -> Self {
        Self {
            target_table: target_table.to_string(),
            join_type,
            condition: Some(condition.to_string()),
        }
    }

    /// Create a `LEFT JOIN` with no condition.
    pub fn unconditional(target_table: &str) -> Self {
        Self {
            target_table: target_table.to_string(),
            join_type: JoinType::default(),
            condition: None,
        }
    }

    /// The condition to emit, falling back to `1=1` when blank.
    pub fn effective_condition(&self) -> &str {
        match self.condition.as_deref().map(str::trim) {
            Some(cond) if !cond.is_empty() => cond,
            _ => UNCONDITIONAL_JOIN,
        }
    }

    fn to_sql(&self) -> String {
        if self.condition_is_blank() {
            warn!(
                table = %self.target_table,
                "Join has no condition; emitting ON 1=1"
            );
        }
        format!(
            "{} {} ON {}",
            self.join_type.as_sql(),
            quote_identifier(self.target_table.as_str()),
            self.effective_condition()
        )
    }

    fn condition_is_blank(&self) -> bool {
        self.condition
            .as_deref()
            .map_or(true, |cond| cond.trim().is_empty())
    }
}

/// Everything needed to derive one export or preview query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub main_table: String,
    /// Bare (`col`) or qualified (`table.col`) column references, in output order.
    pub columns: Vec<String>,
    pub joins: Vec<JoinSpec>,
    pub delimiter: char,
}

impl QuerySpec {
    /// Create a spec selecting `columns` from `main_table`.
    pub fn new<S: AsRef<str>>(main_table: &str, columns: &[S]) -> Self {
        Self {
            main_table: main_table.to_string(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            joins: Vec::new(),
            delimiter: DEFAULT_DELIMITER,
        }
    }

    /// Append a join.
    #[must_use]
    pub fn join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }

    /// Set the output delimiter.
    #[must_use]
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Check the required fields.
    ///
    /// # Errors
    ///
    /// `QueryError::EmptyTable` for a blank main table, `QueryError::NoColumns`
    /// when no column is selected.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.main_table.trim().is_empty() {
            return Err(QueryError::EmptyTable);
        }
        if self.columns.is_empty() {
            return Err(QueryError::NoColumns);
        }
        Ok(())
    }

    /// Build the SELECT statement for this spec.
    ///
    /// # Errors
    ///
    /// Propagates [`QuerySpec::validate`] failures.
    pub fn to_sql(&self) -> Result<String, QueryError> {
        build_select(&self.main_table, &self.columns, &self.joins)
    }

    /// A [`SelectQuery`] builder seeded from this spec.
    pub fn select(&self) -> SelectQuery {
        SelectQuery {
            main_table: self.main_table.clone(),
            columns: self.columns.clone(),
            joins: self.joins.clone(),
            limit: None,
        }
    }
}

/// Builder for SELECT statements.
///
/// # Example
///
/// ```
/// use clickflat::query::{JoinSpec, JoinType, SelectQuery};
///
/// let sql = SelectQuery::new("users")
///     .columns(&["users.id", "orders.total"])
///     .join(JoinSpec::new("orders", JoinType::Left, "users.id=orders.uid"))
///     .limit(10)
///     .build()
///     .unwrap();
///
/// assert_eq!(
///     sql,
///     "SELECT `users`.`id`,`orders`.`total` FROM `users` \
///      LEFT JOIN `orders` ON users.id=orders.uid LIMIT 10"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    main_table: String,
    columns: Vec<String>,
    joins: Vec<JoinSpec>,
    limit: Option<u64>,
}

impl SelectQuery {
    /// Start a query against `main_table`.
    pub fn new(main_table: &str) -> Self {
        Self {
            main_table: main_table.to_string(),
            ..Default::default()
        }
    }

    /// Append columns to the projection.
    #[must_use]
    pub fn columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.columns
            .extend(columns.iter().map(|c| c.as_ref().to_string()));
        self
    }

    /// Append a join clause.
    #[must_use]
    pub fn join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }

    /// Cap the number of returned rows.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Build the statement.
    ///
    /// # Errors
    ///
    /// `QueryError::EmptyTable`, `QueryError::NoColumns`, or
    /// `QueryError::InvalidLimit` for a zero limit.
    pub fn build(&self) -> Result<String, QueryError> {
        let mut sql = build_select(&self.main_table, &self.columns, &self.joins)?;
        if let Some(limit) = self.limit {
            if limit == 0 {
                return Err(QueryError::InvalidLimit);
            }
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(sql)
    }
}

/// Build `SELECT <columns> FROM <main> [<joins>]`.
///
/// Qualified entries (`table.column`) keep their qualifier; bare entries are
/// qualified with `main_table`. An entry with more than one `.` or an empty
/// part is treated as a bare column name. Joins are emitted in order.
///
/// # Errors
///
/// `QueryError::EmptyTable` or `QueryError::NoColumns` before anything is built.
pub fn build_select<S: AsRef<str>>(
    main_table: &str,
    columns: &[S],
    joins: &[JoinSpec],
) -> Result<String, QueryError> {
    if main_table.trim().is_empty() {
        return Err(QueryError::EmptyTable);
    }
    if columns.is_empty() {
        return Err(QueryError::NoColumns);
    }

    let main = quote_identifier(main_table);
    let projection = columns
        .iter()
        .map(|column| qualify_column(&main, column.as_ref()))
        .collect::<Vec<_>>()
        .join(",");

    let mut sql = String::with_capacity(64 + projection.len());
    sql.push_str("SELECT ");
    sql.push_str(&projection);
    sql.push_str(" FROM ");
    sql.push_str(&main);

    for join in joins {
        sql.push(' ');
        sql.push_str(&join.to_sql());
    }

    Ok(sql)
}

/// Render one column reference, qualified by `quoted_main` when bare.
fn qualify_column(quoted_main: &str, column: &str) -> String {
    match column.split_once('.') {
        Some((table, name)) if !table.is_empty() && !name.is_empty() && !name.contains('.') => {
            format!("{}.{}", quote_identifier(table), quote_identifier(name))
        }
        _ => format!("{}.{}", quoted_main, quote_identifier(column)),
    }
}

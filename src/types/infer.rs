//! Column type inference from sample text values.

use super::conversion::is_plausible;
use super::mapping::StoreType;
use crate::query::ddl::CreateTable;

/// Result of inferring one column's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInference {
    /// Narrowest type that fits every non-empty sample.
    pub store_type: StoreType,
    /// Whether any sample was missing or empty.
    pub nullable: bool,
}

/// An inferred column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredColumn {
    /// Column name as it appears in the source header.
    pub name: String,
    /// Inferred store type.
    pub store_type: StoreType,
    /// Whether the column had missing or empty samples.
    pub nullable: bool,
}

/// Ordered header-to-type mapping produced by [`suggest_column_types`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferredTableSchema {
    /// Column definitions in header order.
    pub columns: Vec<InferredColumn>,
}

impl InferredTableSchema {
    /// Look up the inferred type of a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StoreType> {
        self.columns
            .iter()
            .find(|col| col.name == name)
            .map(|col| &col.store_type)
    }

    /// Iterate over `(header, type name)` pairs in header order.
    pub fn type_names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(|col| (col.name.as_str(), col.store_type.type_name()))
    }

    /// Generate a CREATE TABLE statement for this schema.
    ///
    /// Columns that had empty samples become `Nullable`.
    #[must_use]
    pub fn to_ddl(&self, table_name: &str) -> String {
        self.columns
            .iter()
            .fold(CreateTable::new(table_name), |ddl, col| {
                ddl.column(&col.name, col.store_type.to_ddl_type(col.nullable))
            })
            .build()
    }
}

/// Guess the narrowest store type that fits every sample value.
///
/// Candidates are tried from narrowest to widest (`Int32`, `Int64`, `Float64`,
/// `Date`, `DateTime`, `Bool`, `UUID`, `String`). A candidate is ruled out by
/// the first non-empty value it cannot parse. Missing and empty values are
/// ignored; a column with no values at all is `String`.
///
/// # Example
///
/// ```
/// use clickflat::types::{detect_type, StoreType};
///
/// assert_eq!(detect_type([Some("123"), Some("456")]), StoreType::Int32);
/// assert_eq!(detect_type([Some("123"), Some("abc")]), StoreType::String);
/// assert_eq!(detect_type([None, Some(""), Some("123")]), StoreType::Int32);
/// ```
pub fn detect_type<'a, I>(values: I) -> StoreType
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    infer_column(values).store_type
}

/// Like [`detect_type`], also reporting whether empty values were seen.
pub fn infer_column<'a, I>(values: I) -> ColumnInference
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut plausible = [true; StoreType::CANDIDATE_COUNT];
    let mut nullable = false;

    for value in values {
        let text = match value {
            Some(text) if !text.is_empty() => text,
            _ => {
                nullable = true;
                continue;
            }
        };

        let candidates = StoreType::CANDIDATES.iter().zip(plausible.iter_mut());
        for (candidate, still_plausible) in candidates {
            if *still_plausible && !is_plausible(text, candidate) {
                *still_plausible = false;
            }
        }
    }

    let store_type = StoreType::CANDIDATES
        .iter()
        .zip(plausible.iter())
        .find(|(_, still_plausible)| **still_plausible)
        .map(|(candidate, _)| candidate.clone())
        .unwrap_or(StoreType::String);

    ColumnInference {
        store_type,
        nullable,
    }
}

/// Suggest a store type for every header from sample rows.
///
/// Each header's values are gathered by position across all sample rows; rows
/// shorter than the header count contribute missing values. With no sample rows
/// every column is `String`.
pub fn suggest_column_types<H, R>(headers: &[H], sample_rows: &[R]) -> InferredTableSchema
where
    H: AsRef<str>,
    R: AsRef<[Option<String>]>,
{
    let columns = headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            let inference = if sample_rows.is_empty() {
                ColumnInference {
                    store_type: StoreType::String,
                    nullable: false,
                }
            } else {
                infer_column(
                    sample_rows
                        .iter()
                        .map(|row| row.as_ref().get(index).and_then(|cell| cell.as_deref())),
                )
            };

            InferredColumn {
                name: header.as_ref().to_string(),
                store_type: inference.store_type,
                nullable: inference.nullable,
            }
        })
        .collect();

    InferredTableSchema { columns }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
            .collect()
    }

    #[test]
    fn test_detect_int32() {
        assert_eq!(detect_type([Some("123"), Some("456")]), StoreType::Int32);
    }

    #[test]
    fn test_detect_mixed_falls_back_to_string() {
        assert_eq!(detect_type([Some("123"), Some("abc")]), StoreType::String);
    }

    #[test]
    fn test_detect_date() {
        assert_eq!(
            detect_type([Some("2023-01-15"), Some("2022-12-31")]),
            StoreType::Date
        );
    }

    #[test]
    fn test_detect_ignores_blanks() {
        assert_eq!(detect_type([None, Some(""), Some("123")]), StoreType::Int32);
    }

    #[test]
    fn test_detect_all_blank_is_string() {
        assert_eq!(detect_type([None, Some("")]), StoreType::String);
        assert_eq!(detect_type(std::iter::empty()), StoreType::String);
    }

    #[test]
    fn test_detect_widening() {
        assert_eq!(
            detect_type([Some("1"), Some("9000000000")]),
            StoreType::Int64
        );
        assert_eq!(detect_type([Some("1"), Some("2.5")]), StoreType::Float64);
        assert_eq!(
            detect_type([Some("2023-01-15T08:00:00"), Some("2023-01-16T09:30")]),
            StoreType::DateTime
        );
    }

    #[test]
    fn test_detect_boolean_after_numbers() {
        // 1/0 parse as integers first
        assert_eq!(detect_type([Some("1"), Some("0")]), StoreType::Int32);
        assert_eq!(detect_type([Some("true"), Some("No")]), StoreType::Boolean);
        assert_eq!(detect_type([Some("1"), Some("yes")]), StoreType::Boolean);
    }

    #[test]
    fn test_detect_uuid() {
        assert_eq!(
            detect_type([Some("550e8400-e29b-41d4-a716-446655440000")]),
            StoreType::Uuid
        );
    }

    #[test]
    fn test_detect_is_idempotent_on_valid_values() {
        let columns: [&[&str]; 8] = [
            &["-17", "42"],
            &["1", "9000000000"],
            &["1", "2.5", "3.0"],
            &["2023-01-15", "1999-07-04"],
            &["2023-01-15T10:30", "2023-01-16T08:00:00.5"],
            &["true", "No", "yes"],
            &["550E8400-E29B-41D4-A716-446655440000"],
            &["alice", "bob"],
        ];

        for (samples, expected) in columns.iter().zip(StoreType::CANDIDATES.iter()) {
            let first = detect_type(samples.iter().map(|s| Some(*s)));
            assert_eq!(&first, expected, "samples {samples:?}");

            let wire: Vec<String> = samples
                .iter()
                .map(|v| {
                    crate::types::convert(Some(*v), &first)
                        .unwrap()
                        .unwrap()
                        .to_wire()
                })
                .collect();
            let second = detect_type(wire.iter().map(|s| Some(s.as_str())));
            assert_eq!(first, second, "wire form {wire:?}");
        }
    }

    #[test]
    fn test_detect_special_float_words_as_string() {
        assert_eq!(
            detect_type([Some("NaN"), Some("inf"), Some("Infinity")]),
            StoreType::String
        );
        assert_eq!(detect_type([Some("1.5"), Some("nan")]), StoreType::String);
    }

    #[test]
    fn test_infer_column_reports_nullable() {
        let inference = infer_column([Some("1"), None]);
        assert_eq!(inference.store_type, StoreType::Int32);
        assert!(inference.nullable);
        assert!(!infer_column([Some("1")]).nullable);
    }

    #[test]
    fn test_suggest_without_samples_defaults_to_string() {
        let rows: Vec<Vec<Option<String>>> = Vec::new();
        let schema = suggest_column_types(&["id", "name"], &rows);
        assert_eq!(schema.get("id"), Some(&StoreType::String));
        assert_eq!(schema.get("name"), Some(&StoreType::String));
    }

    #[test]
    fn test_suggest_per_column() {
        let rows = vec![
            row(&["1", "alice", "2023-01-15", "true"]),
            row(&["2", "bob", "2023-02-01", "false"]),
        ];
        let schema = suggest_column_types(&["id", "name", "joined", "active"], &rows);

        let names: Vec<(&str, &str)> = schema.type_names().collect();
        assert_eq!(
            names,
            vec![
                ("id", "Int32"),
                ("name", "String"),
                ("joined", "Date"),
                ("active", "Bool"),
            ]
        );
    }

    #[test]
    fn test_suggest_short_rows_count_as_missing() {
        let rows = vec![row(&["1", "x"]), row(&["2"])];
        let schema = suggest_column_types(&["id", "tag"], &rows);
        assert_eq!(schema.columns[1].store_type, StoreType::String);
        assert!(schema.columns[1].nullable);
    }

    #[test]
    fn test_schema_to_ddl() {
        let rows = vec![row(&["1", ""]), row(&["2", "b"])];
        let schema = suggest_column_types(&["id", "label"], &rows);
        let ddl = schema.to_ddl("items");

        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS `items`"));
        assert!(ddl.contains("`id` Int32"));
        assert!(ddl.contains("`label` Nullable(String)"));
    }
}

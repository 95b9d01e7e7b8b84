//! Delimited-text wire formats and delimiter codes.

use std::fmt;

/// Default field delimiter.
pub const DEFAULT_DELIMITER: char = ',';

/// ClickHouse setting that selects the CSV field delimiter.
pub const CSV_DELIMITER_SETTING: &str = "format_csv_delimiter";

/// Text format family exchanged with the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatKind {
    /// CSV with a header row.
    #[default]
    CsvWithNames,
    /// CSV without a header row.
    Csv,
    /// Tab-separated without a header row.
    TabSeparated,
    /// Tab-separated with a header row.
    TabSeparatedWithNames,
    /// One JSON object per line.
    JsonEachRow,
}

impl FormatKind {
    /// ClickHouse format name used in `FORMAT` clauses.
    pub fn name(&self) -> &'static str {
        match self {
            FormatKind::CsvWithNames => "CSVWithNames",
            FormatKind::Csv => "CSV",
            FormatKind::TabSeparated => "TabSeparated",
            FormatKind::TabSeparatedWithNames => "TabSeparatedWithNames",
            FormatKind::JsonEachRow => "JSONEachRow",
        }
    }

    /// Whether the first line is a header row.
    pub fn has_header(&self) -> bool {
        matches!(
            self,
            FormatKind::CsvWithNames | FormatKind::TabSeparatedWithNames
        )
    }

    /// Whether the field delimiter is configurable.
    pub fn is_csv(&self) -> bool {
        matches!(self, FormatKind::CsvWithNames | FormatKind::Csv)
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A wire format together with its field delimiter.
///
/// Tab-separated formats always use `\t`; the delimiter only applies to the
/// CSV family, where it is passed to the store as `format_csv_delimiter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireFormat {
    pub kind: FormatKind,
    pub delimiter: char,
}

impl Default for WireFormat {
    fn default() -> Self {
        Self::csv_with_names(DEFAULT_DELIMITER)
    }
}

impl WireFormat {
    /// CSV with a header row and the given delimiter.
    pub fn csv_with_names(delimiter: char) -> Self {
        Self {
            kind: FormatKind::CsvWithNames,
            delimiter,
        }
    }

    /// Headerless CSV with the given delimiter.
    pub fn csv(delimiter: char) -> Self {
        Self {
            kind: FormatKind::Csv,
            delimiter,
        }
    }

    /// Headerless tab-separated text, used for scalar results.
    pub fn tab_separated() -> Self {
        Self {
            kind: FormatKind::TabSeparated,
            delimiter: '\t',
        }
    }

    /// Newline-delimited JSON objects, used for introspection results.
    pub fn json_each_row() -> Self {
        Self {
            kind: FormatKind::JsonEachRow,
            delimiter: '\n',
        }
    }

    /// The delimiter fields are actually separated by.
    pub fn effective_delimiter(&self) -> char {
        if self.kind.is_csv() {
            self.delimiter
        } else {
            '\t'
        }
    }

    /// Store settings required for this format, as `(name, value)` pairs.
    pub fn settings(&self) -> Vec<(&'static str, String)> {
        if self.kind.is_csv() && self.delimiter != DEFAULT_DELIMITER {
            vec![(CSV_DELIMITER_SETTING, self.delimiter.to_string())]
        } else {
            Vec::new()
        }
    }
}

/// Resolve a delimiter from its textual code.
///
/// The escape sequences `\n`, `\t`, `\r`, `\b`, `\f`, `\'`, `\"` and `\\`
/// map to the character they name. Any other input yields its first
/// character. Empty input has no delimiter.
///
/// # Example
///
/// ```
/// use clickflat::query::parse_delimiter;
///
/// assert_eq!(parse_delimiter("\\t"), Some('\t'));
/// assert_eq!(parse_delimiter(";"), Some(';'));
/// assert_eq!(parse_delimiter("||"), Some('|'));
/// assert_eq!(parse_delimiter(""), None);
/// ```
pub fn parse_delimiter(code: &str) -> Option<char> {
    let escaped = match code {
        "\\n" => Some('\n'),
        "\\t" => Some('\t'),
        "\\r" => Some('\r'),
        "\\b" => Some('\u{8}'),
        "\\f" => Some('\u{c}'),
        "\\'" => Some('\''),
        "\\\"" => Some('"'),
        "\\\\" => Some('\\'),
        _ => None,
    };
    escaped.or_else(|| code.chars().next())
}

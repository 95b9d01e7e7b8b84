//! Identifier and literal quoting for generated ClickHouse SQL.

/// Delimiter ClickHouse uses for quoted identifiers.
pub const IDENTIFIER_QUOTE: char = '`';

/// Quote an identifier (table or column name) for ClickHouse SQL.
///
/// Wraps the name in backticks and escapes any internal backtick by doubling it.
/// A missing name yields the empty quoted identifier (two backticks).
///
/// Quoting is not idempotent: passing an already quoted name quotes it again,
/// so every name must go through this function exactly once.
///
/// # Example
///
/// ```
/// use clickflat::types::quote_identifier;
///
/// assert_eq!(quote_identifier("users"), "`users`");
/// assert_eq!(quote_identifier("a`b"), "`a``b`");
/// assert_eq!(quote_identifier(None), "``");
/// ```
#[must_use]
pub fn quote_identifier<'a>(name: impl Into<Option<&'a str>>) -> String {
    let name = name.into().unwrap_or_default();
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push(IDENTIFIER_QUOTE);
    for c in name.chars() {
        if c == IDENTIFIER_QUOTE {
            quoted.push(IDENTIFIER_QUOTE);
        }
        quoted.push(c);
    }
    quoted.push(IDENTIFIER_QUOTE);
    quoted
}

/// Quote a string literal for ClickHouse SQL.
///
/// Backslashes and single quotes are backslash-escaped, matching the escaping
/// rules ClickHouse applies inside `'...'` literals.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            _ => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

//! Supported store type cache.
//!
//! A [`TypeCatalog`] holds the data type families a server reports in
//! `system.data_type_families`. It is loaded once per connection by whoever
//! owns the connection and passed explicitly to the code that validates
//! column types.

use std::collections::{BTreeMap, HashSet};

/// Type families every wrapper-aware lookup can see through.
const WRAPPER_FAMILIES: [&str; 2] = ["Nullable", "LowCardinality"];

/// Data type families supported by one server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCatalog {
    /// Family name to canonical (alias-resolved) name.
    families: BTreeMap<String, String>,
    /// Lowercased names of case-insensitive families.
    case_insensitive: HashSet<String>,
}

/// One row of `system.data_type_families`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeFamily {
    pub name: String,
    pub case_insensitive: bool,
    /// Canonical family this name is an alias of, if any.
    pub alias_to: Option<String>,
}

impl TypeCatalog {
    /// Build a catalog from introspected families.
    pub fn from_families<I>(families: I) -> Self
    where
        I: IntoIterator<Item = TypeFamily>,
    {
        let mut catalog = TypeCatalog::default();
        for family in families {
            if family.case_insensitive {
                catalog.case_insensitive.insert(family.name.to_ascii_lowercase());
            }
            let canonical = family
                .alias_to
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| family.name.clone());
            catalog.families.insert(family.name, canonical);
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// All family names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(String::as_str)
    }

    /// Canonical name of `family`, resolving aliases.
    pub fn canonical(&self, family: &str) -> Option<&str> {
        if let Some(canonical) = self.families.get(family) {
            return Some(canonical);
        }
        let lower = family.to_ascii_lowercase();
        if !self.case_insensitive.contains(&lower) {
            return None;
        }
        self.families
            .iter()
            .find(|(name, _)| name.to_ascii_lowercase() == lower)
            .map(|(_, canonical)| canonical.as_str())
    }

    /// Whether a full type expression is supported.
    ///
    /// The expression must be a single family name, optionally followed by
    /// one balanced parameter list that ends the expression. The outermost
    /// family must be known; for `Nullable(..)` and `LowCardinality(..)` the
    /// wrapped type is checked too. Parameters of other families
    /// (`Decimal(9, 2)`, `Enum8('a' = 1)`) are only checked for balance.
    pub fn supports(&self, type_name: &str) -> bool {
        let Some((family, args)) = split_type_expression(type_name) else {
            return false;
        };

        if self.canonical(family).is_none() {
            return false;
        }

        if WRAPPER_FAMILIES.contains(&family) {
            return args.map_or(false, |inner| self.supports(inner));
        }
        true
    }
}

/// Split `Family(args)` into the family and the text between the outer
/// parentheses. Returns `None` unless the whole expression is well formed.
fn split_type_expression(type_name: &str) -> Option<(&str, Option<&str>)> {
    let type_name = type_name.trim();
    if type_name.contains(';') || type_name.contains('`') || type_name.contains("--") {
        return None;
    }

    let family_end = type_name
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(type_name.len());
    let family = &type_name[..family_end];
    if family.is_empty() {
        return None;
    }

    let rest = &type_name[family_end..];
    if rest.is_empty() {
        return Some((family, None));
    }
    if !rest.starts_with('(') {
        return None;
    }

    let bytes = rest.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match (in_string, bytes[i]) {
            (true, b'\\') => i += 1,
            (true, b'\'') => in_string = false,
            (true, _) => {}
            (false, b'\'') => in_string = true,
            (false, b'(') => depth += 1,
            (false, b')') => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return (i == bytes.len() - 1).then(|| (family, Some(rest[1..i].trim())));
                }
            }
            (false, _) => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(name: &str, case_insensitive: bool, alias_to: Option<&str>) -> TypeFamily {
        TypeFamily {
            name: name.to_string(),
            case_insensitive,
            alias_to: alias_to.map(str::to_string),
        }
    }

    fn catalog() -> TypeCatalog {
        TypeCatalog::from_families(vec![
            family("Int32", false, None),
            family("String", false, None),
            family("Nullable", false, None),
            family("LowCardinality", false, None),
            family("Decimal", true, None),
            family("TEXT", true, Some("String")),
            family("INTEGER", true, Some("Int32")),
        ])
    }

    #[test]
    fn test_supports_plain_families() {
        let catalog = catalog();
        assert!(catalog.supports("Int32"));
        assert!(catalog.supports("String"));
        assert!(!catalog.supports("Int128"));
        assert!(!catalog.supports(""));
    }

    #[test]
    fn test_supports_rejects_trailing_text() {
        let catalog = catalog();
        assert!(!catalog.supports("Decimal(9, 2)) ENGINE = Log --"));
        assert!(!catalog.supports("Decimal(9, 2) ENGINE = Log"));
        assert!(!catalog.supports("Int32; DROP TABLE t"));
        assert!(!catalog.supports("Decimal(9, 2"));
        assert!(!catalog.supports("Nullable(Int32))"));
        assert!(!catalog.supports("`Int32`"));
    }

    #[test]
    fn test_supports_quoted_parameters() {
        let catalog = TypeCatalog::from_families(vec![family("Enum8", false, None)]);
        assert!(catalog.supports("Enum8('a' = 1, 'b' = 2)"));
        assert!(catalog.supports("Enum8('(' = 1, ')' = 2)"));
        assert!(catalog.supports("Enum8('it\\'s' = 1)"));
        assert!(!catalog.supports("Enum8('a' = 1"));
    }

    #[test]
    fn test_supports_wrapped_types() {
        let catalog = catalog();
        assert!(catalog.supports("Nullable(Int32)"));
        assert!(catalog.supports("LowCardinality(Nullable(String))"));
        assert!(!catalog.supports("Nullable(Int128)"));
        assert!(!catalog.supports("Nullable"));
    }

    #[test]
    fn test_supports_parameterized_and_case_insensitive() {
        let catalog = catalog();
        assert!(catalog.supports("Decimal(9, 2)"));
        assert!(catalog.supports("decimal(9, 2)"));
        assert!(catalog.supports("text"));
        assert!(!catalog.supports("int32"));
    }

    #[test]
    fn test_alias_resolution() {
        let catalog = catalog();
        assert_eq!(catalog.canonical("TEXT"), Some("String"));
        assert_eq!(catalog.canonical("integer"), Some("Int32"));
        assert_eq!(catalog.canonical("Int32"), Some("Int32"));
        assert_eq!(catalog.canonical("Missing"), None);
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = TypeCatalog::default();
        assert!(catalog.is_empty());
        assert!(!catalog.supports("String"));
        assert_eq!(self::catalog().len(), 7);
    }
}

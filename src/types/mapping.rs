//! Mapping between ClickHouse type names and the engine's closed type set.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store column type understood by inference and conversion.
///
/// The variants are listed from the narrowest to the widest candidate used by
/// [`detect_type`](crate::types::detect_type). Type names the engine has no
/// dedicated parser for are kept verbatim in [`StoreType::Other`]; values of
/// such columns pass through conversion unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum StoreType {
    /// 32-bit signed integer (`Int32`).
    Int32,
    /// 64-bit signed integer (`Int64`).
    Int64,
    /// 64-bit float (`Float64`).
    Float64,
    /// Calendar date (`Date`).
    Date,
    /// Date and time without zone (`DateTime`).
    DateTime,
    /// Boolean (`Bool`).
    Boolean,
    /// UUID (`UUID`).
    Uuid,
    /// Arbitrary text (`String`); always plausible.
    String,
    /// Any other store type name, kept as given.
    Other(std::string::String),
}

impl StoreType {
    /// Number of inference candidates.
    pub const CANDIDATE_COUNT: usize = 8;

    /// Inference candidates, narrowest first.
    pub const CANDIDATES: [StoreType; Self::CANDIDATE_COUNT] = [
        StoreType::Int32,
        StoreType::Int64,
        StoreType::Float64,
        StoreType::Date,
        StoreType::DateTime,
        StoreType::Boolean,
        StoreType::Uuid,
        StoreType::String,
    ];

    /// Resolve a store type name.
    ///
    /// `Nullable(..)` and `LowCardinality(..)` wrappers are unwrapped and common
    /// aliases are accepted case-insensitively. Unknown names never fail; they
    /// become [`StoreType::Other`].
    ///
    /// # Example
    ///
    /// ```
    /// use clickflat::types::StoreType;
    ///
    /// assert_eq!(StoreType::from_type_name("Nullable(Int64)"), StoreType::Int64);
    /// assert_eq!(StoreType::from_type_name("boolean"), StoreType::Boolean);
    /// assert_eq!(
    ///     StoreType::from_type_name("Decimal(10, 2)"),
    ///     StoreType::Other("Decimal(10, 2)".to_string())
    /// );
    /// ```
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        let trimmed = name.trim();
        let inner = unwrap_modifiers(trimmed);

        match inner.to_ascii_lowercase().as_str() {
            "int32" | "int" | "integer" => StoreType::Int32,
            "int64" | "bigint" | "long" => StoreType::Int64,
            "float64" | "double" => StoreType::Float64,
            "date" | "date32" => StoreType::Date,
            "datetime" | "timestamp" => StoreType::DateTime,
            "bool" | "boolean" => StoreType::Boolean,
            "uuid" => StoreType::Uuid,
            "string" | "text" | "varchar" => StoreType::String,
            lower if lower.starts_with("datetime64(") || lower.starts_with("datetime(") => {
                StoreType::DateTime
            }
            _ => StoreType::Other(trimmed.to_string()),
        }
    }

    /// The ClickHouse name of this type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            StoreType::Int32 => "Int32",
            StoreType::Int64 => "Int64",
            StoreType::Float64 => "Float64",
            StoreType::Date => "Date",
            StoreType::DateTime => "DateTime",
            StoreType::Boolean => "Bool",
            StoreType::Uuid => "UUID",
            StoreType::String => "String",
            StoreType::Other(name) => name,
        }
    }

    /// DDL type for a column of this type, wrapped in `Nullable` when requested.
    ///
    /// Names that already carry a `Nullable(..)` wrapper are not wrapped twice.
    #[must_use]
    pub fn to_ddl_type(&self, nullable: bool) -> String {
        let name = self.type_name();
        if nullable && !name.starts_with("Nullable(") {
            format!("Nullable({name})")
        } else {
            name.to_string()
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl From<StoreType> for std::string::String {
    fn from(value: StoreType) -> Self {
        value.type_name().to_string()
    }
}

impl From<std::string::String> for StoreType {
    fn from(value: std::string::String) -> Self {
        StoreType::from_type_name(&value)
    }
}

/// Strip `Nullable(..)` and `LowCardinality(..)` wrappers, in any nesting order.
fn unwrap_modifiers(name: &str) -> &str {
    let mut current = name;
    loop {
        let stripped = ["Nullable(", "LowCardinality("].iter().find_map(|prefix| {
            current
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(')'))
        });
        match stripped {
            Some(inner) => current = inner.trim(),
            None => return current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_type_name_canonical() {
        assert_eq!(StoreType::from_type_name("Int32"), StoreType::Int32);
        assert_eq!(StoreType::from_type_name("Int64"), StoreType::Int64);
        assert_eq!(StoreType::from_type_name("Float64"), StoreType::Float64);
        assert_eq!(StoreType::from_type_name("Date"), StoreType::Date);
        assert_eq!(StoreType::from_type_name("DateTime"), StoreType::DateTime);
        assert_eq!(StoreType::from_type_name("Bool"), StoreType::Boolean);
        assert_eq!(StoreType::from_type_name("UUID"), StoreType::Uuid);
        assert_eq!(StoreType::from_type_name("String"), StoreType::String);
    }

    #[test]
    fn test_from_type_name_aliases() {
        assert_eq!(StoreType::from_type_name("integer"), StoreType::Int32);
        assert_eq!(StoreType::from_type_name("LONG"), StoreType::Int64);
        assert_eq!(StoreType::from_type_name("double"), StoreType::Float64);
        assert_eq!(StoreType::from_type_name("Boolean"), StoreType::Boolean);
        assert_eq!(StoreType::from_type_name("Date32"), StoreType::Date);
        assert_eq!(
            StoreType::from_type_name("DateTime64(3)"),
            StoreType::DateTime
        );
    }

    #[test]
    fn test_from_type_name_unwraps_modifiers() {
        assert_eq!(
            StoreType::from_type_name("Nullable(Int32)"),
            StoreType::Int32
        );
        assert_eq!(
            StoreType::from_type_name("LowCardinality(Nullable(String))"),
            StoreType::String
        );
    }

    #[test]
    fn test_from_type_name_unknown_is_other() {
        assert_eq!(
            StoreType::from_type_name(" Decimal(18, 4) "),
            StoreType::Other("Decimal(18, 4)".to_string())
        );
        assert_eq!(
            StoreType::from_type_name("Array(UInt8)").type_name(),
            "Array(UInt8)"
        );
    }

    #[test]
    fn test_to_ddl_type() {
        assert_eq!(StoreType::Int32.to_ddl_type(false), "Int32");
        assert_eq!(StoreType::Int32.to_ddl_type(true), "Nullable(Int32)");
        assert_eq!(
            StoreType::Other("Nullable(Decimal(9, 2))".to_string()).to_ddl_type(true),
            "Nullable(Decimal(9, 2))"
        );
    }

    #[test]
    fn test_serde_uses_type_names() {
        let json = serde_json::to_string(&StoreType::Boolean).unwrap();
        assert_eq!(json, "\"Bool\"");

        let parsed: StoreType = serde_json::from_str("\"Nullable(Float64)\"").unwrap();
        assert_eq!(parsed, StoreType::Float64);
    }

    #[test]
    fn test_candidates_order() {
        assert_eq!(StoreType::CANDIDATES.first(), Some(&StoreType::Int32));
        assert_eq!(StoreType::CANDIDATES.last(), Some(&StoreType::String));
    }
}

//! Store types, identifier quoting, value conversion and type inference.

pub(crate) mod conversion;
mod csv_infer;
mod identifier;
mod infer;
mod mapping;

pub use conversion::{
    convert, parse_boolean, parse_date, parse_date_time, parse_float, Value, DATE_FORMAT,
};
pub use csv_infer::{
    infer_schema_from_csv, sample_csv, CsvInferenceOptions, CsvSample, DEFAULT_SAMPLE_ROWS,
};
pub use identifier::{quote_identifier, quote_literal, IDENTIFIER_QUOTE};
pub use infer::{
    detect_type, infer_column, suggest_column_types, ColumnInference, InferredColumn,
    InferredTableSchema,
};
pub use mapping::StoreType;

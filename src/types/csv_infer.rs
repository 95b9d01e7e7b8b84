//! Type suggestion for delimited-text files.
//!
//! Reads a header and a bounded number of sample rows with the `csv` crate and
//! runs [`suggest_column_types`] over them. Only the sampled prefix of the
//! input is read.

use std::io::Read;
use std::path::Path;

use super::infer::{suggest_column_types, InferredTableSchema};
use crate::import::source::open_decompressed;
use crate::import::ImportError;

/// Default number of data rows sampled for inference.
pub const DEFAULT_SAMPLE_ROWS: usize = 100;

/// Options for sampling a delimited file.
///
/// # Example
///
/// ```
/// use clickflat::types::CsvInferenceOptions;
///
/// let options = CsvInferenceOptions::new()
///     .with_delimiter(b';')
///     .with_max_sample_records(10);
/// assert_eq!(options.delimiter, b';');
/// ```
#[derive(Debug, Clone)]
pub struct CsvInferenceOptions {
    /// Field delimiter byte (default: `,`).
    pub delimiter: u8,
    /// Quote character (default: `"`).
    pub quote: u8,
    /// Maximum number of data rows to sample (default: 100).
    pub max_sample_records: usize,
}

impl Default for CsvInferenceOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            max_sample_records: DEFAULT_SAMPLE_ROWS,
        }
    }
}

impl CsvInferenceOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the quote character.
    #[must_use]
    pub fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    /// Set the maximum number of sampled rows.
    #[must_use]
    pub fn with_max_sample_records(mut self, max: usize) -> Self {
        self.max_sample_records = max;
        self
    }
}

/// Header and sampled rows of a delimited source.
///
/// Empty cells are `None`; rows keep their own length, so short rows stay short.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvSample {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl CsvSample {
    /// Suggest a store type for every header from the sampled rows.
    pub fn suggest_types(&self) -> InferredTableSchema {
        suggest_column_types(&self.headers, &self.rows)
    }
}

/// Read the header and up to `options.max_sample_records` rows from `reader`.
///
/// # Errors
///
/// Returns `ImportError::SchemaInferenceError` if the input is not valid
/// delimited text or has no header row.
pub fn sample_csv<R: Read>(
    reader: R,
    options: &CsvInferenceOptions,
) -> Result<CsvSample, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .quote(options.quote)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| ImportError::SchemaInferenceError(format!("Failed to read header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(ImportError::SchemaInferenceError(
            "Input has no header row".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for record in csv_reader.records().take(options.max_sample_records) {
        let record = record.map_err(|e| {
            ImportError::SchemaInferenceError(format!("Failed to read sample row: {e}"))
        })?;
        rows.push(
            record
                .iter()
                .map(|field| (!field.is_empty()).then(|| field.to_string()))
                .collect(),
        );
    }

    Ok(CsvSample { headers, rows })
}

/// Suggest column types for a delimited file.
///
/// `.gz` and `.bz2` files are decompressed transparently.
///
/// # Arguments
///
/// * `file_path` - Path to the file
/// * `options` - Sampling options
///
/// # Errors
///
/// Returns `ImportError::SchemaInferenceError` if the file cannot be opened or
/// parsed.
pub fn infer_schema_from_csv(
    file_path: &Path,
    options: &CsvInferenceOptions,
) -> Result<InferredTableSchema, ImportError> {
    let reader = open_decompressed(file_path).map_err(|e| {
        ImportError::SchemaInferenceError(format!(
            "Failed to open file '{}': {}",
            file_path.display(),
            e
        ))
    })?;

    Ok(sample_csv(reader, options)?.suggest_types())
}

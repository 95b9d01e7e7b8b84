//! Export of query results to delimited text.
//!
//! This module streams the result of a SELECT built from a
//! [`QuerySpec`](crate::query::QuerySpec) to files, async writers, or memory.
//!
//! # Architecture
//!
//! 1. Take a best-effort row estimate of the main table (logged, never fatal)
//! 2. Build the SELECT with its JOINs
//! 3. Ask the store for the result as `CSVWithNames` with the chosen delimiter
//! 4. Copy the response chunk by chunk into the sink, counting lines
//!
//! # Example
//!
//! ```no_run
//! use clickflat::export::{export_to_file, CsvExportOptions};
//! use clickflat::query::{JoinSpec, JoinType, QuerySpec};
//! use clickflat::store::StoreConnection;
//! use std::path::Path;
//!
//! # async fn example(conn: &StoreConnection) -> Result<(), Box<dyn std::error::Error>> {
//! let spec = QuerySpec::new("users", &["users.id", "orders.total"])
//!     .join(JoinSpec::new("orders", JoinType::Left, "users.id = orders.user_id"))
//!     .delimiter(';');
//!
//! let result = export_to_file(conn, &spec, Path::new("/tmp/users.csv"), &CsvExportOptions::default()).await?;
//!
//! println!("Exported {} lines", result.row_count);
//! # Ok(())
//! # }
//! ```

pub mod csv;

pub use csv::{
    export_to_file, export_to_list, export_to_stream, preview, CsvExportOptions, ExportError,
    LineCounter, QueryPreview,
};

//! SQL statement builders.
//!
//! The builders here produce the complete set of statements the engine sends
//! to the store:
//! - `select` - SELECT with column projection and JOIN composition
//! - `insert` - `INSERT INTO ... FORMAT ...` for streamed ingestion
//! - `ddl` - `CREATE TABLE IF NOT EXISTS` for new ingestion targets
//! - `format` - wire formats and delimiter codes

pub mod ddl;
pub mod format;
pub mod insert;
pub mod select;

pub use ddl::CreateTable;
pub use format::{parse_delimiter, FormatKind, WireFormat, DEFAULT_DELIMITER};
pub use insert::InsertQuery;
pub use select::{build_select, JoinSpec, JoinType, QuerySpec, SelectQuery, UNCONDITIONAL_JOIN};


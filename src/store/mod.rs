//! Store gateway: the live connection plus the supported-type cache.

pub mod catalog;
pub mod connection;

pub use catalog::{TypeCatalog, TypeFamily};
pub use connection::{ColumnDescriptor, RowEstimate, StoreConnection, ESTIMATE_SENTINEL};

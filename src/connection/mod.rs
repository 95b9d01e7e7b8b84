//! Connection configuration for the store.
//!
//! This module provides connection parameter parsing and credentials. The
//! live connection itself is [`StoreConnection`](crate::store::StoreConnection).
//!

pub mod auth;
pub mod params;

pub use auth::{Credential, Credentials};
pub use params::{ConnectionBuilder, ConnectionParams, Protocol};

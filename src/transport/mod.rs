//! Store client contract and byte-stream plumbing.
//!
//! The engine never speaks the store's wire protocol itself. Everything goes
//! through a [`StoreClient`]: results come back as a [`ByteStream`] of
//! delimited text, and inserts consume one. [`HttpStoreClient`] implements the
//! contract over the ClickHouse HTTP interface.

pub mod http;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::error::TransportError;
use crate::query::WireFormat;

pub use http::HttpStoreClient;

/// Default chunk size for streamed bodies (64KB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// A stream of raw byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Operations the engine needs from the store.
///
/// Implementations must be usable from any task; one transfer issues at most
/// one call at a time.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Check that the store answers.
    async fn ping(&self) -> Result<bool, TransportError>;

    /// Run a SELECT and stream its result in `format`.
    async fn query(&self, sql: &str, format: &WireFormat) -> Result<ByteStream, TransportError>;

    /// Run an `INSERT ... FORMAT` statement with `body` as its data.
    ///
    /// Returns the number of rows the store reports as written.
    async fn insert(
        &self,
        sql: &str,
        format: &WireFormat,
        body: ByteStream,
    ) -> Result<u64, TransportError>;

    /// Run a statement without a result set (DDL).
    async fn execute(&self, sql: &str) -> Result<(), TransportError>;
}

/// A stream yielding `data` as a single chunk.
pub fn bytes_stream(data: impl Into<Bytes>) -> ByteStream {
    let data: Bytes = data.into();
    if data.is_empty() {
        Box::pin(stream::empty::<Result<Bytes, TransportError>>())
    } else {
        Box::pin(stream::once(async move { Ok::<_, TransportError>(data) }))
    }
}

/// Drain a stream into memory.
///
/// Only for small results such as counts and introspection queries.
pub async fn collect_bytes(mut stream: ByteStream) -> Result<Vec<u8>, TransportError> {
    let mut data = Vec::new();
    while let Some(chunk) = stream.next().await {
        data.extend_from_slice(&chunk?);
    }
    Ok(data)
}

//! [`StoreClient`] over the ClickHouse HTTP interface.
//!
//! Every statement is a `POST /` with the SQL in the `query` parameter. Result
//! formats are selected with `default_format`, format settings (such as the
//! CSV delimiter) travel as further URL parameters, and inserts stream their
//! data as the request body. Errors are reported with a non-2xx status, the
//! exception text as the body, and the exception code in
//! `X-ClickHouse-Exception-Code`.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, trace};

use super::{ByteStream, StoreClient};
use crate::connection::{ConnectionParams, Credentials};
use crate::error::TransportError;
use crate::query::WireFormat;

/// Header carrying the numeric exception code of a failed statement.
pub const EXCEPTION_CODE_HEADER: &str = "X-ClickHouse-Exception-Code";

/// Header carrying the JSON progress summary of a finished statement.
pub const SUMMARY_HEADER: &str = "X-ClickHouse-Summary";

/// Body returned by `/ping` on a healthy server.
const PING_RESPONSE: &str = "Ok.";

/// HTTP implementation of [`StoreClient`].
#[derive(Debug, Clone)]
pub struct HttpStoreClient {
    client: Client,
    base_url: String,
    database: String,
    credentials: Credentials,
}

/// Subset of the `X-ClickHouse-Summary` header.
///
/// The server encodes the counters as JSON strings.
#[derive(Debug, Deserialize)]
struct QuerySummary {
    #[serde(default)]
    written_rows: Option<serde_json::Value>,
}

impl HttpStoreClient {
    /// Build a client for `params` without contacting the server.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Http` if the HTTP client cannot be built.
    pub fn new(params: &ConnectionParams) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(params.connect_timeout)
            .read_timeout(params.socket_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: params.base_url(),
            database: params.database.clone(),
            credentials: params.credentials.clone(),
        })
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn statement(&self, sql: &str, format: Option<&WireFormat>) -> RequestBuilder {
        let mut params: Vec<(&str, String)> = vec![
            ("database", self.database.clone()),
            ("query", sql.to_string()),
        ];
        if let Some(format) = format {
            params.push(("default_format", format.kind.name().to_string()));
            params.extend(format.settings());
        }

        let mut request = self
            .client
            .post(format!("{}/", self.base_url))
            .query(&params);
        for (name, value) in self.credentials.headers() {
            request = request.header(name, value);
        }
        request
    }

    /// Turn a non-2xx response into `TransportError::Server`.
    async fn check(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = response
            .headers()
            .get(EXCEPTION_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok());
        let message = response.text().await.unwrap_or_default().trim().to_string();

        Err(TransportError::Server {
            status: status.as_u16(),
            code,
            message,
        })
    }
}

/// Parse `written_rows` out of a summary header value.
pub(crate) fn parse_written_rows(summary: &str) -> Option<u64> {
    let summary: QuerySummary = serde_json::from_str(summary).ok()?;
    match summary.written_rows? {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

#[async_trait]
impl StoreClient for HttpStoreClient {
    async fn ping(&self) -> Result<bool, TransportError> {
        let response = self
            .client
            .get(format!("{}/ping", self.base_url))
            .send()
            .await?;
        let response = Self::check(response).await?;
        let body = response.text().await?;
        Ok(body.trim() == PING_RESPONSE)
    }

    async fn query(&self, sql: &str, format: &WireFormat) -> Result<ByteStream, TransportError> {
        debug!(sql = %sql, format = %format.kind, "Executing query");
        let response = self.statement(sql, Some(format)).send().await?;
        let response = Self::check(response).await?;

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(TransportError::from)),
        ))
    }

    async fn insert(
        &self,
        sql: &str,
        format: &WireFormat,
        body: ByteStream,
    ) -> Result<u64, TransportError> {
        debug!(sql = %sql, "Streaming insert");
        let response = self
            .statement(sql, Some(format))
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await?;
        let response = Self::check(response).await?;

        let written = response
            .headers()
            .get(SUMMARY_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_written_rows)
            .unwrap_or(0);
        trace!(written, "Insert finished");

        // Drain so the connection can be reused.
        response.bytes().await?;
        Ok(written)
    }

    async fn execute(&self, sql: &str) -> Result<(), TransportError> {
        debug!(sql = %sql, "Executing statement");
        let response = self.statement(sql, None).send().await?;
        Self::check(response).await?.bytes().await?;
        Ok(())
    }
}

//! Shared fixtures for integration tests.
//!
//! [`MemoryStore`] is an in-memory [`StoreClient`] that understands the
//! statements the engine issues: row counts, `JSONEachRow` introspection of
//! `system.*` tables, single-table SELECTs, `INSERT ... FORMAT CSVWithNames` with or
//! without a column list, and `CREATE TABLE IF NOT EXISTS`. Anything else
//! (joins, for instance) needs a scripted response.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use serde_json::{json, Value};

use clickflat::query::WireFormat;
use clickflat::transport::{collect_bytes, ByteStream, StoreClient};
use clickflat::{ConnectionParams, StoreConnection, TransportError};

pub const DATABASE: &str = "testdb";

/// Response chunks are cut to this size to exercise chunk boundaries.
const RESPONSE_CHUNK_SIZE: usize = 7;

/// Families reported by `system.data_type_families`.
const TYPE_FAMILIES: &[(&str, bool, &str)] = &[
    ("Int32", false, ""),
    ("Int64", false, ""),
    ("UInt64", false, ""),
    ("Float64", false, ""),
    ("String", false, ""),
    ("Date", false, ""),
    ("DateTime", true, ""),
    ("Bool", true, ""),
    ("UUID", false, ""),
    ("Nullable", false, ""),
    ("TEXT", true, "String"),
];

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    /// `(name, type)` in definition order.
    pub columns: Vec<(String, String)>,
    pub rows: Vec<Vec<String>>,
}

/// A scripted response chunk; `Err` breaks the stream at that point.
pub type ScriptedChunk = Result<&'static str, &'static str>;

#[derive(Default)]
struct State {
    tables: BTreeMap<String, MemoryTable>,
    scripted: HashMap<String, Vec<ScriptedChunk>>,
    failing: Vec<String>,
    /// Table to the number of counts that succeed before counts fail.
    failing_counts: HashMap<String, usize>,
    count_calls: HashMap<String, usize>,
    statements: Vec<String>,
    inserts: Vec<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Add a table with `(name, type)` columns.
    pub fn add_table(&self, name: &str, columns: &[(&str, &str)]) {
        let table = MemoryTable {
            columns: columns
                .iter()
                .map(|(n, t)| (n.to_string(), t.to_string()))
                .collect(),
            rows: Vec::new(),
        };
        self.state().tables.insert(name.to_string(), table);
    }

    pub fn add_rows(&self, table: &str, rows: &[&[&str]]) {
        let mut state = self.state();
        let table = state.tables.get_mut(table).unwrap();
        for row in rows {
            table.rows.push(row.iter().map(|v| v.to_string()).collect());
        }
    }

    pub fn table(&self, name: &str) -> Option<MemoryTable> {
        self.state().tables.get(name).cloned()
    }

    pub fn rows(&self, table: &str) -> Vec<Vec<String>> {
        self.table(table).map(|t| t.rows).unwrap_or_default()
    }

    /// Answer `sql` with exactly these chunks.
    pub fn script(&self, sql: &str, chunks: Vec<ScriptedChunk>) {
        self.state().scripted.insert(sql.to_string(), chunks);
    }

    /// Fail every statement containing `fragment`.
    pub fn fail_on(&self, fragment: &str) {
        self.state().failing.push(fragment.to_string());
    }

    /// Let `succeeding` row counts of `table` pass, then fail the rest.
    pub fn fail_counts_after(&self, table: &str, succeeding: usize) {
        self.state()
            .failing_counts
            .insert(table.to_string(), succeeding);
    }

    /// Every statement seen, in order.
    pub fn statements(&self) -> Vec<String> {
        self.state().statements.clone()
    }

    /// INSERT statements seen, in order.
    pub fn inserts(&self) -> Vec<String> {
        self.state().inserts.clone()
    }

    fn record(&self, sql: &str) -> Result<(), TransportError> {
        let mut state = self.state();
        state.statements.push(sql.to_string());
        if state.failing.iter().any(|f| sql.contains(f.as_str())) {
            return Err(server_error(500, 1000, "injected failure"));
        }
        Ok(())
    }

    fn count_rows(&self, table: &str) -> Result<String, TransportError> {
        let mut state = self.state();
        let calls = state.count_calls.entry(table.to_string()).or_insert(0);
        *calls += 1;
        let calls = *calls;
        if let Some(&succeeding) = state.failing_counts.get(table) {
            if calls > succeeding {
                return Err(server_error(500, 159, "Timeout exceeded"));
            }
        }
        match state.tables.get(table) {
            Some(t) => Ok(format!("{}\n", t.rows.len())),
            None => Err(unknown_table(table)),
        }
    }

    fn select(&self, sql: &str, format: &WireFormat) -> Result<String, TransportError> {
        if sql.contains(" JOIN ") {
            return Err(TransportError::Protocol(format!("no scripted response for {sql}")));
        }
        let (projection, rest) = sql
            .strip_prefix("SELECT ")
            .and_then(|s| s.split_once(" FROM "))
            .ok_or_else(|| TransportError::Protocol(format!("unsupported query {sql}")))?;
        let (table_part, limit) = match rest.split_once(" LIMIT ") {
            Some((t, l)) => (t, l.trim().parse::<usize>().ok()),
            None => (rest, None),
        };
        let table_name = unquote(table_part.trim());

        let state = self.state();
        let table = state
            .tables
            .get(&table_name)
            .ok_or_else(|| unknown_table(&table_name))?;

        let names: Vec<String> = projection
            .split(',')
            .map(|c| unquote(c.rsplit('.').next().unwrap_or(c)))
            .collect();
        let indices = names
            .iter()
            .map(|n| {
                table
                    .columns
                    .iter()
                    .position(|(c, _)| c == n)
                    .ok_or_else(|| server_error(400, 47, &format!("Unknown identifier {n}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let delimiter = format.effective_delimiter();
        let mut out = String::new();
        if format.kind.has_header() {
            out.push_str(&csv_line(&names, delimiter));
        }
        for row in table.rows.iter().take(limit.unwrap_or(usize::MAX)) {
            let fields: Vec<String> = indices.iter().map(|&i| row[i].clone()).collect();
            out.push_str(&csv_line(&fields, delimiter));
        }
        Ok(out)
    }

    fn introspect(&self, sql: &str) -> Result<Option<String>, TransportError> {
        let state = self.state();
        if sql == "SELECT 1" {
            return Ok(Some("1\n".to_string()));
        }
        if sql.starts_with("SELECT name FROM system.tables") {
            let out = state
                .tables
                .keys()
                .map(|n| json_line(json!({ "name": n })))
                .collect();
            return Ok(Some(out));
        }
        if sql.starts_with("SELECT count() FROM system.tables") {
            let name = literal_after(sql, "name = ").unwrap_or_default();
            return Ok(Some(format!("{}\n", u8::from(state.tables.contains_key(&name)))));
        }
        if sql.starts_with("SELECT name, type FROM system.columns") {
            let name = literal_after(sql, "table = ").unwrap_or_default();
            let out = state
                .tables
                .get(&name)
                .map(|t| {
                    t.columns
                        .iter()
                        .map(|(n, ty)| json_line(json!({ "name": n, "type": ty })))
                        .collect()
                })
                .unwrap_or_default();
            return Ok(Some(out));
        }
        if sql.starts_with("SELECT name, case_insensitive, alias_to FROM system.data_type_families") {
            let out = TYPE_FAMILIES
                .iter()
                .map(|(n, ci, alias)| {
                    json_line(json!({
                        "name": n,
                        "case_insensitive": u8::from(*ci),
                        "alias_to": alias,
                    }))
                })
                .collect();
            return Ok(Some(out));
        }
        Ok(None)
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn ping(&self) -> Result<bool, TransportError> {
        Ok(true)
    }

    async fn query(&self, sql: &str, format: &WireFormat) -> Result<ByteStream, TransportError> {
        self.record(sql)?;

        if let Some(chunks) = self.state().scripted.get(sql).cloned() {
            let items: Vec<Result<Bytes, TransportError>> = chunks
                .into_iter()
                .map(|c| match c {
                    Ok(data) => Ok(Bytes::from_static(data.as_bytes())),
                    Err(message) => Err(TransportError::Http(message.to_string())),
                })
                .collect();
            return Ok(Box::pin(stream::iter(items)));
        }

        if let Some(out) = self.introspect(sql)? {
            return Ok(chunked(out));
        }

        if let Some(rest) = sql.strip_prefix("SELECT count() FROM ") {
            return Ok(chunked(self.count_rows(&unquote(rest.trim()))?));
        }

        Ok(chunked(self.select(sql, format)?))
    }

    async fn insert(
        &self,
        sql: &str,
        format: &WireFormat,
        body: ByteStream,
    ) -> Result<u64, TransportError> {
        self.record(sql)?;
        self.state().inserts.push(sql.to_string());

        let target = sql
            .strip_prefix("INSERT INTO ")
            .and_then(|s| s.split_once(" FORMAT "))
            .map(|(t, _)| t)
            .ok_or_else(|| TransportError::Protocol(format!("unsupported insert {sql}")))?;
        let (table_name, column_list) = match target.split_once(" (") {
            Some((t, cols)) => {
                let cols: Vec<String> = cols
                    .trim_end_matches(')')
                    .split(", ")
                    .map(unquote)
                    .collect();
                (unquote(t), Some(cols))
            }
            None => (unquote(target), None),
        };

        let data = collect_bytes(body).await?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(format.effective_delimiter() as u8)
            .has_headers(true)
            .from_reader(data.as_slice());
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| server_error(400, 27, &e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut state = self.state();
        let table = state
            .tables
            .get_mut(&table_name)
            .ok_or_else(|| unknown_table(&table_name))?;
        let allowed: Vec<String> = column_list
            .unwrap_or_else(|| table.columns.iter().map(|(n, _)| n.clone()).collect());

        let positions = headers
            .iter()
            .map(|h| {
                table
                    .columns
                    .iter()
                    .position(|(c, _)| c == h)
                    .filter(|_| allowed.contains(h))
                    .ok_or_else(|| server_error(400, 16, &format!("No such column {h}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut parsed = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| server_error(400, 27, &e.to_string()))?;
            let mut row = vec![String::new(); table.columns.len()];
            for (field, &pos) in record.iter().zip(&positions) {
                row[pos] = field.to_string();
            }
            parsed.push(row);
        }

        let written = parsed.len() as u64;
        table.rows.extend(parsed);
        Ok(written)
    }

    async fn execute(&self, sql: &str) -> Result<(), TransportError> {
        self.record(sql)?;

        let rest = sql
            .strip_prefix("CREATE TABLE IF NOT EXISTS ")
            .ok_or_else(|| TransportError::Protocol(format!("unsupported statement {sql}")))?;
        let (name, body) = rest
            .split_once(" (\n")
            .ok_or_else(|| TransportError::Protocol("malformed CREATE TABLE".to_string()))?;
        let definitions = body.split("\n)").next().unwrap_or_default();

        let columns = definitions
            .split(",\n")
            .filter_map(|line| {
                let line = line.trim();
                let end = line.rfind('`')?;
                Some((unquote(&line[..=end]), line[end + 1..].trim().to_string()))
            })
            .collect();

        self.state()
            .tables
            .entry(unquote(name))
            .or_insert(MemoryTable {
                columns,
                rows: Vec::new(),
            });
        Ok(())
    }
}

/// A store connection over `store`.
pub fn connection(store: &Arc<MemoryStore>) -> StoreConnection {
    StoreConnection::from_client(store.clone(), DATABASE)
}

/// A stream yielding `parts` as separate chunks.
pub fn source(parts: &[&'static str]) -> ByteStream {
    let items: Vec<Result<Bytes, TransportError>> = parts
        .iter()
        .map(|p| Ok(Bytes::from_static(p.as_bytes())))
        .collect();
    Box::pin(stream::iter(items))
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Parameters for a live server, from `CLICKHOUSE_*` variables.
pub fn live_params() -> ConnectionParams {
    ConnectionParams::from_env().expect("CLICKHOUSE_* environment should be valid")
}

/// A unique table name for live tests.
pub fn generate_test_table_name(prefix: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{prefix}_{}_{nanos}", std::process::id())
}

fn chunked(out: String) -> ByteStream {
    let bytes = Bytes::from(out);
    let items: Vec<Result<Bytes, TransportError>> = (0..bytes.len())
        .step_by(RESPONSE_CHUNK_SIZE)
        .map(|start| Ok(bytes.slice(start..(start + RESPONSE_CHUNK_SIZE).min(bytes.len()))))
        .collect();
    Box::pin(stream::iter(items))
}

fn json_line(row: Value) -> String {
    format!("{row}\n")
}

fn csv_line(fields: &[String], delimiter: char) -> String {
    let mut line = fields
        .iter()
        .map(|f| {
            if f.contains(delimiter) || f.contains('"') || f.contains('\n') {
                format!("\"{}\"", f.replace('"', "\"\""))
            } else {
                f.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(&delimiter.to_string());
    line.push('\n');
    line
}

/// Strip backtick quoting from an identifier.
fn unquote(identifier: &str) -> String {
    let identifier = identifier.trim();
    identifier
        .strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
        .map(|s| s.replace("``", "`"))
        .unwrap_or_else(|| identifier.to_string())
}

fn literal_after(sql: &str, key: &str) -> Option<String> {
    let start = sql.find(key)? + key.len();
    let rest = sql[start..].strip_prefix('\'')?;
    rest.split('\'').next().map(str::to_string)
}

fn server_error(status: u16, code: u32, message: &str) -> TransportError {
    TransportError::Server {
        status,
        code: Some(code),
        message: message.to_string(),
    }
}

fn unknown_table(table: &str) -> TransportError {
    server_error(404, 60, &format!("Table {DATABASE}.{table} does not exist"))
}

//! Streaming column projection.
//!
//! When only some of a table's columns are ingested, the source rows are
//! reduced to the selected columns on the fly. The source header decides
//! which field positions are kept; the output is delimited text with a header
//! of the selected names followed by one line per source row.
//!
//! Parsing follows the CSV conventions of the store: fields may be quoted,
//! quotes inside quoted fields are doubled, and quoted fields may contain the
//! delimiter or line breaks. Chunk boundaries can fall anywhere.

use bytes::Bytes;
use futures::{stream, StreamExt};
use tracing::debug;

use super::ImportError;
use crate::error::TransportError;
use crate::transport::ByteStream;

const QUOTE: u8 = b'"';

#[derive(Debug, Default)]
struct Field {
    data: Vec<u8>,
    quoted: bool,
}

/// Incremental CSV row projector.
///
/// Feed chunks with [`push`](Self::push) and call [`finish`](Self::finish)
/// once the source ends. Output for complete rows is appended to the caller's
/// buffer.
#[derive(Debug)]
pub struct RowProjector {
    columns: Vec<String>,
    delimiter: u8,
    /// Source positions of the selected columns, once the header is read.
    indices: Option<Vec<usize>>,
    row: Vec<Field>,
    field: Field,
    in_quotes: bool,
    quote_pending: bool,
    /// An unquoted `\r` that is dropped only if `\n` follows.
    cr_pending: bool,
    /// Source rows completed, header included.
    rows_seen: usize,
}

impl RowProjector {
    /// Project onto `columns`, splitting fields on `delimiter`.
    pub fn new(columns: Vec<String>, delimiter: u8) -> Self {
        Self {
            columns,
            delimiter,
            indices: None,
            row: Vec::new(),
            field: Field::default(),
            in_quotes: false,
            quote_pending: false,
            cr_pending: false,
            rows_seen: 0,
        }
    }

    /// Whether the source header has been read and resolved.
    pub fn header_resolved(&self) -> bool {
        self.indices.is_some()
    }

    /// Source positions of the selected columns.
    pub fn indices(&self) -> Option<&[usize]> {
        self.indices.as_deref()
    }

    /// Consume a chunk of source bytes.
    ///
    /// # Errors
    ///
    /// `ImportError::MissingColumn` if the header lacks a selected column.
    pub fn push(&mut self, chunk: &[u8], out: &mut Vec<u8>) -> Result<(), ImportError> {
        for &byte in chunk {
            if self.cr_pending {
                self.cr_pending = false;
                if byte != b'\n' {
                    self.field.data.push(b'\r');
                }
            }

            if self.in_quotes {
                if self.quote_pending {
                    self.quote_pending = false;
                    if byte == QUOTE {
                        self.field.data.push(QUOTE);
                        continue;
                    }
                    self.in_quotes = false;
                } else if byte == QUOTE {
                    self.quote_pending = true;
                    continue;
                } else {
                    self.field.data.push(byte);
                    continue;
                }
            }

            match byte {
                QUOTE if self.field.data.is_empty() && !self.field.quoted => {
                    self.in_quotes = true;
                    self.field.quoted = true;
                }
                b'\n' => {
                    self.end_field();
                    self.end_row(out)?;
                }
                b'\r' => self.cr_pending = true,
                _ if byte == self.delimiter => self.end_field(),
                _ => self.field.data.push(byte),
            }
        }
        Ok(())
    }

    /// Flush the last row.
    ///
    /// # Errors
    ///
    /// `ImportError::MalformedInput` if the source ends inside a quoted
    /// field, or the errors of [`push`](Self::push).
    pub fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), ImportError> {
        if self.in_quotes && !self.quote_pending {
            return Err(ImportError::MalformedInput {
                row: self.rows_seen + 1,
                message: "unterminated quoted field".to_string(),
            });
        }
        self.in_quotes = false;
        self.quote_pending = false;
        if std::mem::take(&mut self.cr_pending) {
            self.field.data.push(b'\r');
        }

        if !self.row.is_empty() || !self.field.data.is_empty() || self.field.quoted {
            self.end_field();
            self.end_row(out)?;
        }
        Ok(())
    }

    fn end_field(&mut self) {
        self.row.push(std::mem::take(&mut self.field));
    }

    fn end_row(&mut self, out: &mut Vec<u8>) -> Result<(), ImportError> {
        let row = std::mem::take(&mut self.row);
        if row.len() == 1 && row[0].data.is_empty() && !row[0].quoted {
            return Ok(());
        }
        self.rows_seen += 1;

        let Some(indices) = &self.indices else {
            return self.resolve_header(&row, out);
        };

        let empty = Field::default();
        for (i, &index) in indices.iter().enumerate() {
            if i > 0 {
                out.push(self.delimiter);
            }
            write_field(row.get(index).unwrap_or(&empty), self.delimiter, out);
        }
        out.push(b'\n');
        Ok(())
    }

    fn resolve_header(&mut self, row: &[Field], out: &mut Vec<u8>) -> Result<(), ImportError> {
        let names: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let name = String::from_utf8_lossy(&field.data);
                let name: &str = if i == 0 { name.trim_start_matches('\u{feff}') } else { &name };
                name.trim().to_string()
            })
            .collect();

        let indices = self
            .columns
            .iter()
            .map(|column| {
                names
                    .iter()
                    .position(|name| name == column.trim())
                    .ok_or_else(|| ImportError::MissingColumn {
                        column: column.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(source_columns = names.len(), selected = ?indices, "Resolved projection");

        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                out.push(self.delimiter);
            }
            let field = Field {
                data: column.as_bytes().to_vec(),
                quoted: false,
            };
            write_field(&field, self.delimiter, out);
        }
        out.push(b'\n');
        self.indices = Some(indices);
        Ok(())
    }
}

fn write_field(field: &Field, delimiter: u8, out: &mut Vec<u8>) {
    let needs_quotes = field.quoted
        || field
            .data
            .iter()
            .any(|&b| b == delimiter || b == QUOTE || b == b'\n' || b == b'\r');
    if !needs_quotes {
        out.extend_from_slice(&field.data);
        return;
    }

    out.push(QUOTE);
    for &b in &field.data {
        if b == QUOTE {
            out.push(QUOTE);
        }
        out.push(b);
    }
    out.push(QUOTE);
}

/// Project a delimited byte stream onto `columns`.
///
/// The source header is read before returning, so an unknown column is
/// reported before anything is sent to the store. Later parse errors end the
/// returned stream with `TransportError::Protocol`. A source without any rows
/// yields an empty stream.
///
/// # Errors
///
/// `ImportError::MissingColumn` for a selected column absent from the header,
/// `ImportError::Source` if the source fails while the header is read.
pub async fn project_stream(
    mut source: ByteStream,
    columns: &[String],
    delimiter: u8,
) -> Result<ByteStream, ImportError> {
    let mut projector = RowProjector::new(columns.to_vec(), delimiter);
    let mut head = Vec::new();

    while !projector.header_resolved() {
        match source.next().await {
            Some(chunk) => projector.push(&chunk.map_err(ImportError::Source)?, &mut head)?,
            None => {
                projector.finish(&mut head)?;
                if !projector.header_resolved() {
                    return Ok(Box::pin(stream::empty::<Result<Bytes, TransportError>>()));
                }
                return Ok(Box::pin(stream::once(async move {
                    Ok::<_, TransportError>(Bytes::from(head))
                })));
            }
        }
    }

    let rest = stream::try_unfold(
        (source, projector, false),
        |(mut source, mut projector, done)| async move {
            if done {
                return Ok::<_, TransportError>(None);
            }
            loop {
                let mut out = Vec::new();
                let finished = match source.next().await {
                    Some(chunk) => {
                        projector.push(&chunk?, &mut out).map_err(to_transport)?;
                        false
                    }
                    None => {
                        projector.finish(&mut out).map_err(to_transport)?;
                        true
                    }
                };
                if !out.is_empty() {
                    return Ok(Some((Bytes::from(out), (source, projector, finished))));
                }
                if finished {
                    return Ok(None);
                }
            }
        },
    );

    let head = stream::once(async move { Ok::<_, TransportError>(Bytes::from(head)) });
    Ok(Box::pin(head.chain(rest)))
}

fn to_transport(err: ImportError) -> TransportError {
    TransportError::Protocol(err.to_string())
}

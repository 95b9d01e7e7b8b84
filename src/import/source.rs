//! Byte sources for ingestion.
//!
//! Files are read on a blocking thread, decompressed if their extension says
//! so, and handed to the async side in fixed-size chunks through a bounded
//! channel. Memory use stays at a few chunks regardless of file size.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use bytes::Bytes;
use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use futures::stream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::transport::{ByteStream, DEFAULT_CHUNK_SIZE};

/// Chunks buffered between the reader thread and the insert.
const CHANNEL_BUFFER_SIZE: usize = 16;

/// Compression of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Bzip2,
}

/// Detect compression from the file extension.
///
/// `.gz`/`.gzip` and `.bz2`/`.bzip2` are recognized, case-insensitively.
pub fn detect_compression(file_path: &Path) -> Compression {
    let path_str = file_path.to_string_lossy().to_lowercase();

    if path_str.ends_with(".gz") || path_str.ends_with(".gzip") {
        Compression::Gzip
    } else if path_str.ends_with(".bz2") || path_str.ends_with(".bzip2") {
        Compression::Bzip2
    } else {
        Compression::None
    }
}

/// Open a file for reading, decompressing according to its extension.
///
/// # Errors
///
/// Returns the I/O error if the file cannot be opened.
pub fn open_decompressed(file_path: &Path) -> io::Result<Box<dyn Read + Send>> {
    let file = BufReader::new(File::open(file_path)?);

    Ok(match detect_compression(file_path) {
        Compression::None => Box::new(file),
        Compression::Gzip => Box::new(MultiGzDecoder::new(file)),
        Compression::Bzip2 => Box::new(BzDecoder::new(file)),
    })
}

/// Stream the (decompressed) contents of a file.
///
/// The file is opened before returning, so a missing file is reported here.
/// Read and decompression errors surface as stream items.
///
/// # Errors
///
/// Returns the I/O error if the file cannot be opened.
pub fn file_stream(file_path: &Path) -> io::Result<ByteStream> {
    let reader = open_decompressed(file_path)?;
    debug!(
        path = %file_path.display(),
        compression = ?detect_compression(file_path),
        "Streaming file"
    );
    Ok(read_stream(reader, DEFAULT_CHUNK_SIZE))
}

/// Stream a blocking reader in chunks of at most `chunk_size` bytes.
pub fn read_stream<R>(mut reader: R, chunk_size: usize) -> ByteStream
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Result<Bytes, TransportError>>(CHANNEL_BUFFER_SIZE);

    tokio::task::spawn_blocking(move || {
        let mut buffer = vec![0u8; chunk_size.max(1)];
        loop {
            let item = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => Ok(Bytes::copy_from_slice(&buffer[..n])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Err(TransportError::from(e)),
            };
            let failed = item.is_err();
            if tx.blocking_send(item).is_err() {
                warn!("Source consumer went away, stopping read");
                break;
            }
            if failed {
                break;
            }
        }
    });

    Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::collect_bytes;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_detect_compression() {
        assert_eq!(detect_compression(Path::new("data.csv")), Compression::None);
        assert_eq!(detect_compression(Path::new("data.csv.gz")), Compression::Gzip);
        assert_eq!(detect_compression(Path::new("DATA.CSV.GZIP")), Compression::Gzip);
        assert_eq!(detect_compression(Path::new("data.csv.bz2")), Compression::Bzip2);
        assert_eq!(detect_compression(Path::new("data.bzip2")), Compression::Bzip2);
    }

    #[test]
    fn test_open_decompressed_missing_file() {
        let result = open_decompressed(&PathBuf::from("/nonexistent/file.csv"));
        assert_eq!(result.err().map(|e| e.kind()), Some(io::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_file_stream_plain() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.csv");
        std::fs::write(&path, "id,name\n1,a\n").unwrap();

        let data = collect_bytes(file_stream(&path).unwrap()).await.unwrap();
        assert_eq!(data, b"id,name\n1,a\n");
    }

    #[tokio::test]
    async fn test_file_stream_gzip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv.gz");
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"id\n1\n2\n").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let data = collect_bytes(file_stream(&path).unwrap()).await.unwrap();
        assert_eq!(data, b"id\n1\n2\n");
    }

    #[tokio::test]
    async fn test_file_stream_bzip2() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv.bz2");
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(b"x,y\n3,4\n").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let data = collect_bytes(file_stream(&path).unwrap()).await.unwrap();
        assert_eq!(data, b"x,y\n3,4\n");
    }

    #[tokio::test]
    async fn test_read_stream_small_chunks() {
        let reader = io::Cursor::new(b"abcdefg".to_vec());
        let data = collect_bytes(read_stream(reader, 3)).await.unwrap();
        assert_eq!(data, b"abcdefg");
    }

    #[tokio::test]
    async fn test_read_stream_corrupt_gzip_errors() {
        let reader = MultiGzDecoder::new(io::Cursor::new(b"not gzip at all".to_vec()));
        let result = collect_bytes(read_stream(reader, 16)).await;
        assert!(matches!(result, Err(TransportError::Io(_))));
    }
}

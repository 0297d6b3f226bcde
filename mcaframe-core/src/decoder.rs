//! Record decoding from byte buffers and byte streams.
//!
//! [`decode_records`] is a pure transform over one in-memory buffer.
//! [`RecordReader`] wraps any [`Read`] source and hands out buffers holding a
//! whole number of records, so chunk boundaries never split a record.

use crate::parser;
use crate::types::{RawEventRecord, RECORD_SIZE};
use std::io::{self, Read};
use std::iter::FusedIterator;
use std::slice::ChunksExact;
use thiserror::Error;

/// Errors that can occur while decoding a record stream.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid format: stream length {len} is not a multiple of the 14-byte record size")]
    UnalignedLength { len: u64 },

    #[error("Invalid format: expected {expected} records, decoded {decoded}")]
    CountMismatch { expected: u64, decoded: u64 },
}

impl DecodeError {
    /// True for errors caused by the layout of the data rather than I/O.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::UnalignedLength { .. } | Self::CountMismatch { .. }
        )
    }
}

/// Returns the number of records in a stream of `len` bytes.
///
/// Fails if `len` is not a whole number of records.
pub fn record_count(len: u64) -> Result<u64, DecodeError> {
    if len % RECORD_SIZE as u64 != 0 {
        return Err(DecodeError::UnalignedLength { len });
    }
    Ok(len / RECORD_SIZE as u64)
}

/// Validates `bytes` and returns a lazy iterator over its records.
///
/// The buffer is checked up front, so iteration itself cannot fail.
pub fn decode_records(bytes: &[u8]) -> Result<Records<'_>, DecodeError> {
    record_count(bytes.len() as u64)?;
    Ok(Records {
        chunks: bytes.chunks_exact(RECORD_SIZE),
    })
}

/// Iterator over the records of a validated buffer, in buffer order.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    chunks: ChunksExact<'a, u8>,
}

impl Iterator for Records<'_> {
    type Item = RawEventRecord;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next().map(parser::parse_record)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Records<'_> {}
impl FusedIterator for Records<'_> {}

/// Chunked reader over a raw record stream.
///
/// Each call to [`RecordReader::next_chunk`] fills an internal buffer with up to
/// `chunk_records` whole records. A stream ending part-way through a record
/// fails with [`DecodeError::UnalignedLength`].
#[derive(Debug)]
pub struct RecordReader<R> {
    inner: R,
    buffer: Vec<u8>,
    bytes_read: u64,
    records_read: u64,
}

impl<R: Read> RecordReader<R> {
    /// Creates a reader yielding chunks of at most `chunk_records` records.
    pub fn new(inner: R, chunk_records: usize) -> Self {
        Self {
            inner,
            buffer: vec![0u8; chunk_records.max(1) * RECORD_SIZE],
            bytes_read: 0,
            records_read: 0,
        }
    }

    /// Total records handed out so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Total bytes consumed from the source so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Reads the next chunk. Returns `Ok(None)` at a clean end of stream.
    pub fn next_chunk(&mut self) -> Result<Option<Records<'_>>, DecodeError> {
        let mut filled = 0;
        while filled < self.buffer.len() {
            match self.inner.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.bytes_read += filled as u64;

        if filled == 0 {
            return Ok(None);
        }
        if filled % RECORD_SIZE != 0 {
            return Err(DecodeError::UnalignedLength {
                len: self.bytes_read,
            });
        }

        let records = decode_records(&self.buffer[..filled])?;
        self.records_read += records.len() as u64;
        Ok(Some(records))
    }

    /// Consumes the reader, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

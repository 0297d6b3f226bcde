//! Whole-stream conversion: decode, segment, and append to a store chunk by chunk.

use crate::decoder::{decode_records, record_count, DecodeError, RecordReader};
use crate::segmenter::{ConversionStats, FrameSegmenter};
use crate::store::{ColumnStore, MemoryStore};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Default number of records decoded per chunk.
pub const DEFAULT_CHUNK_RECORDS: usize = 100_000;

/// Tuning for a conversion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Records per read chunk; zero is treated as one
    pub chunk_records: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            chunk_records: DEFAULT_CHUNK_RECORDS,
        }
    }
}

impl ConvertOptions {
    pub fn with_chunk_records(mut self, chunk_records: usize) -> Self {
        self.chunk_records = chunk_records.max(1);
        self
    }
}

/// Result of converting one record stream.
#[derive(Debug, Clone)]
pub struct Conversion<S = MemoryStore> {
    pub store: S,
    pub stats: ConversionStats,
}

/// Converts an in-memory record buffer.
pub fn convert_bytes(bytes: &[u8]) -> Result<Conversion, DecodeError> {
    let records = decode_records(bytes)?;
    let mut segmenter = FrameSegmenter::new();
    let mut store = MemoryStore::new();
    store.append(&segmenter.segment(records));
    Ok(Conversion {
        store,
        stats: *segmenter.stats(),
    })
}

/// Converts a record stream into `store`, calling `progress` with the running
/// record count after each chunk.
///
/// The store is only handed back on success, so a failed pass never exposes a
/// partially converted store to the caller.
pub fn convert_reader_into<R, S, P>(
    reader: R,
    mut store: S,
    options: ConvertOptions,
    mut progress: P,
) -> Result<Conversion<S>, DecodeError>
where
    R: Read,
    S: ColumnStore,
    P: FnMut(u64),
{
    let mut records = RecordReader::new(reader, options.chunk_records);
    let mut segmenter = FrameSegmenter::new();

    while let Some(chunk) = records.next_chunk()? {
        let batch = segmenter.segment(chunk);
        debug!(
            events = batch.events.len(),
            frames = batch.frames.len(),
            "chunk segmented"
        );
        store.append(&batch);
        progress(records.records_read());
    }

    let stats = *segmenter.stats();
    log_summary(&stats, store.frame_count());
    Ok(Conversion { store, stats })
}

/// Converts a record stream into a fresh [`MemoryStore`].
pub fn convert_reader<R: Read>(
    reader: R,
    options: ConvertOptions,
) -> Result<Conversion, DecodeError> {
    convert_reader_into(reader, MemoryStore::new(), options, |_| {})
}

/// Converts a raw record file, checking its length before decoding starts.
pub fn convert_file<P: AsRef<Path>>(
    path: P,
    options: ConvertOptions,
) -> Result<Conversion, DecodeError> {
    convert_file_with_progress(path, options, |_| {})
}

/// [`convert_file`] with a progress callback receiving the records read so far.
pub fn convert_file_with_progress<P, F>(
    path: P,
    options: ConvertOptions,
    progress: F,
) -> Result<Conversion, DecodeError>
where
    P: AsRef<Path>,
    F: FnMut(u64),
{
    let path = path.as_ref();
    let file = File::open(path)?;
    let expected = record_count(file.metadata()?.len())?;
    debug!(path = %path.display(), records = expected, "converting");

    convert_expecting(file, expected, options, progress)
}

/// Converts a stream that should hold exactly `expected` records.
///
/// Fails with [`DecodeError::CountMismatch`] if the stream ends early or runs
/// long, for example when a file changes size while it is being read.
pub fn convert_expecting<R, F>(
    reader: R,
    expected: u64,
    options: ConvertOptions,
    progress: F,
) -> Result<Conversion, DecodeError>
where
    R: Read,
    F: FnMut(u64),
{
    let conversion = convert_reader_into(reader, MemoryStore::new(), options, progress)?;
    if conversion.stats.records != expected {
        return Err(DecodeError::CountMismatch {
            expected,
            decoded: conversion.stats.records,
        });
    }
    Ok(conversion)
}

fn log_summary(stats: &ConversionStats, frames: usize) {
    info!(
        records = stats.records,
        frames,
        events = stats.accepted,
        markers = stats.markers,
        rejected = stats.rejected(),
        "conversion complete"
    );
}

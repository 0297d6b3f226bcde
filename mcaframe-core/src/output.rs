//! Output format writers for converted event data.
//!
//! Supports the `.mcaf` binary container (readable back into a
//! [`MemoryStore`]), per-event CSV with a configurable field order, and a
//! per-frame summary CSV.

use crate::store::{ColumnStore, FrameIndex, MemoryStore};
use crate::types::EventColumns;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during output writing or container reading.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Container magic number.
pub const MAGIC: &[u8; 8] = b"MCAFRM\0\0";

/// Container format version.
pub const VERSION: u32 = 1;

/// One per-event output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    FrameNumber,
    TriggerTime,
    FrameTime,
    Energy,
    Extras,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Self::FrameNumber => "frame_number",
            Self::TriggerTime => "trigger_time",
            Self::FrameTime => "frame_time",
            Self::Energy => "energy",
            Self::Extras => "extras",
        }
    }
}

/// Field ordering for event CSV output.
///
/// Any non-empty subset of the five columns, each at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOrder(Vec<Field>);

impl Default for FieldOrder {
    /// n, t, f, e, x
    fn default() -> Self {
        Self(vec![
            Field::FrameNumber,
            Field::TriggerTime,
            Field::FrameTime,
            Field::Energy,
            Field::Extras,
        ])
    }
}

impl std::str::FromStr for FieldOrder {
    type Err = OutputError;

    /// Parses a field order from a format string like "n,t,f,e,x" or "f,e".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Vec::new();

        for part in s.split(',').map(|p| p.trim().to_lowercase()) {
            let field = match part.as_str() {
                "n" | "frame" | "frame_number" => Field::FrameNumber,
                "t" | "trigger_time" => Field::TriggerTime,
                "f" | "frame_time" | "time_offset" => Field::FrameTime,
                "e" | "energy" => Field::Energy,
                "x" | "extras" | "flags" => Field::Extras,
                _ => {
                    return Err(OutputError::InvalidFormat(format!(
                        "Unknown field: {}. Use n, t, f, e, x",
                        part
                    )))
                }
            };

            if fields.contains(&field) {
                return Err(OutputError::InvalidFormat(format!(
                    "Duplicate field: {}",
                    part
                )));
            }
            fields.push(field);
        }

        Ok(Self(fields))
    }
}

impl FieldOrder {
    /// Returns the CSV header line for this field order.
    pub fn header(&self) -> String {
        self.0
            .iter()
            .map(|f| f.name())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn fields(&self) -> &[Field] {
        &self.0
    }
}

/// CSV output writer for accepted events.
pub struct CsvWriter<W: Write> {
    writer: BufWriter<W>,
    field_order: FieldOrder,
}

impl<W: Write> CsvWriter<W> {
    /// Creates a new CSV writer.
    pub fn new(writer: W, field_order: FieldOrder) -> Self {
        Self {
            writer: BufWriter::new(writer),
            field_order,
        }
    }

    /// Writes the column header line.
    pub fn write_header(&mut self) -> Result<(), OutputError> {
        writeln!(self.writer, "{}", self.field_order.header())?;
        Ok(())
    }

    /// Writes every event in `events`.
    pub fn write_events(&mut self, events: &EventColumns) -> Result<(), OutputError> {
        for i in 0..events.len() {
            self.write_event(events, i)?;
        }
        Ok(())
    }

    #[inline]
    fn write_event(&mut self, events: &EventColumns, i: usize) -> Result<(), OutputError> {
        for (pos, field) in self.field_order.0.iter().enumerate() {
            if pos > 0 {
                self.writer.write_all(b",")?;
            }
            match field {
                Field::FrameNumber => write!(self.writer, "{}", events.frame_number[i])?,
                Field::TriggerTime => write!(self.writer, "{}", events.trigger_time[i])?,
                Field::FrameTime => write!(self.writer, "{}", events.frame_time[i])?,
                Field::Energy => write!(self.writer, "{}", events.energy[i])?,
                Field::Extras => write!(self.writer, "{}", events.extras[i])?,
            }
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// CSV writer for the per-frame summary.
pub struct FrameCsvWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> FrameCsvWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Writes one line per frame, with a header.
    pub fn write_frames<S: ColumnStore + ?Sized>(&mut self, store: &S) -> Result<(), OutputError> {
        writeln!(
            self.writer,
            "frame,frame_number,start_time,first_event,event_count"
        )?;
        for k in 0..store.frame_count() {
            if let (Some(entry), Some(range)) = (store.frame_entry(k), store.frame_bounds(k)) {
                writeln!(
                    self.writer,
                    "{},{},{},{},{}",
                    k,
                    entry.frame_number,
                    entry.start_time,
                    range.start,
                    range.end - range.start
                )?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Binary container writer.
///
/// Layout, all little-endian:
/// - magic: 8 bytes `MCAFRM\0\0`
/// - version: u32
/// - event count N: u64
/// - frame count F: u64
/// - run start: u64
/// - trigger_time, frame_time: N x u64 each
/// - energy: N x i16
/// - extras, frame_number: N x u32 each
/// - event index: (F + 1) x u64
/// - frame start times: F x u64
/// - frame numbers: F x u32
pub struct BinaryWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> BinaryWriter<W> {
    /// Creates a new binary writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Writes a complete store.
    pub fn write_store(&mut self, store: &MemoryStore) -> Result<(), OutputError> {
        let events = store.events();
        let frames = store.frames();

        self.writer.write_all(MAGIC)?;
        self.writer.write_u32::<LittleEndian>(VERSION)?;
        self.writer.write_u64::<LittleEndian>(events.len() as u64)?;
        self.writer.write_u64::<LittleEndian>(frames.len() as u64)?;
        self.writer.write_u64::<LittleEndian>(frames.run_start)?;

        for &v in &events.trigger_time {
            self.writer.write_u64::<LittleEndian>(v)?;
        }
        for &v in &events.frame_time {
            self.writer.write_u64::<LittleEndian>(v)?;
        }
        for &v in &events.energy {
            self.writer.write_i16::<LittleEndian>(v)?;
        }
        for &v in &events.extras {
            self.writer.write_u32::<LittleEndian>(v)?;
        }
        for &v in &events.frame_number {
            self.writer.write_u32::<LittleEndian>(v)?;
        }
        for v in store.event_index() {
            self.writer.write_u64::<LittleEndian>(v)?;
        }
        for &v in &frames.start_time {
            self.writer.write_u64::<LittleEndian>(v)?;
        }
        for &v in &frames.frame_number {
            self.writer.write_u32::<LittleEndian>(v)?;
        }
        Ok(())
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads a container produced by [`BinaryWriter`].
pub fn read_container<R: Read>(reader: &mut R) -> Result<MemoryStore, OutputError> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(OutputError::InvalidFormat("Bad container magic".to_string()));
    }
    let version = reader.read_u32::<LittleEndian>()?;
    if version != VERSION {
        return Err(OutputError::InvalidFormat(format!(
            "Unsupported container version {}",
            version
        )));
    }
    let n = to_len(reader.read_u64::<LittleEndian>()?)?;
    let f = to_len(reader.read_u64::<LittleEndian>()?)?;
    let index_len = f
        .checked_add(1)
        .ok_or_else(|| OutputError::InvalidFormat(format!("Frame count {} too large", f)))?;
    let run_start = reader.read_u64::<LittleEndian>()?;

    let events = EventColumns {
        trigger_time: read_column(reader, n, |r| r.read_u64::<LittleEndian>())?,
        frame_time: read_column(reader, n, |r| r.read_u64::<LittleEndian>())?,
        energy: read_column(reader, n, |r| r.read_i16::<LittleEndian>())?,
        extras: read_column(reader, n, |r| r.read_u32::<LittleEndian>())?,
        frame_number: read_column(reader, n, |r| r.read_u32::<LittleEndian>())?,
    };
    let mut offsets = read_column(reader, index_len, |r| r.read_u64::<LittleEndian>())?;
    let start_time = read_column(reader, f, |r| r.read_u64::<LittleEndian>())?;
    let frame_number = read_column(reader, f, |r| r.read_u32::<LittleEndian>())?;

    if offsets.pop() != Some(n as u64) {
        return Err(OutputError::InvalidFormat(
            "Event index does not end at the event count".to_string(),
        ));
    }
    let frames = FrameIndex {
        frame_number,
        start_time,
        first_event: offsets,
        run_start,
    };
    if !frames.is_monotonic(n as u64) {
        return Err(OutputError::InvalidFormat(
            "Event index is not monotonic".to_string(),
        ));
    }

    Ok(MemoryStore::from_parts(events, frames))
}

fn to_len(count: u64) -> Result<usize, OutputError> {
    usize::try_from(count)
        .map_err(|_| OutputError::InvalidFormat(format!("Count {} too large", count)))
}

fn read_column<R, T, F>(reader: &mut R, len: usize, mut read: F) -> Result<Vec<T>, OutputError>
where
    R: Read,
    F: FnMut(&mut R) -> std::io::Result<T>,
{
    // Cap the preallocation so a corrupt header cannot request huge buffers.
    let mut column = Vec::with_capacity(len.min(1 << 20));
    for _ in 0..len {
        column.push(read(reader)?);
    }
    Ok(column)
}

/// Writes events to a CSV file.
pub fn write_csv<P: AsRef<Path>>(
    path: P,
    events: &EventColumns,
    field_order: FieldOrder,
) -> Result<(), OutputError> {
    let file = File::create(path)?;
    let mut writer = CsvWriter::new(file, field_order);
    writer.write_header()?;
    writer.write_events(events)?;
    writer.flush()?;
    Ok(())
}

/// Writes the per-frame summary to a CSV file.
pub fn write_frames_csv<P: AsRef<Path>>(path: P, store: &MemoryStore) -> Result<(), OutputError> {
    let file = File::create(path)?;
    let mut writer = FrameCsvWriter::new(file);
    writer.write_frames(store)?;
    writer.flush()?;
    Ok(())
}

/// Writes a store to a binary container file.
pub fn write_store<P: AsRef<Path>>(path: P, store: &MemoryStore) -> Result<(), OutputError> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BinaryWriter::new(file);
    writer.write_store(store)?;
    writer.flush()?;
    debug!(path = %path.display(), events = store.event_count(), "container written");
    Ok(())
}

/// Reads a store from a binary container file.
pub fn read_store<P: AsRef<Path>>(path: P) -> Result<MemoryStore, OutputError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_container(&mut reader)
}

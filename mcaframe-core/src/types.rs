//! Core types for MCA list-mode event data.
//!
//! This module defines the raw 14-byte record as written by the digitiser and
//! the derived per-event attributes retained after frame segmentation.

/// Size in bytes of one encoded record: `u64` trigger time, `i16` energy,
/// `u32` extras, packed little-endian.
pub const RECORD_SIZE: usize = 14;

/// Extras bit reserved for frame-boundary marker records.
pub const FRAME_MARKER_FLAG: u32 = 0x8;

/// Energy value reported by a saturated detector channel.
pub const SATURATED_ENERGY: i16 = i16::MAX;

/// One raw record from the acquisition stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawEventRecord {
    /// Absolute device clock ticks
    pub trigger_time: u64,
    /// Raw detector amplitude (32767 = saturated)
    pub energy: i16,
    /// Device flag bits, see [`crate::ExtraFlags`]
    pub extras: u32,
}

impl RawEventRecord {
    /// Creates a new raw record.
    #[inline]
    pub fn new(trigger_time: u64, energy: i16, extras: u32) -> Self {
        Self {
            trigger_time,
            energy,
            extras,
        }
    }

    /// Creates a frame-boundary marker at `trigger_time`.
    #[inline]
    pub fn marker(trigger_time: u64) -> Self {
        Self::new(trigger_time, 0, FRAME_MARKER_FLAG)
    }

    /// True if this record opens a new frame.
    ///
    /// Only the exact combination `extras == 0x8` and `energy == 0` counts;
    /// other records carrying the marker bit are rejected, not treated as
    /// boundaries.
    #[inline]
    pub fn is_frame_marker(&self) -> bool {
        self.extras == FRAME_MARKER_FLAG && self.energy == 0
    }

    /// Encodes this record into its 14-byte wire form.
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        crate::parser::encode_record(self, &mut buf);
        buf
    }
}

/// A record accepted as a real detector event, with its frame attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilteredEvent {
    /// Absolute device clock ticks
    pub trigger_time: u64,
    /// Ticks since the opening marker of the frame (wrapping)
    pub frame_time: u64,
    /// Raw detector amplitude
    pub energy: i16,
    /// Device flag bits
    pub extras: u32,
    /// Frame active when the record was observed
    pub frame_number: u32,
}

impl FilteredEvent {
    /// Frame time as a signed offset.
    ///
    /// Negative only when the trigger time stepped backwards within a frame.
    #[inline]
    pub fn signed_frame_time(&self) -> i64 {
        self.frame_time as i64
    }
}

/// Start of a frame in the emitted event sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEntry {
    /// Frame number as carried in the `frame_number` column
    pub frame_number: u32,
    /// Trigger time of the opening marker (0 for the pre-marker frame)
    pub start_time: u64,
    /// Position of the frame's first event in the event columns
    pub first_event: u64,
}

/// Parallel per-event columns.
///
/// All five vectors always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventColumns {
    pub trigger_time: Vec<u64>,
    pub frame_time: Vec<u64>,
    pub energy: Vec<i16>,
    pub extras: Vec<u32>,
    pub frame_number: Vec<u32>,
}

impl EventColumns {
    /// Creates empty columns with room for `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            trigger_time: Vec::with_capacity(capacity),
            frame_time: Vec::with_capacity(capacity),
            energy: Vec::with_capacity(capacity),
            extras: Vec::with_capacity(capacity),
            frame_number: Vec::with_capacity(capacity),
        }
    }

    /// Number of events held.
    #[inline]
    pub fn len(&self) -> usize {
        self.energy.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }

    /// Appends one event to every column.
    #[inline]
    pub fn push(&mut self, event: &FilteredEvent) {
        self.trigger_time.push(event.trigger_time);
        self.frame_time.push(event.frame_time);
        self.energy.push(event.energy);
        self.extras.push(event.extras);
        self.frame_number.push(event.frame_number);
    }

    /// Appends all of `other` to the end of these columns.
    pub fn extend_from(&mut self, other: &EventColumns) {
        self.trigger_time.extend_from_slice(&other.trigger_time);
        self.frame_time.extend_from_slice(&other.frame_time);
        self.energy.extend_from_slice(&other.energy);
        self.extras.extend_from_slice(&other.extras);
        self.frame_number.extend_from_slice(&other.frame_number);
    }

    /// Reassembles the event at `index`.
    pub fn get(&self, index: usize) -> Option<FilteredEvent> {
        Some(FilteredEvent {
            trigger_time: *self.trigger_time.get(index)?,
            frame_time: *self.frame_time.get(index)?,
            energy: *self.energy.get(index)?,
            extras: *self.extras.get(index)?,
            frame_number: *self.frame_number.get(index)?,
        })
    }

    /// True if every column has the same length.
    pub fn is_consistent(&self) -> bool {
        let n = self.energy.len();
        self.trigger_time.len() == n
            && self.frame_time.len() == n
            && self.extras.len() == n
            && self.frame_number.len() == n
    }
}

/// Output of segmenting one chunk of records.
///
/// Frame entries refer to absolute event positions, so consecutive batches can
/// be appended to a store without rewriting earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBatch {
    /// Accepted events in arrival order
    pub events: EventColumns,
    /// Frames opened while processing the chunk
    pub frames: Vec<FrameEntry>,
    /// Trigger time of the first record of the stream, set only on the batch
    /// that contains it
    pub run_start: Option<u64>,
}

impl EventBatch {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.frames.is_empty()
    }
}

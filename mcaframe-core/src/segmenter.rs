//! Frame segmentation of a decoded record stream.
//!
//! Segmentation is an explicit fold: [`step`] maps the running [`FrameState`]
//! and one record to the next state plus an [`Outcome`]. [`FrameSegmenter`]
//! drives that fold over successive chunks, collecting accepted events into
//! columns and recording where each frame starts.
//!
//! Records seen before the first marker belong to frame 0 with a start time
//! of 0. Frame 0 only gets an index entry if at least one record precedes the
//! first marker.

use crate::types::{
    EventBatch, EventColumns, FilteredEvent, FrameEntry, RawEventRecord, FRAME_MARKER_FLAG,
    SATURATED_ENERGY,
};
use tracing::{debug, trace, warn};

/// Running frame state threaded through one conversion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameState {
    /// Frame number carried by events observed now
    pub frame_number: u32,
    /// Trigger time of the marker that opened the current frame
    pub frame_start_time: u64,
    /// Whether the current frame already has an index entry
    pub frame_open: bool,
}

/// Why a non-marker record was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Energy equal to the saturation sentinel
    Saturated,
    /// Zero or negative energy
    NonPositiveEnergy,
    /// Marker bit set without being an exact marker record
    MarkerFlag,
}

/// Classification of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Frame-boundary marker; never emitted as an event
    Marker,
    /// Real detector event
    Accepted(FilteredEvent),
    /// Dropped record
    Rejected(Rejection),
}

/// Result of one fold step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Set when this record opened a frame: `(frame_number, start_time)`
    pub opened: Option<(u32, u64)>,
    pub outcome: Outcome,
}

/// Applies the acceptance test to a non-marker record.
#[inline]
pub fn classify(record: &RawEventRecord) -> Result<(), Rejection> {
    if record.energy == SATURATED_ENERGY {
        Err(Rejection::Saturated)
    } else if record.energy <= 0 {
        Err(Rejection::NonPositiveEnergy)
    } else if record.extras & FRAME_MARKER_FLAG != 0 {
        Err(Rejection::MarkerFlag)
    } else {
        Ok(())
    }
}

/// Advances the frame state by one record.
///
/// Total over every input: there is no record for which this fails.
pub fn step(state: FrameState, record: &RawEventRecord) -> (FrameState, Step) {
    let mut next = state;
    let mut opened = None;

    if record.is_frame_marker() {
        next.frame_number = state.frame_number.wrapping_add(1);
        next.frame_start_time = record.trigger_time;
        next.frame_open = true;
        opened = Some((next.frame_number, next.frame_start_time));
    } else if !state.frame_open {
        next.frame_open = true;
        opened = Some((next.frame_number, next.frame_start_time));
    }

    let outcome = if record.is_frame_marker() {
        Outcome::Marker
    } else {
        match classify(record) {
            Ok(()) => Outcome::Accepted(FilteredEvent {
                trigger_time: record.trigger_time,
                frame_time: record.trigger_time.wrapping_sub(next.frame_start_time),
                energy: record.energy,
                extras: record.extras,
                frame_number: next.frame_number,
            }),
            Err(reason) => Outcome::Rejected(reason),
        }
    };

    (next, Step { opened, outcome })
}

/// Counters accumulated over a conversion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionStats {
    /// Raw records consumed
    pub records: u64,
    /// Frame-boundary markers seen
    pub markers: u64,
    /// Events accepted into the output
    pub accepted: u64,
    /// Records rejected for saturated energy
    pub rejected_saturated: u64,
    /// Records rejected for zero or negative energy
    pub rejected_non_positive: u64,
    /// Records rejected for carrying the marker bit
    pub rejected_marker_flag: u64,
    /// Accepted events that arrived before the first marker
    pub before_first_marker: u64,
    /// Accepted events whose trigger time precedes their frame start
    pub backwards_time: u64,
    /// Trigger time of the first record, marker or not
    pub run_start: Option<u64>,
}

impl ConversionStats {
    /// Records that were neither accepted events nor markers.
    pub fn rejected(&self) -> u64 {
        self.rejected_saturated + self.rejected_non_positive + self.rejected_marker_flag
    }

    fn record(&mut self, outcome: &Outcome, state: &FrameState) {
        self.records += 1;
        match outcome {
            Outcome::Marker => self.markers += 1,
            Outcome::Accepted(event) => {
                self.accepted += 1;
                if self.markers == 0 {
                    self.before_first_marker += 1;
                }
                if event.trigger_time < state.frame_start_time {
                    self.backwards_time += 1;
                }
            }
            Outcome::Rejected(Rejection::Saturated) => self.rejected_saturated += 1,
            Outcome::Rejected(Rejection::NonPositiveEnergy) => self.rejected_non_positive += 1,
            Outcome::Rejected(Rejection::MarkerFlag) => self.rejected_marker_flag += 1,
        }
    }
}

/// Stateful driver of [`step`] across the chunks of one conversion pass.
#[derive(Debug, Default)]
pub struct FrameSegmenter {
    state: FrameState,
    stats: ConversionStats,
    frames: u64,
}

impl FrameSegmenter {
    /// Creates a segmenter in its initial state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current running frame state.
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &ConversionStats {
        &self.stats
    }

    /// Number of frames opened so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Number of events emitted so far.
    pub fn event_count(&self) -> u64 {
        self.stats.accepted
    }

    /// Segments one chunk of records, continuing from the current state.
    pub fn segment<I>(&mut self, records: I) -> EventBatch
    where
        I: IntoIterator<Item = RawEventRecord>,
    {
        let iter = records.into_iter();
        let mut batch = EventBatch {
            events: EventColumns::with_capacity(iter.size_hint().0),
            frames: Vec::new(),
            run_start: None,
        };
        for record in iter {
            self.push(&record, &mut batch);
        }
        batch
    }

    /// Feeds a single record, appending its effect to `batch`.
    pub fn push(&mut self, record: &RawEventRecord, batch: &mut EventBatch) {
        let (next, step) = step(self.state, record);

        if self.stats.run_start.is_none() {
            debug!(run_start = record.trigger_time, "run started");
            self.stats.run_start = Some(record.trigger_time);
            batch.run_start = Some(record.trigger_time);
        }

        if let Some((frame_number, start_time)) = step.opened {
            trace!(frame_number, start_time, "frame opened");
            batch.frames.push(FrameEntry {
                frame_number,
                start_time,
                first_event: self.stats.accepted,
            });
            self.frames += 1;
        }

        let anomalies = (self.stats.before_first_marker, self.stats.backwards_time);
        self.stats.record(&step.outcome, &next);
        if let Outcome::Accepted(event) = &step.outcome {
            batch.events.push(event);
        }

        if anomalies.0 == 0 && self.stats.before_first_marker > 0 {
            warn!(
                trigger_time = record.trigger_time,
                "events before the first frame marker, assigning them to frame 0"
            );
        }
        if anomalies.1 == 0 && self.stats.backwards_time > 0 {
            warn!(
                trigger_time = record.trigger_time,
                frame_start_time = next.frame_start_time,
                "trigger time precedes frame start"
            );
        }

        self.state = next;
    }
}

/// Segments a complete record sequence in one call.
pub fn segment_all<I>(records: I) -> (EventBatch, ConversionStats)
where
    I: IntoIterator<Item = RawEventRecord>,
{
    let mut segmenter = FrameSegmenter::new();
    let batch = segmenter.segment(records);
    (batch, *segmenter.stats())
}

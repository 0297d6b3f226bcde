//! Columnar storage of segmented events and their frame index.

use crate::types::{EventBatch, EventColumns, FrameEntry};
use std::ops::Range;

/// Per-frame index: where each frame's events start, plus frame metadata.
///
/// The extent of frame `k` is `[first_event[k], first_event[k + 1])`, with the
/// last frame ending at the total event count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameIndex {
    pub frame_number: Vec<u32>,
    pub start_time: Vec<u64>,
    pub first_event: Vec<u64>,
    /// Trigger time of the first record of the run; 0 for an empty run
    pub run_start: u64,
}

impl FrameIndex {
    pub fn len(&self) -> usize {
        self.first_event.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_event.is_empty()
    }

    pub fn push(&mut self, entry: &FrameEntry) {
        self.frame_number.push(entry.frame_number);
        self.start_time.push(entry.start_time);
        self.first_event.push(entry.first_event);
    }

    pub fn get(&self, frame: usize) -> Option<FrameEntry> {
        Some(FrameEntry {
            frame_number: *self.frame_number.get(frame)?,
            start_time: *self.start_time.get(frame)?,
            first_event: *self.first_event.get(frame)?,
        })
    }

    /// Ticks from the start of the run to the opening of `frame`.
    ///
    /// A frame 0 made of records preceding the first marker starts at 0, and
    /// so reports 0 here.
    pub fn since_run_start(&self, frame: usize) -> Option<u64> {
        self.start_time
            .get(frame)
            .map(|&t| t.saturating_sub(self.run_start))
    }

    /// Half-open event range of `frame` given `event_count` total events.
    pub fn bounds(&self, frame: usize, event_count: u64) -> Option<Range<u64>> {
        let start = *self.first_event.get(frame)?;
        let end = self
            .first_event
            .get(frame + 1)
            .copied()
            .unwrap_or(event_count);
        Some(start..end)
    }

    /// The `len() + 1` offsets array, ending with `event_count`.
    ///
    /// Every segmented index starts at 0, since the first frame opens before
    /// any event can be accepted.
    pub fn offsets(&self, event_count: u64) -> Vec<u64> {
        let mut offsets = Vec::with_capacity(self.len() + 1);
        offsets.extend_from_slice(&self.first_event);
        offsets.push(event_count);
        offsets
    }

    /// True if offsets never decrease and none exceeds `event_count`.
    pub fn is_monotonic(&self, event_count: u64) -> bool {
        self.first_event.first().map_or(true, |&first| first == 0)
            && self.first_event.windows(2).all(|w| w[0] <= w[1])
            && self.first_event.last().map_or(true, |&last| last <= event_count)
    }
}

/// Storage for converted event columns and their frame index.
///
/// `append` takes `&mut self`, so a batch is applied as a whole before any
/// reader can borrow the store again.
pub trait ColumnStore {
    /// Appends one segmented batch: its events and any frames it opened.
    fn append(&mut self, batch: &EventBatch);

    /// Total stored events.
    fn event_count(&self) -> u64;

    /// Total stored frames.
    fn frame_count(&self) -> usize;

    /// Metadata of frame `k`.
    fn frame_entry(&self, k: usize) -> Option<FrameEntry>;

    /// Event range of frame `k`.
    fn frame_bounds(&self, k: usize) -> Option<Range<u64>>;

    /// Frame-relative times of the events in `range`.
    fn frame_times(&self, range: Range<u64>) -> &[u64];

    /// Energies of the events in `range`.
    fn energies(&self, range: Range<u64>) -> &[i16];

    /// Trigger time of the first record of the run.
    fn run_start(&self) -> u64;
}

/// In-memory [`ColumnStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    pub(crate) events: EventColumns,
    pub(crate) frames: FrameIndex,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from already assembled parts.
    pub fn from_parts(events: EventColumns, frames: FrameIndex) -> Self {
        Self { events, frames }
    }

    pub fn events(&self) -> &EventColumns {
        &self.events
    }

    pub fn frames(&self) -> &FrameIndex {
        &self.frames
    }

    /// The `frame_count + 1` offsets array.
    pub fn event_index(&self) -> Vec<u64> {
        self.frames.offsets(self.event_count())
    }

    /// Splits the store back into its columns and index.
    pub fn into_parts(self) -> (EventColumns, FrameIndex) {
        (self.events, self.frames)
    }

    fn slice_range(&self, range: Range<u64>) -> Range<usize> {
        let len = self.events.len();
        let start = (range.start as usize).min(len);
        let end = (range.end as usize).clamp(start, len);
        start..end
    }
}

impl ColumnStore for MemoryStore {
    fn append(&mut self, batch: &EventBatch) {
        self.events.extend_from(&batch.events);
        if let Some(run_start) = batch.run_start {
            self.frames.run_start = run_start;
        }
        for entry in &batch.frames {
            self.frames.push(entry);
        }
    }

    fn event_count(&self) -> u64 {
        self.events.len() as u64
    }

    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame_entry(&self, k: usize) -> Option<FrameEntry> {
        self.frames.get(k)
    }

    fn frame_bounds(&self, k: usize) -> Option<Range<u64>> {
        self.frames.bounds(k, self.event_count())
    }

    fn frame_times(&self, range: Range<u64>) -> &[u64] {
        &self.events.frame_time[self.slice_range(range)]
    }

    fn energies(&self, range: Range<u64>) -> &[i16] {
        &self.events.energy[self.slice_range(range)]
    }

    fn run_start(&self) -> u64 {
        self.frames.run_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::segment_all;
    use crate::types::RawEventRecord;

    fn store_from(records: &[RawEventRecord]) -> MemoryStore {
        let (batch, _) = segment_all(records.iter().copied());
        let mut store = MemoryStore::new();
        store.append(&batch);
        store
    }

    #[test]
    fn test_offsets_marker_then_event() {
        let store = store_from(&[RawEventRecord::marker(100), RawEventRecord::new(150, 500, 0)]);
        assert_eq!(store.event_index(), vec![0, 1]);
        assert_eq!(store.frame_bounds(0), Some(0..1));
    }

    #[test]
    fn test_offsets_saturated_only() {
        let store = store_from(&[RawEventRecord::new(10, i16::MAX, 0)]);
        assert_eq!(store.event_count(), 0);
        assert_eq!(store.event_index(), vec![0, 0]);
    }

    #[test]
    fn test_offsets_empty_store() {
        let store = MemoryStore::new();
        assert_eq!(store.event_index(), vec![0]);
        assert_eq!(store.frame_bounds(0), None);
    }

    #[test]
    fn test_append_in_batches() {
        let mut store = MemoryStore::new();
        let mut segmenter = crate::segmenter::FrameSegmenter::new();
        store.append(&segmenter.segment([
            RawEventRecord::marker(100),
            RawEventRecord::new(101, 1, 0),
        ]));
        store.append(&segmenter.segment([
            RawEventRecord::new(102, 2, 0),
            RawEventRecord::marker(200),
            RawEventRecord::marker(300),
            RawEventRecord::new(305, 3, 0),
        ]));

        assert_eq!(store.event_index(), vec![0, 2, 2, 3]);
        assert!(store.frames().is_monotonic(store.event_count()));
        assert_eq!(store.frame_times(0..2).to_vec(), vec![1, 2]);
        assert_eq!(store.energies(2..3).to_vec(), vec![3]);
        assert_eq!(store.frame_entry(2).map(|f| f.start_time), Some(300));
        assert_eq!(store.run_start(), 100);
        assert_eq!(store.frames().since_run_start(2), Some(200));
        assert_eq!(store.frames().since_run_start(3), None);
    }

    #[test]
    fn test_run_start_with_pre_marker_records() {
        let store = store_from(&[
            RawEventRecord::new(40, 1, 0),
            RawEventRecord::marker(100),
            RawEventRecord::new(130, 2, 0),
        ]);
        assert_eq!(store.run_start(), 40);
        assert_eq!(store.frames().since_run_start(0), Some(0));
        assert_eq!(store.frames().since_run_start(1), Some(60));
    }

    #[test]
    fn test_into_parts_round_trip() {
        let store = store_from(&[RawEventRecord::marker(7), RawEventRecord::new(9, 4, 0)]);
        let (events, frames) = store.clone().into_parts();
        assert_eq!(events.energy, vec![4]);
        assert_eq!(frames.first_event, vec![0]);
        assert_eq!(frames.run_start, 7);
        assert_eq!(MemoryStore::from_parts(events, frames), store);
    }

    #[test]
    fn test_range_reads_are_clamped() {
        let store = store_from(&[RawEventRecord::new(1, 1, 0)]);
        assert_eq!(store.energies(0..10).to_vec(), vec![1]);
        assert!(store.energies(5..10).is_empty());
    }
}

//! Per-frame access to converted event columns.

use crate::store::ColumnStore;
use std::iter::Zip;
use std::slice::Iter;
use thiserror::Error;

/// Errors returned by frame queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame {frame} out of range: store holds {frame_count} frames")]
    OutOfRange { frame: usize, frame_count: usize },
}

/// Events of one frame, borrowed from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    /// Position of the frame in the index
    pub index: usize,
    /// Frame number carried by its events
    pub frame_number: u32,
    /// Trigger time of the opening marker
    pub start_time: u64,
    /// Ticks from the first record of the run to `start_time`
    pub since_run_start: u64,
    /// Position of the first event in the event columns
    pub first_event: u64,
    /// Frame-relative time of each event
    pub time_offsets: &'a [u64],
    /// Raw energy of each event
    pub energies: &'a [i16],
}

impl<'a> FrameView<'a> {
    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    /// `(time_offset, energy)` pairs in event order.
    pub fn iter(&self) -> FrameEvents<'a> {
        FrameEvents {
            inner: self.time_offsets.iter().zip(self.energies.iter()),
        }
    }
}

impl<'a> IntoIterator for FrameView<'a> {
    type Item = (u64, i16);
    type IntoIter = FrameEvents<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the `(time_offset, energy)` pairs of a frame.
#[derive(Debug, Clone)]
pub struct FrameEvents<'a> {
    inner: Zip<Iter<'a, u64>, Iter<'a, i16>>,
}

impl Iterator for FrameEvents<'_> {
    type Item = (u64, i16);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(&t, &e)| (t, e))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for FrameEvents<'_> {}

/// Read-only frame lookup over any [`ColumnStore`].
#[derive(Debug)]
pub struct FrameReader<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S: ColumnStore + ?Sized> FrameReader<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Number of frames in the index.
    pub fn frame_count(&self) -> usize {
        self.store.frame_count()
    }

    /// Number of stored events.
    pub fn event_count(&self) -> u64 {
        self.store.event_count()
    }

    /// Returns the events of frame `k`.
    pub fn get_frame(&self, k: usize) -> Result<FrameView<'s>, FrameError> {
        let out_of_range = || FrameError::OutOfRange {
            frame: k,
            frame_count: self.store.frame_count(),
        };
        let entry = self.store.frame_entry(k).ok_or_else(out_of_range)?;
        let range = self.store.frame_bounds(k).ok_or_else(out_of_range)?;

        Ok(FrameView {
            index: k,
            frame_number: entry.frame_number,
            start_time: entry.start_time,
            since_run_start: entry.start_time.saturating_sub(self.store.run_start()),
            first_event: range.start,
            time_offsets: self.store.frame_times(range.clone()),
            energies: self.store.energies(range),
        })
    }

    /// Iterates every frame in index order.
    pub fn frames(&self) -> impl Iterator<Item = FrameView<'s>> + '_ {
        (0..self.frame_count()).filter_map(move |k| self.get_frame(k).ok())
    }
}

//! Python bindings for the MCA frame converter with numpy column access.
//!
//! Converted data is held in a [`FrameStore`]: the five event columns plus the
//! frame index. Columns and per-frame slices are handed to Python as numpy
//! arrays.

use mcaframe_core::{
    output, ColumnStore, ConvertOptions, DecodeError, FrameError, FrameReader, MemoryStore,
    OutputError,
};
use numpy::{IntoPyArray, PyArray1};
use pyo3::exceptions::{PyIOError, PyIndexError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::path::PathBuf;

fn decode_err(e: DecodeError) -> PyErr {
    if e.is_format_error() {
        PyValueError::new_err(format!("Failed to convert: {}", e))
    } else {
        PyIOError::new_err(format!("Failed to convert: {}", e))
    }
}

fn output_err(e: OutputError) -> PyErr {
    match e {
        OutputError::Io(_) => PyIOError::new_err(e.to_string()),
        OutputError::InvalidFormat(_) => PyValueError::new_err(e.to_string()),
    }
}

fn frame_err(e: FrameError) -> PyErr {
    PyIndexError::new_err(e.to_string())
}

/// Converted events with their frame index.
///
/// Columns are stored separately (trigger_time, frame_time, energy, extras,
/// frame_number), so each maps directly onto a numpy array.
#[pyclass]
pub struct FrameStore {
    store: MemoryStore,
    /// Raw records read during conversion, if converted in this session
    records: Option<u64>,
}

#[pymethods]
impl FrameStore {
    /// Returns the number of events.
    fn __len__(&self) -> usize {
        self.store.events().len()
    }

    fn __repr__(&self) -> String {
        format!(
            "FrameStore(events={}, frames={})",
            self.store.event_count(),
            self.store.frame_count()
        )
    }

    /// Number of frames in the index.
    #[getter]
    fn frame_count(&self) -> usize {
        self.store.frame_count()
    }

    /// Number of stored events.
    #[getter]
    fn event_count(&self) -> u64 {
        self.store.event_count()
    }

    /// Raw records consumed by the conversion, or None for a loaded store.
    #[getter]
    fn raw_records(&self) -> Option<u64> {
        self.records
    }

    /// Absolute trigger times as a numpy array.
    #[getter]
    fn trigger_time<'py>(&self, py: Python<'py>) -> &'py PyArray1<u64> {
        self.store.events().trigger_time.clone().into_pyarray(py)
    }

    /// Frame-relative times as a numpy array.
    #[getter]
    fn frame_time<'py>(&self, py: Python<'py>) -> &'py PyArray1<u64> {
        self.store.events().frame_time.clone().into_pyarray(py)
    }

    /// Raw energies as a numpy array.
    #[getter]
    fn energy<'py>(&self, py: Python<'py>) -> &'py PyArray1<i16> {
        self.store.events().energy.clone().into_pyarray(py)
    }

    /// Extras flags as a numpy array.
    #[getter]
    fn extras<'py>(&self, py: Python<'py>) -> &'py PyArray1<u32> {
        self.store.events().extras.clone().into_pyarray(py)
    }

    /// Frame number of each event as a numpy array.
    #[getter]
    fn frame_number<'py>(&self, py: Python<'py>) -> &'py PyArray1<u32> {
        self.store.events().frame_number.clone().into_pyarray(py)
    }

    /// The `frame_count + 1` event index: frame k spans
    /// `event_index[k]:event_index[k + 1]`.
    #[getter]
    fn event_index<'py>(&self, py: Python<'py>) -> &'py PyArray1<u64> {
        self.store.event_index().into_pyarray(py)
    }

    /// Trigger time of each frame's opening marker.
    #[getter]
    fn frame_start_time<'py>(&self, py: Python<'py>) -> &'py PyArray1<u64> {
        self.store.frames().start_time.clone().into_pyarray(py)
    }

    /// Trigger time of the first record of the run.
    #[getter]
    fn run_start(&self) -> u64 {
        self.store.run_start()
    }

    /// Ticks from the start of the run to each frame's opening marker.
    #[getter]
    fn frame_time_zero<'py>(&self, py: Python<'py>) -> &'py PyArray1<u64> {
        let frames = self.store.frames();
        (0..frames.len())
            .filter_map(|k| frames.since_run_start(k))
            .collect::<Vec<_>>()
            .into_pyarray(py)
    }

    /// Returns `(time_offset, energy)` numpy arrays for frame `k`.
    ///
    /// Raises IndexError for a negative or out-of-range frame.
    fn get_frame<'py>(
        &self,
        py: Python<'py>,
        k: i64,
    ) -> PyResult<(&'py PyArray1<u64>, &'py PyArray1<i16>)> {
        let k = usize::try_from(k).map_err(|_| {
            PyIndexError::new_err(format!(
                "Frame {} out of range: store holds {} frames",
                k,
                self.store.frame_count()
            ))
        })?;
        let reader = FrameReader::new(&self.store);
        let frame = reader.get_frame(k).map_err(frame_err)?;
        Ok((
            frame.time_offsets.to_vec().into_pyarray(py),
            frame.energies.to_vec().into_pyarray(py),
        ))
    }

    /// Returns all columns as a dictionary.
    ///
    /// This is useful for creating a pandas DataFrame.
    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<PyObject> {
        let dict = PyDict::new(py);
        dict.set_item("trigger_time", self.trigger_time(py))?;
        dict.set_item("frame_time", self.frame_time(py))?;
        dict.set_item("energy", self.energy(py))?;
        dict.set_item("extras", self.extras(py))?;
        dict.set_item("frame_number", self.frame_number(py))?;
        Ok(dict.into())
    }

    /// Writes the store to a `.mcaf` container.
    fn save(&self, path: &str) -> PyResult<()> {
        output::write_store(PathBuf::from(path), &self.store).map_err(output_err)
    }
}

/// Converts a raw record file.
///
/// Args:
///     path: Path to the raw .dat file
///     chunk_records: Records decoded per read (default: 100000)
///
/// Returns:
///     FrameStore: Event columns and frame index
///
/// Example:
///     >>> import mcaframe
///     >>> store = mcaframe.convert("CHARM_A_19_ch000.dat")
///     >>> offsets, energies = store.get_frame(0)
#[pyfunction]
#[pyo3(signature = (path, chunk_records=None))]
fn convert(py: Python<'_>, path: &str, chunk_records: Option<usize>) -> PyResult<Py<FrameStore>> {
    let mut options = ConvertOptions::default();
    if let Some(n) = chunk_records {
        options = options.with_chunk_records(n);
    }
    let path = PathBuf::from(path);
    let conversion = py
        .allow_threads(|| mcaframe_core::convert_file(&path, options))
        .map_err(decode_err)?;

    Py::new(
        py,
        FrameStore {
            store: conversion.store,
            records: Some(conversion.stats.records),
        },
    )
}

/// Converts raw record bytes already in memory.
#[pyfunction]
fn convert_bytes(py: Python<'_>, data: &[u8]) -> PyResult<Py<FrameStore>> {
    let conversion = mcaframe_core::convert_bytes(data).map_err(decode_err)?;
    Py::new(
        py,
        FrameStore {
            store: conversion.store,
            records: Some(conversion.stats.records),
        },
    )
}

/// Loads a `.mcaf` container written by `FrameStore.save` or the CLI.
#[pyfunction]
fn open_store(py: Python<'_>, path: &str) -> PyResult<Py<FrameStore>> {
    let store = output::read_store(PathBuf::from(path)).map_err(output_err)?;
    Py::new(
        py,
        FrameStore {
            store,
            records: None,
        },
    )
}

/// Describes an extras flag value in words.
#[pyfunction]
fn describe_flags(extras: u32) -> String {
    mcaframe_core::ExtraFlags::describe(extras)
}

/// MCA frame converter module for Python.
#[pymodule]
fn mcaframe(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(convert, m)?)?;
    m.add_function(wrap_pyfunction!(convert_bytes, m)?)?;
    m.add_function(wrap_pyfunction!(open_store, m)?)?;
    m.add_function(wrap_pyfunction!(describe_flags, m)?)?;
    m.add_class::<FrameStore>()?;
    Ok(())
}

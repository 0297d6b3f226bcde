//! Frame-segmenting decoder for CAEN MCA list-mode event streams.
//!
//! The digitiser writes a flat stream of 14-byte records. Periodic marker
//! records (`extras == 0x8`, `energy == 0`) delimit acquisition frames. This
//! crate decodes the stream, assigns each real event to its frame with a
//! frame-relative time, drops saturated and non-physical records, and builds a
//! frame index so the events of any frame can be looked up directly.
//!
//! # Example
//!
//! ```no_run
//! use mcaframe_core::{convert_file, ConvertOptions, FrameReader};
//!
//! let conversion = convert_file("CHARM_A_19_ch000.dat", ConvertOptions::default()).unwrap();
//! let reader = FrameReader::new(&conversion.store);
//!
//! println!("{} frames, {} events", reader.frame_count(), reader.event_count());
//! for (time_offset, energy) in reader.get_frame(0).unwrap().iter() {
//!     println!("{} {}", time_offset, energy);
//! }
//! ```

pub mod convert;
pub mod decoder;
pub mod flags;
pub mod output;
pub mod parser;
pub mod reader;
pub mod segmenter;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use convert::{
    convert_bytes, convert_expecting, convert_file, convert_reader, Conversion, ConvertOptions,
};
pub use decoder::{decode_records, DecodeError, RecordReader};
pub use flags::ExtraFlags;
pub use output::{FieldOrder, OutputError};
pub use reader::{FrameError, FrameReader, FrameView};
pub use segmenter::{step, ConversionStats, FrameSegmenter, FrameState, Outcome, Rejection};
pub use store::{ColumnStore, FrameIndex, MemoryStore};
pub use types::{
    EventBatch, EventColumns, FilteredEvent, FrameEntry, RawEventRecord, RECORD_SIZE,
};

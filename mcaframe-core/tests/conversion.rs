//! End-to-end conversion tests over synthetic raw files.

use mcaframe_core::parser::encode_records;
use mcaframe_core::{
    convert_bytes, convert_file, output, ColumnStore, ConvertOptions, DecodeError, FrameError,
    FrameReader, RawEventRecord,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_raw(records: &[RawEventRecord]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(&encode_records(records)).expect("write records");
    file.flush().expect("flush");
    file
}

/// A marker followed by one valid event gives one frame with one event.
#[test]
fn test_marker_then_event() {
    let file = write_raw(&[RawEventRecord::marker(100), RawEventRecord::new(150, 500, 0)]);
    let conversion = convert_file(file.path(), ConvertOptions::default()).unwrap();
    let store = &conversion.store;

    assert_eq!(store.event_count(), 1);
    assert_eq!(store.events().frame_time, vec![50]);
    assert_eq!(store.events().frame_number, vec![1]);
    assert_eq!(store.event_index(), vec![0, 1]);
}

/// A lone saturated event is dropped.
#[test]
fn test_saturated_only() {
    let file = write_raw(&[RawEventRecord::new(10, i16::MAX, 0)]);
    let conversion = convert_file(file.path(), ConvertOptions::default()).unwrap();

    assert_eq!(conversion.store.event_count(), 0);
    assert_eq!(conversion.store.event_index(), vec![0, 0]);
    assert_eq!(conversion.stats.rejected_saturated, 1);
}

/// Frame queries past the end fail without touching the store.
#[test]
fn test_get_frame_out_of_range() {
    let conversion = convert_bytes(&encode_records(&[
        RawEventRecord::marker(1),
        RawEventRecord::new(2, 3, 0),
    ]))
    .unwrap();
    let reader = FrameReader::new(&conversion.store);

    let k = reader.frame_count();
    assert!(matches!(
        reader.get_frame(k),
        Err(FrameError::OutOfRange { frame, frame_count }) if frame == k && frame_count == 1
    ));
    assert_eq!(reader.get_frame(0).unwrap().len(), 1);
}

/// Two markers back to back leave an empty frame.
#[test]
fn test_consecutive_markers() {
    let conversion = convert_bytes(&encode_records(&[
        RawEventRecord::marker(100),
        RawEventRecord::new(120, 5, 0),
        RawEventRecord::marker(200),
        RawEventRecord::marker(300),
        RawEventRecord::new(310, 6, 0),
    ]))
    .unwrap();
    let index = conversion.store.event_index();

    assert_eq!(index, vec![0, 1, 1, 2]);
    assert_eq!(index[1], index[2]);
    let reader = FrameReader::new(&conversion.store);
    assert!(reader.get_frame(1).unwrap().is_empty());
}

#[test]
fn test_unaligned_file_is_rejected_before_decoding() {
    let mut file = write_raw(&[RawEventRecord::marker(1)]);
    file.write_all(&[0xAB]).unwrap();
    file.flush().unwrap();

    let err = convert_file(file.path(), ConvertOptions::default()).unwrap_err();
    assert!(err.is_format_error());
    assert!(matches!(err, DecodeError::UnalignedLength { len: 15 }));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = convert_file(dir.path().join("absent.dat"), ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, DecodeError::Io(_)));
    assert!(!err.is_format_error());
}

/// Converting, saving the container, and reading it back gives the same frames.
#[test]
fn test_container_round_trip_through_disk() {
    let mut records = vec![RawEventRecord::new(7, 9, 0)];
    for frame in 1..=20u64 {
        records.push(RawEventRecord::marker(frame * 10_000));
        for i in 0..(frame % 4) {
            records.push(RawEventRecord::new(frame * 10_000 + i * 3 + 1, (i + 1) as i16, 0x1));
        }
    }
    let raw = write_raw(&records);
    let options = ConvertOptions::default().with_chunk_records(7);
    let conversion = convert_file(raw.path(), options).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let container = dir.path().join("run.mcaf");
    output::write_store(&container, &conversion.store).unwrap();
    let loaded = output::read_store(&container).unwrap();
    assert_eq!(loaded, conversion.store);

    let reader = FrameReader::new(&loaded);
    assert_eq!(reader.frame_count(), 21);
    let frame = reader.get_frame(3).unwrap();
    assert_eq!(frame.frame_number, 3);
    assert_eq!(frame.start_time, 30_000);
    assert_eq!(frame.since_run_start, 29_993);
    assert_eq!(frame.iter().collect::<Vec<_>>(), vec![(1, 1), (4, 2), (7, 3)]);

    let pre_marker = reader.get_frame(0).unwrap();
    assert_eq!(pre_marker.frame_number, 0);
    assert_eq!(pre_marker.iter().collect::<Vec<_>>(), vec![(7, 9)]);
}

#[test]
fn test_csv_exports() {
    let conversion = convert_bytes(&encode_records(&[
        RawEventRecord::marker(100),
        RawEventRecord::new(150, 500, 0),
    ]))
    .unwrap();
    let dir = tempfile::tempdir().unwrap();

    let events_path = dir.path().join("events.csv");
    let order = "f,e".parse().unwrap();
    output::write_csv(&events_path, conversion.store.events(), order).unwrap();
    let events = std::fs::read_to_string(&events_path).unwrap();
    assert_eq!(events, "frame_time,energy\n50,500\n");

    let frames_path = dir.path().join("frames.csv");
    output::write_frames_csv(&frames_path, &conversion.store).unwrap();
    let frames = std::fs::read_to_string(&frames_path).unwrap();
    assert_eq!(
        frames,
        "frame,frame_number,start_time,first_event,event_count\n0,1,100,0,1\n"
    );
}

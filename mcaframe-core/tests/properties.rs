use mcaframe_core::parser::encode_records;
use mcaframe_core::segmenter::segment_all;
use mcaframe_core::{
    convert_bytes, decode_records, ColumnStore, DecodeError, FrameReader, RawEventRecord,
    RECORD_SIZE,
};
use proptest::prelude::*;

fn arb_record() -> impl Strategy<Value = RawEventRecord> {
    prop_oneof![
        // plain records across the whole value space
        (any::<u64>(), any::<i16>(), any::<u32>()).prop_map(|(t, e, x)| RawEventRecord::new(t, e, x)),
        // markers
        any::<u64>().prop_map(RawEventRecord::marker),
        // saturated, with arbitrary flags
        (any::<u64>(), any::<u32>()).prop_map(|(t, x)| RawEventRecord::new(t, i16::MAX, x)),
        // likely-accepted events
        (any::<u64>(), 1i16..i16::MAX, prop_oneof![Just(0u32), Just(0x1u32), Just(0x8000u32)])
            .prop_map(|(t, e, x)| RawEventRecord::new(t, e, x)),
    ]
}

fn arb_stream() -> impl Strategy<Value = Vec<RawEventRecord>> {
    prop::collection::vec(arb_record(), 0..200)
}

proptest! {
    #[test]
    fn decode_round_trip(t in any::<u64>(), e in any::<i16>(), x in any::<u32>()) {
        let record = RawEventRecord::new(t, e, x);
        let bytes = record.encode();
        prop_assert_eq!(bytes.len(), RECORD_SIZE);
        let decoded: Vec<_> = decode_records(&bytes).unwrap().collect();
        prop_assert_eq!(decoded, vec![record]);
    }

    #[test]
    fn length_invariant(bytes in prop::collection::vec(any::<u8>(), 0..300)) {
        match decode_records(&bytes) {
            Ok(records) => {
                prop_assert_eq!(bytes.len() % RECORD_SIZE, 0);
                prop_assert_eq!(records.count(), bytes.len() / RECORD_SIZE);
            }
            Err(err) => {
                prop_assert!(bytes.len() % RECORD_SIZE != 0);
                let is_unaligned = matches!(err, DecodeError::UnalignedLength { .. });
                prop_assert!(is_unaligned);
            }
        }
    }

    #[test]
    fn frame_index_is_monotonic(records in arb_stream()) {
        let conversion = convert_bytes(&encode_records(&records)).unwrap();
        let index = conversion.store.event_index();
        prop_assert!(index.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(index.first().copied(), Some(0));
        prop_assert_eq!(index.last().copied(), Some(conversion.store.event_count()));
        prop_assert_eq!(index.len(), conversion.store.frame_count() + 1);
    }

    #[test]
    fn saturated_energy_never_emitted(records in arb_stream()) {
        let (batch, _) = segment_all(records);
        prop_assert!(batch.events.energy.iter().all(|&e| e != i16::MAX && e > 0));
        prop_assert!(batch.events.extras.iter().all(|&x| x & 0x8 == 0));
    }

    #[test]
    fn markers_increment_frame_by_one(records in arb_stream()) {
        let markers = records.iter().filter(|r| r.is_frame_marker()).count() as u32;
        let mut expected = 0u32;
        let (batch, stats) = segment_all(records.iter().copied());
        prop_assert_eq!(stats.markers, markers as u64);

        // every emitted event carries the number of markers seen before it
        let mut emitted = batch.events.frame_number.iter();
        for record in &records {
            if record.is_frame_marker() {
                expected += 1;
            } else if mcaframe_core::segmenter::classify(record).is_ok() {
                prop_assert_eq!(emitted.next().copied(), Some(expected));
            }
        }
        prop_assert_eq!(emitted.next(), None);
    }

    #[test]
    fn frames_partition_events(records in arb_stream()) {
        let conversion = convert_bytes(&encode_records(&records)).unwrap();
        let reader = FrameReader::new(&conversion.store);
        let total: usize = reader.frames().map(|f| f.len()).sum();
        prop_assert_eq!(total as u64, reader.event_count());
        prop_assert_eq!(
            conversion.stats.records,
            conversion.stats.markers + conversion.stats.accepted + conversion.stats.rejected()
        );
    }
}

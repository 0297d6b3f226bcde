//! Benchmarks for decoding and frame segmentation.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mcaframe_core::parser::encode_records;
use mcaframe_core::{convert_bytes, decode_records, FrameSegmenter, RawEventRecord, RECORD_SIZE};

/// 1000 frames of 1000 records, every 50th record saturated.
fn synthetic_stream() -> Vec<u8> {
    let mut records = Vec::with_capacity(1_001_000);
    for frame in 0..1000u64 {
        let start = frame * 1_000_000;
        records.push(RawEventRecord::marker(start));
        for i in 0..1000u64 {
            let energy = if i % 50 == 0 {
                i16::MAX
            } else {
                (i % 4096) as i16 + 1
            };
            records.push(RawEventRecord::new(start + i * 997, energy, 0));
        }
    }
    encode_records(&records)
}

fn decode_benchmark(c: &mut Criterion) {
    let data = synthetic_stream();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("synthetic_1m_records", |b| {
        b.iter(|| {
            let records = decode_records(black_box(&data)).unwrap();
            black_box(records.fold(0u64, |acc, r| acc ^ r.trigger_time))
        })
    });

    group.finish();
}

fn segment_benchmark(c: &mut Criterion) {
    let data = synthetic_stream();

    let mut group = c.benchmark_group("segment");
    group.throughput(Throughput::Elements((data.len() / RECORD_SIZE) as u64));

    group.bench_function("chunked_100k", |b| {
        b.iter(|| {
            let mut segmenter = FrameSegmenter::new();
            let mut events = 0;
            for chunk in black_box(&data).chunks(100_000 * RECORD_SIZE) {
                let batch = segmenter.segment(decode_records(chunk).unwrap());
                events += batch.events.len();
            }
            black_box(events)
        })
    });

    group.bench_function("whole_buffer", |b| {
        b.iter(|| {
            let conversion = convert_bytes(black_box(&data)).unwrap();
            black_box(conversion.stats.accepted)
        })
    });

    group.finish();
}

criterion_group!(benches, decode_benchmark, segment_benchmark);
criterion_main!(benches);

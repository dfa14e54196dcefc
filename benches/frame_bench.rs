//! Performance benchmarks for the sensor frame codec.
//!
//! The continuous-capture loop decodes a template reply on every successful
//! poll and the maintenance tools move full images, so both sizes are
//! measured.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench frame_bench
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use latchkey_core::constants::{EIGENVALUE_LEN, PACKED_IMAGE_LEN};
use latchkey_protocol::{CommandCode, SliceReader, checksum, decode_response, encode_data, encode_simple};
use std::hint::black_box;

/// Benchmark building simple command frames.
fn bench_encode_simple(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_simple");
    group.throughput(Throughput::Elements(1));

    group.bench_function("enroll_step", |b| {
        b.iter(|| {
            let frame = encode_simple(
                black_box(CommandCode::AddFingerprint1),
                black_box(0x01),
                black_box(0x2A),
                black_box(0x01),
            );
            black_box(frame);
        });
    });

    group.finish();
}

/// Benchmark decoding data responses of typical sizes.
fn bench_decode_data(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_data");

    for (name, len) in [("template", EIGENVALUE_LEN + 3), ("image", PACKED_IMAGE_LEN)] {
        let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
        let frame = encode_data(CommandCode::UploadEigenvalues, &payload).unwrap();

        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &frame, |b, frame| {
            b.iter(|| {
                let mut reader = SliceReader::new(black_box(frame));
                let response = decode_response(&mut reader, true).unwrap();
                black_box(response);
            });
        });
    }

    group.finish();
}

/// Benchmark the XOR checksum over an image-sized buffer.
fn bench_checksum(c: &mut Criterion) {
    let buffer = vec![0x5Au8; PACKED_IMAGE_LEN];

    let mut group = c.benchmark_group("checksum");
    group.throughput(Throughput::Bytes(buffer.len() as u64));
    group.bench_function("packed_image", |b| {
        b.iter(|| black_box(checksum(black_box(&buffer))));
    });
    group.finish();
}

criterion_group!(benches, bench_encode_simple, bench_decode_data, bench_checksum);
criterion_main!(benches);

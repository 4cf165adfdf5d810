//! Benchmarks for the inbound decode path
//!
//! Covers frame recovery from a noisy stream, envelope decoding and the
//! content heuristics used when a packet carries no port.
//!
//! Run with `cargo bench --features benchmark`.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use meshtap::frame::FrameSynchronizer;
use meshtap::messages::RadioEnvelope;
use meshtap::resolver::{DEFAULT_PRINTABLE_THRESHOLD, infer_packet_type};
use meshtap::test_utils::{framed_stream, node_record, position_message, text_message};
use meshtap::wire::WireWriter;
use std::hint::black_box;

fn sample_payloads() -> Vec<Vec<u8>> {
    (0..64u32)
        .map(|n| match n % 3 {
            0 => text_message(n, 0xFFFF_FFFF, n, "Checking in from the ridge, all quiet"),
            1 => position_message(n, n, 473_977_000 + n as i32, 85_449_000),
            _ => node_record(n, "Relay Station", "RLY"),
        })
        .collect()
}

fn bench_frame_sync(c: &mut Criterion) {
    let stream = framed_stream(&sample_payloads());

    let mut group = c.benchmark_group("frame_sync");
    group.throughput(Throughput::Bytes(stream.len() as u64));

    group.bench_function("whole_capture", |b| {
        b.iter(|| {
            let mut synchronizer = FrameSynchronizer::new();
            black_box(synchronizer.push(black_box(&stream)))
        })
    });

    for chunk_len in [1usize, 64, 1024] {
        group.bench_with_input(BenchmarkId::new("chunked", chunk_len), &chunk_len, |b, &chunk_len| {
            b.iter(|| {
                let mut synchronizer = FrameSynchronizer::new();
                let mut frames = 0;
                for chunk in stream.chunks(chunk_len) {
                    frames += synchronizer.push(chunk).len();
                }
                black_box(frames)
            })
        });
    }

    group.finish();
}

fn bench_envelope_decode(c: &mut Criterion) {
    let payloads = sample_payloads();
    let total: usize = payloads.iter().map(Vec::len).sum();

    let mut group = c.benchmark_group("envelope_decode");
    group.throughput(Throughput::Bytes(total as u64));
    group.bench_function("mixed_envelopes", |b| {
        b.iter(|| {
            for payload in &payloads {
                black_box(RadioEnvelope::decode(black_box(payload)));
            }
        })
    });
    group.finish();
}

fn bench_heuristics(c: &mut Criterion) {
    let mut telemetry = WireWriter::new();
    telemetry.fixed32(1, 1_700_000_000);
    telemetry.message(2, |metrics| {
        metrics.varint(1, 87).float(2, 4.1).float(3, 12.5);
    });
    let telemetry = telemetry.into_bytes();
    let text = b"Battery at 87 percent, voltage nominal".to_vec();
    let noise: Vec<u8> = (0..128u8).map(|n| n.wrapping_mul(37)).collect();

    let mut group = c.benchmark_group("infer_packet_type");
    for (name, payload) in [("telemetry", &telemetry), ("text", &text), ("noise", &noise)] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(infer_packet_type(black_box(payload), DEFAULT_PRINTABLE_THRESHOLD)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_frame_sync, bench_envelope_decode, bench_heuristics);
criterion_main!(benches);

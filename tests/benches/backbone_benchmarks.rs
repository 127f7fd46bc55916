//! # Inference Backbone Benchmarks
//!
//! | Subsystem | Operation | Target |
//! |-----------|-----------|--------|
//! | shared-types | seal + verify an envelope | < 20µs |
//! | bb-01 Clock Merger | compare / merge 16-node clocks | < 2µs |
//! | bb-02 Memory Gateway | squared L2 over 768 dims | < 1µs |
//! | bb-03 Dispatcher | enqueue + dequeue under load | < 10µs per envelope |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use bb_01_clock_merger::{compare, merge, tick};
use bb_02_memory_gateway::squared_l2;
use bb_03_dispatcher::{Dispatcher, DispatcherConfig};
use shared_types::{
    Enrichment, Envelope, HmacSigner, Payload, Region, SecurityLevel, VectorClock,
};

fn sealed(signer: &HmacSigner, priority: i64, clock: VectorClock) -> Envelope {
    let mut envelope = Envelope::create(
        Payload::chat("What is the capital of Yemen?"),
        priority,
        Region::Local,
        SecurityLevel::Internal,
    )
    .unwrap();
    envelope
        .enrich(
            Enrichment::new()
                .with_causal_stamp("node-1", clock)
                .with_context("Sana'a is the capital of Yemen.")
                .with_meta("source", "bench"),
        )
        .unwrap();
    envelope.seal(signer).unwrap();
    envelope
}

fn clock_of(nodes: usize, offset: u64) -> VectorClock {
    let mut clock = VectorClock::new();
    for n in 0..nodes {
        for _ in 0..(n as u64 + offset) % 5 + 1 {
            clock = tick(&clock, &format!("node-{n}"));
        }
    }
    clock
}

// ============================================================================
// Envelope sealing
// ============================================================================

fn bench_envelope_seal(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared-types-envelope");
    let signer = HmacSigner::new(&[0x42; 32]).unwrap();
    let clock = clock_of(8, 0);

    group.bench_function("seal", |b| {
        b.iter(|| black_box(sealed(&signer, 10, clock.clone())))
    });

    let envelope = sealed(&signer, 10, clock.clone());
    group.bench_function("verify", |b| b.iter(|| black_box(envelope.verify(&signer))));

    let wire = envelope.to_wire().unwrap();
    group.bench_function("decode_wire", |b| {
        b.iter(|| black_box(Envelope::from_wire(&wire).unwrap()))
    });
    group.finish();
}

// ============================================================================
// bb-01: Clock Merger
// ============================================================================

fn bench_clock_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("bb-01-clock-merger");
    for nodes in [4, 16, 64] {
        let a = clock_of(nodes, 0);
        let b = clock_of(nodes, 2);
        group.bench_with_input(BenchmarkId::new("compare", nodes), &nodes, |bench, _| {
            bench.iter(|| black_box(compare(&a, &b)))
        });
        group.bench_with_input(BenchmarkId::new("merge", nodes), &nodes, |bench, _| {
            bench.iter(|| black_box(merge(&a, &b)))
        });
    }
    group.finish();
}

// ============================================================================
// bb-02: Memory Gateway
// ============================================================================

fn bench_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("bb-02-memory-gateway");
    for dims in [384, 768, 1536] {
        let a: Vec<f32> = (0..dims).map(|i| (i as f32).sin()).collect();
        let b: Vec<f32> = (0..dims).map(|i| (i as f32).cos()).collect();
        group.throughput(Throughput::Elements(dims as u64));
        group.bench_with_input(BenchmarkId::new("squared_l2", dims), &dims, |bench, _| {
            bench.iter(|| black_box(squared_l2(&a, &b)))
        });
    }
    group.finish();
}

// ============================================================================
// bb-03: Dispatcher
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("bb-03-dispatcher");
    group.measurement_time(Duration::from_secs(5));
    let signer = HmacSigner::new(&[0x42; 32]).unwrap();

    for batch in [100usize, 1_000] {
        let envelopes: Vec<Envelope> = (0..batch)
            .map(|i| sealed(&signer, (i % 11) as i64, VectorClock::new()))
            .collect();
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(
            BenchmarkId::new("enqueue_dequeue", batch),
            &envelopes,
            |bench, envelopes| {
                bench.iter(|| {
                    let dispatcher = Dispatcher::new(DispatcherConfig {
                        queue_bound: batch,
                        ..DispatcherConfig::default()
                    })
                    .unwrap();
                    for envelope in envelopes {
                        dispatcher.enqueue(envelope.clone()).unwrap();
                    }
                    while let Some(envelope) = dispatcher.try_dequeue(Region::Local) {
                        dispatcher.retire(envelope.trace_id());
                    }
                })
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_envelope_seal,
    bench_clock_ops,
    bench_distance,
    bench_dispatch
);
criterion_main!(benches);

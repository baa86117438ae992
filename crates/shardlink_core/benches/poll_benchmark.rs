//! # Mailbox Poll Benchmark
//!
//! The receiver tick runs inside someone else's frame budget, so an idle
//! tick and a delivering tick both need to stay in the nanosecond range.
//!
//! Run with: `cargo bench --package shardlink_core`

// Benchmarks don't need strict docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use shardlink_core::{LinkConfig, MailboxSender, PollLoop, SharedRegisterBlock};

/// Idle tick: nothing in the slot, nothing new to publish.
fn bench_idle_tick(c: &mut Criterion) {
    let block = SharedRegisterBlock::new();
    let mut receiver = PollLoop::from_config(&block, &LinkConfig::default()).unwrap();
    receiver.poll_once();

    c.bench_function("poll_once_idle", |b| {
        b.iter(|| black_box(receiver.poll_once()));
    });
}

/// Send then drain, per item class.
fn bench_send_and_drain(c: &mut Criterion) {
    let config = LinkConfig::default();
    let mut group = c.benchmark_group("send_and_drain");

    let items = [
        ("milestone", config.milestone_item_id(3).unwrap()),
        ("counter", config.counter_item_id("extra_lives").unwrap()),
        ("unknown", 42),
    ];

    for (label, item_id) in items {
        group.bench_with_input(BenchmarkId::from_parameter(label), &item_id, |b, &item_id| {
            let block = SharedRegisterBlock::new();
            let sender = MailboxSender::new(&block);
            let mut receiver = PollLoop::from_config(&block, &config).unwrap();
            let mut sender_ref = 0u32;

            b.iter(|| {
                sender_ref = sender_ref.wrapping_add(1);
                let sent = sender.try_send(black_box(item_id), sender_ref);
                black_box((sent, receiver.poll_once()))
            });
        });
    }

    group.finish();
}

/// Raw snapshot of all seven registers.
fn bench_snapshot(c: &mut Criterion) {
    let block = SharedRegisterBlock::new();
    c.bench_function("register_snapshot", |b| {
        b.iter(|| black_box(block.snapshot().to_le_bytes()));
    });
}

criterion_group!(benches, bench_idle_tick, bench_send_and_drain, bench_snapshot);
criterion_main!(benches);

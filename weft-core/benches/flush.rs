//! Flush Throughput Benchmarks
//!
//! Measures the cost of invalidating N watchers through one shared property
//! and draining them in a single flush, and of array mutations fanning out
//! to readers.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use weft_core::{run_pending_ticks, Owner, Value, WatchSource, Watcher, WatcherOptions};

fn owner_with_watchers(count: usize) -> (Owner, Vec<std::rc::Rc<Watcher>>) {
    let owner = Owner::new("bench");
    owner.init_data(Value::object([
        ("counter", Value::from(0)),
        ("items", Value::array((0..64).map(Value::from))),
    ]));
    let watchers = (0..count)
        .map(|_| {
            Watcher::new(
                &owner,
                WatchSource::path("counter"),
                None,
                WatcherOptions::default(),
                false,
            )
            .unwrap()
        })
        .collect();
    (owner, watchers)
}

fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");
    for count in [10usize, 100, 1000] {
        let (owner, _watchers) = owner_with_watchers(count);
        let mut n = 0.0;
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                n += 1.0;
                owner.set("counter", Value::from(n));
                black_box(run_pending_ticks());
            })
        });
    }
    group.finish();
}

fn bench_array_push(c: &mut Criterion) {
    let owner = Owner::new("bench");
    owner.init_data(Value::object([("items", Value::array([]))]));
    let _reader = Watcher::new(
        &owner,
        WatchSource::path("items.length"),
        None,
        WatcherOptions::default(),
        false,
    )
    .unwrap();
    let items = owner.get("items").unwrap();

    c.bench_function("array_push_and_flush", |b| {
        b.iter(|| {
            if let Some(array) = items.as_array() {
                array.push([Value::object([("v", Value::from(1))])]);
            }
            black_box(run_pending_ticks());
        })
    });
}

criterion_group!(benches, bench_flush, bench_array_push);
criterion_main!(benches);

//! Dispatch benchmarks
//!
//! - Combined reducer execution in isolation
//! - Store dispatch with and without middleware
//!
//! Run with: `cargo bench`

#![allow(missing_docs)]
#![allow(clippy::expect_used)]

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use reflow_core::{Action, CombinedReducer, ReducerTree, State, combine_reducers, slice_reducer};
use reflow_runtime::{ApplyMiddleware, LoggingMiddleware, create_store, create_store_with_enhancer, from_fn};

fn bench_reducer() -> CombinedReducer {
    let counter = |name: &'static str| {
        slice_reducer(0_i64, move |n: &i64, a: &Action| a.is(name).then(|| n + 1))
    };
    let mut settings = ReducerTree::new();
    for i in 0..16 {
        settings = settings.leaf(format!("flag{i}"), slice_reducer(false, |_: &bool, _: &Action| None));
    }
    combine_reducers(
        ReducerTree::new()
            .leaf("counter", counter("increment"))
            .leaf("other", counter("other"))
            .branch("settings", settings),
    )
}

fn benchmark_reducer_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("reducer");
    group.throughput(Throughput::Elements(1));

    let reducer = bench_reducer();
    let state = reducer.apply(None, &Action::new("noop")).expect("initial state");

    group.bench_function("increment", |b| {
        let action = Action::new("increment");
        b.iter(|| reducer.apply(Some(black_box(&state)), &action));
    });

    group.bench_function("unchanged", |b| {
        let action = Action::new("noop");
        b.iter(|| reducer.apply(Some(black_box(&state)), &action));
    });

    group.finish();
}

fn benchmark_store_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("no_middleware", |b| {
        let store = create_store(bench_reducer(), None).expect("store");
        b.iter(|| store.dispatch(black_box(Action::new("increment"))));
    });

    group.bench_function("with_middleware", |b| {
        let passthrough = ApplyMiddleware::new()
            .with(LoggingMiddleware)
            .with(from_fn(|_api, action: Action, next| next.run(action)));
        let store = create_store_with_enhancer(bench_reducer(), None, passthrough).expect("store");
        b.iter(|| store.dispatch(black_box(Action::new("increment"))));
    });

    group.bench_function("with_listeners", |b| {
        let store = create_store(bench_reducer(), Some(State::empty_tree())).expect("store");
        let _handles: Vec<_> = (0..8).map(|_| store.subscribe(|| {})).collect();
        b.iter(|| store.dispatch(black_box(Action::new("increment"))));
    });

    group.finish();
}

criterion_group!(benches, benchmark_reducer_execution, benchmark_store_dispatch);
criterion_main!(benches);

//! Benchmarks for candidate generation, locating and binding

use std::sync::Arc;

use autonative::search::{generate, SearchLayout};
use autonative::{bind, locate, InterfaceDescriptor, NameStyle, NativeValue, StubLoader};
use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput,
};

extern "C" fn add(a: i64, b: i64) -> i64 {
    a + b
}

extern "C" fn ping() -> i32 {
    1
}

/// Candidate list size grows with version depth
fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    let loader = StubLoader::new(NameStyle::Posix);
    let layout = SearchLayout::new("/opt/app", "amd64");

    for version in ["", "1", "1.2", "1.2.3", "1.2.3.4"] {
        let count = generate("rocksdb", version, &layout, &loader).len();
        group.throughput(Throughput::Elements(count as u64));

        group.bench_function(format!("{}_candidates", count), |b| {
            b.iter(|| black_box(generate("rocksdb", black_box(version), &layout, &loader)))
        });
    }

    group.finish();
}

/// Worst-case search: only the last candidate loads
fn bench_locate_and_bind(c: &mut Criterion) {
    let loader = Arc::new(
        StubLoader::new(NameStyle::Posix)
            .with_library("libdemo.so", [("add", add as usize), ("ping", ping as usize)]),
    );
    let layout = SearchLayout::new("/opt/app", "amd64");
    let candidates = generate("demo", "1.2.3", &layout, loader.as_ref());
    let descriptor = InterfaceDescriptor::parse_many("i64 add(i64, i64)\ni32 ping()").unwrap();

    c.bench_function("locate_bind_last_candidate", |b| {
        b.iter_batched(
            || loader.reset_log(),
            |_| {
                let library = locate("demo", &candidates, loader.clone()).unwrap();
                black_box(bind(&descriptor, library).unwrap())
            },
            BatchSize::SmallInput,
        )
    });
}

/// Per-call overhead through the adapter
fn bench_adapter_call(c: &mut Criterion) {
    let loader = Arc::new(
        StubLoader::new(NameStyle::Posix).with_library("libdemo.so", [("add", add as usize)]),
    );
    let candidates = vec![autonative::CandidatePath::bare("demo", "libdemo.so")];
    let library = locate("demo", &candidates, loader).unwrap();
    let descriptor = InterfaceDescriptor::parse_many("i64 add(i64, i64)").unwrap();
    let adapter = bind(&descriptor, library).unwrap();
    let args = [NativeValue::Int(40), NativeValue::Int(2)];

    c.bench_function("adapter_call_add", |b| {
        b.iter(|| black_box(adapter.call("add", black_box(&args)).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_generate,
    bench_locate_and_bind,
    bench_adapter_call
);
criterion_main!(benches);

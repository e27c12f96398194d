//! Store operation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tabula_codec::Value;
use tabula_core::{Store, StoreConfig};

/// A `users` table with `count` records over 100 distinct emails.
fn populated(count: usize, indexed: bool) -> Store {
    let mut store = Store::new();
    let columns: &[&str] = if indexed { &["email"] } else { &[] };
    store.create_table("users", columns);
    for i in 0..count {
        let tags = store.heap_mut().list([Value::from("a"), Value::from("b")]);
        let user = store.heap_mut().object([
            ("name", Value::from(format!("user{i}"))),
            ("email", Value::from(format!("user{}@example.com", i % 100))),
            ("tags", tags),
        ]);
        store.add_record("users", user).unwrap();
    }
    store
}

/// Benchmark column lookup with and without an index.
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_by_column");
    let wanted = Value::from("user42@example.com");

    for count in [100usize, 1_000, 10_000].iter() {
        for indexed in [true, false] {
            let mut store = populated(*count, indexed);
            let label = if indexed { "indexed" } else { "scan" };
            group.bench_with_input(BenchmarkId::new(label, count), count, |b, _| {
                b.iter(|| {
                    let found = store
                        .get_records_by_column("users", "email", black_box(&wanted))
                        .unwrap();
                    black_box(found.len())
                });
            });
        }
    }
    group.finish();
}

/// Benchmark record insertion into an indexed table.
fn bench_add_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_record");
    group.throughput(Throughput::Elements(1));
    group.bench_function("indexed", |b| {
        let mut store = populated(0, true);
        let mut i = 0u32;
        b.iter(|| {
            i += 1;
            let user = store
                .heap_mut()
                .object([("email", Value::from(i % 100)), ("n", Value::from(i))]);
            black_box(store.add_record("users", user).unwrap());
        });
    });
    group.finish();
}

/// Benchmark observed mutation inside a rolled back transaction.
fn bench_rollback(c: &mut Criterion) {
    let mut store = populated(1, true);
    let user = store.get_all_records("users").unwrap().remove(0);
    let tags = store
        .observe(&user)
        .get("tags")
        .unwrap()
        .and_then(|o| o.into_handle())
        .unwrap();

    c.bench_function("rollback_100_pushes", |b| {
        b.iter(|| {
            store.begin();
            for i in 0..100 {
                store.observe(&tags).push(i).unwrap();
            }
            store.rollback().unwrap();
        });
    });
}

/// Benchmark snapshot serialize and load.
fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for count in [100usize, 1_000, 10_000].iter() {
        let store = populated(*count, true);
        let bytes = store.serialize();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("serialize", count), count, |b, _| {
            b.iter(|| black_box(store.serialize()));
        });
        group.bench_with_input(BenchmarkId::new("load", count), count, |b, _| {
            b.iter(|| {
                let restored = Store::from_snapshot(black_box(&bytes), StoreConfig::default()).unwrap();
                black_box(restored.record_count("users").unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lookup, bench_add_record, bench_rollback, bench_snapshot);
criterion_main!(benches);

//! Storage model benchmarks.
//!
//! Measures the paths the interpreter leans on: descriptor-resolved slot
//! reads (inline and spill), fast-path writes, migration cost as layouts
//! grow, and canonical-layout reuse across sibling instances.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use opal_core::intern::{intern, InternedString};
use opal_core::Value;
use opal_runtime::{Class, Instance};
use std::sync::Arc;

/// An instance with `n` integer attributes named "attr0".."attrN".
fn instance_with_n_attributes(n: usize) -> Instance {
    let class = Class::new(intern("Bench"));
    let mut obj = Instance::new(class);
    for i in 0..n {
        obj.set_attribute(&intern(&format!("attr{i}")), Value::int(i as i64).unwrap());
    }
    obj
}

fn attribute_names(count: usize) -> Vec<InternedString> {
    (0..count).map(|i| intern(&format!("attr{i}"))).collect()
}

fn bench_attribute_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("attribute_read");

    group.bench_function("inline_int_slot", |b| {
        let obj = instance_with_n_attributes(4);
        let name = intern("attr2");
        b.iter(|| black_box(obj.get_attribute(&name).unwrap()))
    });

    group.bench_function("inline_reference_slot", |b| {
        let mut obj = instance_with_n_attributes(0);
        let name = intern("label");
        obj.set_attribute(&name, Value::string(&intern("payload")));
        b.iter(|| black_box(obj.get_attribute(&name).unwrap()))
    });

    group.bench_function("spill_slot", |b| {
        // 12 ints: 5 inline, the rest in the spill array.
        let obj = instance_with_n_attributes(12);
        let name = intern("attr11");
        b.iter(|| black_box(obj.get_attribute(&name).unwrap()))
    });

    group.finish();
}

fn bench_attribute_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("attribute_write");

    group.bench_function("fast_path_overwrite", |b| {
        let mut obj = instance_with_n_attributes(4);
        let name = intern("attr1");
        let value = Value::int(99).unwrap();
        b.iter(|| obj.set_attribute(&name, black_box(value)))
    });

    group.bench_function("enumerate_8_attributes", |b| {
        let obj = instance_with_n_attributes(8);
        b.iter(|| black_box(obj.attributes()))
    });

    group.finish();
}

fn bench_migration(c: &mut Criterion) {
    let mut group = c.benchmark_group("migration");

    for count in [2usize, 8, 16] {
        let names = attribute_names(count);
        group.bench_with_input(
            BenchmarkId::new("grow_fresh_object", count),
            &count,
            |b, &count| {
                b.iter(|| {
                    let class = Class::new(intern("Fresh"));
                    let mut obj = Instance::new(class);
                    for (i, name) in names.iter().enumerate().take(count) {
                        obj.set_attribute(name, Value::int(i as i64).unwrap());
                    }
                    black_box(obj)
                })
            },
        );
    }

    group.bench_function("reuse_canonical_layout", |b| {
        // The canonical already has every slot; sibling writes never migrate.
        let class = Class::new(intern("Warm"));
        let mut warm = Instance::new(Arc::clone(&class));
        let names = attribute_names(8);
        for (i, name) in names.iter().enumerate() {
            warm.set_attribute(name, Value::int(i as i64).unwrap());
        }

        b.iter(|| {
            let mut obj = Instance::new(Arc::clone(&class));
            for (i, name) in names.iter().enumerate() {
                obj.set_attribute(name, Value::int(i as i64).unwrap());
            }
            black_box(obj)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_attribute_read,
    bench_attribute_write,
    bench_migration
);
criterion_main!(benches);

//! Performance benchmarks for the interop hot paths:
//! - trampoline registry lookup (every foreign callback pays this)
//! - generic proxy dispatch into an application slot
//! - callback object construction and teardown

use combridge::core::registry;
use combridge::prelude::*;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_registry_lookup(c: &mut Criterion) {
    let object = CallbackBuilder::new().method(|_| HResult::OK).build().unwrap();
    let address = object.address();

    c.bench_function("registry_lookup_hit", |b| {
        b.iter(|| registry::contains(black_box(address)))
    });
    c.bench_function("registry_lookup_miss", |b| {
        b.iter(|| registry::contains(black_box(0xdead_beef)))
    });
}

fn bench_proxy_dispatch(c: &mut Criterion) {
    let object = CallbackBuilder::new().method(|_| HResult::OK).build().unwrap();
    let handle = object.handle();

    c.bench_function("invoke_app_slot", |b| {
        b.iter(|| unsafe { invoke(black_box(handle), 3, &[1, 2]).unwrap() })
    });
    c.bench_function("invoke_add_ref_release", |b| {
        b.iter(|| {
            unsafe { handle.add_ref() };
            unsafe { handle.release() }
        })
    });
}

fn bench_build_teardown(c: &mut Criterion) {
    c.bench_function("callback_build_drop", |b| {
        b.iter(|| {
            let object = CallbackBuilder::new().method(|_| HResult::OK).build().unwrap();
            black_box(object.address());
        })
    });
}

criterion_group!(
    benches,
    bench_registry_lookup,
    bench_proxy_dispatch,
    bench_build_teardown
);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use studiokit_core::tolerance::{compare, compare_with_tolerance, ToleranceInput, ToleranceSpec};

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    group.bench_function("percentage", |b| {
        b.iter(|| ToleranceSpec::parse(black_box("0.001%")))
    });

    group.bench_function("absolute", |b| {
        b.iter(|| ToleranceSpec::parse(black_box("0.25")))
    });

    group.finish();
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");

    group.bench_function("default", |b| {
        b.iter(|| compare(black_box(100.0005), black_box(100.0)))
    });

    group.bench_function("relative_percentage", |b| {
        let spec = ToleranceSpec::Percentage(10.0);
        b.iter(|| compare_with_tolerance(black_box(111.0), black_box(100.0), spec, true))
    });

    group.bench_function("authored_text", |b| {
        let input = ToleranceInput::Text("5%".into());
        b.iter(|| input.compare(black_box(104.0), black_box(100.0), false))
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_compare);
criterion_main!(benches);

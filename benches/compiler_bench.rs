//! Benchmarks for the expression compiler and query builder
//!
//! Run with: cargo bench

use claw_druid::query::{
    compile_filter, compile_having, compile_post_aggregation, AggregationRegistry, QueryBuilder,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

/// `a0 = 0 and (a1 > 1 or a2 < 2) and ...` with `terms` comparisons
fn filter_expression(terms: usize) -> String {
    let mut parts = Vec::new();
    let mut i = 0;
    while i < terms {
        if i + 2 < terms {
            parts.push(format!("(d{} > {} or d{} < {})", i, i, i + 1, i + 1));
            i += 2;
        } else {
            parts.push(format!("d{} = 'v{}'", i, i));
            i += 1;
        }
    }
    parts.join(" and ")
}

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");

    for terms in [4, 32, 256] {
        let expr = filter_expression(terms);
        group.throughput(Throughput::Elements(terms as u64));

        group.bench_function(format!("compile_{}", terms), |b| {
            b.iter(|| compile_filter(black_box(&expr)).unwrap())
        });
    }

    group.finish();
}

fn bench_having_and_arithmetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregates");

    group.bench_function("having", |b| {
        b.iter(|| {
            compile_having(black_box("clicks > 10 and (cost < 2.5 or views = 0)")).unwrap()
        })
    });

    group.bench_function("post_aggregation", |b| {
        b.iter(|| {
            let mut registry = AggregationRegistry::new();
            compile_post_aggregation(
                black_box("(sum(clicks) ++ sum(views)) // count(*) ** 100"),
                &mut registry,
            )
            .unwrap()
        })
    });

    group.finish();
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("build_group_by", |b| {
        b.iter(|| {
            let mut builder = QueryBuilder::new("ads");
            builder
                .interval("2020-01-01", "2020-02-01")
                .group(&["country", "device"])
                .select("sum(clicks), sum(price * qty) as gross, sum(clicks) // sum(views) as ctr")
                .unwrap()
                .filter_expr("country in ['US', 'CA'] and clicks > 0")
                .unwrap()
                .having("gross > 100")
                .unwrap()
                .order(&["ctr desc"])
                .limit(50);
            black_box(builder.build().unwrap())
        })
    });
}

criterion_group!(benches, bench_filters, bench_having_and_arithmetic, bench_build);
criterion_main!(benches);

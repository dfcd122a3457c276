use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgfluent::{Query, Value, number, select};

/// SELECT with `n` equality conditions and a sub-query filter.
fn build_select(n: usize) -> Query {
    let mut sub = select();
    sub.select(["user_id"])
        .table("bans")
        .expect("table")
        .where_("active", true)
        .expect("where");

    let mut q = select();
    q.select(["u.id", "u.email"])
        .from_as("users", "u")
        .expect("from")
        .left_join("orgs", "o", "o.id = u.org_id")
        .expect("join");
    for i in 0..n {
        q.where_(format!("u.col{i}"), i as i64).expect("where");
    }
    q.where_("u.id NOT IN (?)", sub).expect("where");
    q.order_by(["u.id"]).limit(50);
    q
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("qb/compile");

    for n in [1, 5, 20, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                // Build inside the loop so the memoized form is never reused.
                let q = build_select(n);
                black_box(q.compile())
            });
        });
    }

    group.finish();
}

fn bench_memoized(c: &mut Criterion) {
    let q = build_select(20);
    let _ = q.compile();
    c.bench_function("qb/compile_memoized", |b| b.iter(|| black_box(q.compile())));
}

fn bench_number(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql/number");

    for n in [10, 100, 1000] {
        let text = vec!["id IN (?)"; n].join(" OR ");
        let params: Vec<Value> = (0..n)
            .map(|i| Value::array([i as i64, i as i64 + 1, i as i64 + 2]))
            .collect();
        group.bench_with_input(
            BenchmarkId::from_parameter(n),
            &(text, params),
            |b, (text, params)| b.iter(|| black_box(number(text, params))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_memoized, bench_number);
criterion_main!(benches);

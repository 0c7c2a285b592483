use criterion::{criterion_group, criterion_main, Criterion};
use smon::style::{render, StyleContext};
use smon::table::Table;

/// Build a synthetic squeue listing with the given number of rows
fn sample_queue(rows: usize) -> String {
    let mut raw = String::from("JOBID PARTITION NAME USER ST TIME NODES NODELIST(REASON)\n");
    for i in 0..rows {
        let state = if i % 3 == 0 { "PD" } else { "R" };
        raw.push_str(&format!(
            "{} batch job{} user{} {} 1:0{} 1 node{:03}\n",
            100_000 + i,
            i,
            i % 50,
            state,
            i % 10,
            i % 200
        ));
    }
    raw
}

fn benchmark_parse(c: &mut Criterion) {
    let raw = sample_queue(1000);
    c.bench_function("parse 1000 rows", |b| {
        b.iter(|| Table::parse(&raw).expect("sample parses"))
    });
}

fn benchmark_render(c: &mut Criterion) {
    let raw = sample_queue(1000);
    let table = Table::parse(&raw).expect("sample parses");
    let ctx = StyleContext {
        username: "user7".to_string(),
    };
    c.bench_function("render 1000 rows", |b| b.iter(|| render(&table, &ctx)));
}

criterion_group!(benches, benchmark_parse, benchmark_render);
criterion_main!(benches);

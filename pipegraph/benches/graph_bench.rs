//! Benchmarks for graph construction and execution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pipegraph::engine::run;
use pipegraph::graph::{ActivityGraph, PipelineDefinition};
use pipegraph::testing::{chain, fan_in, payroll_pipeline_definition, ScriptedExecutor};
use std::sync::Arc;

fn build_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for size in [10, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("chain", size), &size, |b, &size| {
            b.iter_batched(
                || chain(size),
                |specs| black_box(ActivityGraph::build("chain", specs)),
                criterion::BatchSize::SmallInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("fan_in", size), &size, |b, &size| {
            b.iter_batched(
                || fan_in(size),
                |specs| black_box(ActivityGraph::build("fan_in", specs)),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();

    let document = payroll_pipeline_definition().to_string();
    c.bench_function("parse_payroll_definition", |b| {
        b.iter(|| {
            let definition = PipelineDefinition::from_json(black_box(&document)).ok();
            black_box(definition.and_then(|d| d.to_graph().ok()))
        });
    });
}

fn run_benchmark(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Builder::new_multi_thread().enable_all().build() else {
        return;
    };
    let Ok(graph) = ActivityGraph::build("fan_in", fan_in(100)) else {
        return;
    };

    c.bench_function("run_fan_in_100", |b| {
        b.iter(|| {
            let executor = Arc::new(ScriptedExecutor::new());
            black_box(runtime.block_on(run(&graph, executor)))
        });
    });
}

criterion_group!(benches, build_benchmark, run_benchmark);
criterion_main!(benches);

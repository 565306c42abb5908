use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashSet;

use orka_core::dag::{Graph, Task, TaskId, TaskType};

/// A chain of `n` tasks, each depending on the one before it.
fn chain_graph(n: usize) -> Graph {
    let tasks: Vec<Task> = (0..n)
        .map(|i| {
            let id = format!("t{i}");
            let mut task = Task::new(id.clone(), id.clone(), TaskType::Bash, "true");
            if i > 0 {
                task = task.with_dependencies([TaskId::new(format!("t{}", i - 1))]);
            }
            task
        })
        .collect();
    Graph::build("bench-chain", tasks).expect("valid chain")
}

/// A layered fan-out/fan-in graph: `width` independent tasks per layer, each
/// layer depending on the full previous layer.
fn layered_graph(layers: usize, width: usize) -> Graph {
    let mut tasks = Vec::with_capacity(layers * width);
    for layer in 0..layers {
        let deps: Vec<TaskId> = if layer == 0 {
            Vec::new()
        } else {
            (0..width).map(|w| TaskId::new(format!("l{}_{w}", layer - 1))).collect()
        };
        for w in 0..width {
            let id = format!("l{layer}_{w}");
            tasks.push(Task::new(id.clone(), id.clone(), TaskType::Bash, "true").with_dependencies(deps.clone()));
        }
    }
    Graph::build("bench-layered", tasks).expect("valid layered graph")
}

fn bench_graph_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");
    for size in [10usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| black_box(chain_graph(size)));
        });
    }
    group.finish();
}

fn bench_topological_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("topological_order");
    for size in [10usize, 100, 1_000] {
        let g = chain_graph(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(g.topological_order().unwrap()));
        });
    }
    group.finish();
}

fn bench_ready_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("ready_set");
    for (layers, width) in [(5usize, 10usize), (10, 50)] {
        let g = layered_graph(layers, width);
        let label = format!("{layers}x{width}");
        group.bench_with_input(BenchmarkId::from_parameter(label), &(layers, width), |b, _| {
            let completed: HashSet<TaskId> = HashSet::new();
            b.iter(|| black_box(g.ready_set(&completed)));
        });
    }
    group.finish();
}

fn bench_critical_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("critical_path");
    for (layers, width) in [(5usize, 10usize), (10, 50)] {
        let g = layered_graph(layers, width);
        let label = format!("{layers}x{width}");
        group.bench_with_input(BenchmarkId::from_parameter(label), &(layers, width), |b, _| {
            b.iter(|| black_box(g.critical_path().unwrap()));
        });
    }
    group.finish();
}

fn bench_upstream_downstream_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("closure");
    let g = chain_graph(1_000);
    let mid = TaskId::new("t500");
    group.bench_function("upstream_closure", |b| {
        b.iter(|| black_box(g.upstream_closure(&mid).unwrap()));
    });
    group.bench_function("downstream_closure", |b| {
        b.iter(|| black_box(g.downstream_closure(&mid).unwrap()));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_graph_build,
    bench_topological_order,
    bench_ready_set,
    bench_critical_path,
    bench_upstream_downstream_closure,
);
criterion_main!(benches);

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fleet_core::domain::models::{Capability, MissionPriority, Pilot, WorkOrder};
use fleet_core::services::ScoreCalculator;

const POOL_SIZES: &[usize] = &[10, 100, 1000];

fn candidate_pool(size: usize) -> Vec<Pilot> {
    (0..size)
        .map(|i| {
            let mut pilot = Pilot::new(format!("pilot-{i}"), "backend", 5);
            pilot.current_workload = (i % 5) as u32;
            pilot.capabilities.push(Capability::new("rust", vec!["rust".into(), "endpoint".into()]));
            pilot
        })
        .collect()
}

fn scheduler_scoring(c: &mut Criterion) {
    let work_order = WorkOrder::new("implement endpoint", "add a rust rest endpoint", MissionPriority::High, 2);
    let calculator = ScoreCalculator::default();
    let mut group = c.benchmark_group("scheduler_rank");

    for &size in POOL_SIZES {
        let pool = candidate_pool(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &pool, |b, pool| {
            b.iter(|| calculator.rank(pool, &work_order));
        });
    }

    group.finish();
}

criterion_group!(benches, scheduler_scoring);
criterion_main!(benches);

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fleet_core::domain::models::{EventPayload, StreamType};
use fleet_core::infrastructure::database::{all_embedded_migrations, create_test_pool, Migrator, SqliteEventRepository};
use fleet_core::services::EventLog;
use std::sync::Arc;
use tokio::runtime::Runtime;

const BATCH_SIZES: &[usize] = &[16, 64, 256];

async fn append_batch(log: &EventLog<SqliteEventRepository>, stream_id: &str, count: usize) {
    for i in 0..count {
        log.append(
            StreamType::WorkOrder,
            stream_id,
            EventPayload::WorkOrderSubmitted { work_type: format!("task-{i}") },
            None,
            None,
        )
        .await
        .expect("append");
    }
}

fn event_log_append(c: &mut Criterion) {
    let runtime = Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("event_log_append");

    for &batch in BATCH_SIZES {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &size| {
            b.to_async(&runtime).iter(|| async move {
                let pool = create_test_pool().await.expect("pool");
                Migrator::new(pool.clone()).run_embedded_migrations(all_embedded_migrations()).await.expect("migrate");
                let log = EventLog::new(Arc::new(SqliteEventRepository::new(pool)));
                append_batch(&log, "bench-stream", size).await;
            });
        });
    }

    group.finish();
}

criterion_group!(benches, event_log_append);
criterion_main!(benches);

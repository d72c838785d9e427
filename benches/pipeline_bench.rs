use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use logfiler::{Database, Pipeline, PipelineOptions, Transformer};
use std::time::Duration;

const PATTERN: &str = "{timestamp:date:yyyy-MM-ddTHH:mm:ss.ffffffZ} {level:enum-level} {source} {message}";

fn sample_lines(count: usize) -> Vec<String> {
    let levels = ["I", "W", "E", "I"];
    (0..count)
        .map(|i| {
            format!(
                "2024-07-24T11:{:02}:{:02}.{:06}Z {} i.q.g.e.QueryProgress exe [id={}, sql=`tables();`, principal=admin]",
                (i / 60) % 60,
                i % 60,
                i % 1_000_000,
                levels[i % levels.len()],
                i
            )
        })
        .collect()
}

/// 测试从内存行到内存数据库的完整导入
fn bench_pipeline(c: &mut Criterion) {
    let lines = sample_lines(50_000);
    let bytes: usize = lines.iter().map(|l| l.len() + 1).sum();

    let mut group = c.benchmark_group("pipeline_in_memory");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Bytes(bytes as u64));

    for batch_size in [1_000usize, 10_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, &batch_size| {
                b.iter(|| {
                    let transformer = Transformer::from_pattern(PATTERN, false).unwrap();
                    let options = PipelineOptions {
                        batch_size,
                        silent: true,
                        ..PipelineOptions::default()
                    };
                    let mut pipeline = Pipeline::new(transformer, options);
                    let database = Database::open_in_memory().unwrap();
                    let summary = pipeline
                        .run(black_box(&lines).iter().cloned().map(Ok), database)
                        .unwrap();
                    summary.rows_written
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);

//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use scanflow::prelude::*;
use scanflow::results::derive_severity;

fn five_stage_table() -> StageTable {
    let mut builder = StageTable::builder();
    for id in ["validate", "crawl", "extract", "analyze", "report"] {
        let worker = FnWorker::new(|_: &WorkerContext| Ok::<_, StageError>(Advance::by(25.0)));
        builder = builder.add(id, id, Arc::new(worker));
    }
    builder.build().expect("valid table")
}

fn pipeline_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let table = five_stage_table();
    let producer: Arc<dyn ResultProducer> = Arc::new(DemoResultProducer);

    c.bench_function("five_stage_run", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let executor = PipelineExecutor::new(ExecutorConfig::immediate());
                let handle = executor
                    .start(&table, ScanConfig::new("https://example.com"), producer.clone())
                    .expect("start");
                black_box(handle.results().await.expect("results"))
            })
        });
    });

    c.bench_function("derive_severity", |b| {
        let factors = ["innerHTML assignment", "location.hash read", "inline handler"];
        b.iter(|| black_box(derive_severity(black_box(&factors))));
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);

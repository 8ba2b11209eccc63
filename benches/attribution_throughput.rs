//! Attribution throughput benchmark
//!
//! Measures log scanning and attribution over synthetic runs of increasing
//! size: one batch per simulated property, one protocol execution per batch
//! plus an equal number of unreferenced executions.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench attribution_throughput
//! ```

use chrono::{Duration, NaiveDate, NaiveDateTime};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use evaltime::batch_timing::extract_batch_timings;
use evaltime::interval::Layer;
use evaltime::protocol_timing::{extract_protocol_timings, WorkerLog};
use evaltime::provenance::{PropertyRecord, ProtocolDescriptor, RequestResult};
use evaltime::time_attribution::attribute_time;
use evaltime::TimingConfig;
use serde_json::json;

fn midnight() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn stamp(t: NaiveDateTime) -> String {
    t.format("%H:%M:%S%.3f").to_string()
}

/// Driver log, worker log and results for `batches` batches of 10s each
fn synthetic_run(batches: usize) -> (String, WorkerLog, Vec<RequestResult>) {
    let mut driver = vec![
        "Started at 2020-06-01 00:00:00".to_string(),
        "00:00:00.000 INFO Received estimation request".to_string(),
    ];
    let mut worker = vec!["2020-06-01 00:00:00.000 INFO Worker started".to_string()];
    let mut properties = Vec::with_capacity(batches);

    for i in 0..batches {
        let start = midnight() + Duration::seconds(10 * i as i64);
        let end = start + Duration::seconds(10);
        driver.push(format!("{} INFO Launching batch b{} using the SimulationLayer", stamp(start), i));
        driver.push(format!("{} INFO Finished server request b{}", stamp(end), i));

        for (id, offset) in [(format!("p{}", i), 1), (format!("idle{}", i), 6)] {
            let run_start = start + Duration::seconds(offset);
            worker.push(format!("2020-06-01 {} INFO Executing {}", stamp(run_start), id));
            worker.push(format!(
                "2020-06-01 {} INFO {} finished executing after 3000.0 ms",
                stamp(run_start + Duration::seconds(3)),
                id
            ));
        }

        let schemas = vec![
            ProtocolDescriptor::new("assign_parameters").with_input(
                ".force_field_path",
                json!(format!("working-data/SimulationLayer/b{}/ff.json", i)),
            ),
            ProtocolDescriptor::new(format!("p{}", i)),
        ];
        properties.push(PropertyRecord::new("Density", Layer::SimulationLayer, schemas));
    }

    let log = WorkerLog {
        name: "worker-0.log".to_string(),
        modified: midnight() - Duration::hours(2),
        text: worker.join("\n"),
    };
    (
        driver.join("\n"),
        log,
        vec![RequestResult::from_properties(properties)],
    )
}

fn bench_attribution(c: &mut Criterion) {
    let config = TimingConfig::default();
    let mut group = c.benchmark_group("attribution");

    for batches in [10usize, 100, 1000] {
        let (driver, worker, results) = synthetic_run(batches);
        group.throughput(Throughput::Elements(batches as u64));

        group.bench_with_input(BenchmarkId::new("end_to_end", batches), &batches, |b, _| {
            b.iter(|| {
                let timings = extract_batch_timings(black_box(&driver), "driver.o", &config).unwrap();
                let protocols = extract_protocol_timings([&worker], &config).unwrap();
                attribute_time(&timings, protocols, black_box(&results), &config).unwrap()
            });
        });

        let timings = extract_batch_timings(&driver, "driver.o", &config).unwrap();
        let protocols = extract_protocol_timings([&worker], &config).unwrap();
        group.bench_with_input(BenchmarkId::new("attribute_only", batches), &batches, |b, _| {
            b.iter(|| attribute_time(&timings, protocols.clone(), black_box(&results), &config).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_attribution);
criterion_main!(benches);

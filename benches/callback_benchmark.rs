//! Performance Benchmarks for fleetrecap's aggregation engine
//!
//! ## Benchmarks Included:
//!
//! 1. **Task Aggregation**:
//!    - Identical results across many hosts (one group)
//!    - Distinct results per host (one group per host)
//!    - Results carrying diffs
//!
//! 2. **Event Decoding**:
//!    - JSON line to event conversion
//!
//! 3. **Host List Folding**:
//!    - Contiguous, sparse and mixed-prefix host sets

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use fleetrecap::callback::{Event, FileDiff, HostResult, OutcomeKind, PlaybookRun};
use fleetrecap::config::{RenderConfig, RendererKind};
use fleetrecap::hostlist::fold;
use fleetrecap::output::RecordingSink;

// ============================================================================
// Helpers
// ============================================================================

fn hosts(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("node{:04}", i)).collect()
}

fn run_task(hosts: &[String], result: impl Fn(usize) -> HostResult) -> PlaybookRun<RecordingSink> {
    let mut config = RenderConfig::plain(RendererKind::Tally);
    config.width = Some(120);
    let mut run = PlaybookRun::new(config, RecordingSink::new()).unwrap();
    run.handle(Event::PlayStart {
        name: "bench".into(),
        hosts: hosts.to_vec(),
    })
    .unwrap();
    run.handle(Event::TaskStart {
        name: "configure".into(),
        hosts: None,
    })
    .unwrap();
    for (i, host) in hosts.iter().enumerate() {
        run.handle(Event::HostResult {
            host: host.clone(),
            result: result(i),
        })
        .unwrap();
    }
    run.finish().unwrap();
    run
}

// ============================================================================
// Task Aggregation
// ============================================================================

fn bench_task_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("task_aggregation");

    for num_hosts in [10, 100, 500, 1000].iter() {
        let hosts = hosts(*num_hosts);
        group.throughput(Throughput::Elements(*num_hosts as u64));

        group.bench_with_input(BenchmarkId::new("identical_results", num_hosts), &hosts, |b, hosts| {
            b.iter(|| {
                let run = run_task(hosts, |_| {
                    HostResult::ok("service is running")
                        .with_field("delta", "0:00:00.120")
                        .with_field("rc", 0)
                });
                black_box(run)
            })
        });

        group.bench_with_input(BenchmarkId::new("distinct_results", num_hosts), &hosts, |b, hosts| {
            b.iter(|| {
                let run = run_task(hosts, |i| HostResult::ok(format!("uptime {} days", i)));
                black_box(run)
            })
        });

        group.bench_with_input(BenchmarkId::new("changed_with_diffs", num_hosts), &hosts, |b, hosts| {
            b.iter(|| {
                let run = run_task(hosts, |i| {
                    let after = format!("ServerName web\nWorkers {}\n", i % 4);
                    HostResult::new(OutcomeKind::Changed)
                        .with_diff(FileDiff::new("ServerName web\nWorkers 1\n", after))
                });
                black_box(run)
            })
        });
    }

    group.finish();
}

// ============================================================================
// Event Decoding
// ============================================================================

fn bench_event_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_decoding");

    let small = r#"{"event": "host_result", "host": "node0001", "result": {"status": "ok", "msg": "pong"}}"#;
    let stdout = "line of output\n".repeat(200);
    let large = serde_json::json!({
        "event": "host_result",
        "host": "node0001",
        "result": {
            "status": "changed",
            "stdout": stdout,
            "stdout_lines": stdout.lines().collect::<Vec<_>>(),
            "diff": {"before": "a\n".repeat(100), "after": "b\n".repeat(100)},
        },
    })
    .to_string();

    group.bench_function("small_result", |b| b.iter(|| black_box(Event::from_json(black_box(small)))));
    group.bench_function("large_result", |b| b.iter(|| black_box(Event::from_json(black_box(&large)))));

    group.finish();
}

// ============================================================================
// Host List Folding
// ============================================================================

fn bench_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("hostlist_fold");

    for num_hosts in [10, 100, 1000].iter() {
        let contiguous = hosts(*num_hosts);
        let sparse: Vec<String> = (0..*num_hosts).map(|i| format!("node{:04}", i * 3)).collect();
        let mixed: Vec<String> = (0..*num_hosts)
            .map(|i| format!("{}{}", ["web", "db", "cache", "login-"][i % 4], i))
            .collect();

        group.throughput(Throughput::Elements(*num_hosts as u64));
        group.bench_with_input(BenchmarkId::new("contiguous", num_hosts), &contiguous, |b, hosts| {
            b.iter(|| black_box(fold(hosts)))
        });
        group.bench_with_input(BenchmarkId::new("sparse", num_hosts), &sparse, |b, hosts| {
            b.iter(|| black_box(fold(hosts)))
        });
        group.bench_with_input(BenchmarkId::new("mixed_prefixes", num_hosts), &mixed, |b, hosts| {
            b.iter(|| black_box(fold(hosts)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_task_aggregation, bench_event_decoding, bench_fold);
criterion_main!(benches);

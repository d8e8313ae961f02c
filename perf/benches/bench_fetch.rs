use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tsdb_format::{AggregationType, SeriesType, Slug};
use tsdb_series::{ArchiveConfig, CreateConfig, SeriesEngine};

fn populated_engine(dir: &std::path::Path) -> SeriesEngine {
    let slug = Slug::parse("perf_fetch".to_string()).unwrap();
    let mut engine = SeriesEngine::create(
        dir,
        &slug,
        CreateConfig {
            series_type: SeriesType::Period,
            start: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            interval: 60,
            timezone_name: "UTC".to_string(),
            archives: vec![ArchiveConfig {
                aggregation_type: AggregationType::Average,
                aggregation: 1,
                count: 100_000,
                threshold: 0.5,
            }],
        },
    )
    .unwrap();
    let start_epoch = engine.info().start_epoch;
    let batch: Vec<(i64, f32)> = (1..=50_000).map(|i| (start_epoch + i as i64 * 60, i as f32)).collect();
    engine.update(&batch).unwrap();
    engine
}

fn bench_fetch_full_window(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let engine = populated_engine(dir.path());
    let info = engine.info();

    c.bench_function("fetch 50k-slot window", |b| {
        b.iter(|| {
            let rows = engine
                .fetch(AggregationType::Average, 60, info.start_epoch, info.last_epoch)
                .unwrap();
            black_box(rows.len());
        });
    });
}

fn bench_fetch_recent_window(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let engine = populated_engine(dir.path());
    let info = engine.info();
    let recent_start = info.last_epoch - 3_600;

    c.bench_function("fetch last hour", |b| {
        b.iter(|| {
            let rows = engine
                .fetch(AggregationType::Average, 60, recent_start, info.last_epoch)
                .unwrap();
            black_box(rows.len());
        });
    });
}

criterion_group!(benches, bench_fetch_full_window, bench_fetch_recent_window);
criterion_main!(benches);

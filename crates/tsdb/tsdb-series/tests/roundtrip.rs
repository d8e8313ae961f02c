use chrono::{TimeZone, Utc};
use tempfile::tempdir;
use tsdb_format::{AggregationType, Error, SeriesType, Slug};
use tsdb_series::{ArchiveConfig, CreateConfig, SeriesEngine};

fn archive(aggregation_type: AggregationType, aggregation: u32, count: u32) -> ArchiveConfig {
    ArchiveConfig {
        aggregation_type,
        aggregation,
        count,
        threshold: 0.5,
    }
}

#[test]
fn create_update_close_reopen_fetch_round_trip() {
    let dir = tempdir().unwrap();
    let slug = Slug::parse("temperature").unwrap();
    let start = Utc.with_ymd_and_hms(2011, 1, 1, 0, 0, 0).unwrap();

    let config = CreateConfig {
        series_type: SeriesType::Period,
        start,
        interval: 1800,
        timezone_name: "Europe/London".into(),
        archives: vec![
            archive(AggregationType::Average, 1, 1000),
            archive(AggregationType::Min, 20, 2000),
            archive(AggregationType::Max, 50, 500),
        ],
    };

    {
        let mut engine = SeriesEngine::create(dir.path(), &slug, config).unwrap();
        let start_epoch = engine.info().start_epoch;
        let batch: Vec<(i64, f32)> = (0..1500)
            .map(|i| (start_epoch + (i as i64 + 1) * 1800, i as f32))
            .collect();
        engine.update(&batch).unwrap();
        engine.close().unwrap();
    }

    let engine = SeriesEngine::open(dir.path(), &slug).unwrap();
    let info = engine.info();
    assert_eq!(info.archives[0].count, 1000);
    assert_eq!(info.archives[1].count, 2000);
    assert_eq!(info.archives[2].count, 500);

    let fetched = engine
        .fetch(AggregationType::Average, 1800, info.start_epoch, info.last_epoch + 10_000)
        .unwrap();
    assert_eq!(fetched.len(), 1000);
    // oldest retained slot value should be 500 (values 0..1499, ring holds last 1000).
    let values: Vec<f32> = fetched.iter().map(|(_, v)| *v).collect();
    assert_eq!(values.first().copied(), Some(500.0));
    assert_eq!(values.last().copied(), Some(1499.0));
}

#[test]
fn empty_update_is_a_no_op() {
    let dir = tempdir().unwrap();
    let slug = Slug::parse("empty_batch").unwrap();
    let start = Utc.with_ymd_and_hms(2011, 1, 1, 0, 0, 0).unwrap();
    let mut engine = SeriesEngine::create(
        dir.path(),
        &slug,
        CreateConfig {
            series_type: SeriesType::Gauge,
            start,
            interval: 60,
            timezone_name: "UTC".into(),
            archives: vec![archive(AggregationType::Average, 1, 100)],
        },
    )
    .unwrap();

    let before = engine.info().last_epoch;
    engine.update(&[]).unwrap();
    assert_eq!(engine.info().last_epoch, before);
}

#[test]
fn aggregation_values_stay_within_input_range() {
    let dir = tempdir().unwrap();
    let slug = Slug::parse("bounded_gauge").unwrap();
    let start = Utc.with_ymd_and_hms(2011, 1, 1, 0, 0, 0).unwrap();
    let mut engine = SeriesEngine::create(
        dir.path(),
        &slug,
        CreateConfig {
            series_type: SeriesType::Gauge,
            start,
            interval: 60,
            timezone_name: "UTC".into(),
            archives: vec![archive(AggregationType::Average, 1, 500)],
        },
    )
    .unwrap();

    let start_epoch = engine.info().start_epoch;
    let mut ts = start_epoch;
    let mut rng_state: u32 = 12345;
    let mut batch = Vec::new();
    for _ in 0..100 {
        rng_state = rng_state.wrapping_mul(1664525).wrapping_add(1013904223);
        let gap = 1 + (rng_state % 5000) as i64;
        ts += gap;
        rng_state = rng_state.wrapping_mul(1664525).wrapping_add(1013904223);
        let value = (rng_state % 101) as f32;
        batch.push((ts, value));
    }
    engine.update(&batch).unwrap();

    let fetched = engine.fetch(AggregationType::Average, 60, start_epoch, ts + 1000).unwrap();
    for (_, value) in fetched {
        if !value.is_nan() {
            assert!((0.0..=100.0).contains(&value), "value {value} out of range");
        }
    }
}

#[test]
fn fetch_does_not_include_a_slot_past_period_end() {
    let dir = tempdir().unwrap();
    let slug = Slug::parse("unclamped_fetch").unwrap();
    let start = Utc.with_ymd_and_hms(2011, 1, 1, 0, 0, 0).unwrap();

    let mut engine = SeriesEngine::create(
        dir.path(),
        &slug,
        CreateConfig {
            series_type: SeriesType::Period,
            start,
            interval: 1800,
            timezone_name: "UTC".into(),
            archives: vec![archive(AggregationType::Average, 1, 1000)],
        },
    )
    .unwrap();

    let start_epoch = engine.info().start_epoch;
    let batch: Vec<(i64, f32)> = (0..1500)
        .map(|i| (start_epoch + (i as i64 + 1) * 1800, i as f32))
        .collect();
    engine.update(&batch).unwrap();

    // period_end lands exactly on the boundary timestamp of the 800th
    // retained slot (an aligned resolution multiple well inside the
    // retained window, not clamped by `total`); the fetch must stop there,
    // not include one slot past it.
    let period_end = start_epoch + 800 * 1800;
    let fetched = engine.fetch(AggregationType::Average, 1800, start_epoch, period_end).unwrap();
    let values: Vec<f32> = fetched.iter().map(|(_, v)| *v).collect();
    assert_eq!(values.last().copied(), Some(799.0));
}

#[test]
fn create_twice_fails() {
    let dir = tempdir().unwrap();
    let slug = Slug::parse("dup").unwrap();
    let start = Utc.with_ymd_and_hms(2011, 1, 1, 0, 0, 0).unwrap();
    let cfg = || CreateConfig {
        series_type: SeriesType::Period,
        start,
        interval: 60,
        timezone_name: "UTC".into(),
        archives: vec![archive(AggregationType::Average, 1, 10)],
    };
    SeriesEngine::create(dir.path(), &slug, cfg()).unwrap();
    let result = SeriesEngine::create(dir.path(), &slug, cfg());
    assert!(matches!(result, Err(Error::SeriesAlreadyExists(_))));
}

#[test]
fn fetch_with_no_matching_archive_errors() {
    let dir = tempdir().unwrap();
    let slug = Slug::parse("no_archive").unwrap();
    let start = Utc.with_ymd_and_hms(2011, 1, 1, 0, 0, 0).unwrap();
    let engine = SeriesEngine::create(
        dir.path(),
        &slug,
        CreateConfig {
            series_type: SeriesType::Period,
            start,
            interval: 60,
            timezone_name: "UTC".into(),
            archives: vec![archive(AggregationType::Average, 1, 10)],
        },
    )
    .unwrap();

    let result = engine.fetch(AggregationType::Max, 999, 0, 1000);
    assert!(matches!(result, Err(Error::NoSuitableArchive { .. })));
}

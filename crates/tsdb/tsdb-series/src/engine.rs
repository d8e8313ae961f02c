use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;
use tsdb_aggregate::{combine_gauge, combine_period, ArchiveState, CounterTracker};
use tsdb_format::{
    timestamp::{align_down, align_up, from_epoch, lookup_timezone, to_epoch},
    AggregationType, ArchiveMeta, Error, Header, SeriesType, Slug,
};

use crate::archive::{advance, oldest_retained, physical_index, total_appended, ArchiveConfig};
use crate::series_file::SeriesFile;

/// Inputs to `create`: the immutable shape of a new series.
pub struct CreateConfig {
    pub series_type: SeriesType,
    pub start: DateTime<Utc>,
    pub interval: u32,
    pub timezone_name: String,
    pub archives: Vec<ArchiveConfig>,
}

#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    pub aggregation_type: AggregationType,
    pub resolution: u32,
    pub count: u32,
    pub aggregation: u32,
}

#[derive(Debug, Clone)]
pub struct SeriesInfo {
    pub series_type: SeriesType,
    pub interval: u32,
    pub start_epoch: i64,
    pub last_epoch: i64,
    pub timezone_name: String,
    pub archives: Vec<ArchiveInfo>,
}

fn series_path(base_path: &Path, slug: &Slug) -> PathBuf {
    base_path.join("tsdb").join(format!("{slug}.tsdb"))
}

/// The public series engine: `create`/`open`/`update`/`fetch`/`info`/`close`.
///
/// One `SeriesEngine` owns one open, memory-mapped `.tsdb` file. Callers
/// (the broker) are responsible for serializing access to a given series —
/// this type has no internal locking of its own.
pub struct SeriesEngine {
    file: SeriesFile,
    zone: Tz,
    counter_tracker: Option<CounterTracker>,
}

impl SeriesEngine {
    pub fn create(base_path: &Path, slug: &Slug, config: CreateConfig) -> Result<Self, Error> {
        let path = series_path(base_path, slug);
        if path.exists() {
            return Err(Error::SeriesAlreadyExists(slug.as_str().to_owned()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if config.archives.is_empty() {
            return Err(Error::InvalidConfig("a series needs at least one archive".into()));
        }
        if config.interval == 0 {
            return Err(Error::InvalidConfig("interval must be positive".into()));
        }
        for archive in &config.archives {
            if archive.count == 0 || archive.aggregation == 0 {
                return Err(Error::InvalidConfig(
                    "archive count and aggregation must be positive".into(),
                ));
            }
        }
        let zone = lookup_timezone(&config.timezone_name)?;

        let start_epoch = align_down(to_epoch(&config.start), config.interval as i64);

        let header = Header {
            series_type: config.series_type,
            start_epoch,
            interval: config.interval,
            archive_count: config.archives.len() as u32,
            timezone_name: config.timezone_name,
            last_epoch: start_epoch,
        };

        let metas = config
            .archives
            .iter()
            .map(|a| ArchiveMeta {
                aggregation_type: a.aggregation_type,
                aggregation: a.aggregation,
                count: a.count,
                cycles: 0,
                position: 0,
                threshold: a.threshold,
                state_accumulator: f32::NAN,
                state_sample_count: f32::NAN,
            })
            .collect();

        let file = SeriesFile::create(&path, header, metas)?;
        Ok(Self {
            file,
            zone,
            counter_tracker: None,
        })
    }

    pub fn open(base_path: &Path, slug: &Slug) -> Result<Self, Error> {
        let path = series_path(base_path, slug);
        if !path.exists() {
            return Err(Error::SeriesNotFound(slug.as_str().to_owned()));
        }
        let file = SeriesFile::open(&path)?;
        let zone = lookup_timezone(&file.header().timezone_name)?;
        let counter_tracker = match file.header().series_type {
            SeriesType::Counter => Some(CounterTracker::new()),
            _ => None,
        };
        Ok(Self {
            file,
            zone,
            counter_tracker,
        })
    }

    pub fn exists(base_path: &Path, slug: &Slug) -> bool {
        series_path(base_path, slug).exists()
    }

    pub fn delete(base_path: &Path, slug: &Slug) -> Result<(), Error> {
        let path = series_path(base_path, slug);
        if !path.exists() {
            return Err(Error::SeriesNotFound(slug.as_str().to_owned()));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Folds an ordered batch of `(epoch_seconds, value)` samples into every
    /// archive, then flushes metadata and `last_epoch` once the full batch
    /// has been applied.
    pub fn update(&mut self, batch: &[(i64, f32)]) -> Result<(), Error> {
        let series_type = self.file.header().series_type;
        let interval = self.file.header().interval;
        let mut last_epoch = self.file.header().last_epoch;

        for &(timestamp, value) in batch {
            if timestamp <= last_epoch {
                warn!(timestamp, last_epoch, "dropping non-monotonic sample");
                continue;
            }

            match series_type {
                SeriesType::Period => {
                    self.apply_to_every_archive(interval, last_epoch, timestamp, value)?;
                }
                SeriesType::Gauge => {
                    self.apply_gauge_to_every_archive(interval, last_epoch, timestamp, value)?;
                }
                SeriesType::Counter => {
                    let tracker = self.counter_tracker.get_or_insert_with(CounterTracker::new);
                    if let Some((prev_ts, new_ts, rate)) = tracker.observe(timestamp, value) {
                        self.apply_to_every_archive(interval, prev_ts, new_ts, rate)?;
                    }
                }
            }

            last_epoch = timestamp;
        }

        self.file.write_last_epoch(last_epoch)?;
        self.file.flush()?;
        Ok(())
    }

    fn apply_to_every_archive(
        &mut self,
        interval: u32,
        prev_ts: i64,
        new_ts: i64,
        value: f32,
    ) -> Result<(), Error> {
        for index in 0..self.file.metas().len() {
            let meta = self.file.metas()[index].clone();
            let state = ArchiveState {
                accumulator: meta.state_accumulator,
                sample_count: meta.state_sample_count,
            };
            let (new_state, emitted) = combine_period(
                meta.aggregation_type,
                interval,
                meta.aggregation,
                meta.threshold,
                prev_ts,
                state,
                new_ts,
                value,
            )?;
            self.append_slots(index, emitted)?;
            let m = self.file.meta_mut(index);
            m.state_accumulator = new_state.accumulator;
            m.state_sample_count = new_state.sample_count;
            self.file.sync_meta(index)?;
        }
        Ok(())
    }

    fn apply_gauge_to_every_archive(
        &mut self,
        interval: u32,
        prev_ts: i64,
        new_ts: i64,
        value: f32,
    ) -> Result<(), Error> {
        for index in 0..self.file.metas().len() {
            let meta = self.file.metas()[index].clone();
            let state = ArchiveState {
                accumulator: meta.state_accumulator,
                sample_count: meta.state_sample_count,
            };
            let (new_state, emitted) = combine_gauge(interval, meta.aggregation, prev_ts, state, new_ts, value);
            self.append_slots(index, emitted)?;
            let m = self.file.meta_mut(index);
            m.state_accumulator = new_state.accumulator;
            m.state_sample_count = new_state.sample_count;
            self.file.sync_meta(index)?;
        }
        Ok(())
    }

    fn append_slots(&mut self, archive_index: usize, values: Vec<f32>) -> Result<(), Error> {
        if values.is_empty() {
            return Ok(());
        }
        let count = self.file.metas()[archive_index].count;
        for value in values {
            let position = self.file.metas()[archive_index].position;
            self.file.write_slot(archive_index, position, value)?;
            let meta = self.file.meta_mut(archive_index);
            advance(&mut meta.cycles, &mut meta.position, count);
        }
        Ok(())
    }

    /// Returns every finalized, retained slot of the archive matching
    /// `(aggregation_type, resolution)` whose instant falls in
    /// `[period_start, period_end]`.
    pub fn fetch(
        &self,
        aggregation_type: AggregationType,
        resolution: u32,
        period_start: i64,
        period_end: i64,
    ) -> Result<Vec<(DateTime<Tz>, f32)>, Error> {
        let interval = self.file.header().interval;
        let (archive_index, meta) = self
            .file
            .metas()
            .iter()
            .enumerate()
            .find(|(_, m)| m.aggregation_type == aggregation_type && m.aggregation * interval == resolution)
            .ok_or(Error::NoSuitableArchive {
                aggregation_type: aggregation_type.as_str().to_owned(),
                resolution,
            })?;

        let start_epoch = self.file.header().start_epoch;
        let period_start = period_start.max(start_epoch);
        let period_start = align_up(period_start, resolution as i64);
        let period_end = align_down(period_end, resolution as i64);

        let total = total_appended(meta.cycles, meta.position, meta.count);
        if period_end < period_start || total == 0 {
            return Ok(Vec::new());
        }

        let offset_start = ((period_start - start_epoch) / resolution as i64) as u64;
        let raw_end = (period_end - start_epoch) / resolution as i64;
        if raw_end <= 0 {
            return Ok(Vec::new());
        }
        let offset_end = (raw_end.min(total as i64) - 1) as u64;

        let seek_from = offset_start.max(oldest_retained(meta.cycles, meta.position, meta.count));
        if seek_from > offset_end {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity((offset_end - seek_from + 1) as usize);
        for logical in seek_from..=offset_end {
            let physical = physical_index(logical, meta.count);
            let value = self.file.read_slot(archive_index, physical)?;
            let epoch = start_epoch + (logical as i64 + 1) * resolution as i64;
            out.push((from_epoch(epoch, self.zone), value));
        }
        Ok(out)
    }

    pub fn info(&self) -> SeriesInfo {
        let header = self.file.header();
        SeriesInfo {
            series_type: header.series_type,
            interval: header.interval,
            start_epoch: header.start_epoch,
            last_epoch: header.last_epoch,
            timezone_name: header.timezone_name.clone(),
            archives: self
                .file
                .metas()
                .iter()
                .map(|m| ArchiveInfo {
                    aggregation_type: m.aggregation_type,
                    resolution: m.aggregation * header.interval,
                    count: m.count,
                    aggregation: m.aggregation,
                })
                .collect(),
        }
    }

    pub fn close(self) -> Result<(), Error> {
        self.file.flush()
    }
}

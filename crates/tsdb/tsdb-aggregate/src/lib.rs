//! The stateful folder that turns irregular `(timestamp, value)` samples
//! into finalized, threshold-gated archive slots.
//!
//! The on-disk state for an archive is exactly two floats (accumulator,
//! sample_count — see `tsdb_format::layout::ArchiveMeta`), so every series
//! type is expressed as a transform down to the same `combine_period`
//! primitive rather than carrying its own persisted shape. `counter` series
//! keep their raw-value baseline in memory, in `CounterTracker`, rather than
//! on disk: the per-archive state stays uniform, and a counter series that
//! is reopened simply treats its first post-reopen sample as a fresh
//! baseline (no emission), same as a brand new series.

use tsdb_format::{AggregationType, Error};

/// Persisted per-archive aggregation state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchiveState {
    pub accumulator: f32,
    pub sample_count: f32,
}

impl ArchiveState {
    pub const FRESH: ArchiveState = ArchiveState {
        accumulator: f32::NAN,
        sample_count: f32::NAN,
    };

    fn is_fresh(&self) -> bool {
        self.accumulator.is_nan()
    }
}

fn default_accumulator(aggregation_type: AggregationType) -> f32 {
    match aggregation_type {
        AggregationType::Average => 0.0,
        AggregationType::Min => f32::INFINITY,
        AggregationType::Max => f32::NEG_INFINITY,
    }
}

fn accumulate(aggregation_type: AggregationType, acc: f32, value: f32, time_share: f32) -> f32 {
    match aggregation_type {
        AggregationType::Average => acc + value * time_share,
        AggregationType::Min => acc.min(value),
        AggregationType::Max => acc.max(value),
    }
}

/// Boundaries of `R = interval * aggregation` strictly inside `(prev_ts, new_ts]`.
fn boundaries(prev_ts: i64, new_ts: i64, resolution: i64) -> Vec<i64> {
    let mut out = Vec::new();
    let mut next = ((prev_ts as f64) / (resolution as f64)).ceil() as i64 * resolution;
    while next <= new_ts {
        if next > prev_ts {
            out.push(next);
        }
        next += resolution;
    }
    out
}

/// Shared core for `period` series and for `counter` series once their raw
/// totals have been differenced into a rate (see [`CounterTracker`]).
///
/// `value` is treated as a rate held constant over `(prev_ts, new_ts]`.
pub fn combine_period(
    aggregation_type: AggregationType,
    interval: u32,
    aggregation: u32,
    threshold: f32,
    prev_ts: i64,
    state: ArchiveState,
    new_ts: i64,
    value: f32,
) -> Result<(ArchiveState, Vec<f32>), Error> {
    if aggregation_type == AggregationType::Average && value < 0.0 {
        return Err(Error::NegativeValueForAverage(value as f64));
    }

    let resolution = interval as i64 * aggregation as i64;
    let crossed = boundaries(prev_ts, new_ts, resolution);

    let mut accumulator = if state.is_fresh() {
        default_accumulator(aggregation_type)
    } else {
        state.accumulator
    };
    let mut sample_count = if state.is_fresh() { 0.0 } else { state.sample_count };
    sample_count += 1.0;

    let mut emitted = Vec::with_capacity(crossed.len());
    let mut last_boundary = prev_ts;
    for boundary in crossed {
        let time_share = (boundary - last_boundary) as f32 / resolution as f32;
        accumulator = accumulate(aggregation_type, accumulator, value, time_share);

        let coverage = sample_count / aggregation as f32;
        emitted.push(if coverage >= threshold { accumulator } else { f32::NAN });

        accumulator = default_accumulator(aggregation_type);
        sample_count = 0.0;
        last_boundary = boundary;
    }

    let remainder_share = (new_ts - last_boundary) as f32 / resolution as f32;
    if remainder_share > 0.0 {
        accumulator = accumulate(aggregation_type, accumulator, value, remainder_share);
    }

    Ok((
        ArchiveState {
            accumulator,
            sample_count,
        },
        emitted,
    ))
}

/// `gauge` series: each sample is a point reading. Every crossed boundary
/// emits the linear interpolation between the previous and new reading at
/// that boundary's timestamp. Not threshold-gated — a gauge archive always
/// has an opinion about every boundary it crosses.
pub fn combine_gauge(
    interval: u32,
    aggregation: u32,
    prev_ts: i64,
    state: ArchiveState,
    new_ts: i64,
    value: f32,
) -> (ArchiveState, Vec<f32>) {
    let resolution = interval as i64 * aggregation as i64;
    let crossed = boundaries(prev_ts, new_ts, resolution);

    let base = if state.is_fresh() { value } else { state.accumulator };
    let span = (new_ts - prev_ts) as f32;

    let mut emitted = Vec::with_capacity(crossed.len());
    for boundary in crossed {
        let frac = if span > 0.0 {
            (new_ts - boundary) as f32 / span
        } else {
            0.0
        };
        emitted.push(base + (value - base) * frac);
    }

    (
        ArchiveState {
            accumulator: value,
            sample_count: 0.0,
        },
        emitted,
    )
}

/// In-memory baseline for `counter` series: differences consecutive raw
/// totals into a rate and feeds it through [`combine_period`]. Kept outside
/// the persisted archive state since it is series-wide, not per-archive.
#[derive(Debug, Default, Clone, Copy)]
pub struct CounterTracker {
    baseline: Option<(i64, f32)>,
}

impl CounterTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw counter reading. Returns `Some((prev_ts, new_ts, rate))`
    /// once a baseline exists to difference against; `None` on the first
    /// sample (or the first sample after reopening), which only records the
    /// baseline and emits nothing, per spec.
    pub fn observe(&mut self, timestamp: i64, value: f32) -> Option<(i64, i64, f32)> {
        let result = self.baseline.map(|(prev_ts, prev_value)| {
            let duration = (timestamp - prev_ts) as f32;
            let rate = if duration > 0.0 { (value - prev_value) / duration } else { 0.0 };
            (prev_ts, timestamp, rate)
        });
        self.baseline = Some((timestamp, value));
        result
    }
}

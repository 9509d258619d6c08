//! Per-second timeline alignment.
//!
//! Sensor streams arrive with different start times, gaps, and several
//! samples per second. The resampler joins them on integer seconds so that
//! every output frame consumes exactly one row.
//!
//! Gap-fill policy, per column:
//! - samples in the same second are averaged;
//! - seconds strictly inside the stream's first..last observed range with no
//!   sample take the nearest earlier value;
//! - seconds outside that range stay missing and are never fabricated.

use std::collections::BTreeMap;

use heatreel_common::error::{HeatreelError, HeatreelResult};
use heatreel_scene_model::sensor::{SensorSample, SensorStream};

/// Longest timeline accepted: one year of seconds.
pub const MAX_TIMELINE_ROWS: usize = 366 * 24 * 60 * 60;

/// Resampled table: one row per integer second across the union of all
/// streams' observed ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTimeline {
    start_second: i64,
    rows: usize,
    columns: Vec<Vec<Option<f64>>>,
}

/// One row of an [`AlignedTimeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub second: i64,
    pub values: Vec<Option<f64>>,
}

impl AlignedTimeline {
    /// Number of rows (seconds).
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// First second covered, if any.
    pub fn start_second(&self) -> Option<i64> {
        (!self.is_empty()).then_some(self.start_second)
    }

    pub fn second(&self, row: usize) -> i64 {
        self.start_second + row as i64
    }

    pub fn column(&self, col: usize) -> &[Option<f64>] {
        &self.columns[col]
    }

    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.columns.get(col)?.get(row).copied().flatten()
    }

    pub fn row(&self, row: usize) -> Option<AlignedRow> {
        if row >= self.rows {
            return None;
        }
        Some(AlignedRow {
            second: self.second(row),
            values: self.columns.iter().map(|c| c[row]).collect(),
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = AlignedRow> + '_ {
        (0..self.rows).filter_map(|r| self.row(r))
    }

    /// Non-missing cells of each column as streams, so a resampled table can
    /// be fed back through the resampler.
    pub fn to_streams(&self, names: &[String]) -> Vec<SensorStream> {
        self.columns
            .iter()
            .enumerate()
            .map(|(col, values)| {
                let samples = values
                    .iter()
                    .enumerate()
                    .filter_map(|(row, v)| v.map(|v| SensorSample::new(self.second(row), v)))
                    .collect();
                let name = names.get(col).cloned().unwrap_or_default();
                SensorStream::new(name, samples)
            })
            .collect()
    }
}

/// Aligns N sensor streams to one row per integer second.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineResampler;

impl TimelineResampler {
    pub fn new() -> Self {
        Self
    }

    /// Build the aligned table. Column `i` belongs to `streams[i]`.
    ///
    /// Fails with a config error on `streams` when the combined range is
    /// longer than [`MAX_TIMELINE_ROWS`].
    pub fn resample(&self, streams: &[SensorStream]) -> HeatreelResult<AlignedTimeline> {
        let buckets: Vec<BTreeMap<i64, f64>> = streams.iter().map(bucket_by_second).collect();

        let bounds = buckets
            .iter()
            .filter_map(|b| Some((*b.keys().next()?, *b.keys().next_back()?)))
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)));

        let Some((start, end)) = bounds else {
            return Ok(AlignedTimeline {
                start_second: 0,
                rows: 0,
                columns: vec![Vec::new(); streams.len()],
            });
        };

        let rows = end
            .checked_sub(start)
            .and_then(|span| span.checked_add(1))
            .and_then(|rows| usize::try_from(rows).ok())
            .filter(|&rows| rows <= MAX_TIMELINE_ROWS)
            .ok_or_else(|| {
                HeatreelError::config(
                    "streams",
                    format!(
                        "samples span seconds {start}..={end}, longer than {MAX_TIMELINE_ROWS} rows"
                    ),
                )
            })?;
        let columns = buckets
            .iter()
            .map(|bucket| fill_column(bucket, start, rows))
            .collect();

        tracing::debug!(
            streams = streams.len(),
            rows,
            start_second = start,
            "Resampled sensor timeline"
        );

        Ok(AlignedTimeline {
            start_second: start,
            rows,
            columns,
        })
    }
}

/// Average every second's samples.
fn bucket_by_second(stream: &SensorStream) -> BTreeMap<i64, f64> {
    let mut sums: BTreeMap<i64, (f64, u32)> = BTreeMap::new();
    for sample in &stream.samples {
        if !sample.value.is_finite() {
            continue;
        }
        let entry = sums.entry(sample.second).or_insert((0.0, 0));
        entry.0 += sample.value;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(second, (sum, count))| (second, sum / count as f64))
        .collect()
}

/// Lay one stream's buckets onto the shared row range and forward-fill
/// inside its own observed range.
fn fill_column(bucket: &BTreeMap<i64, f64>, start: i64, rows: usize) -> Vec<Option<f64>> {
    let mut column = vec![None; rows];
    let (Some(&first), Some(&last)) = (bucket.keys().next(), bucket.keys().next_back()) else {
        return column;
    };

    for (&second, &value) in bucket {
        column[(second - start) as usize] = Some(value);
    }

    let mut carry = None;
    let first_row = (first - start) as usize;
    let last_row = (last - start) as usize;
    for cell in &mut column[first_row..=last_row] {
        match cell {
            Some(v) => carry = Some(*v),
            None => *cell = carry,
        }
    }
    column
}

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::date_util::{month_start, week_start};
use crate::error::Error;
use crate::metrics::types::{MetricMode, SeriesRow};

/// Re-bucketing interval for a date-keyed series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Day,
    Week,
    Month,
}

impl Interval {
    /// Bucket key for a date: the date itself, its ISO week's Monday, or
    /// the first of its month.
    pub fn bucket_of(self, d: NaiveDate) -> NaiveDate {
        match self {
            Interval::Day => d,
            Interval::Week => week_start(d),
            Interval::Month => month_start(d),
        }
    }
}

impl std::str::FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(Interval::Day),
            "week" => Ok(Interval::Week),
            "month" => Ok(Interval::Month),
            other => Err(Error::IntervalParse(format!(
                "{other} (expected day, week or month)"
            ))),
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interval::Day => write!(f, "day"),
            Interval::Week => write!(f, "week"),
            Interval::Month => write!(f, "month"),
        }
    }
}

#[derive(Default)]
struct Bucket {
    total_mass: f64,
    planned_mass: f64,
    total_hours: f64,
    total_drawings: i64,
    complexity_sum: f64,
    rows: usize,
}

/// Re-group a daily series into the requested interval. `Day` is the
/// identity. Additive metrics sum within a bucket; modeling complexity
/// averages over the contributing rows (in drawing mode complexity is
/// already a per-day sum and keeps summing). Output is in ascending
/// bucket order regardless of input order.
pub fn bucket_series(rows: Vec<SeriesRow>, interval: Interval, mode: MetricMode) -> Vec<SeriesRow> {
    if interval == Interval::Day || rows.is_empty() {
        return rows;
    }

    let mut buckets: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
    for row in rows {
        let bucket = buckets.entry(interval.bucket_of(row.date)).or_default();
        bucket.total_mass += row.total_mass;
        bucket.planned_mass += row.planned_mass;
        bucket.total_hours += row.total_hours;
        bucket.total_drawings += row.total_drawings;
        bucket.complexity_sum += row.complexity;
        bucket.rows += 1;
    }

    buckets
        .into_iter()
        .map(|(date, b)| SeriesRow {
            date,
            total_mass: b.total_mass,
            planned_mass: b.planned_mass,
            complexity: match mode {
                MetricMode::Mass => b.complexity_sum / b.rows as f64,
                MetricMode::Drawings => b.complexity_sum,
            },
            total_drawings: b.total_drawings,
            total_hours: b.total_hours,
        })
        .collect()
}

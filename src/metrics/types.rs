use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Error;

/// Which family of metrics a series carries: modeled mass or drawing
/// output. The bucketing transform aggregates differently per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricMode {
    Mass,
    Drawings,
}

impl std::str::FromStr for MetricMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mass" => Ok(MetricMode::Mass),
            "drawings" | "drawing" => Ok(MetricMode::Drawings),
            other => Err(Error::InvalidArgument(format!(
                "unknown metric mode: {other} (expected mass or drawings)"
            ))),
        }
    }
}

impl std::fmt::Display for MetricMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricMode::Mass => write!(f, "mass"),
            MetricMode::Drawings => write!(f, "drawings"),
        }
    }
}

/// One date-keyed row of the chart series. In mass mode the populated
/// columns are `total_mass`, `planned_mass`, `complexity` and
/// `total_hours`; in drawing mode `total_drawings`, `complexity` and
/// `total_mass`. Unpopulated columns are zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    pub date: NaiveDate,
    /// Modeled (or drawn) mass, metric tons.
    pub total_mass: f64,
    /// Target mass derived from tracked hours, metric tons.
    pub planned_mass: f64,
    pub complexity: f64,
    pub total_drawings: i64,
    /// Hours tracked in the modeling tool.
    pub total_hours: f64,
}

/// One executor's rollup across all four fact tables for a title.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutorRow {
    pub name: String,
    /// Modeled mass, metric tons.
    pub total_mass_modeling: f64,
    /// Hours tracked in the task tracker.
    pub total_hours: f64,
    /// Target mass derived from tracked hours, metric tons.
    pub planned_mass: f64,
    pub completed_drawings: i64,
    pub total_complexity_drawing: f64,
    /// Drawn mass, metric tons.
    pub total_mass_drawing: f64,
    /// Hours tracked in the modeling tool.
    pub tekla_hours: f64,
    /// Share of all tracked hours spent in the modeling tool, 0 when no
    /// hours are tracked. One decimal place.
    pub tekla_percentage: f64,
}

/// One chapter's share of a title's tracked task time.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterRow {
    pub chapter_name: String,
    pub total_time: f64,
    /// Share of the title total; all rows sum to 100 unless the total
    /// is zero, in which case every row is 0.
    pub percentage: f64,
}

/// Completed mass against the planned target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Progress {
    pub completed_tons: f64,
    pub percent: f64,
}

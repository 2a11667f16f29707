// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Intelligence Module
//!
//! Run-performance analytics over a decoded [`TimeSeries`](crate::models::TimeSeries).
//!
//! Every metric is a [`MetricValue`]: either a computed number or an explicit
//! `NotAvailable`. Missing sensors, empty inputs and divisions by zero all
//! end up as `NotAvailable`; nothing here ever reports a placeholder zero.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod metrics;

pub use metrics::{compute_performance_metrics, MetricsCalculator, PaceUnit};

/// Outcome of a single metric computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum MetricValue<T> {
    /// The metric could be computed
    Available(T),
    /// Not enough (or unusable) data for this metric
    NotAvailable,
}

impl<T> MetricValue<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, MetricValue::Available(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            MetricValue::Available(value) => Some(value),
            MetricValue::NotAvailable => None,
        }
    }
}

impl<T> From<Option<T>> for MetricValue<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => MetricValue::Available(value),
            None => MetricValue::NotAvailable,
        }
    }
}

/// Renders the value (honouring the formatter's precision) or `n/a`
impl<T: fmt::Display> fmt::Display for MetricValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Available(value) => fmt::Display::fmt(value, f),
            MetricValue::NotAvailable => f.write_str("n/a"),
        }
    }
}

/// Heart-rate change between the first and second half of an activity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrDrift {
    /// Second-half average minus first-half average (bpm)
    pub absolute_bpm: f64,
    /// `absolute_bpm` as a percentage of the first-half average
    pub percent: MetricValue<f64>,
}

impl fmt::Display for HrDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = f.precision().unwrap_or(2);
        write!(f, "{:+.*} bpm", precision, self.absolute_bpm)?;
        match self.percent {
            MetricValue::Available(percent) => write!(f, " ({:+.*}%)", precision, percent),
            MetricValue::NotAvailable => f.write_str(" (n/a)"),
        }
    }
}

/// Metrics record produced for one activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Activity the samples belong to
    pub activity_id: i64,
    /// Number of samples analysed
    pub sample_count: usize,
    /// Mean heart rate (bpm)
    pub average_hr: MetricValue<f64>,
    /// Peak heart rate (bpm)
    pub max_hr: MetricValue<u16>,
    /// First-half vs second-half heart rate
    pub hr_drift: MetricValue<HrDrift>,
    /// Average pace (seconds per pace unit) divided by average heart rate
    pub pace_vs_hr_ratio: MetricValue<f64>,
    /// Cadence steadiness, 0-100 (100 = perfectly steady)
    pub cadence_consistency: MetricValue<f64>,
    /// Efficiency lost from first to second half, in percent
    pub aerobic_decoupling: MetricValue<f64>,
}

impl PerformanceMetrics {
    /// How many of the six metrics could be computed
    pub fn available_count(&self) -> usize {
        [
            self.average_hr.is_available(),
            self.max_hr.is_available(),
            self.hr_drift.is_available(),
            self.pace_vs_hr_ratio.is_available(),
            self.cadence_consistency.is_available(),
            self.aerobic_decoupling.is_available(),
        ]
        .into_iter()
        .filter(|available| *available)
        .count()
    }
}

/// Errors that can occur during analysis
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid time-series data: {0}")]
    InvalidData(String),
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

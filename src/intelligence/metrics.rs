// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Run-performance metrics calculation over a decoded time-series

use super::{AnalysisError, HrDrift, MetricValue, PerformanceMetrics};
use crate::constants::analysis::{
    METERS_PER_KILOMETER, METERS_PER_MILE, MIN_CADENCE_SAMPLES, MIN_HALVED_SAMPLES,
};
use crate::models::TimeSeries;
use serde::{Deserialize, Serialize};

/// Distance unit that pace is expressed against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaceUnit {
    /// Seconds per kilometre
    #[default]
    Kilometer,
    /// Seconds per mile
    Mile,
}

impl PaceUnit {
    pub fn meters(self) -> f64 {
        match self {
            PaceUnit::Kilometer => METERS_PER_KILOMETER,
            PaceUnit::Mile => METERS_PER_MILE,
        }
    }
}

/// Metrics calculator for decoded activities
#[derive(Debug, Clone, Default)]
pub struct MetricsCalculator {
    /// Unit used for the pace side of the pace/HR ratio
    pub pace_unit: PaceUnit,
}

impl MetricsCalculator {
    /// Create a new metrics calculator (pace in seconds per kilometre)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pace_unit(mut self, pace_unit: PaceUnit) -> Self {
        self.pace_unit = pace_unit;
        self
    }

    /// Validate the series and compute every metric
    pub fn calculate_metrics(
        &self,
        activity_id: i64,
        series: &TimeSeries,
    ) -> Result<PerformanceMetrics, AnalysisError> {
        validate(series)?;

        Ok(PerformanceMetrics {
            activity_id,
            sample_count: series.len(),
            average_hr: average_hr(series),
            max_hr: max_hr(series),
            hr_drift: hr_drift(series),
            pace_vs_hr_ratio: pace_vs_hr_ratio(series, self.pace_unit),
            cadence_consistency: cadence_consistency(series),
            aerobic_decoupling: aerobic_decoupling(series),
        })
    }
}

/// Compute the metrics record with the default calculator
pub fn compute_performance_metrics(
    activity_id: i64,
    series: &TimeSeries,
) -> Result<PerformanceMetrics, AnalysisError> {
    MetricsCalculator::new().calculate_metrics(activity_id, series)
}

/// Check the ordering and range invariants a decoded series must satisfy
pub fn validate(series: &TimeSeries) -> Result<(), AnalysisError> {
    let mut last_distance: Option<f64> = None;

    for (index, sample) in series.samples().iter().enumerate() {
        if index > 0 && sample.timestamp < series.samples()[index - 1].timestamp {
            return Err(AnalysisError::InvalidData(format!(
                "sample {} at {} precedes the previous sample",
                index, sample.timestamp
            )));
        }

        if let Some(speed) = sample.speed {
            if !speed.is_finite() || speed < 0.0 {
                return Err(AnalysisError::InvalidData(format!(
                    "sample {} has invalid speed {}",
                    index, speed
                )));
            }
        }

        if let Some(altitude) = sample.altitude {
            if !altitude.is_finite() {
                return Err(AnalysisError::InvalidData(format!(
                    "sample {} has non-finite altitude",
                    index
                )));
            }
        }

        if let Some(distance) = sample.distance {
            if !distance.is_finite() {
                return Err(AnalysisError::InvalidData(format!(
                    "sample {} has non-finite distance",
                    index
                )));
            }
            if let Some(previous) = last_distance {
                if distance < previous {
                    return Err(AnalysisError::InvalidData(format!(
                        "distance decreases at sample {} ({} m after {} m)",
                        index, distance, previous
                    )));
                }
            }
            last_distance = Some(distance);
        }
    }

    Ok(())
}

/// Mean of all present heart-rate values
pub fn average_hr(series: &TimeSeries) -> MetricValue<f64> {
    let values: Vec<f64> = series.heart_rates().map(f64::from).collect();
    mean(&values).into()
}

/// Maximum present heart-rate value
pub fn max_hr(series: &TimeSeries) -> MetricValue<u16> {
    series.heart_rates().max().into()
}

/// Change in average heart rate between the two halves of the HR samples
pub fn hr_drift(series: &TimeSeries) -> MetricValue<HrDrift> {
    let values: Vec<f64> = series.heart_rates().map(f64::from).collect();
    if values.len() < MIN_HALVED_SAMPLES {
        return MetricValue::NotAvailable;
    }

    let (first, second) = halves(&values);
    let (Some(first_avg), Some(second_avg)) = (mean(first), mean(second)) else {
        return MetricValue::NotAvailable;
    };

    let absolute_bpm = second_avg - first_avg;
    let percent = if first_avg > 0.0 {
        MetricValue::Available(absolute_bpm / first_avg * 100.0)
    } else {
        MetricValue::NotAvailable
    };

    MetricValue::Available(HrDrift {
        absolute_bpm,
        percent,
    })
}

/// Mean speed expressed as seconds per pace unit
pub fn average_pace(series: &TimeSeries, unit: PaceUnit) -> MetricValue<f64> {
    let speeds: Vec<f64> = series.speeds().collect();
    match mean(&speeds) {
        Some(speed) if speed > 0.0 => MetricValue::Available(unit.meters() / speed),
        _ => MetricValue::NotAvailable,
    }
}

/// Average pace divided by average heart rate
pub fn pace_vs_hr_ratio(series: &TimeSeries, unit: PaceUnit) -> MetricValue<f64> {
    match (average_pace(series, unit), average_hr(series)) {
        (MetricValue::Available(pace), MetricValue::Available(hr)) if hr > 0.0 => {
            MetricValue::Available(pace / hr)
        }
        _ => MetricValue::NotAvailable,
    }
}

/// Cadence steadiness: `max(0, 100 - 100 * coefficient_of_variation)`
///
/// Uses the sample standard deviation, so two values are the minimum.
pub fn cadence_consistency(series: &TimeSeries) -> MetricValue<f64> {
    let values: Vec<f64> = series.cadences().map(f64::from).collect();
    if values.len() < MIN_CADENCE_SAMPLES {
        return MetricValue::NotAvailable;
    }

    let Some(avg) = mean(&values) else {
        return MetricValue::NotAvailable;
    };
    if avg <= 0.0 {
        return MetricValue::NotAvailable;
    }

    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;
    let coefficient_of_variation = variance.sqrt() / avg;

    MetricValue::Available((100.0 - coefficient_of_variation * 100.0).max(0.0))
}

/// Efficiency-factor loss between the two halves of the speed+HR samples
///
/// Positive means the second half needed more heartbeats for the same speed.
pub fn aerobic_decoupling(series: &TimeSeries) -> MetricValue<f64> {
    let pairs: Vec<(f64, f64)> = series.speed_heart_rate_pairs().collect();
    if pairs.len() < MIN_HALVED_SAMPLES {
        return MetricValue::NotAvailable;
    }

    let (first, second) = halves(&pairs);
    match (efficiency_factor(first), efficiency_factor(second)) {
        (Some(first_ef), Some(second_ef)) if first_ef > 0.0 => {
            MetricValue::Available((first_ef - second_ef) / first_ef * 100.0)
        }
        _ => MetricValue::NotAvailable,
    }
}

/// Mean speed over mean heart rate for a run of `(speed, hr)` pairs
fn efficiency_factor(pairs: &[(f64, f64)]) -> Option<f64> {
    let speeds: Vec<f64> = pairs.iter().map(|(speed, _)| *speed).collect();
    let rates: Vec<f64> = pairs.iter().map(|(_, hr)| *hr).collect();

    let avg_hr = mean(&rates)?;
    if avg_hr <= 0.0 {
        return None;
    }
    Some(mean(&speeds)? / avg_hr)
}

/// First half gets `len / 2` items, the second half the remainder
fn halves<T>(items: &[T]) -> (&[T], &[T]) {
    items.split_at(items.len() / 2)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sample;
    use chrono::{Duration, TimeZone, Utc};

    fn series_from(builder: impl Fn(Sample, usize) -> Sample, count: usize) -> TimeSeries {
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap();
        (0..count)
            .map(|i| builder(Sample::at(start + Duration::seconds(i as i64)), i))
            .collect::<Vec<_>>()
            .into()
    }

    fn hr_series(values: &[u16]) -> TimeSeries {
        series_from(|s, i| s.with_heart_rate(values[i]), values.len())
    }

    fn cadence_series(values: &[u16]) -> TimeSeries {
        series_from(|s, i| s.with_cadence(values[i]), values.len())
    }

    #[test]
    fn test_halves_floor_split() {
        let items = [1, 2, 3, 4, 5];
        let (first, second) = halves(&items);
        assert_eq!(first, &[1, 2]);
        assert_eq!(second, &[3, 4, 5]);
    }

    #[test]
    fn test_average_and_max_hr() {
        let series = hr_series(&[140, 150, 160]);
        assert_eq!(average_hr(&series), MetricValue::Available(150.0));
        assert_eq!(max_hr(&series), MetricValue::Available(160));
    }

    #[test]
    fn test_hr_drift_odd_count_uses_floor_for_first_half() {
        // first half [100], second half [110, 120]
        let series = hr_series(&[100, 110, 120]);
        let drift = hr_drift(&series).into_option().unwrap();
        assert!((drift.absolute_bpm - 15.0).abs() < 1e-9);
        assert!((drift.percent.into_option().unwrap() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_hr_drift_single_sample_not_available() {
        assert_eq!(hr_drift(&hr_series(&[150])), MetricValue::NotAvailable);
    }

    #[test]
    fn test_hr_drift_zero_first_half_has_no_percentage() {
        let drift = hr_drift(&hr_series(&[0, 90])).into_option().unwrap();
        assert_eq!(drift.absolute_bpm, 90.0);
        assert_eq!(drift.percent, MetricValue::NotAvailable);
    }

    #[test]
    fn test_pace_vs_hr_ratio() {
        // 4 m/s -> 250 s/km; 250 / 125 bpm = 2.0
        let series = series_from(|s, _| s.with_speed(4.0).with_heart_rate(125), 4);
        let ratio = pace_vs_hr_ratio(&series, PaceUnit::Kilometer)
            .into_option()
            .unwrap();
        assert!((ratio - 2.0).abs() < 1e-9);

        let per_mile = pace_vs_hr_ratio(&series, PaceUnit::Mile).into_option().unwrap();
        assert!((per_mile - 1609.344 / 4.0 / 125.0).abs() < 1e-9);
    }

    #[test]
    fn test_pace_vs_hr_ratio_zero_speed_not_available() {
        let series = series_from(|s, _| s.with_speed(0.0).with_heart_rate(100), 3);
        assert_eq!(
            pace_vs_hr_ratio(&series, PaceUnit::Kilometer),
            MetricValue::NotAvailable
        );
    }

    #[test]
    fn test_pace_vs_hr_ratio_zero_heart_rate_not_available() {
        let series = series_from(|s, _| s.with_speed(3.0).with_heart_rate(0), 3);
        assert_eq!(
            pace_vs_hr_ratio(&series, PaceUnit::Kilometer),
            MetricValue::NotAvailable
        );
    }

    #[test]
    fn test_cadence_consistency_values() {
        let steady = cadence_consistency(&cadence_series(&[80, 80, 80, 80]));
        assert_eq!(steady, MetricValue::Available(100.0));

        // std = 7.0711, cv = 0.0884
        let close = cadence_consistency(&cadence_series(&[75, 85]))
            .into_option()
            .unwrap();
        assert!((close - 91.161).abs() < 1e-3);
    }

    #[test]
    fn test_cadence_consistency_clamps_at_zero() {
        let erratic = cadence_consistency(&cadence_series(&[1, 300]));
        assert_eq!(erratic, MetricValue::Available(0.0));
    }

    #[test]
    fn test_cadence_consistency_needs_two_values_and_nonzero_mean() {
        assert_eq!(
            cadence_consistency(&cadence_series(&[170])),
            MetricValue::NotAvailable
        );
        assert_eq!(
            cadence_consistency(&cadence_series(&[0, 0])),
            MetricValue::NotAvailable
        );
    }

    #[test]
    fn test_aerobic_decoupling_detects_efficiency_loss() {
        // same speed, heart rate 150 -> 165 in the second half: EF drops by 1/11
        let series = series_from(
            |s, i| s.with_speed(3.0).with_heart_rate(if i < 2 { 150 } else { 165 }),
            4,
        );
        let decoupling = aerobic_decoupling(&series).into_option().unwrap();
        assert!((decoupling - 100.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_aerobic_decoupling_ignores_unpaired_samples() {
        let series = series_from(
            |s, i| match i {
                0 | 2 => s.with_speed(3.0).with_heart_rate(150),
                _ => s.with_heart_rate(190),
            },
            4,
        );
        let decoupling = aerobic_decoupling(&series).into_option().unwrap();
        assert!(decoupling.abs() < 1e-9);
    }

    #[test]
    fn test_aerobic_decoupling_stationary_first_half_not_available() {
        let series = series_from(
            |s, i| s.with_speed(if i == 0 { 0.0 } else { 3.0 }).with_heart_rate(120),
            2,
        );
        assert_eq!(aerobic_decoupling(&series), MetricValue::NotAvailable);
    }

    #[test]
    fn test_validate_rejects_decreasing_timestamps() {
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap();
        let series = TimeSeries::new(vec![
            Sample::at(start + Duration::seconds(5)).with_heart_rate(120),
            Sample::at(start).with_heart_rate(121),
        ]);

        let err = compute_performance_metrics(1, &series).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidData(_)));
        assert!(err.to_string().contains("precedes"));
    }

    #[test]
    fn test_validate_rejects_decreasing_distance_and_negative_speed() {
        let regress = series_from(
            |s, i| s.with_distance(if i == 1 { 5.0 } else { 10.0 * (i + 1) as f64 }),
            3,
        );
        assert!(validate(&regress).is_err());

        let backwards = series_from(|s, _| s.with_speed(-1.0), 1);
        assert!(validate(&backwards).is_err());
    }

    #[test]
    fn test_validate_allows_gaps_in_distance() {
        let series = series_from(
            |s, i| if i == 1 { s } else { s.with_distance(i as f64) },
            3,
        );
        assert!(validate(&series).is_ok());
    }

    #[test]
    fn test_empty_series_is_all_not_available() {
        let metrics = compute_performance_metrics(99, &TimeSeries::default()).unwrap();

        assert_eq!(metrics.activity_id, 99);
        assert_eq!(metrics.sample_count, 0);
        assert_eq!(metrics.average_hr, MetricValue::NotAvailable);
        assert_eq!(metrics.max_hr, MetricValue::NotAvailable);
        assert_eq!(metrics.hr_drift, MetricValue::NotAvailable);
        assert_eq!(metrics.pace_vs_hr_ratio, MetricValue::NotAvailable);
        assert_eq!(metrics.cadence_consistency, MetricValue::NotAvailable);
        assert_eq!(metrics.aerobic_decoupling, MetricValue::NotAvailable);
    }
}

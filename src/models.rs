// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Data Models
//!
//! Core data structures shared by the service client, the FIT decoder, the
//! analytics engine and the CSV writers.
//!
//! ## Core Models
//!
//! - [`ActivitySummary`]: one activity as reported by Garmin Connect
//! - [`ActivityRow`]: the flattened, CSV-ready projection of a summary
//! - [`Sample`]: one decoded per-timestamp point from a FIT file
//! - [`TimeSeries`]: the ordered samples of one activity
//!
//! Sensor fields are `Option`s throughout: a missing heart-rate strap or
//! footpod shows up as `None`, never as a zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Activity metadata as returned by the Garmin Connect activity search
///
/// Only the fields the exporter needs are mapped; everything else in the
/// payload is ignored.
///
/// # Examples
///
/// ```rust
/// use runstack::models::ActivitySummary;
///
/// let json = r#"{
///     "activityId": 123,
///     "activityName": "Morning Run",
///     "activityType": {"typeKey": "running"},
///     "startTimeLocal": "2024-01-03 06:40:12",
///     "distance": 5012.3,
///     "averageHR": 148.0
/// }"#;
/// let summary: ActivitySummary = serde_json::from_str(json).unwrap();
/// assert_eq!(summary.type_key(), Some("running"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    /// Garmin activity identifier; manual entries can arrive without one
    pub activity_id: Option<i64>,
    /// User-visible title
    pub activity_name: Option<String>,
    /// Activity type descriptor
    pub activity_type: Option<ActivityTypeRef>,
    /// Local start time, formatted `YYYY-MM-DD HH:MM:SS`
    pub start_time_local: Option<String>,
    /// Distance in meters
    pub distance: Option<f64>,
    /// Elapsed duration in seconds
    pub duration: Option<f64>,
    /// Moving duration in seconds
    pub moving_duration: Option<f64>,
    /// Average heart rate (bpm)
    #[serde(rename = "averageHR")]
    pub average_hr: Option<f64>,
    /// Maximum heart rate (bpm)
    #[serde(rename = "maxHR")]
    pub max_hr: Option<f64>,
    /// Average running cadence (steps per minute)
    #[serde(rename = "averageRunningCadenceInStepsPerMinute", alias = "averageRunCadence")]
    pub average_cadence: Option<f64>,
    /// Estimated calories
    pub calories: Option<f64>,
}

/// Nested `activityType` object of an activity summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTypeRef {
    /// Machine-readable type, e.g. `running`, `trail_running`, `cycling`
    pub type_key: Option<String>,
}

impl ActivitySummary {
    /// The activity's type key, if reported
    pub fn type_key(&self) -> Option<&str> {
        self.activity_type
            .as_ref()
            .and_then(|kind| kind.type_key.as_deref())
    }
}

/// One row of the activity CSV export
///
/// Column order is fixed by [`ActivityRow::COLUMNS`] and matches the field
/// order, so the header is written even when there are no rows. The `fit_*`
/// columns stay empty unless the export was run with FIT enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRow {
    pub activity_id: Option<i64>,
    pub activity_name: Option<String>,
    pub activity_type: Option<String>,
    pub start_time_local: Option<String>,
    pub distance_m: Option<f64>,
    pub duration_s: Option<f64>,
    pub moving_duration_s: Option<f64>,
    pub average_hr: Option<f64>,
    pub max_hr: Option<f64>,
    pub average_cadence: Option<f64>,
    pub calories: Option<f64>,
    pub fit_avg_heart_rate: Option<f64>,
    pub fit_max_heart_rate: Option<u16>,
    pub fit_avg_cadence: Option<f64>,
    pub fit_max_cadence: Option<u16>,
}

impl ActivityRow {
    /// CSV header, in field order
    pub const COLUMNS: [&'static str; 15] = [
        "activity_id",
        "activity_name",
        "activity_type",
        "start_time_local",
        "distance_m",
        "duration_s",
        "moving_duration_s",
        "average_hr",
        "max_hr",
        "average_cadence",
        "calories",
        "fit_avg_heart_rate",
        "fit_max_heart_rate",
        "fit_avg_cadence",
        "fit_max_cadence",
    ];
}

impl From<&ActivitySummary> for ActivityRow {
    fn from(summary: &ActivitySummary) -> Self {
        Self {
            activity_id: summary.activity_id,
            activity_name: summary.activity_name.clone(),
            activity_type: summary.type_key().map(str::to_string),
            start_time_local: summary.start_time_local.clone(),
            distance_m: summary.distance,
            duration_s: summary.duration,
            moving_duration_s: summary.moving_duration,
            average_hr: summary.average_hr,
            max_hr: summary.max_hr,
            average_cadence: summary.average_cadence,
            calories: summary.calories,
            ..Self::default()
        }
    }
}

/// One decoded time-series point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Recording time (UTC)
    pub timestamp: DateTime<Utc>,
    /// Heart rate in beats per minute
    pub heart_rate: Option<u16>,
    /// Steps (running) or revolutions (cycling) per minute
    pub cadence: Option<u16>,
    /// Cumulative distance in meters
    pub distance: Option<f64>,
    /// Instantaneous speed in meters per second
    pub speed: Option<f64>,
    /// Altitude in meters
    pub altitude: Option<f64>,
}

impl Sample {
    /// A sample with only a timestamp; sensor fields are added with the `with_*` builders
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            heart_rate: None,
            cadence: None,
            distance: None,
            speed: None,
            altitude: None,
        }
    }

    pub fn with_heart_rate(mut self, bpm: u16) -> Self {
        self.heart_rate = Some(bpm);
        self
    }

    pub fn with_cadence(mut self, cadence: u16) -> Self {
        self.cadence = Some(cadence);
        self
    }

    pub fn with_distance(mut self, meters: f64) -> Self {
        self.distance = Some(meters);
        self
    }

    pub fn with_speed(mut self, meters_per_second: f64) -> Self {
        self.speed = Some(meters_per_second);
        self
    }

    pub fn with_altitude(mut self, meters: f64) -> Self {
        self.altitude = Some(meters);
        self
    }
}

/// Ordered samples of a single activity, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    samples: Vec<Sample>,
}

impl TimeSeries {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Heart-rate values of the samples that carry one, in order
    pub fn heart_rates(&self) -> impl Iterator<Item = u16> + '_ {
        self.samples.iter().filter_map(|s| s.heart_rate)
    }

    /// Cadence values of the samples that carry one, in order
    pub fn cadences(&self) -> impl Iterator<Item = u16> + '_ {
        self.samples.iter().filter_map(|s| s.cadence)
    }

    /// Speed values of the samples that carry one, in order
    pub fn speeds(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().filter_map(|s| s.speed)
    }

    /// `(speed, heart_rate)` for the samples that carry both, in order
    pub fn speed_heart_rate_pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.samples
            .iter()
            .filter_map(|s| Some((s.speed?, f64::from(s.heart_rate?))))
    }
}

impl From<Vec<Sample>> for TimeSeries {
    fn from(samples: Vec<Sample>) -> Self {
        Self::new(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_summary_json() -> serde_json::Value {
        json!({
            "activityId": 14_000_000_001i64,
            "activityName": "Easy Run",
            "activityType": {"typeId": 1, "typeKey": "running", "parentTypeId": 17},
            "startTimeLocal": "2024-01-03 06:40:12",
            "startTimeGMT": "2024-01-03 05:40:12",
            "distance": 8012.5,
            "duration": 2710.2,
            "movingDuration": 2690.0,
            "averageHR": 142.0,
            "maxHR": 161.0,
            "averageRunningCadenceInStepsPerMinute": 171.3,
            "calories": 512.0,
            "ownerDisplayName": "runner"
        })
    }

    #[test]
    fn test_summary_deserialization() {
        let summary: ActivitySummary =
            serde_json::from_value(sample_summary_json()).expect("Failed to deserialize summary");

        assert_eq!(summary.activity_id, Some(14_000_000_001));
        assert_eq!(summary.activity_name.as_deref(), Some("Easy Run"));
        assert_eq!(summary.type_key(), Some("running"));
        assert_eq!(summary.average_hr, Some(142.0));
        assert_eq!(summary.average_cadence, Some(171.3));
    }

    #[test]
    fn test_summary_with_missing_fields() {
        let summary: ActivitySummary = serde_json::from_value(json!({
            "activityId": 7,
            "activityType": null,
            "averageHR": null
        }))
        .unwrap();

        assert_eq!(summary.type_key(), None);
        assert_eq!(summary.average_hr, None);
        assert_eq!(summary.distance, None);
    }

    #[test]
    fn test_list_with_entry_without_id() {
        let activities: Vec<ActivitySummary> = serde_json::from_value(json!([
            {"activityId": 1, "activityType": {"typeKey": "running"}},
            {"activityName": "manual entry", "activityType": {"typeKey": "running"}}
        ]))
        .unwrap();

        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0].activity_id, Some(1));
        assert_eq!(activities[1].activity_id, None);
        assert_eq!(ActivityRow::from(&activities[1]).activity_id, None);
    }

    #[test]
    fn test_run_cadence_field_name() {
        let summary: ActivitySummary = serde_json::from_value(json!({
            "activityId": 3,
            "averageRunCadence": 168.5
        }))
        .unwrap();

        assert_eq!(summary.average_cadence, Some(168.5));
    }

    #[test]
    fn test_row_flattening() {
        let summary: ActivitySummary = serde_json::from_value(sample_summary_json()).unwrap();
        let row = ActivityRow::from(&summary);

        assert_eq!(row.activity_id, summary.activity_id);
        assert_eq!(row.activity_type.as_deref(), Some("running"));
        assert_eq!(row.distance_m, Some(8012.5));
        assert_eq!(row.moving_duration_s, Some(2690.0));
        assert_eq!(row.fit_avg_heart_rate, None);
        assert_eq!(row.fit_max_cadence, None);
    }

    #[test]
    fn test_sample_builders_and_series_views() {
        let start = Utc.with_ymd_and_hms(2024, 1, 3, 6, 40, 0).unwrap();
        let series = TimeSeries::new(vec![
            Sample::at(start).with_heart_rate(120).with_speed(2.5),
            Sample::at(start).with_cadence(170),
            Sample::at(start).with_heart_rate(130).with_cadence(172),
        ]);

        assert_eq!(series.len(), 3);
        assert_eq!(series.heart_rates().collect::<Vec<_>>(), vec![120, 130]);
        assert_eq!(series.cadences().collect::<Vec<_>>(), vec![170, 172]);
        assert_eq!(series.speeds().collect::<Vec<_>>(), vec![2.5]);
        assert_eq!(
            series.speed_heart_rate_pairs().collect::<Vec<_>>(),
            vec![(2.5, 120.0)]
        );
    }
}

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Flat-file output: activity CSV, time-series CSV and raw FIT files
//!
//! Every file is written to a sibling temp file and renamed into place, so
//! a failed run never leaves a truncated export behind.

use crate::models::{ActivityRow, TimeSeries};
use chrono::SecondsFormat;
use std::fs;
use std::path::{Path, PathBuf};

pub const TIMESERIES_COLUMNS: [&str; 6] =
    ["timestamp", "heart_rate", "cadence", "distance", "speed", "altitude"];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Write the activity export; the header is always present
pub fn write_activities_csv(path: &Path, rows: &[ActivityRow]) -> Result<(), StorageError> {
    write_atomically(path, |writer| {
        writer.write_record(ActivityRow::COLUMNS)?;
        for row in rows {
            writer.write_record(&[
                number(row.activity_id),
                text(&row.activity_name),
                text(&row.activity_type),
                text(&row.start_time_local),
                number(row.distance_m),
                number(row.duration_s),
                number(row.moving_duration_s),
                number(row.average_hr),
                number(row.max_hr),
                number(row.average_cadence),
                number(row.calories),
                number(row.fit_avg_heart_rate),
                number(row.fit_max_heart_rate),
                number(row.fit_avg_cadence),
                number(row.fit_max_cadence),
            ])?;
        }
        Ok(())
    })
}

/// Write one row per sample; absent sensor values are empty cells
pub fn write_timeseries_csv(path: &Path, series: &TimeSeries) -> Result<(), StorageError> {
    write_atomically(path, |writer| {
        writer.write_record(TIMESERIES_COLUMNS)?;
        for sample in series.samples() {
            writer.write_record(&[
                sample.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                number(sample.heart_rate),
                number(sample.cadence),
                number(sample.distance),
                number(sample.speed),
                number(sample.altitude),
            ])?;
        }
        Ok(())
    })
}

/// Store a downloaded FIT payload as `<dir>/<activity_id>.fit`
pub fn save_fit_file(dir: &Path, activity_id: i64, bytes: &[u8]) -> Result<PathBuf, StorageError> {
    let path = dir.join(format!("{}.fit", activity_id));
    replace_file(&path, |tmp_path| {
        fs::write(tmp_path, bytes).map_err(|e| StorageError::io(tmp_path, e))
    })?;
    Ok(path)
}

fn write_atomically<F>(path: &Path, write_rows: F) -> Result<(), StorageError>
where
    F: FnOnce(&mut csv::Writer<fs::File>) -> Result<(), csv::Error>,
{
    replace_file(path, |tmp_path| {
        let mut writer = csv::Writer::from_path(tmp_path)?;
        write_rows(&mut writer)?;
        writer.flush().map_err(|e| StorageError::io(tmp_path, e))
    })
}

/// Write into a sibling temp file, then rename it over `path`
fn replace_file<F>(path: &Path, write: F) -> Result<(), StorageError>
where
    F: FnOnce(&Path) -> Result<(), StorageError>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let tmp_path = temp_path(path);
    let result = write(&tmp_path)
        .and_then(|()| fs::rename(&tmp_path, path).map_err(|e| StorageError::io(path, e)));

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn number<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

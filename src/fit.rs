// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! FIT file decoding into a [`TimeSeries`]
//!
//! Binary decoding is done by `fitparser`; this module only picks the
//! `record` messages and maps the handful of fields the analytics use.

use crate::constants::analysis::DISPLAY_PRECISION;
use crate::intelligence::{metrics, round_to};
use crate::models::{Sample, TimeSeries};
use chrono::Utc;
use fitparser::profile::MesgNum;
use fitparser::{FitDataRecord, Value};
use serde::Serialize;
use std::borrow::Cow;
use std::io::{Cursor, Read};
use tracing::debug;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Errors raised while turning downloaded bytes into a time-series
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("FIT payload is empty")]
    Empty,

    #[error("Failed to decode FIT data: {0}")]
    Parse(String),

    #[error("Failed to read FIT archive: {0}")]
    Archive(String),

    #[error("Archive does not contain a .fit file")]
    MissingFitEntry,
}

/// Decode FIT bytes (or a zip archive wrapping them) into a time-series
pub fn decode(bytes: &[u8]) -> Result<TimeSeries, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let payload: Cow<'_, [u8]> = if bytes.starts_with(ZIP_MAGIC) {
        Cow::Owned(extract_fit_from_zip(bytes)?)
    } else {
        Cow::Borrowed(bytes)
    };

    let records = fitparser::from_bytes(&payload)
        .map_err(|e| DecodeError::Parse(e.to_string()))?;

    let mut skipped = 0usize;
    let samples: Vec<Sample> = records
        .iter()
        .filter(|record| record.kind() == MesgNum::Record)
        .filter_map(|record| {
            let sample = sample_from_record(record);
            if sample.is_none() {
                skipped += 1;
            }
            sample
        })
        .collect();

    debug!(
        fit.messages = records.len(),
        fit.samples = samples.len(),
        fit.skipped = skipped,
        "Decoded FIT records"
    );

    Ok(TimeSeries::new(samples))
}

/// Per-activity aggregates used to enrich the activity export
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FitSummary {
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<u16>,
    pub avg_cadence: Option<f64>,
    pub max_cadence: Option<u16>,
}

/// Summarize a decoded series; averages are rounded for export
pub fn summarize(series: &TimeSeries) -> FitSummary {
    let cadences: Vec<f64> = series.cadences().map(f64::from).collect();
    let avg_cadence = if cadences.is_empty() {
        None
    } else {
        Some(cadences.iter().sum::<f64>() / cadences.len() as f64)
    };

    FitSummary {
        avg_heart_rate: metrics::average_hr(series)
            .into_option()
            .map(|hr| round_to(hr, DISPLAY_PRECISION)),
        max_heart_rate: metrics::max_hr(series).into_option(),
        avg_cadence: avg_cadence.map(|c| round_to(c, DISPLAY_PRECISION)),
        max_cadence: series.cadences().max(),
    }
}

/// Map one `record` message; records without a timestamp are dropped
fn sample_from_record(record: &FitDataRecord) -> Option<Sample> {
    let mut sample = Sample::at(Utc::now());
    let mut timestamp = None;
    let mut speed = None;
    let mut enhanced_speed = None;
    let mut altitude = None;
    let mut enhanced_altitude = None;

    for field in record.fields() {
        match field.name() {
            "timestamp" => {
                if let Value::Timestamp(t) = field.value() {
                    timestamp = Some(t.with_timezone(&Utc));
                }
            }
            "heart_rate" => sample.heart_rate = as_u16(field.value()),
            "cadence" => sample.cadence = as_u16(field.value()),
            "distance" => sample.distance = as_f64(field.value()),
            "speed" => speed = as_f64(field.value()),
            "enhanced_speed" => enhanced_speed = as_f64(field.value()),
            "altitude" => altitude = as_f64(field.value()),
            "enhanced_altitude" => enhanced_altitude = as_f64(field.value()),
            _ => {}
        }
    }

    sample.timestamp = timestamp?;
    sample.speed = enhanced_speed.or(speed);
    sample.altitude = enhanced_altitude.or(altitude);
    Some(sample)
}

fn as_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::UInt8(v) | Value::UInt8z(v) | Value::Byte(v) => f64::from(*v),
        Value::SInt8(v) => f64::from(*v),
        Value::UInt16(v) | Value::UInt16z(v) => f64::from(*v),
        Value::SInt16(v) => f64::from(*v),
        Value::UInt32(v) | Value::UInt32z(v) => f64::from(*v),
        Value::SInt32(v) => f64::from(*v),
        Value::UInt64(v) | Value::UInt64z(v) => *v as f64,
        Value::SInt64(v) => *v as f64,
        Value::Float32(v) => f64::from(*v),
        Value::Float64(v) => *v,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn as_u16(value: &Value) -> Option<u16> {
    as_f64(value)
        .filter(|v| *v >= 0.0 && *v <= f64::from(u16::MAX))
        .map(|v| v.round() as u16)
}

fn extract_fit_from_zip(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DecodeError::Archive(e.to_string()))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| DecodeError::Archive(e.to_string()))?;
        if !entry.name().to_ascii_lowercase().ends_with(".fit") {
            continue;
        }

        let mut buffer = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buffer)
            .map_err(|e| DecodeError::Archive(e.to_string()))?;
        debug!(fit.entry = %entry.name(), fit.bytes = buffer.len(), "Extracted FIT from archive");
        return Ok(buffer);
    }

    Err(DecodeError::MissingFitEntry)
}

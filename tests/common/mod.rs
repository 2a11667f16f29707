// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Shared test fixtures: a minimal FIT encoder and an in-memory provider

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use runstack::models::{ActivitySummary, ActivityTypeRef, Sample, TimeSeries};
use runstack::providers::{ActivityProvider, ProviderError};
use std::collections::HashMap;
use std::io::{Cursor, Write};

/// Seconds between the Unix epoch and the FIT epoch (1989-12-31T00:00:00Z)
const FIT_EPOCH_OFFSET: i64 = 631_065_600;

const CRC_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
    0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
];

const MESG_FILE_ID: u16 = 0;
const MESG_RECORD: u16 = 20;

const BASE_ENUM: u8 = 0x00;
const BASE_UINT8: u8 = 0x02;
const BASE_UINT16: u8 = 0x84;
const BASE_UINT32: u8 = 0x86;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 4, 7, 30, 0).unwrap()
}

/// One `record` message; `None` fields are left out of the message entirely
#[derive(Debug, Clone, Default)]
pub struct FitRecord {
    pub offset_secs: Option<u32>,
    pub heart_rate: Option<u8>,
    pub cadence: Option<u8>,
    pub distance_m: Option<f64>,
    pub speed_mps: Option<f64>,
    pub altitude_m: Option<f64>,
}

impl FitRecord {
    pub fn at(offset_secs: u32) -> Self {
        Self {
            offset_secs: Some(offset_secs),
            ..Self::default()
        }
    }

    pub fn hr(mut self, bpm: u8) -> Self {
        self.heart_rate = Some(bpm);
        self
    }

    pub fn cadence(mut self, spm: u8) -> Self {
        self.cadence = Some(spm);
        self
    }

    pub fn distance(mut self, meters: f64) -> Self {
        self.distance_m = Some(meters);
        self
    }

    pub fn speed(mut self, mps: f64) -> Self {
        self.speed_mps = Some(mps);
        self
    }

    pub fn altitude(mut self, meters: f64) -> Self {
        self.altitude_m = Some(meters);
        self
    }

    /// (field number, size, base type, little-endian bytes) for the present fields
    fn fields(&self, start: DateTime<Utc>) -> Vec<(u8, u8, u8, Vec<u8>)> {
        let mut fields = Vec::new();
        if let Some(offset) = self.offset_secs {
            let ts = (start.timestamp() - FIT_EPOCH_OFFSET) as u32 + offset;
            fields.push((253, 4, BASE_UINT32, ts.to_le_bytes().to_vec()));
        }
        if let Some(hr) = self.heart_rate {
            fields.push((3, 1, BASE_UINT8, vec![hr]));
        }
        if let Some(cadence) = self.cadence {
            fields.push((4, 1, BASE_UINT8, vec![cadence]));
        }
        if let Some(distance) = self.distance_m {
            let raw = (distance * 100.0).round() as u32;
            fields.push((5, 4, BASE_UINT32, raw.to_le_bytes().to_vec()));
        }
        if let Some(speed) = self.speed_mps {
            let raw = (speed * 1000.0).round() as u16;
            fields.push((6, 2, BASE_UINT16, raw.to_le_bytes().to_vec()));
        }
        if let Some(altitude) = self.altitude_m {
            let raw = ((altitude + 500.0) * 5.0).round() as u16;
            fields.push((2, 2, BASE_UINT16, raw.to_le_bytes().to_vec()));
        }
        fields
    }
}

/// Encode a FIT activity file holding a `file_id` message and the given records
pub fn build_fit(start: DateTime<Utc>, records: &[FitRecord]) -> Vec<u8> {
    let mut data = Vec::new();

    // file_id: type = activity, manufacturer = garmin, time_created
    let created = (start.timestamp() - FIT_EPOCH_OFFSET) as u32;
    write_definition(
        &mut data,
        MESG_FILE_ID,
        &[(0, 1, BASE_ENUM), (1, 2, BASE_UINT16), (4, 4, BASE_UINT32)],
    );
    data.push(0x00);
    data.push(4);
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&created.to_le_bytes());

    // Records are redefined whenever their field set changes
    let mut current: Option<Vec<(u8, u8, u8)>> = None;
    for record in records {
        let fields = record.fields(start);
        let layout: Vec<(u8, u8, u8)> = fields.iter().map(|(n, s, b, _)| (*n, *s, *b)).collect();
        if current.as_ref() != Some(&layout) {
            write_definition(&mut data, MESG_RECORD, &layout);
            current = Some(layout);
        }
        data.push(0x00);
        for (_, _, _, bytes) in fields {
            data.extend_from_slice(&bytes);
        }
    }

    let mut file = Vec::with_capacity(data.len() + 16);
    file.push(14);
    file.push(0x20);
    file.extend_from_slice(&2132u16.to_le_bytes());
    file.extend_from_slice(&(data.len() as u32).to_le_bytes());
    file.extend_from_slice(b".FIT");
    let header_crc = fit_crc(&file);
    file.extend_from_slice(&header_crc.to_le_bytes());
    file.extend_from_slice(&data);
    let file_crc = fit_crc(&file);
    file.extend_from_slice(&file_crc.to_le_bytes());
    file
}

fn write_definition(data: &mut Vec<u8>, global: u16, fields: &[(u8, u8, u8)]) {
    data.push(0x40);
    data.push(0);
    data.push(0);
    data.extend_from_slice(&global.to_le_bytes());
    data.push(fields.len() as u8);
    for (number, size, base) in fields {
        data.extend_from_slice(&[*number, *size, *base]);
    }
}

pub fn fit_crc(bytes: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in bytes {
        let mut tmp = CRC_TABLE[(crc & 0xF) as usize];
        crc = (crc >> 4) & 0x0FFF;
        crc = crc ^ tmp ^ CRC_TABLE[(byte & 0xF) as usize];

        tmp = CRC_TABLE[(crc & 0xF) as usize];
        crc = (crc >> 4) & 0x0FFF;
        crc = crc ^ tmp ^ CRC_TABLE[((byte >> 4) & 0xF) as usize];
    }
    crc
}

/// Steady run: 10 records, HR 140..149, cadence 170, 3 m/s
pub fn steady_run() -> Vec<FitRecord> {
    (0..10)
        .map(|i| {
            FitRecord::at(i)
                .hr(140 + i as u8)
                .cadence(170)
                .distance(f64::from(i) * 3.0)
                .speed(3.0)
                .altitude(100.0)
        })
        .collect()
}

/// Wrap a payload in a zip archive under `name` (stored, no compression)
pub fn zip_with(name: &str, payload: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    writer.start_file(name, options).unwrap();
    writer.write_all(payload).unwrap();
    writer.finish().unwrap().into_inner()
}

/// A time-series built directly, for tests that skip FIT decoding
pub fn series(builder: impl Fn(Sample, u32) -> Sample, count: u32) -> TimeSeries {
    let start = start_time();
    TimeSeries::new(
        (0..count)
            .map(|i| builder(Sample::at(start + chrono::Duration::seconds(i64::from(i))), i))
            .collect(),
    )
}

pub fn summary(id: i64, type_key: &str, start_time_local: Option<&str>) -> ActivitySummary {
    ActivitySummary {
        activity_id: Some(id),
        activity_name: Some(format!("Activity {}", id)),
        activity_type: Some(ActivityTypeRef {
            type_key: Some(type_key.to_string()),
        }),
        start_time_local: start_time_local.map(str::to_string),
        distance: Some(5000.0),
        duration: Some(1500.0),
        average_hr: Some(150.0),
        ..ActivitySummary::default()
    }
}

/// How the fake answers a FIT download
#[derive(Debug, Clone)]
pub enum FitResponse {
    Bytes(Vec<u8>),
    Missing,
    RateLimited,
}

/// In-memory provider; list failures are given as an HTTP status
#[derive(Debug, Default)]
pub struct FakeProvider {
    pub activities: Vec<ActivitySummary>,
    pub list_failure: Option<u16>,
    pub fit_files: HashMap<i64, FitResponse>,
}

impl FakeProvider {
    pub fn with_activities(activities: Vec<ActivitySummary>) -> Self {
        Self {
            activities,
            ..Self::default()
        }
    }

    pub fn failing_with(status: u16) -> Self {
        Self {
            list_failure: Some(status),
            ..Self::default()
        }
    }

    pub fn with_fit(mut self, activity_id: i64, response: FitResponse) -> Self {
        self.fit_files.insert(activity_id, response);
        self
    }
}

fn status_error(status: u16) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(format!("status {}", status)),
        429 => ProviderError::RateLimited,
        _ => ProviderError::Upstream {
            status,
            endpoint: "fake".to_string(),
        },
    }
}

#[async_trait]
impl ActivityProvider for FakeProvider {
    async fn get_recent_activities(
        &self,
        start: usize,
        limit: usize,
    ) -> Result<Vec<ActivitySummary>, ProviderError> {
        if let Some(status) = self.list_failure {
            return Err(status_error(status));
        }
        Ok(self.activities.iter().skip(start).take(limit).cloned().collect())
    }

    async fn download_fit(&self, activity_id: i64) -> Result<Option<Vec<u8>>, ProviderError> {
        match self.fit_files.get(&activity_id) {
            Some(FitResponse::Bytes(bytes)) => Ok(Some(bytes.clone())),
            Some(FitResponse::RateLimited) => Err(ProviderError::RateLimited),
            Some(FitResponse::Missing) | None => Ok(None),
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

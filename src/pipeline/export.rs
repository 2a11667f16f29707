// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::config::ExportDefaults;
use crate::fit;
use crate::logging::AppLogger;
use crate::models::{ActivityRow, ActivitySummary};
use crate::providers::{ActivityProvider, ProviderError};
use crate::storage::{self, StorageError};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parameters of one export run
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub days: u32,
    pub limit: usize,
    pub activity_type: String,
    pub csv_path: PathBuf,
    /// Download each kept activity's FIT file and fill the `fit_*` columns
    pub include_fit: bool,
    pub fit_dir: PathBuf,
}

impl From<&ExportDefaults> for ExportRequest {
    fn from(defaults: &ExportDefaults) -> Self {
        Self {
            days: defaults.days,
            limit: defaults.limit,
            activity_type: defaults.activity_type.clone(),
            csv_path: defaults.csv_path.clone(),
            include_fit: false,
            fit_dir: defaults.fit_dir.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub row_count: usize,
    pub csv_path: PathBuf,
    pub rows: Vec<ActivityRow>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to fetch activities from {provider}: {source}")]
    FetchFailed {
        provider: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("Failed to write export: {0}")]
    Write(#[from] StorageError),
}

/// Run an export relative to the current time
pub async fn export(
    provider: &dyn ActivityProvider,
    request: &ExportRequest,
) -> Result<ExportOutcome, ExportError> {
    export_at(provider, request, Utc::now()).await
}

/// Run an export with an explicit "now" for the day window
pub async fn export_at(
    provider: &dyn ActivityProvider,
    request: &ExportRequest,
    now: DateTime<Utc>,
) -> Result<ExportOutcome, ExportError> {
    let started = Instant::now();

    let activities = provider
        .get_recent_activities(0, request.limit)
        .await
        .map_err(|source| ExportError::FetchFailed {
            provider: provider.provider_name(),
            source,
        })?;
    let fetched = activities.len();

    let kept = filter_activities(activities, request.days, &request.activity_type, now);
    info!(
        export.fetched = fetched,
        export.kept = kept.len(),
        export.activity_type = %request.activity_type,
        export.days = request.days,
        "Filtered activities"
    );

    let mut rows: Vec<ActivityRow> = kept.iter().map(ActivityRow::from).collect();
    if request.include_fit {
        for row in &mut rows {
            enrich_from_fit(provider, row, &request.fit_dir).await;
        }
    }

    storage::write_activities_csv(&request.csv_path, &rows)?;
    AppLogger::log_export_event(
        rows.len(),
        &request.csv_path,
        request.include_fit,
        started.elapsed().as_millis() as u64,
    );

    Ok(ExportOutcome {
        row_count: rows.len(),
        csv_path: request.csv_path.clone(),
        rows,
    })
}

/// Keep activities of the requested type that started within the last `days` days
///
/// A start time that is missing or cannot be parsed counts as inside the
/// window, so such activities are kept. A window reaching past the earliest
/// representable date keeps every activity of the type.
pub fn filter_activities(
    activities: Vec<ActivitySummary>,
    days: u32,
    activity_type: &str,
    now: DateTime<Utc>,
) -> Vec<ActivitySummary> {
    let cutoff = now
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    activities
        .into_iter()
        .filter(|activity| activity.type_key() == Some(activity_type))
        .filter(|activity| match parse_start_time(activity.start_time_local.as_deref()) {
            Some(start) => start >= cutoff,
            None => {
                debug!(
                    activity.id = ?activity.activity_id,
                    "Start time missing or unparsable, keeping activity"
                );
                true
            }
        })
        .collect()
}

fn parse_start_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    NaiveDateTime::parse_from_str(raw, START_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Fill the `fit_*` columns; failures are logged and leave them empty
async fn enrich_from_fit(provider: &dyn ActivityProvider, row: &mut ActivityRow, fit_dir: &Path) {
    let Some(activity_id) = row.activity_id else {
        warn!(
            activity.name = ?row.activity_name,
            "Activity has no id, skipping FIT enrichment"
        );
        return;
    };

    let bytes = match provider.download_fit(activity_id).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            AppLogger::log_activity_warning(activity_id, "download", &"no FIT file available");
            return;
        }
        Err(e) => {
            AppLogger::log_activity_warning(activity_id, "download", &e);
            return;
        }
    };

    if let Err(e) = storage::save_fit_file(fit_dir, activity_id, &bytes) {
        AppLogger::log_activity_warning(activity_id, "save", &e);
    }

    let series = match fit::decode(&bytes) {
        Ok(series) => series,
        Err(e) => {
            AppLogger::log_activity_warning(activity_id, "decode", &e);
            return;
        }
    };
    AppLogger::log_fit_event(activity_id, bytes.len(), series.len());

    let summary = fit::summarize(&series);
    row.fit_avg_heart_rate = summary.avg_heart_rate;
    row.fit_max_heart_rate = summary.max_heart_rate;
    row.fit_avg_cadence = summary.avg_cadence;
    row.fit_max_cadence = summary.max_cadence;
}

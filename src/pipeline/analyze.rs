// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::fit::{self, DecodeError};
use crate::intelligence::{AnalysisError, MetricsCalculator, PaceUnit, PerformanceMetrics};
use crate::logging::AppLogger;
use crate::providers::{ActivityProvider, ProviderError};
use crate::storage::{self, StorageError};
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

/// Parameters of one analysis run
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeRequest {
    pub activity_id: i64,
    /// Downloaded files are kept as `<fit_dir>/<activity_id>.fit`
    pub fit_dir: PathBuf,
    pub timeseries_csv: PathBuf,
    pub pace_unit: PaceUnit,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub metrics: PerformanceMetrics,
    /// Where the FIT payload was saved, if it was
    pub fit_path: Option<PathBuf>,
    pub timeseries_csv: PathBuf,
    pub sample_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("Failed to download FIT file from {provider}: {source}")]
    FetchFailed {
        provider: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("No FIT file available for activity {0}")]
    FitUnavailable(i64),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Failed to write analysis output: {0}")]
    Write(#[from] StorageError),
}

/// Download, decode and analyze one activity
pub async fn analyze(
    provider: &dyn ActivityProvider,
    request: &AnalyzeRequest,
) -> Result<AnalysisReport, AnalyzeError> {
    let bytes = provider
        .download_fit(request.activity_id)
        .await
        .map_err(|source| AnalyzeError::FetchFailed {
            provider: provider.provider_name(),
            source,
        })?
        .ok_or(AnalyzeError::FitUnavailable(request.activity_id))?;

    let fit_path = match storage::save_fit_file(&request.fit_dir, request.activity_id, &bytes) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(activity.id = request.activity_id, "Could not keep FIT file: {}", e);
            None
        }
    };

    let mut report = analyze_bytes(request, &bytes)?;
    report.fit_path = fit_path;
    Ok(report)
}

/// Analyze an already available FIT payload (a local file, for instance)
pub fn analyze_bytes(request: &AnalyzeRequest, bytes: &[u8]) -> Result<AnalysisReport, AnalyzeError> {
    let series = fit::decode(bytes)?;
    AppLogger::log_fit_event(request.activity_id, bytes.len(), series.len());

    let metrics = MetricsCalculator::new()
        .with_pace_unit(request.pace_unit)
        .calculate_metrics(request.activity_id, &series)?;
    AppLogger::log_analysis_event(request.activity_id, series.len(), metrics.available_count());

    storage::write_timeseries_csv(&request.timeseries_csv, &series)?;

    Ok(AnalysisReport {
        sample_count: series.len(),
        metrics,
        fit_path: None,
        timeseries_csv: request.timeseries_csv.clone(),
    })
}

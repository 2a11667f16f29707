// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Web Dashboard
//!
//! A single page with an Export tab and an Analyze tab, backed by two JSON
//! endpoints that run the same pipelines as the CLI.
//!
//! | Route               | Body                                   |
//! |---------------------|----------------------------------------|
//! | `GET /`             | the HTML page                          |
//! | `GET /health`       | service status                         |
//! | `POST /api/export`  | `{days?, limit?, activity_type?, include_fit?}` |
//! | `POST /api/analyze` | `{activity_id}`                        |

use crate::config::ExportDefaults;
use crate::constants::defaults;
use crate::intelligence::PaceUnit;
use crate::logging::AppLogger;
use crate::pipeline::{self, AnalyzeError, AnalyzeRequest, ExportError, ExportRequest};
use crate::providers::ActivityProvider;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

const INDEX_HTML: &str = include_str!("index.html");
const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Everything a request handler needs
#[derive(Clone)]
pub struct DashboardState {
    provider: Arc<dyn ActivityProvider>,
    defaults: ExportDefaults,
    pace_unit: PaceUnit,
}

impl DashboardState {
    pub fn new(provider: Arc<dyn ActivityProvider>, defaults: ExportDefaults, pace_unit: PaceUnit) -> Self {
        Self {
            provider,
            defaults,
            pace_unit,
        }
    }
}

/// Export form; omitted fields fall back to the configured defaults
#[derive(Debug, Default, Deserialize)]
pub struct ExportForm {
    pub days: Option<u32>,
    pub limit: Option<usize>,
    pub activity_type: Option<String>,
    pub include_fit: Option<bool>,
}

impl ExportForm {
    fn into_request(self, defaults: &ExportDefaults) -> Result<ExportRequest, ApiError> {
        let mut request = ExportRequest::from(defaults);
        if let Some(days) = self.days {
            request.days = days;
        }
        if let Some(limit) = self.limit {
            if limit == 0 {
                return Err(ApiError::bad_request("limit must be greater than zero"));
            }
            request.limit = limit;
        }
        if let Some(activity_type) = self.activity_type.filter(|t| !t.trim().is_empty()) {
            request.activity_type = activity_type.trim().to_string();
        }
        request.include_fit = self.include_fit.unwrap_or(false);
        Ok(request)
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeForm {
    pub activity_id: i64,
}

/// HTTP API error wrapper
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl warp::reject::Reject for ApiError {}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        let status = match e {
            ExportError::FetchFailed { .. } => StatusCode::BAD_GATEWAY,
            ExportError::Write(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<AnalyzeError> for ApiError {
    fn from(e: AnalyzeError) -> Self {
        let status = match e {
            AnalyzeError::FetchFailed { .. } => StatusCode::BAD_GATEWAY,
            AnalyzeError::FitUnavailable(_) => StatusCode::NOT_FOUND,
            AnalyzeError::Decode(_) | AnalyzeError::Analysis(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AnalyzeError::Write(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

/// All dashboard routes, with rejections turned into JSON errors
pub fn routes(
    state: DashboardState,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(INDEX_HTML));

    let health = warp::path("health").and(warp::path::end()).and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "status": "ok",
            "service": defaults::SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }))
    });

    let export = warp::path!("api" / "export")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_export);

    let analyze = warp::path!("api" / "analyze")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(handle_analyze);

    index
        .or(health)
        .or(export)
        .or(analyze)
        .with(warp::log::custom(|info| {
            AppLogger::log_api_request(
                info.method().as_str(),
                info.path(),
                info.status().as_u16(),
                info.elapsed().as_millis() as u64,
            )
        }))
        .recover(handle_rejection)
}

/// Serve the dashboard on localhost until the process is stopped
pub async fn serve(state: DashboardState, port: u16) {
    info!("Dashboard listening on http://127.0.0.1:{}", port);
    warp::serve(routes(state)).run(([127, 0, 0, 1], port)).await;
}

fn with_state(
    state: DashboardState,
) -> impl Filter<Extract = (DashboardState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

async fn handle_export(form: ExportForm, state: DashboardState) -> Result<impl Reply, Rejection> {
    let request = form.into_request(&state.defaults).map_err(warp::reject::custom)?;
    let outcome = pipeline::export(state.provider.as_ref(), &request)
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;
    Ok(warp::reply::json(&outcome))
}

async fn handle_analyze(form: AnalyzeForm, state: DashboardState) -> Result<impl Reply, Rejection> {
    let request = AnalyzeRequest {
        activity_id: form.activity_id,
        fit_dir: state.defaults.fit_dir.clone(),
        timeseries_csv: state.defaults.timeseries_csv.clone(),
        pace_unit: state.pace_unit,
    };
    let report = pipeline::analyze(state.provider.as_ref(), &request)
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;
    Ok(warp::reply::json(&report))
}

/// Handle HTTP rejections and errors
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(api_error) = err.find::<ApiError>() {
        if api_error.status.is_server_error() {
            error!(http.status = api_error.status.as_u16(), "{}", api_error.message);
        }
        (api_error.status, api_error.message.clone())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "The requested endpoint was not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong".to_string())
    };

    let json = warp::reply::json(&serde_json::json!({
        "error": status.canonical_reason().unwrap_or("Error"),
        "message": message,
    }));
    Ok(warp::reply::with_status(json, status))
}

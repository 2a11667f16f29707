// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Pipelines
//!
//! The two end-to-end flows shared by the CLI and the dashboard:
//!
//! - [`export`]: fetch summaries, filter, optionally enrich from FIT, write CSV
//! - [`analyze`]: download one FIT file, decode, compute metrics, write the
//!   per-sample CSV
//!
//! Both take the service as `&dyn ActivityProvider` so tests can run them
//! against an in-memory fake.

pub mod analyze;
pub mod export;

pub use analyze::{analyze, analyze_bytes, AnalysisReport, AnalyzeError, AnalyzeRequest};
pub use export::{export, export_at, filter_activities, ExportError, ExportOutcome, ExportRequest};

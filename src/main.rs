// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # runstack CLI
//!
//! Without a subcommand the flags are those of `export`, so
//! `runstack --days 7` keeps working.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use runstack::{
    auth::GarminCredentials,
    config::AppConfig,
    dashboard::{self, DashboardState},
    intelligence::{PaceUnit, PerformanceMetrics},
    logging::LoggingConfig,
    pipeline::{self, AnalysisReport, AnalyzeRequest, ExportRequest},
    providers::GarminConnectClient,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "runstack", version, about = "Garmin Connect export and run analysis")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    legacy: ExportArgs,

    /// Session token file
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export recent activity summaries to CSV
    Export(ExportArgs),
    /// Download one activity's FIT file and compute performance metrics
    Analyze(AnalyzeArgs),
    /// Start the web dashboard
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default)]
struct ExportArgs {
    /// Only activities that started within this many days
    #[arg(long)]
    days: Option<u32>,

    /// Number of recent activities to fetch
    #[arg(long)]
    limit: Option<usize>,

    /// Activity type key, e.g. running or cycling
    #[arg(long)]
    activity_type: Option<String>,

    /// Output CSV file
    #[arg(long)]
    csv_path: Option<PathBuf>,

    /// Also download FIT files and add heart-rate/cadence columns
    #[arg(long)]
    include_fit: bool,

    /// Directory for downloaded FIT files
    #[arg(long)]
    fit_dir: Option<PathBuf>,
}

impl ExportArgs {
    fn into_request(self, config: &AppConfig) -> ExportRequest {
        let defaults = &config.export;
        ExportRequest {
            days: self.days.unwrap_or(defaults.days),
            limit: self.limit.unwrap_or(defaults.limit),
            activity_type: self.activity_type.unwrap_or_else(|| defaults.activity_type.clone()),
            csv_path: self.csv_path.unwrap_or_else(|| defaults.csv_path.clone()),
            include_fit: self.include_fit,
            fit_dir: self.fit_dir.unwrap_or_else(|| defaults.fit_dir.clone()),
        }
    }
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Garmin activity id
    #[arg(long)]
    activity_id: i64,

    /// Directory for the downloaded FIT file
    #[arg(long)]
    fit_dir: Option<PathBuf>,

    /// Output CSV for the per-sample time-series
    #[arg(long)]
    timeseries_csv: Option<PathBuf>,

    /// Analyze a local FIT file instead of downloading it
    #[arg(long)]
    fit_file: Option<PathBuf>,

    /// Pace unit for the pace/HR ratio
    #[arg(long, value_parser = parse_pace_unit)]
    pace_unit: Option<PaceUnit>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(short, long)]
    port: Option<u16>,
}

fn parse_pace_unit(value: &str) -> Result<PaceUnit, String> {
    match value.to_ascii_lowercase().as_str() {
        "km" | "kilometer" | "kilometre" => Ok(PaceUnit::Kilometer),
        "mi" | "mile" => Ok(PaceUnit::Mile),
        other => Err(format!("unknown pace unit '{}', expected km or mile", other)),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    LoggingConfig::from_env().verbose(cli.verbose).init()?;

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(session_file) = cli.session_file {
        config.garmin.session_file = session_file;
    }

    match cli.command {
        Some(Commands::Export(args)) => run_export(args, &config).await,
        Some(Commands::Analyze(args)) => run_analyze(args, &config).await,
        Some(Commands::Serve(args)) => run_serve(args, &config).await,
        None => run_export(cli.legacy, &config).await,
    }
}

async fn connect(config: &AppConfig) -> Result<GarminConnectClient> {
    let credentials = GarminCredentials::from_env()?;
    let mut client = GarminConnectClient::new(credentials, &config.garmin)
        .context("Failed to create Garmin client")?;
    client.login().await.context("Garmin login failed")?;
    Ok(client)
}

async fn run_export(args: ExportArgs, config: &AppConfig) -> Result<()> {
    let request = args.into_request(config);
    if request.limit == 0 {
        anyhow::bail!("--limit must be greater than zero");
    }

    let client = connect(config).await?;
    let outcome = pipeline::export(&client, &request).await?;

    println!(
        "Exported {} activities to {}",
        outcome.row_count,
        outcome.csv_path.display()
    );
    Ok(())
}

async fn run_analyze(args: AnalyzeArgs, config: &AppConfig) -> Result<()> {
    let request = AnalyzeRequest {
        activity_id: args.activity_id,
        fit_dir: args.fit_dir.unwrap_or_else(|| config.export.fit_dir.clone()),
        timeseries_csv: args
            .timeseries_csv
            .unwrap_or_else(|| config.export.timeseries_csv.clone()),
        pace_unit: args.pace_unit.unwrap_or(config.analysis.pace_unit),
    };

    let report = match args.fit_file {
        Some(path) => {
            info!(fit.file = %path.display(), "Analyzing local FIT file");
            let bytes = fs::read(&path)
                .with_context(|| format!("Failed to read FIT file {}", path.display()))?;
            let mut report = pipeline::analyze_bytes(&request, &bytes)?;
            report.fit_path = Some(path);
            report
        }
        None => {
            let client = connect(config).await?;
            pipeline::analyze(&client, &request).await?
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, request.pace_unit);
    }
    Ok(())
}

async fn run_serve(args: ServeArgs, config: &AppConfig) -> Result<()> {
    let port = args.port.unwrap_or(config.dashboard.port);
    let client = connect(config).await?;
    let state = DashboardState::new(
        Arc::new(client),
        config.export.clone(),
        config.analysis.pace_unit,
    );

    dashboard::serve(state, port).await;
    Ok(())
}

fn print_report(report: &AnalysisReport, pace_unit: PaceUnit) {
    let m: &PerformanceMetrics = &report.metrics;
    let pace_label = match pace_unit {
        PaceUnit::Kilometer => "s/km per bpm",
        PaceUnit::Mile => "s/mi per bpm",
    };

    println!("Activity {} ({} samples)", m.activity_id, report.sample_count);
    println!("  {:<22} {:.2} bpm", "Average HR", m.average_hr);
    println!("  {:<22} {} bpm", "Max HR", m.max_hr);
    println!("  {:<22} {:.2}", "HR drift", m.hr_drift);
    println!("  {:<22} {:.3} {}", "Pace / HR", m.pace_vs_hr_ratio, pace_label);
    println!("  {:<22} {:.2} / 100", "Cadence consistency", m.cadence_consistency);
    println!("  {:<22} {:.2} %", "Aerobic decoupling", m.aerobic_decoupling);
    if let Some(path) = &report.fit_path {
        println!("FIT file:    {}", path.display());
    }
    println!("Time-series: {}", report.timeseries_csv.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_legacy_flags_without_subcommand() {
        let cli = Cli::try_parse_from(["runstack", "--days", "7", "--include-fit"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.legacy.days, Some(7));
        assert!(cli.legacy.include_fit);

        let request = cli.legacy.into_request(&AppConfig::default());
        assert_eq!(request.days, 7);
        assert_eq!(request.limit, 50);
    }

    #[test]
    fn test_analyze_subcommand() {
        let cli = Cli::try_parse_from([
            "runstack",
            "analyze",
            "--activity-id",
            "123",
            "--json",
            "--pace-unit",
            "mile",
            "--session-file",
            "/tmp/s.json",
        ])
        .unwrap();

        assert_eq!(cli.session_file, Some(PathBuf::from("/tmp/s.json")));
        match cli.command {
            Some(Commands::Analyze(args)) => {
                assert_eq!(args.activity_id, 123);
                assert!(args.json);
                assert_eq!(args.pace_unit, Some(PaceUnit::Mile));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_pace_unit_parser() {
        assert_eq!(parse_pace_unit("KM"), Ok(PaceUnit::Kilometer));
        assert!(parse_pace_unit("furlong").is_err());
    }
}

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{Table, Tabled};

use zonetime::config::AppConfig;
use zonetime::export::{self, ExportFormat, ZoneReport};
use zonetime::logging::{init_logging, LogLevel};
use zonetime::models::{DateRange, SessionFilter};
use zonetime::source::FileHealthSource;
use zonetime::zones::ZoneClassifier;
use zonetime::SampleFetchCoordinator;

/// zonetime - Cardio Zone Time Analysis CLI
///
/// Aggregates heart rate data recorded during exercise sessions into
/// time-in-zone summaries over a date range.
#[derive(Parser)]
#[command(name = "zonetime")]
#[command(version = "0.1.0")]
#[command(about = "Cardio Zone Time Analysis CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show time-in-zone totals for a date range
    Summary {
        /// Health archive file (JSON or CSV)
        #[arg(short = 'i', long)]
        file: Option<PathBuf>,

        /// Date range start (YYYY-MM-DD)
        #[arg(short, long)]
        from: Option<String>,

        /// Date range end (YYYY-MM-DD)
        #[arg(short, long)]
        to: Option<String>,
    },

    /// List exercise sessions in a date range
    Sessions {
        /// Health archive file (JSON or CSV)
        #[arg(short = 'i', long)]
        file: Option<PathBuf>,

        /// Date range start (YYYY-MM-DD)
        #[arg(short, long)]
        from: Option<String>,

        /// Date range end (YYYY-MM-DD)
        #[arg(short, long)]
        to: Option<String>,
    },

    /// Export a zone report
    Export {
        /// Health archive file (JSON or CSV)
        #[arg(short = 'i', long)]
        file: Option<PathBuf>,

        /// Date range start (YYYY-MM-DD)
        #[arg(short, long)]
        from: Option<String>,

        /// Date range end (YYYY-MM-DD)
        #[arg(short, long)]
        to: Option<String>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (csv, json)
        #[arg(short = 'F', long, default_value = "csv")]
        format: String,
    },

    /// Show configuration
    Config {
        /// Print the configuration file path
        #[arg(short, long)]
        path: bool,
    },
}

#[derive(Tabled)]
struct ZoneRow {
    #[tabled(rename = "Zone")]
    zone: String,
    #[tabled(rename = "Heart Rate")]
    heart_rate: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Share")]
    share: String,
}

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "Activity")]
    activity: String,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Id")]
    id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut app_config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default(),
    };

    if cli.verbose > 0 {
        app_config.logging.level = match cli.verbose {
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        };
    }
    init_logging(&app_config.logging)?;

    match cli.command {
        Commands::Summary { file, from, to } => {
            let range = resolve_range(&app_config, from, to)?;
            let source = open_archive(&app_config, file)?;

            let coordinator = SampleFetchCoordinator::new(Arc::new(source));
            let cycle = coordinator.fetch(&range).await?;
            let report = ZoneReport::new(range, &cycle.aggregates, &SessionFilter::All);

            println!(
                "{}",
                format!("Time in zones, {}", range).green().bold()
            );
            let total = report.merged.total_seconds();
            let rows: Vec<ZoneRow> = report
                .merged
                .iter()
                .map(|(zone, seconds)| ZoneRow {
                    zone: zone.label().to_string(),
                    heart_rate: ZoneClassifier::bounds_label(zone),
                    time: report.merged.formatted(zone),
                    share: if total > 0.0 {
                        format!("{:.0}%", seconds / total * 100.0)
                    } else {
                        "-".to_string()
                    },
                })
                .collect();
            println!("{}", Table::new(rows));

            if !cycle.summary.is_fully_successful() {
                println!(
                    "{}",
                    format!(
                        "⚠ {} of {} sessions could not be read and contribute no time",
                        cycle.summary.failed_sessions, cycle.summary.total_sessions
                    )
                    .yellow()
                );
            }
        }

        Commands::Sessions { file, from, to } => {
            let range = resolve_range(&app_config, from, to)?;
            let source = open_archive(&app_config, file)?;

            let coordinator = SampleFetchCoordinator::new(Arc::new(source));
            let cycle = coordinator.fetch(&range).await?;

            println!("{}", format!("Sessions, {}", range).blue().bold());
            let rows: Vec<SessionRow> = cycle
                .aggregates
                .iter()
                .map(|aggregate| SessionRow {
                    activity: aggregate.session.activity_kind.to_string(),
                    start: aggregate.session.start.format("%Y-%m-%d %H:%M").to_string(),
                    duration: zonetime::models::format_seconds(
                        aggregate.session.duration().num_seconds() as f64,
                    ),
                    id: aggregate.session.id.to_string(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }

        Commands::Export { file, from, to, output, format } => {
            let range = resolve_range(&app_config, from, to)?;
            let source = open_archive(&app_config, file)?;

            let coordinator = SampleFetchCoordinator::new(Arc::new(source));
            let cycle = coordinator.fetch(&range).await?;
            let report = ZoneReport::new(range, &cycle.aggregates, &SessionFilter::All);

            match ExportFormat::from_str(&format)? {
                ExportFormat::Csv => export::csv::export_session_breakdown(&report, &output)?,
                ExportFormat::Json => export::json::export_zone_report(&report, &output)?,
            }
            println!(
                "{}",
                format!("✓ Exported zone report to {}", output.display()).green()
            );
        }

        Commands::Config { path } => {
            if path {
                println!("{}", AppConfig::default_config_path().display());
            } else {
                println!("{}", toml::to_string_pretty(&app_config)?);
            }
        }
    }

    Ok(())
}

fn resolve_range(
    config: &AppConfig,
    from: Option<String>,
    to: Option<String>,
) -> Result<DateRange> {
    let default = DateRange::trailing_days(config.settings.default_range_days);
    let start = match from {
        Some(s) => parse_date(&s)?,
        None => default.start,
    };
    let end = match to {
        Some(s) => parse_date(&s)?,
        None => default.end,
    };

    let range = DateRange::new(start, end);
    if !range.is_ordered() {
        bail!("range start {} is after end {}", range.start, range.end);
    }
    Ok(range)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date {:?}, expected YYYY-MM-DD", s))
}

fn open_archive(config: &AppConfig, file: Option<PathBuf>) -> Result<FileHealthSource> {
    let path = file
        .or_else(|| config.settings.archive_path.clone())
        .context("no health archive given; pass --file or set archive_path in the config")?;
    Ok(FileHealthSource::load(&path)?)
}

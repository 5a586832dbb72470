//! Impressions Calc - one-shot attribution from a request file
//!
//! Reads a calculation request (the same JSON accepted by
//! `POST /api/calculate`), runs the pipeline and writes the response JSON.
//!
//! Usage:
//!   impressions-calc --input request.json
//!   impressions-calc --input - --output out/report.json --intervals --pretty

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

use geofence_impressions::infra::Config;
use geofence_impressions::io::report::{read_input, render};
use geofence_impressions::io::{parse_request, ReportWriter};
use geofence_impressions::services::calculate;

/// Impressions Calc - attribute impressions for a request file
#[derive(Parser, Debug)]
#[command(name = "impressions-calc", version, about, long_about = None)]
struct Args {
    /// Request JSON file, or `-` for stdin
    #[arg(short, long)]
    input: String,

    /// Output file for the response JSON (stdout when omitted)
    #[arg(short, long)]
    output: Option<String>,

    /// Include per-interval detail regardless of the request options
    #[arg(long)]
    intervals: bool,

    /// Pretty-print the response JSON
    #[arg(long)]
    pretty: bool,

    /// Path to TOML configuration file
    ///
    /// Only the `[calculation]` section is used here.
    #[arg(short, long)]
    config: Option<String>,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean for the report
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let body = read_input(&args.input)?;
    let mut request = match parse_request(&body) {
        Ok(request) => request,
        Err(issues) => {
            for issue in &issues {
                error!(issue = %issue, "invalid_request");
            }
            bail!("{} validation issue(s) in {}", issues.len(), args.input);
        }
    };

    if args.intervals {
        let options = request.options.get_or_insert_with(Default::default);
        options.return_intervals = Some(true);
    }

    let calculation = calculate(&request, config.return_intervals_default())
        .with_context(|| format!("Calculation failed for {}", args.input))?;

    for warning in &calculation.warnings {
        warn!(route_id = %warning.route_id(), "{}", warning);
    }

    let summary = calculation.response.summary;
    info!(
        campaigns = %summary.campaign_count,
        routes = %summary.route_count,
        impressions = %summary.total_impressions,
        seconds_inside = %format!("{:.1}", summary.total_seconds_inside),
        "calculation_completed"
    );

    let rendered = render(&calculation.response, args.pretty)?;
    ReportWriter::new(args.output.as_deref()).write(&rendered)?;
    Ok(())
}

mod config;
mod fetcher;
mod metrics;
mod models;
mod normalizer;
mod pipeline;
mod report;
mod storage;
mod utils;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::metrics::RankMetric;
use crate::models::{NavDataset, REPORT_DATE_FORMAT};
use crate::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "nav-etl", about = "Mutual fund NAV history ETL and analytics", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Accepts `01-Jan-2020` (portal style) or `2020-01-01`.
fn parse_cli_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, REPORT_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| format!("invalid date {:?} (expected dd-Mon-yyyy or yyyy-mm-dd)", s))
}

#[derive(Subcommand)]
enum Command {
    /// Download one NAV history report per day into the raw log
    Fetch {
        /// First day (default: fetcher.start_date)
        #[arg(long, value_parser = parse_cli_date)]
        from: Option<NaiveDate>,

        /// Last day, inclusive (default: fetcher.end_date)
        #[arg(long, value_parser = parse_cli_date)]
        to: Option<NaiveDate>,

        /// Append to the existing raw log instead of starting over
        #[arg(long)]
        append: bool,
    },

    /// Parse the raw log into the scheme directory and compressed NAV series
    Normalize,

    /// Rank schemes by cumulative return or Sharpe ratio
    Top {
        #[arg(short, long, default_value = "returns")]
        metric: RankMetric,

        /// How many schemes to list (default: presenter.top_k)
        #[arg(short = 'k', long)]
        limit: Option<usize>,
    },

    /// Show one scheme's NAV history
    Trend {
        /// Scheme code
        #[arg(long, conflicts_with = "name", required_unless_present = "name")]
        code: Option<String>,

        /// Exact scheme name
        #[arg(long)]
        name: Option<String>,

        /// Only print the most recent N points
        #[arg(long)]
        last: Option<usize>,
    },

    /// Future value of a monthly SIP
    Sip {
        /// Monthly instalment (₹)
        #[arg(long, default_value_t = 1000.0)]
        amount: f64,

        /// Number of monthly instalments
        #[arg(long, default_value_t = 12)]
        months: u32,

        /// Expected annual return in percent
        #[arg(long, default_value_t = 12.0, allow_negative_numbers = true)]
        rate: f64,
    },

    /// Dataset totals plus both ranking tables
    Dashboard,

    /// Write one scheme's chronological NAV series as CSV
    Export {
        #[arg(long)]
        code: String,

        #[arg(short, long)]
        out: PathBuf,
    },

    /// Show dataset statistics
    Stats,
}

fn resolve_code<'a>(dataset: &'a NavDataset, code: Option<&'a str>, name: Option<&str>) -> Result<&'a str> {
    match (code, name) {
        (Some(code), _) => Ok(code),
        (None, Some(name)) => dataset
            .code_for_name(name)
            .with_context(|| format!("No scheme named {:?}", name)),
        (None, None) => anyhow::bail!("Pass --code or --name"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "nav_etl=info,warn",
        1 => "nav_etl=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let top_k = config.presenter.top_k;
    let fetch_defaults = (config.fetcher.start_date, config.fetcher.end_date);
    let pipeline = Pipeline::new(config);
    let mut out = io::stdout();

    match cli.command {
        Command::Fetch { from, to, append } => {
            let start = from.unwrap_or(fetch_defaults.0);
            let end = to.unwrap_or(fetch_defaults.1);
            if start > end {
                warn!("Start date {} is after end date {}; nothing to fetch", start, end);
            }
            let _t = utils::Timer::start("NAV report fetch");
            let stats = pipeline.fetch(start, end, append).await?;
            info!(
                "Done: {} days, {} written, {} errors",
                stats.days_requested, stats.days_written, stats.errors
            );
        }

        Command::Normalize => {
            let _t = utils::Timer::start("Normalize raw log");
            let (dataset, stats) = pipeline.normalize()?;
            info!(
                "Done: {} schemes, {} NAV points ({})",
                dataset.directory.len(),
                dataset.point_count(),
                stats
            );
        }

        Command::Top { metric, limit } => {
            let dataset = pipeline.load_dataset()?;
            let funds = metrics::top_funds(&dataset, metric, limit.unwrap_or(top_k));
            report::render_top(&mut out, metric, &funds)?;
        }

        Command::Trend { code, name, last } => {
            let dataset = pipeline.load_dataset()?;
            let code = resolve_code(&dataset, code.as_deref(), name.as_deref())?;
            let scheme_name = dataset.scheme_name(code).unwrap_or(code);
            let points = metrics::scheme_nav(&dataset, code)
                .map(metrics::chronological)
                .unwrap_or_default();
            report::render_trend(&mut out, code, scheme_name, &points, last)?;
        }

        Command::Sip { amount, months, rate } => {
            report::render_sip(&mut out, amount, months, rate)?;
        }

        Command::Dashboard => {
            let dataset = pipeline.load_dataset()?;
            report::render_dashboard(&mut out, &dataset, top_k)?;
        }

        Command::Export { code, out: path } => {
            let dataset = pipeline.load_dataset()?;
            let nav = metrics::scheme_nav(&dataset, &code)
                .with_context(|| format!("No NAV series for scheme {}", code))?;
            let points = metrics::chronological(nav);
            report::export_trend_csv(&path, &points)?;
            info!("Wrote {} points for {} to {:?}", points.len(), code, path);
        }

        Command::Stats => {
            let dataset = pipeline.load_dataset()?;
            report::render_stats(&mut out, &dataset)?;
        }
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cli_date() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        assert_eq!(parse_cli_date("31-Jan-2020"), Ok(d));
        assert_eq!(parse_cli_date("2020-01-31"), Ok(d));
        assert!(parse_cli_date("31/01/2020").is_err());
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["nav-etl", "-v", "top", "--metric", "sharpe", "-k", "3"]).unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(
            cli.command,
            Command::Top { metric: RankMetric::Sharpe, limit: Some(3) }
        ));

        let cli = Cli::try_parse_from(["nav-etl", "sip", "--rate", "-5"]).unwrap();
        assert!(matches!(cli.command, Command::Sip { months: 12, .. }));

        assert!(Cli::try_parse_from(["nav-etl", "trend"]).is_err());
        assert!(Cli::try_parse_from(["nav-etl", "trend", "--code", "1", "--name", "x"]).is_err());
    }

    #[test]
    fn test_resolve_code() {
        let (ds, _) = normalizer::normalize("100;Alpha;x;x;1;x;x;01-Jan-2020");
        assert_eq!(resolve_code(&ds, Some("9"), None).unwrap(), "9");
        assert_eq!(resolve_code(&ds, None, Some("Alpha")).unwrap(), "100");
        assert!(resolve_code(&ds, None, Some("Beta")).is_err());
    }
}

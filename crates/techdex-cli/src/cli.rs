//! CLI argument definitions for techdex.
//!
//! Every flag is optional: a bare `techdex` fetches the built-in eight
//! constituents over the trailing year, prints a summary, and opens the
//! chart window.
//!
//! # Examples
//!
//! ```bash
//! # Default run
//! techdex
//!
//! # Six months, rebased to 1000, exported with constituent columns, no window
//! techdex --days 182 --rebase 1000 --csv tech8.csv --csv-constituents --no-chart
//!
//! # Custom weights, union calendar, JSON summary
//! techdex --weights weights.json --align union --format json --pretty
//!
//! # Capitalization-weighted, opening at 1000
//! techdex --weighting market-cap
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Composite tech-stock index: fetch, weight, chart, export.
#[derive(Debug, Parser)]
#[command(
    name = "techdex",
    author,
    version,
    about = "Weighted composite index over eight technology equities",
    long_about = "techdex fetches daily closing prices from Yahoo Finance for a fixed set of \
technology equities, combines them into a weighted composite index, prints a summary, \
and renders the series in a chart window.\n\
\n\
Weights default to a built-in table and can be replaced with a JSON file, \
or derived from market capitalization with --weighting market-cap."
)]
pub struct Cli {
    /// First date to include (YYYY-MM-DD). Defaults to --days before --end.
    #[arg(long)]
    pub start: Option<String>,

    /// Date to stop before (YYYY-MM-DD). Defaults to tomorrow (UTC).
    #[arg(long)]
    pub end: Option<String>,

    /// Lookback window in calendar days when --start is not given.
    #[arg(long, default_value_t = 365)]
    pub days: u32,

    /// Bar interval: 1d, 1wk or 1mo.
    #[arg(long, default_value = "1d")]
    pub interval: String,

    /// JSON weights file, e.g. {"AAPL": 0.5, "MSFT": 0.5}.
    #[arg(long)]
    pub weights: Option<PathBuf>,

    /// How to weight constituents: static (table as given) or market-cap
    /// (shares outstanding from Yahoo, index opens at 1000).
    #[arg(long, default_value = "static")]
    pub weighting: String,

    /// How to reconcile trading calendars: intersection or union.
    #[arg(long, default_value = "intersection")]
    pub align: String,

    /// Use split/dividend adjusted closes.
    #[arg(long, default_value_t = false)]
    pub adjusted: bool,

    /// Rebase the index so its first value equals this number.
    #[arg(long)]
    pub rebase: Option<f64>,

    /// Write the index series to this CSV file.
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Add one close column per constituent to the CSV.
    #[arg(long, default_value_t = false, requires = "csv")]
    pub csv_constituents: bool,

    /// Plot each constituent's weighted contribution alongside the index.
    #[arg(long, default_value_t = false)]
    pub constituents: bool,

    /// Skip the chart window.
    #[arg(long, default_value_t = false)]
    pub no_chart: bool,

    /// Summary format printed to stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = techdex_core::http_client::DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text table.
    Table,
    /// Single JSON object.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_uses_fixed_defaults() {
        let cli = Cli::try_parse_from(["techdex"]).expect("no flags is valid");
        assert_eq!(cli.days, 365);
        assert_eq!(cli.interval, "1d");
        assert_eq!(cli.align, "intersection");
        assert_eq!(cli.weighting, "static");
        assert_eq!(cli.format, OutputFormat::Table);
        assert!(cli.csv.is_none());
        assert!(!cli.no_chart);
    }

    #[test]
    fn csv_constituents_requires_csv_path() {
        let err = Cli::try_parse_from(["techdex", "--csv-constituents"]).expect_err("must fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}

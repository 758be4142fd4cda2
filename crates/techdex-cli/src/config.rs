//! Resolution of CLI flags into a validated run configuration.

use std::path::PathBuf;
use std::str::FromStr;

use techdex_core::{
    Alignment, DateRange, HistoryRequest, Interval, PriceField, Symbol, TradingDate, WeightTable,
    Weighting,
};

use crate::cli::{Cli, OutputFormat};
use crate::error::CliError;

/// Where and how to write the CSV artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTarget {
    pub path: PathBuf,
    pub include_constituents: bool,
}

/// Fully validated settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub range: DateRange,
    pub interval: Interval,
    pub field: PriceField,
    /// Constituents, and their weights under [`Weighting::Static`].
    pub weights: WeightTable,
    pub weighting: Weighting,
    pub alignment: Alignment,
    pub rebase: Option<f64>,
    pub timeout_ms: u64,
    pub csv: Option<CsvTarget>,
    pub chart: bool,
    pub chart_constituents: bool,
    pub format: OutputFormat,
    pub pretty: bool,
}

impl RunConfig {
    /// Resolve `cli` relative to `today` (UTC).
    pub fn from_cli(cli: &Cli, today: TradingDate) -> Result<Self, CliError> {
        let end = match &cli.end {
            Some(raw) => TradingDate::parse(raw)?,
            // The range end is exclusive, so step past today to include it.
            None => today.checked_add_days(1).unwrap_or(today),
        };
        let range = match &cli.start {
            Some(raw) => DateRange::new(TradingDate::parse(raw)?, end)?,
            None => DateRange::trailing_days(end, cli.days)?,
        };

        let weights = match &cli.weights {
            Some(path) => WeightTable::from_json_file(path).map_err(CliError::Weights)?,
            None => WeightTable::default(),
        };

        Ok(Self {
            range,
            interval: Interval::from_str(&cli.interval)?,
            field: if cli.adjusted {
                PriceField::AdjClose
            } else {
                PriceField::Close
            },
            weights,
            weighting: Weighting::from_str(&cli.weighting)?,
            alignment: Alignment::from_str(&cli.align)?,
            rebase: cli.rebase,
            timeout_ms: cli.timeout_ms,
            csv: cli.csv.clone().map(|path| CsvTarget {
                path,
                include_constituents: cli.csv_constituents,
            }),
            chart: !cli.no_chart,
            chart_constituents: cli.constituents,
            format: cli.format,
            pretty: cli.pretty,
        })
    }

    /// Constituents to fetch, in weight-table order.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.weights.symbols().cloned().collect()
    }

    /// Request shape shared by every constituent fetch.
    pub fn history_template(&self, symbol: Symbol) -> HistoryRequest {
        HistoryRequest::new(symbol, self.range, self.interval).with_field(self.field)
    }
}

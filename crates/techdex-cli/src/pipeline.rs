//! Fetch, combine, and export: one techdex run up to the point of display.

use std::time::Instant;

use serde::Serialize;
use tracing::info;

use techdex_core::{
    compute_index, fetch_all, fetch_share_counts, market_cap_weights, snapshots,
    ConstituentSnapshot, Contribution, CsvExport, DateRange, IndexPoint, IndexSeries, PriceSource,
    Weighting, YahooAdapter, INDEX_NAME, MARKET_CAP_BASE,
};

use crate::config::RunConfig;
use crate::error::CliError;

/// Everything the summary and the chart window need from a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub name: &'static str,
    pub source: &'static str,
    pub range: DateRange,
    pub weighting: Weighting,
    pub index: IndexSeries,
    pub contributions: Vec<Contribution>,
    pub snapshots: Vec<ConstituentSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_rows: Option<usize>,
    pub latency_ms: u64,
}

/// Run against Yahoo Finance.
pub async fn run(config: &RunConfig) -> Result<RunOutcome, CliError> {
    let adapter = YahooAdapter::default().with_timeout_ms(config.timeout_ms);
    run_with_source(&adapter, config).await
}

pub async fn run_with_source(
    source: &dyn PriceSource,
    config: &RunConfig,
) -> Result<RunOutcome, CliError> {
    let started = Instant::now();
    let symbols = config.symbols();
    let Some(first) = symbols.first().cloned() else {
        return Err(techdex_core::ValidationError::EmptyWeightTable.into());
    };

    info!(
        source = source.id(),
        constituents = symbols.len(),
        start = %config.range.start(),
        end = %config.range.end(),
        interval = %config.interval,
        "fetching constituent history"
    );
    let series = fetch_all(source, &symbols, &config.history_template(first)).await?;

    let weights = match config.weighting {
        Weighting::Static => config.weights.clone(),
        Weighting::MarketCap => {
            let shares = fetch_share_counts(source, &symbols).await?;
            market_cap_weights(&series, &shares, config.alignment, MARKET_CAP_BASE)?
        }
    };

    let raw = compute_index(&series, &weights, config.alignment);
    let mut contributions = raw.contributions(&series, &weights);
    let index = match config.rebase {
        Some(base) => {
            let rebased = raw.rebased(base)?;
            if let Some(factor) = scale_factor(&raw, &rebased) {
                rescale(&mut contributions, factor);
            }
            rebased
        }
        None => raw,
    };
    info!(
        points = index.len(),
        excluded = index.excluded().len(),
        alignment = %index.alignment(),
        weighting = %config.weighting,
        "computed composite index"
    );

    let csv_rows = match &config.csv {
        Some(target) => {
            let export = CsvExport::new(&index);
            let export = if target.include_constituents {
                export.with_constituents(&series)
            } else {
                export
            };
            let rows = export.write_to_path(&target.path)?;
            info!(path = %target.path.display(), rows, "wrote index csv");
            Some(rows)
        }
        None => None,
    };

    Ok(RunOutcome {
        name: INDEX_NAME,
        source: source.id(),
        range: config.range,
        weighting: config.weighting,
        snapshots: snapshots(&series),
        index,
        contributions,
        csv_rows,
        latency_ms: started.elapsed().as_millis() as u64,
    })
}

fn scale_factor(raw: &IndexSeries, rebased: &IndexSeries) -> Option<f64> {
    let before = raw.points().first()?.value;
    let after = rebased.points().first()?.value;
    (before != 0.0).then(|| after / before)
}

fn rescale(contributions: &mut [Contribution], factor: f64) {
    for contribution in contributions {
        for point in &mut contribution.points {
            *point = IndexPoint {
                date: point.date,
                value: point.value * factor,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use clap::Parser;
    use techdex_core::{
        HistoryRequest, PricePoint, PriceSeries, ShareCount, SourceError, Symbol, TradingDate,
        ValidationError, WeightTable,
    };

    use super::*;
    use crate::cli::Cli;

    struct FixtureSource {
        series: Vec<PriceSeries>,
        shares: Vec<ShareCount>,
        fail_on: Option<Symbol>,
        requests: Mutex<Vec<HistoryRequest>>,
    }

    impl FixtureSource {
        fn new(series: Vec<PriceSeries>) -> Self {
            Self {
                series,
                shares: Vec::new(),
                fail_on: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn with_shares(mut self, shares: &[(&str, f64)]) -> Self {
            self.shares = shares
                .iter()
                .map(|(ticker, count)| {
                    ShareCount::new(Symbol::parse(ticker).expect("symbol"), *count, false)
                        .expect("share count")
                })
                .collect();
            self
        }

        fn failing_on(mut self, ticker: &str) -> Self {
            self.fail_on = Some(Symbol::parse(ticker).expect("symbol"));
            self
        }
    }

    impl PriceSource for FixtureSource {
        fn id(&self) -> &'static str {
            "fixture"
        }

        fn history<'a>(
            &'a self,
            request: HistoryRequest,
        ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, SourceError>> + Send + 'a>> {
            Box::pin(async move {
                if self.fail_on.as_ref() == Some(&request.symbol) {
                    return Err(SourceError::unavailable("connection reset").for_symbol(&request.symbol));
                }
                let found = self
                    .series
                    .iter()
                    .find(|series| series.symbol() == &request.symbol)
                    .cloned()
                    .unwrap_or_else(|| PriceSeries::empty(request.symbol.clone()));
                self.requests.lock().expect("lock").push(request);
                Ok(found)
            })
        }

        fn shares_outstanding<'a>(
            &'a self,
            symbol: Symbol,
        ) -> Pin<Box<dyn Future<Output = Result<ShareCount, SourceError>> + Send + 'a>> {
            Box::pin(async move {
                self.shares
                    .iter()
                    .find(|count| count.symbol == symbol)
                    .cloned()
                    .ok_or_else(|| SourceError::invalid_request("no share count").for_symbol(&symbol))
            })
        }
    }

    fn series(ticker: &str, closes: &[(&str, f64)]) -> PriceSeries {
        let points = closes
            .iter()
            .map(|(raw, close)| {
                PricePoint::new(TradingDate::parse(raw).expect("date"), *close).expect("point")
            })
            .collect();
        PriceSeries::new(Symbol::parse(ticker).expect("symbol"), points)
    }

    fn config(args: &[&str]) -> RunConfig {
        let mut argv = vec!["techdex", "--start", "2024-01-01", "--end", "2024-01-10"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).expect("arguments");
        let mut config =
            RunConfig::from_cli(&cli, TradingDate::parse("2024-01-10").expect("date")).expect("config");
        config.weights =
            WeightTable::from_pairs([("AAA", 1.0), ("BBB", 2.0)]).expect("valid weights");
        config
    }

    fn fixture() -> FixtureSource {
        FixtureSource::new(vec![
            series("AAA", &[("2024-01-02", 10.0), ("2024-01-03", 12.0)]),
            series("BBB", &[("2024-01-02", 5.0), ("2024-01-03", 4.0)]),
        ])
    }

    #[tokio::test]
    async fn run_fetches_each_constituent_and_combines() {
        let source = fixture();
        let outcome = run_with_source(&source, &config(&[]))
            .await
            .expect("run succeeds");

        let requested: Vec<String> = source
            .requests
            .lock()
            .expect("lock")
            .iter()
            .map(|request| request.symbol.to_string())
            .collect();
        assert_eq!(requested, vec!["AAA", "BBB"]);

        let values: Vec<f64> = outcome.index.points().iter().map(|p| p.value).collect();
        assert_eq!(values, vec![20.0, 20.0]);
        assert_eq!(outcome.snapshots.len(), 2);
        assert_eq!(outcome.contributions.len(), 2);
        assert_eq!(outcome.csv_rows, None);
    }

    #[tokio::test]
    async fn rebase_scales_index_and_contributions_together() {
        let source = fixture();
        let outcome = run_with_source(&source, &config(&["--rebase", "1000"]))
            .await
            .expect("run succeeds");

        assert_eq!(outcome.index.points()[0].value, 1000.0);
        let first_day: f64 = outcome
            .contributions
            .iter()
            .map(|contribution| contribution.points[0].value)
            .sum();
        assert!((first_day - 1000.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn csv_target_is_written() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("index.csv");
        let path_arg = path.to_string_lossy().into_owned();
        let source = fixture();

        let outcome = run_with_source(
            &source,
            &config(&["--csv", &path_arg, "--csv-constituents"]),
        )
        .await
        .expect("run succeeds");

        assert_eq!(outcome.csv_rows, Some(2));
        let body = std::fs::read_to_string(&path).expect("csv written");
        assert_eq!(body.lines().next(), Some("date,index,AAA,BBB"));
    }

    #[tokio::test]
    async fn failing_source_aborts_with_source_exit_code() {
        let source = fixture().failing_on("BBB");

        let err = run_with_source(&source, &config(&[]))
            .await
            .expect_err("BBB fails");

        assert!(matches!(&err, CliError::Source(inner) if inner.symbol().map(Symbol::as_str) == Some("BBB")));
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn market_cap_weighting_opens_at_one_thousand() {
        // Caps on 2024-01-02: AAA 100 × 10, BBB 200 × 5, so 2000 in total.
        let source = fixture().with_shares(&[("AAA", 100.0), ("BBB", 200.0)]);

        let outcome = run_with_source(&source, &config(&["--weighting", "market-cap"]))
            .await
            .expect("run succeeds");

        let values: Vec<f64> = outcome.index.points().iter().map(|p| p.value).collect();
        assert_eq!(outcome.weighting, Weighting::MarketCap);
        assert!((values[0] - 1000.0).abs() < 1e-9);
        // 2024-01-03: (100 × 12 + 200 × 4) / 2000 × 1000
        assert!((values[1] - 1000.0).abs() < 1e-9);
        assert_eq!(outcome.contributions[0].weight, 50.0);
    }

    #[tokio::test]
    async fn missing_share_count_is_a_source_error() {
        let source = fixture().with_shares(&[("AAA", 100.0)]);

        let err = run_with_source(&source, &config(&["--weighting", "market-cap"]))
            .await
            .expect_err("BBB has no share count");

        assert!(matches!(err, CliError::Source(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn rebasing_a_zero_anchor_is_rejected() {
        let source = FixtureSource::new(vec![
            series("AAA", &[("2024-01-02", 0.0)]),
            series("BBB", &[("2024-01-02", 0.0)]),
        ]);
        let err = run_with_source(&source, &config(&["--rebase", "100"]))
            .await
            .expect_err("zero anchor");
        assert!(matches!(
            err,
            CliError::Validation(ValidationError::ZeroRebaseAnchor)
        ));
    }
}

use std::io::{self, Write};

use techdex_core::Tick;

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::pipeline::RunOutcome;

pub fn render(outcome: &RunOutcome, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Json => write_json(&mut out, outcome, pretty),
        OutputFormat::Table => write_table(&mut out, outcome),
    }
}

fn write_json<W: Write>(out: &mut W, outcome: &RunOutcome, pretty: bool) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(outcome)?
    } else {
        serde_json::to_string(outcome)?
    };
    writeln!(out, "{payload}")?;
    Ok(())
}

fn write_table<W: Write>(out: &mut W, outcome: &RunOutcome) -> Result<(), CliError> {
    let index = &outcome.index;

    writeln!(out, "index       : {}", outcome.name)?;
    writeln!(out, "source      : {}", outcome.source)?;
    writeln!(
        out,
        "range       : {} .. {}",
        outcome.range.start(),
        outcome.range.end()
    )?;
    writeln!(out, "weighting   : {}", outcome.weighting)?;
    writeln!(out, "alignment   : {}", index.alignment())?;
    writeln!(
        out,
        "constituents: {}",
        index
            .constituents()
            .iter()
            .map(|symbol| symbol.as_str())
            .collect::<Vec<_>>()
            .join(",")
    )?;
    writeln!(out, "latency_ms  : {}", outcome.latency_ms)?;
    if let Some(rows) = outcome.csv_rows {
        writeln!(out, "csv_rows    : {rows}")?;
    }

    match index.summary() {
        Some(summary) => {
            writeln!(out, "points      : {}", summary.points)?;
            writeln!(
                out,
                "first       : {} {:.2}",
                summary.first.date, summary.first.value
            )?;
            writeln!(
                out,
                "last        : {} {:.2}",
                summary.last.date, summary.last.value
            )?;
            writeln!(out, "range_low   : {:.2}", summary.min)?;
            writeln!(out, "range_high  : {:.2}", summary.max)?;
            writeln!(out, "change      : {:+.2}%", summary.change_pct)?;
        }
        None => writeln!(out, "points      : 0 (no overlapping history)")?,
    }

    if !index.excluded().is_empty() {
        writeln!(out, "excluded:")?;
        for exclusion in index.excluded() {
            writeln!(out, "  - {}: {:?}", exclusion.symbol, exclusion.reason)?;
        }
    }

    if !outcome.snapshots.is_empty() {
        writeln!(out, "constituents:")?;
        writeln!(
            out,
            "  {:<8} {:<10} {:>12} {:>9}",
            "symbol", "as_of", "close", "change"
        )?;
        for snapshot in &outcome.snapshots {
            writeln!(
                out,
                "  {:<8} {:<10} {:>12.2} {:>8.2}% {}",
                snapshot.symbol.as_str(),
                snapshot.as_of.format_iso(),
                snapshot.last_close,
                snapshot.change_pct,
                tick_marker(snapshot.tick)
            )?;
        }
    }

    Ok(())
}

fn tick_marker(tick: Tick) -> &'static str {
    match tick {
        Tick::Up => "▲",
        Tick::Down => "▼",
        Tick::Flat => "-",
    }
}

#[cfg(test)]
mod tests {
    use techdex_core::{
        compute_index, snapshots, Alignment, DateRange, PricePoint, PriceSeries, Symbol,
        TradingDate, WeightTable, Weighting, INDEX_NAME,
    };

    use super::*;

    fn date(raw: &str) -> TradingDate {
        TradingDate::parse(raw).expect("valid date")
    }

    fn outcome() -> RunOutcome {
        let series = vec![
            PriceSeries::new(
                Symbol::parse("AAA").expect("symbol"),
                vec![
                    PricePoint::new(date("2024-01-02"), 10.0).expect("point"),
                    PricePoint::new(date("2024-01-03"), 11.0).expect("point"),
                ],
            ),
            PriceSeries::empty(Symbol::parse("BBB").expect("symbol")),
        ];
        let weights = WeightTable::from_pairs([("AAA", 1.0), ("BBB", 1.0)]).expect("weights");
        let index = compute_index(&series, &weights, Alignment::Intersection);

        RunOutcome {
            name: INDEX_NAME,
            source: "fixture",
            range: DateRange::new(date("2024-01-01"), date("2024-01-05")).expect("range"),
            weighting: Weighting::Static,
            contributions: index.contributions(&series, &weights),
            snapshots: snapshots(&series),
            index,
            csv_rows: None,
            latency_ms: 7,
        }
    }

    #[test]
    fn table_lists_summary_exclusions_and_snapshots() {
        let mut buffer = Vec::new();
        write_table(&mut buffer, &outcome()).expect("render");
        let text = String::from_utf8(buffer).expect("utf8");

        assert!(text.contains("index       : Tech8 Composite"));
        assert!(text.contains("range       : 2024-01-01 .. 2024-01-05"));
        assert!(text.contains("weighting   : static"));
        assert!(text.contains("change      : +10.00%"));
        assert!(text.contains("  - BBB: EmptyHistory"));
        assert!(text.contains("AAA      2024-01-03        11.00    10.00% ▲"));
    }

    #[test]
    fn json_is_a_single_object() {
        let mut buffer = Vec::new();
        write_json(&mut buffer, &outcome(), false).expect("render");
        let value: serde_json::Value = serde_json::from_slice(&buffer).expect("valid json");

        assert_eq!(value["name"], "Tech8 Composite");
        assert_eq!(value["index"]["alignment"], "intersection");
        assert_eq!(value["weighting"], "static");
        assert_eq!(value["index"]["excluded"][0]["reason"], "empty_history");
        assert_eq!(value["snapshots"][0]["tick"], "up");
    }
}

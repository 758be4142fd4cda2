//! Latest-session view of each constituent.

use serde::{Deserialize, Serialize};

use crate::{PriceSeries, Symbol, TradingDate};

/// Direction of the most recent price move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tick {
    Up,
    Down,
    Flat,
}

/// Last close of a constituent against the session before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstituentSnapshot {
    pub symbol: Symbol,
    pub as_of: TradingDate,
    pub last_close: f64,
    pub previous_close: f64,
    pub change_pct: f64,
    pub tick: Tick,
}

impl ConstituentSnapshot {
    /// Snapshot from the last two closes of `series`; `None` when empty.
    ///
    /// A single-point series compares the close against itself.
    pub fn from_series(series: &PriceSeries) -> Option<Self> {
        let points = series.points();
        let last = points.last()?;
        let previous = points.len().checked_sub(2).map_or(last, |i| &points[i]);

        let change_pct = if previous.close == 0.0 {
            0.0
        } else {
            (last.close - previous.close) / previous.close * 100.0
        };
        let tick = if last.close > previous.close {
            Tick::Up
        } else if last.close < previous.close {
            Tick::Down
        } else {
            Tick::Flat
        };

        Some(Self {
            symbol: series.symbol().clone(),
            as_of: last.date,
            last_close: last.close,
            previous_close: previous.close,
            change_pct,
            tick,
        })
    }
}

/// Snapshots for every non-empty series, in input order.
pub fn snapshots(series: &[PriceSeries]) -> Vec<ConstituentSnapshot> {
    series.iter().filter_map(ConstituentSnapshot::from_series).collect()
}

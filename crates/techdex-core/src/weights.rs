//! Constituent weights: the built-in static table and market-cap weights.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CoreError, ShareCount, Symbol, TradingDate, ValidationError};

/// Display name of the built-in composite.
pub const INDEX_NAME: &str = "Tech8 Composite";

/// Built-in constituents and their weights, in display order.
pub const DEFAULT_WEIGHTS: [(&str, f64); 8] = [
    ("NVDA", 0.20),
    ("MSFT", 0.18),
    ("AAPL", 0.16),
    ("GOOGL", 0.12),
    ("AMZN", 0.12),
    ("META", 0.10),
    ("AVGO", 0.07),
    ("TSLA", 0.05),
];

/// Value a market-cap weighted index opens at.
pub const MARKET_CAP_BASE: f64 = 1000.0;

/// How constituent weights are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Weighting {
    /// Weights taken as given from the table.
    #[default]
    Static,
    /// Weights proportional to shares outstanding, scaled to open at
    /// [`MARKET_CAP_BASE`].
    MarketCap,
}

impl Weighting {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::MarketCap => "market-cap",
        }
    }
}

impl Display for Weighting {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Weighting {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "static" | "fixed" => Ok(Self::Static),
            "market-cap" | "marketcap" | "market_cap" | "mcap" => Ok(Self::MarketCap),
            other => Err(ValidationError::InvalidWeighting {
                value: other.to_owned(),
            }),
        }
    }
}

/// Ordered mapping from constituent to a non-negative weight.
///
/// Weights are not required to sum to one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightTable {
    entries: Vec<(Symbol, f64)>,
}

impl WeightTable {
    pub fn new(entries: Vec<(Symbol, f64)>) -> Result<Self, ValidationError> {
        if entries.is_empty() {
            return Err(ValidationError::EmptyWeightTable);
        }

        for (index, (symbol, weight)) in entries.iter().enumerate() {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ValidationError::InvalidWeight {
                    symbol: symbol.to_string(),
                    value: *weight,
                });
            }
            if entries[..index].iter().any(|(seen, _)| seen == symbol) {
                return Err(ValidationError::DuplicateWeight {
                    symbol: symbol.to_string(),
                });
            }
        }

        Ok(Self { entries })
    }

    /// Parse `(ticker, weight)` pairs.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let entries = pairs
            .into_iter()
            .map(|(raw, weight)| Symbol::parse(raw).map(|symbol| (symbol, weight)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(entries)
    }

    /// Parse a JSON object such as `{"AAPL": 0.5, "MSFT": 0.5}`.
    ///
    /// Constituents come back in ticker order since JSON objects carry no
    /// reliable ordering.
    pub fn from_json(body: &str) -> Result<Self, CoreError> {
        let raw: BTreeMap<String, f64> = serde_json::from_str(body)?;
        let entries = raw
            .into_iter()
            .map(|(ticker, weight)| Symbol::parse(&ticker).map(|symbol| (symbol, weight)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(entries)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CoreError> {
        let body = std::fs::read_to_string(path)?;
        Self::from_json(&body)
    }

    /// Market-cap weights: `shares[s] × base / Σ shares × close`.
    ///
    /// The sum runs over the `anchor_closes` that have a share count, so an
    /// index built from these weights equals `base` on the anchor date.
    /// Every share count gets a weight, including symbols that did not trade
    /// on the anchor date. `anchor_date` only labels the error.
    pub fn from_market_caps(
        shares: &[ShareCount],
        anchor_closes: &[(Symbol, f64)],
        anchor_date: TradingDate,
        base: f64,
    ) -> Result<Self, ValidationError> {
        if !base.is_finite() || base <= 0.0 {
            return Err(ValidationError::InvalidRebaseBase { value: base });
        }

        let base_cap: f64 = anchor_closes
            .iter()
            .filter_map(|(symbol, close)| {
                shares
                    .iter()
                    .find(|count| &count.symbol == symbol)
                    .map(|count| count.shares * close)
            })
            .sum();
        if !base_cap.is_finite() || base_cap <= 0.0 {
            return Err(ValidationError::ZeroMarketCap {
                date: anchor_date.to_string(),
            });
        }

        Self::new(
            shares
                .iter()
                .map(|count| (count.symbol.clone(), count.shares * base / base_cap))
                .collect(),
        )
    }

    /// Weight of `symbol`, or zero when it is not a constituent.
    pub fn weight(&self, symbol: &Symbol) -> f64 {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == symbol)
            .map(|(_, weight)| *weight)
            .unwrap_or(0.0)
    }

    /// Copy of this table with `symbol` set to `weight`, appended when absent.
    pub fn with_weight(&self, symbol: Symbol, weight: f64) -> Result<Self, ValidationError> {
        let mut entries = self.entries.clone();
        match entries.iter_mut().find(|(candidate, _)| *candidate == symbol) {
            Some(entry) => entry.1 = weight,
            None => entries.push((symbol, weight)),
        }
        Self::new(entries)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.entries.iter().map(|(symbol, _)| symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, f64)> + '_ {
        self.entries.iter().map(|(symbol, weight)| (symbol, *weight))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, weight)| weight).sum()
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        let entries = DEFAULT_WEIGHTS
            .iter()
            .filter_map(|(ticker, weight)| Symbol::parse(ticker).ok().map(|s| (s, *weight)))
            .collect();
        Self { entries }
    }
}

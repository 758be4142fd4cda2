//! Composite index calculation.
//!
//! The composite value on a date is `Σ weight[s] × close[s][date]` over the
//! constituents that contribute on that date. Which dates appear, and which
//! constituents contribute, is decided by [`Alignment`]:
//!
//! | Alignment | Dates kept | Value |
//! |-----------|------------|-------|
//! | `Intersection` | every participating constituent traded | full weighted sum |
//! | `Union` | at least one participating constituent traded | sum over those present |
//!
//! A constituent participates when its weight is strictly positive and its
//! series is non-empty. Zero-weight constituents are dropped before
//! alignment, so they influence neither the values nor the calendar.
//!
//! [`market_cap_weights`] derives a table from share counts so that the
//! first aligned value equals a chosen base, the classic capitalization
//! index construction.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{PriceSeries, ShareCount, Symbol, TradingDate, ValidationError, WeightTable};

/// Policy for reconciling constituent calendars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    Intersection,
    Union,
}

impl Alignment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Intersection => "intersection",
            Self::Union => "union",
        }
    }
}

impl Display for Alignment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Alignment {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "intersection" | "inner" => Ok(Self::Intersection),
            "union" | "outer" => Ok(Self::Union),
            other => Err(ValidationError::InvalidAlignment {
                value: other.to_owned(),
            }),
        }
    }
}

/// Why a weighted constituent did not contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// The source returned no closes in the requested window.
    EmptyHistory,
    /// No series was supplied for the symbol at all.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    pub symbol: Symbol,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexPoint {
    pub date: TradingDate,
    pub value: f64,
}

/// Composite series plus the bookkeeping needed to explain it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSeries {
    points: Vec<IndexPoint>,
    constituents: Vec<Symbol>,
    alignment: Alignment,
    excluded: Vec<Exclusion>,
}

/// Headline numbers for a non-empty index series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub first: IndexPoint,
    pub last: IndexPoint,
    pub min: f64,
    pub max: f64,
    pub change_pct: f64,
    pub points: usize,
}

/// One constituent's weighted share of the index, on the index's dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub symbol: Symbol,
    pub weight: f64,
    pub points: Vec<IndexPoint>,
}

/// Combine constituent series into a composite with static weights.
pub fn compute_index(
    series: &[PriceSeries],
    weights: &WeightTable,
    alignment: Alignment,
) -> IndexSeries {
    let (participants, excluded) = select_participants(series, weights);
    for exclusion in &excluded {
        match exclusion.reason {
            ExclusionReason::EmptyHistory => {
                warn!(symbol = %exclusion.symbol, "excluding constituent with empty price history");
            }
            ExclusionReason::Missing => {
                warn!(symbol = %exclusion.symbol, "excluding constituent with no price series");
            }
        }
    }

    IndexSeries {
        points: weighted_points(&participants, alignment),
        constituents: participants
            .iter()
            .map(|(constituent, _)| constituent.symbol().clone())
            .collect(),
        alignment,
        excluded,
    }
}

/// Market-cap weights for `series`, scaled so that [`compute_index`] with
/// the same `alignment` opens at `base`.
///
/// The anchor is the first date `alignment` keeps when constituents are
/// weighted by share count. When nothing trades in the window there is no
/// anchor and the share counts themselves are returned as weights.
pub fn market_cap_weights(
    series: &[PriceSeries],
    shares: &[ShareCount],
    alignment: Alignment,
    base: f64,
) -> Result<WeightTable, ValidationError> {
    let by_shares = WeightTable::new(
        shares
            .iter()
            .map(|count| (count.symbol.clone(), count.shares))
            .collect(),
    )?;
    let (participants, _) = select_participants(series, &by_shares);
    let Some(anchor) = weighted_points(&participants, alignment)
        .first()
        .map(|point| point.date)
    else {
        return Ok(by_shares);
    };

    let anchor_closes: Vec<(Symbol, f64)> = participants
        .iter()
        .filter_map(|(constituent, _)| {
            constituent
                .close_on(anchor)
                .map(|close| (constituent.symbol().clone(), close))
        })
        .collect();
    WeightTable::from_market_caps(shares, &anchor_closes, anchor, base)
}

/// Split weighted constituents into those with history and those without.
fn select_participants<'s>(
    series: &'s [PriceSeries],
    weights: &WeightTable,
) -> (Vec<(&'s PriceSeries, f64)>, Vec<Exclusion>) {
    let mut participants = Vec::new();
    let mut excluded = Vec::new();

    for (symbol, weight) in weights.iter() {
        if weight <= 0.0 {
            continue;
        }
        match series.iter().find(|candidate| candidate.symbol() == symbol) {
            Some(found) if !found.is_empty() => participants.push((found, weight)),
            Some(_) => excluded.push(Exclusion {
                symbol: symbol.clone(),
                reason: ExclusionReason::EmptyHistory,
            }),
            None => excluded.push(Exclusion {
                symbol: symbol.clone(),
                reason: ExclusionReason::Missing,
            }),
        }
    }

    (participants, excluded)
}

fn weighted_points(participants: &[(&PriceSeries, f64)], alignment: Alignment) -> Vec<IndexPoint> {
    let calendar: BTreeSet<TradingDate> = participants
        .iter()
        .flat_map(|(constituent, _)| constituent.dates())
        .collect();

    calendar
        .into_iter()
        .filter_map(|date| {
            let mut value = 0.0;
            let mut present = 0;
            for (constituent, weight) in participants {
                if let Some(close) = constituent.close_on(date) {
                    value += weight * close;
                    present += 1;
                }
            }

            let keep = match alignment {
                Alignment::Intersection => present == participants.len(),
                Alignment::Union => present > 0,
            };
            keep.then_some(IndexPoint { date, value })
        })
        .collect()
}

impl IndexSeries {
    /// Build a series from already-computed points, e.g. read back from CSV.
    ///
    /// Points may come in any order. When two points share a date the later
    /// one in `points` wins, as in [`PriceSeries::new`].
    pub fn from_points(points: Vec<IndexPoint>) -> Self {
        let by_date: BTreeMap<TradingDate, f64> = points
            .into_iter()
            .map(|point| (point.date, point.value))
            .collect();
        Self {
            points: by_date
                .into_iter()
                .map(|(date, value)| IndexPoint { date, value })
                .collect(),
            constituents: Vec::new(),
            alignment: Alignment::default(),
            excluded: Vec::new(),
        }
    }

    pub fn points(&self) -> &[IndexPoint] {
        &self.points
    }

    /// Constituents that contributed to at least one point.
    pub fn constituents(&self) -> &[Symbol] {
        &self.constituents
    }

    pub const fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn excluded(&self) -> &[Exclusion] {
        &self.excluded
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn value_on(&self, date: TradingDate) -> Option<f64> {
        self.points
            .binary_search_by(|point| point.date.cmp(&date))
            .ok()
            .map(|index| self.points[index].value)
    }

    /// Scale the series so that its first value equals `base`.
    pub fn rebased(&self, base: f64) -> Result<Self, ValidationError> {
        if !base.is_finite() || base <= 0.0 {
            return Err(ValidationError::InvalidRebaseBase { value: base });
        }
        let Some(anchor) = self.points.first().map(|point| point.value) else {
            return Ok(self.clone());
        };
        if anchor == 0.0 {
            return Err(ValidationError::ZeroRebaseAnchor);
        }

        let factor = base / anchor;
        Ok(Self {
            points: self
                .points
                .iter()
                .map(|point| IndexPoint {
                    date: point.date,
                    value: point.value * factor,
                })
                .collect(),
            ..self.clone()
        })
    }

    pub fn summary(&self) -> Option<IndexSummary> {
        let first = *self.points.first()?;
        let last = *self.points.last()?;
        let (min, max) = self
            .points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), point| {
                (lo.min(point.value), hi.max(point.value))
            });
        let change_pct = if first.value == 0.0 {
            0.0
        } else {
            (last.value - first.value) / first.value * 100.0
        };

        Some(IndexSummary {
            first,
            last,
            min,
            max,
            change_pct,
            points: self.points.len(),
        })
    }

    /// Weighted constituent lines (`weight × close`) on this index's dates.
    ///
    /// A constituent that did not trade on an index date (possible under
    /// union alignment) has no point for that date. Scaling from
    /// [`rebased`](Self::rebased) is not applied.
    pub fn contributions(&self, series: &[PriceSeries], weights: &WeightTable) -> Vec<Contribution> {
        self.constituents
            .iter()
            .filter_map(|symbol| {
                let constituent = series.iter().find(|candidate| candidate.symbol() == symbol)?;
                let weight = weights.weight(symbol);
                let points = self
                    .points
                    .iter()
                    .filter_map(|point| {
                        constituent.close_on(point.date).map(|close| IndexPoint {
                            date: point.date,
                            value: weight * close,
                        })
                    })
                    .collect();
                Some(Contribution {
                    symbol: symbol.clone(),
                    weight,
                    points,
                })
            })
            .collect()
    }
}

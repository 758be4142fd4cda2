use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Symbol, TradingDate, ValidationError};

/// Closing price of one symbol on one trading date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: TradingDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: TradingDate, close: f64) -> Result<Self, ValidationError> {
        validate_non_negative("close", close)?;
        Ok(Self { date, close })
    }
}

/// Date-ordered closing prices for one symbol.
///
/// Points are kept in ascending date order with at most one point per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: Symbol,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series from points in any order. When two points share a
    /// date the later one in `points` wins.
    pub fn new(symbol: Symbol, points: Vec<PricePoint>) -> Self {
        let by_date: BTreeMap<TradingDate, f64> = points
            .into_iter()
            .map(|point| (point.date, point.close))
            .collect();

        Self {
            symbol,
            points: by_date
                .into_iter()
                .map(|(date, close)| PricePoint { date, close })
                .collect(),
        }
    }

    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            points: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Close on `date`, if the symbol traded that day.
    pub fn close_on(&self, date: TradingDate) -> Option<f64> {
        self.points
            .binary_search_by(|point| point.date.cmp(&date))
            .ok()
            .map(|index| self.points[index].close)
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn dates(&self) -> impl Iterator<Item = TradingDate> + '_ {
        self.points.iter().map(|point| point.date)
    }
}

/// Shares outstanding for one constituent, the input to market-cap weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareCount {
    pub symbol: Symbol,
    pub shares: f64,
    /// True when the count was derived as market cap over previous close
    /// rather than reported directly.
    pub estimated: bool,
}

impl ShareCount {
    pub fn new(symbol: Symbol, shares: f64, estimated: bool) -> Result<Self, ValidationError> {
        validate_non_negative("shares", shares)?;
        Ok(Self {
            symbol,
            shares,
            estimated,
        })
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

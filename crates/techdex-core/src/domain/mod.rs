//! # Domain Models
//!
//! Canonical value types shared by the fetcher, the index calculator, and
//! the presenters.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated equity ticker |
//! | [`TradingDate`] | Session date in exchange-local time |
//! | [`DateRange`] | Half-open window of dates to fetch |
//! | [`Interval`] | Bar spacing (1d, 1wk, 1mo) |
//! | [`PricePoint`] | One closing price |
//! | [`PriceSeries`] | Date-ordered closes for one symbol |
//! | [`ShareCount`] | Shares outstanding, for market-cap weights |
//!
//! All constructors validate their inputs, so a `PriceSeries` never holds a
//! negative or non-finite close and never holds two points on the same date.

mod date;
mod interval;
mod models;
mod symbol;

pub use date::{DateRange, TradingDate};
pub use interval::Interval;
pub use models::{PricePoint, PriceSeries, ShareCount};
pub use symbol::Symbol;

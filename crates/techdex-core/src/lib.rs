//! # Techdex Core
//!
//! Domain types, the Yahoo Finance price source, and the composite index
//! math behind the `techdex` CLI.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐   fetch_all    ┌──────────────┐  compute_index  ┌──────────────┐
//! │ PriceSource  │ ─────────────▶ │ PriceSeries  │ ──────────────▶ │ IndexSeries  │
//! │ (Yahoo)      │  one at a time │ per symbol   │   WeightTable   │              │
//! └──────────────┘                └──────────────┘                 └──────┬───────┘
//!                                                                         │
//!                                                          CsvExport / chart / summary
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Yahoo Finance chart and quote API adapter |
//! | [`data_source`] | `PriceSource` trait, requests, and source errors |
//! | [`domain`] | Symbol, dates, intervals, price series |
//! | [`error`] | Validation and umbrella error types |
//! | [`export`] | CSV writer and reader |
//! | [`fetcher`] | Sequential multi-symbol history and share-count fetch |
//! | [`http_client`] | Transport abstraction over reqwest |
//! | [`index`] | Weighted composite calculation and alignment |
//! | [`snapshot`] | Last-session view of each constituent |
//! | [`weights`] | Weight tables, market-cap weights, built-in constituents |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use techdex_core::{
//!     compute_index, fetch_all, Alignment, DateRange, HistoryRequest, Interval, TradingDate,
//!     WeightTable, YahooAdapter,
//! };
//!
//! let weights = WeightTable::default();
//! let symbols: Vec<_> = weights.symbols().cloned().collect();
//! let range = DateRange::trailing_days(TradingDate::today_utc(), 365)?;
//! let template = HistoryRequest::new(symbols[0].clone(), range, Interval::OneDay);
//!
//! let series = fetch_all(&YahooAdapter::default(), &symbols, &template).await?;
//! let index = compute_index(&series, &weights, Alignment::Intersection);
//! ```

pub mod adapters;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod http_client;
pub mod index;
pub mod snapshot;
pub mod weights;

pub use adapters::YahooAdapter;

pub use data_source::{HistoryRequest, PriceField, PriceSource, SourceError, SourceErrorKind};

pub use domain::{DateRange, Interval, PricePoint, PriceSeries, ShareCount, Symbol, TradingDate};

pub use error::{CoreError, ValidationError};

pub use export::{read_index_csv, read_index_csv_path, CsvExport, ExportError};

pub use fetcher::{fetch_all, fetch_share_counts};

pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

pub use index::{
    compute_index, market_cap_weights, Alignment, Contribution, Exclusion, ExclusionReason, IndexPoint, IndexSeries,
    IndexSummary,
};

pub use snapshot::{snapshots, ConstituentSnapshot, Tick};

pub use weights::{Weighting, WeightTable, DEFAULT_WEIGHTS, INDEX_NAME, MARKET_CAP_BASE};

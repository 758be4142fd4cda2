use thiserror::Error;

use crate::data_source::SourceError;
use crate::export::ExportError;

/// Validation and contract errors exposed by `techdex-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid interval '{value}', expected one of 1d, 1wk, 1mo")]
    InvalidInterval { value: String },
    #[error("invalid alignment '{value}', expected intersection or union")]
    InvalidAlignment { value: String },
    #[error("invalid weighting '{value}', expected static or market-cap")]
    InvalidWeighting { value: String },

    #[error("date must be formatted YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },
    #[error("date range end {end} must be after start {start}")]
    EmptyDateRange { start: String, end: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("weight for '{symbol}' must be a finite non-negative number, got {value}")]
    InvalidWeight { symbol: String, value: f64 },
    #[error("weight table lists '{symbol}' more than once")]
    DuplicateWeight { symbol: String },
    #[error("weight table must contain at least one constituent")]
    EmptyWeightTable,
    #[error("combined market cap on {date} must be positive")]
    ZeroMarketCap { date: String },

    #[error("base value must be a positive finite number, got {value}")]
    InvalidRebaseBase { value: f64 },
    #[error("cannot rebase a series whose first value is zero")]
    ZeroRebaseAnchor,
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

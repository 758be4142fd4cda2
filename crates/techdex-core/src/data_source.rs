//! Price source trait and request/error types.
//!
//! A [`PriceSource`] turns a [`HistoryRequest`] into a [`PriceSeries`]. The
//! only production implementation is
//! [`YahooAdapter`](crate::adapters::YahooAdapter); tests implement the trait
//! directly with in-memory fixtures.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{DateRange, Interval, PriceSeries, ShareCount, Symbol};

/// Which close a source should report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    /// Raw session close.
    #[default]
    Close,
    /// Close adjusted for splits and dividends.
    AdjClose,
}

/// Request payload for a single-symbol history fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub symbol: Symbol,
    pub range: DateRange,
    pub interval: Interval,
    pub field: PriceField,
}

impl HistoryRequest {
    pub fn new(symbol: Symbol, range: DateRange, interval: Interval) -> Self {
        Self {
            symbol,
            range,
            interval,
            field: PriceField::Close,
        }
    }

    pub fn with_field(mut self, field: PriceField) -> Self {
        self.field = field;
        self
    }

    /// Same window and interval for a different symbol.
    pub fn for_symbol(&self, symbol: Symbol) -> Self {
        Self {
            symbol,
            ..self.clone()
        }
    }
}

/// Source-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    InvalidRequest,
    Internal,
}

/// Structured price source error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    symbol: Option<Symbol>,
}

impl SourceError {
    fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            symbol: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unavailable, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::RateLimited, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Internal, message)
    }

    /// Attach the symbol being fetched when the error surfaced.
    pub fn for_symbol(mut self, symbol: &Symbol) -> Self {
        self.symbol = Some(symbol.clone());
        self
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn symbol(&self) -> Option<&Symbol> {
        self.symbol.as_ref()
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.symbol {
            Some(symbol) => write!(f, "{symbol}: {} ({})", self.message, self.code()),
            None => write!(f, "{} ({})", self.message, self.code()),
        }
    }
}

impl std::error::Error for SourceError {}

/// Historical price provider contract.
///
/// Implementations must be `Send + Sync`; the fetcher only ever drives one
/// request at a time.
pub trait PriceSource: Send + Sync {
    /// Short provider name used in logs.
    fn id(&self) -> &'static str;

    /// Fetches the closing-price history of one symbol.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the provider cannot be reached, rejects
    /// the symbol, or answers with a body that cannot be parsed. A window
    /// with no trading sessions is not an error and yields an empty series.
    fn history<'a>(
        &'a self,
        req: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, SourceError>> + Send + 'a>>;

    /// Fetches the current shares outstanding of one symbol.
    ///
    /// Only needed for market-cap weighting. The default rejects the request
    /// so history-only sources need not implement it.
    fn shares_outstanding<'a>(
        &'a self,
        symbol: Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<ShareCount, SourceError>> + Send + 'a>> {
        let error = SourceError::invalid_request(format!(
            "{} does not report shares outstanding",
            self.id()
        ))
        .for_symbol(&symbol);
        Box::pin(async move { Err(error) })
    }
}

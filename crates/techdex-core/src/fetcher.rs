//! Sequential multi-symbol fetches.

use std::time::Instant;

use tracing::{info, warn};

use crate::data_source::{HistoryRequest, PriceSource, SourceError};
use crate::{PriceSeries, ShareCount, Symbol};

/// Fetch one series per symbol, one request after another, in input order.
///
/// `template` supplies the window, interval and price field; its symbol is
/// replaced for each entry of `symbols`. The first failing request aborts the
/// whole fetch and its error is returned unchanged.
pub async fn fetch_all(
    source: &dyn PriceSource,
    symbols: &[Symbol],
    template: &HistoryRequest,
) -> Result<Vec<PriceSeries>, SourceError> {
    let mut all = Vec::with_capacity(symbols.len());

    for symbol in symbols {
        let started = Instant::now();
        let series = source.history(template.for_symbol(symbol.clone())).await?;

        if series.is_empty() {
            warn!(source = source.id(), %symbol, "no price history in requested window");
        } else {
            info!(
                source = source.id(),
                %symbol,
                points = series.len(),
                latency_ms = started.elapsed().as_millis() as u64,
                "fetched price history"
            );
        }
        all.push(series);
    }

    Ok(all)
}

/// Fetch shares outstanding for each symbol, in input order.
///
/// Fails fast like [`fetch_all`].
pub async fn fetch_share_counts(
    source: &dyn PriceSource,
    symbols: &[Symbol],
) -> Result<Vec<ShareCount>, SourceError> {
    let mut counts = Vec::with_capacity(symbols.len());

    for symbol in symbols {
        let count = source.shares_outstanding(symbol.clone()).await?;
        info!(
            source = source.id(),
            %symbol,
            shares = count.shares,
            estimated = count.estimated,
            "fetched shares outstanding"
        );
        counts.push(count);
    }

    Ok(counts)
}

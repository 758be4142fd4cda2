use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::data_source::{HistoryRequest, PriceField, PriceSource, SourceError};
use crate::http_client::{
    HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient, DEFAULT_TIMEOUT_MS,
};
use crate::{PricePoint, PriceSeries, ShareCount, Symbol, TradingDate};

pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Second quote host, tried when the configured one will not hand out a crumb.
const YAHOO_FALLBACK_URL: &str = "https://query2.finance.yahoo.com";

/// Visiting this host sets the session cookie the crumb is bound to.
const YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";

const YAHOO_REFERER: &str = "https://finance.yahoo.com/";

const QUOTE_FIELDS: &str = "sharesOutstanding,marketCap,regularMarketPreviousClose";

/// Yahoo Finance price source.
///
/// History comes from the public v8 chart endpoint. Share counts come from
/// the v7 quote endpoint, which needs a session cookie and a crumb token;
/// the cookie lives in the HTTP client's jar and the crumb is cached here.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    timeout_ms: u64,
    crumb: Arc<Mutex<Option<String>>>,
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }
}

impl YahooAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: String::from(YAHOO_BASE_URL),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            crumb: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn chart_request(&self, req: &HistoryRequest) -> HttpRequest {
        let endpoint = format!(
            "{}/v8/finance/chart/{}",
            self.base_url,
            urlencoding::encode(req.symbol.as_str())
        );

        HttpRequest::get(endpoint)
            .with_query("period1", req.range.start().unix_midnight_utc().to_string())
            .with_query("period2", req.range.end().unix_midnight_utc().to_string())
            .with_query("interval", req.interval.as_str())
            .with_query("includePrePost", "false")
            .with_query("events", "div|split")
            .with_header("referer", YAHOO_REFERER)
            .with_timeout_ms(self.timeout_ms)
    }

    fn quote_request(&self, symbol: &Symbol, crumb: &str) -> HttpRequest {
        HttpRequest::get(format!("{}/v7/finance/quote", self.base_url))
            .with_query("symbols", symbol.as_str())
            .with_query("fields", QUOTE_FIELDS)
            .with_query("crumb", crumb)
            .with_header("referer", YAHOO_REFERER)
            .with_timeout_ms(self.timeout_ms)
    }

    /// Map a transport failure, naming the configured deadline on timeouts.
    fn transport_error(&self, error: &HttpError) -> SourceError {
        if error.timed_out() {
            SourceError::unavailable(format!(
                "yahoo request timed out after {} ms",
                self.timeout_ms
            ))
        } else {
            SourceError::unavailable(format!("yahoo transport error: {}", error.message()))
        }
    }

    async fn fetch_history(&self, req: HistoryRequest) -> Result<PriceSeries, SourceError> {
        let request = self.chart_request(&req);
        debug!(symbol = %req.symbol, url = %request.url, "requesting yahoo chart");

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| self.transport_error(&e).for_symbol(&req.symbol))?;

        parse_chart_response(&req.symbol, req.field, &response)
            .map_err(|error| error.for_symbol(&req.symbol))
    }

    async fn fetch_share_count(&self, symbol: Symbol) -> Result<ShareCount, SourceError> {
        let mut response = self.quote_with_crumb(&symbol).await?;

        // A stale crumb comes back as 401; refresh it once and retry.
        if response.status == 401 {
            debug!(%symbol, "yahoo rejected crumb, refreshing");
            self.invalidate_crumb();
            response = self.quote_with_crumb(&symbol).await?;
        }

        let count = parse_quote_response(&symbol, &response).map_err(|e| e.for_symbol(&symbol))?;
        if count.estimated {
            warn!(%symbol, shares = count.shares, "shares outstanding derived from market cap");
        }
        Ok(count)
    }

    async fn quote_with_crumb(&self, symbol: &Symbol) -> Result<HttpResponse, SourceError> {
        let crumb = self.crumb().await.map_err(|e| e.for_symbol(symbol))?;
        let request = self.quote_request(symbol, &crumb);
        debug!(%symbol, url = %request.url, "requesting yahoo quote");

        self.http_client
            .execute(request)
            .await
            .map_err(|e| self.transport_error(&e).for_symbol(symbol))
    }

    /// Cached crumb, fetching a fresh one when none is held.
    async fn crumb(&self) -> Result<String, SourceError> {
        if let Some(crumb) = self.cached_crumb() {
            return Ok(crumb);
        }

        let cookie_request = HttpRequest::get(YAHOO_COOKIE_URL)
            .with_header("referer", YAHOO_REFERER)
            .with_timeout_ms(self.timeout_ms);
        // Only the Set-Cookie header matters; the status is usually 404.
        self.http_client
            .execute(cookie_request)
            .await
            .map_err(|e| self.transport_error(&e))?;

        for host in [self.base_url.as_str(), YAHOO_FALLBACK_URL] {
            let crumb_request = HttpRequest::get(format!("{host}/v1/test/getcrumb"))
                .with_header("referer", YAHOO_REFERER)
                .with_timeout_ms(self.timeout_ms);

            let Ok(response) = self.http_client.execute(crumb_request).await else {
                continue;
            };
            if response.status == 429 {
                return Err(SourceError::rate_limited("yahoo rate limited the crumb request"));
            }
            if !response.is_success() {
                continue;
            }
            if let Some(crumb) = parse_crumb(&response.body) {
                *self.crumb.lock().unwrap_or_else(PoisonError::into_inner) = Some(crumb.clone());
                return Ok(crumb);
            }
        }

        Err(SourceError::unavailable("failed to obtain a yahoo crumb"))
    }

    fn cached_crumb(&self) -> Option<String> {
        self.crumb
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn invalidate_crumb(&self) {
        *self.crumb.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl PriceSource for YahooAdapter {
    fn id(&self) -> &'static str {
        "yahoo"
    }

    fn history<'a>(
        &'a self,
        req: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, SourceError>> + Send + 'a>> {
        Box::pin(self.fetch_history(req))
    }

    fn shares_outstanding<'a>(
        &'a self,
        symbol: Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<ShareCount, SourceError>> + Send + 'a>> {
        Box::pin(self.fetch_share_count(symbol))
    }
}

/// A crumb is a short token; HTML pages and throttling notices are not.
fn parse_crumb(body: &str) -> Option<String> {
    let body = body.trim();
    let looks_like_page = body.contains("<html") || body.contains("<!DOCTYPE");
    let throttled = body.to_ascii_lowercase().contains("too many requests");
    let plausible = !body.is_empty() && body.len() < 100 && !body.contains(char::is_whitespace);
    (!looks_like_page && !throttled && plausible).then(|| body.to_owned())
}

/// Map a v7 quote response into a share count.
///
/// `sharesOutstanding` is preferred. When Yahoo omits it the count is
/// estimated as `marketCap / regularMarketPreviousClose`.
fn parse_quote_response(symbol: &Symbol, response: &HttpResponse) -> Result<ShareCount, SourceError> {
    if response.status == 429 {
        return Err(SourceError::rate_limited("yahoo returned status 429"));
    }

    let parsed = serde_json::from_str::<YahooQuoteResponse>(&response.body);
    if let Ok(quote_response) = &parsed {
        if let Some(error) = &quote_response.quote_response.error {
            return Err(SourceError::invalid_request(format!(
                "yahoo quote error {}: {}",
                error.code, error.description
            )));
        }
    }

    if !response.is_success() {
        let message = format!("yahoo returned status {}", response.status);
        return Err(match response.status {
            400 | 404 => SourceError::invalid_request(message),
            _ => SourceError::unavailable(message),
        });
    }

    let quote_response =
        parsed.map_err(|e| SourceError::internal(format!("failed to parse yahoo quote: {e}")))?;
    let quote = quote_response
        .quote_response
        .result
        .into_iter()
        .flatten()
        .find(|quote| quote.symbol.eq_ignore_ascii_case(symbol.as_str()))
        .ok_or_else(|| SourceError::invalid_request("yahoo returned no quote for symbol"))?;

    let positive = |value: Option<f64>| value.filter(|v| v.is_finite() && *v > 0.0);
    let (shares, estimated) = match (
        positive(quote.shares_outstanding),
        positive(quote.market_cap),
        positive(quote.regular_market_previous_close),
    ) {
        (Some(shares), _, _) => (shares, false),
        (None, Some(cap), Some(previous_close)) => (cap / previous_close, true),
        _ => {
            return Err(SourceError::invalid_request(
                "yahoo quote has neither shares outstanding nor market cap and previous close",
            ))
        }
    };

    ShareCount::new(symbol.clone(), shares, estimated)
        .map_err(|e| SourceError::internal(format!("bad share count: {e}")))
}

/// Map a raw chart endpoint response into a price series.
fn parse_chart_response(
    symbol: &Symbol,
    field: PriceField,
    response: &HttpResponse,
) -> Result<PriceSeries, SourceError> {
    if response.status == 429 {
        return Err(SourceError::rate_limited("yahoo returned status 429"));
    }

    // Yahoo reports unknown symbols as a 404 whose body still carries the
    // chart error object, so look at the body before the status.
    let parsed = serde_json::from_str::<YahooChartResponse>(&response.body);
    if let Ok(chart_response) = &parsed {
        if let Some(error) = &chart_response.chart.error {
            return Err(SourceError::invalid_request(format!(
                "yahoo chart error {}: {}",
                error.code, error.description
            )));
        }
    }

    if !response.is_success() {
        let message = format!("yahoo returned status {}", response.status);
        return Err(match response.status {
            400 | 404 => SourceError::invalid_request(message),
            _ => SourceError::unavailable(message),
        });
    }

    let chart_response = parsed
        .map_err(|e| SourceError::internal(format!("failed to parse yahoo chart: {e}")))?;
    let result = chart_response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| SourceError::internal("no chart result in response"))?;

    let Some(timestamps) = result.timestamp else {
        return Ok(PriceSeries::empty(symbol.clone()));
    };

    let closes = match field {
        PriceField::Close => result
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|quote| quote.close),
        PriceField::AdjClose => result
            .indicators
            .adjclose
            .into_iter()
            .next()
            .map(|adj| adj.adjclose),
    }
    .ok_or_else(|| SourceError::internal(format!("no {field:?} data in chart result")))?;

    let gmt_offset = result.meta.gmtoffset.unwrap_or(0);
    let mut points = Vec::with_capacity(timestamps.len());
    for (ts, close) in timestamps.iter().zip(closes) {
        // Sessions still in progress or halted come back as null.
        let Some(close) = close else { continue };
        let date = TradingDate::from_unix_with_offset(*ts, gmt_offset)
            .map_err(|e| SourceError::internal(e.to_string()))?;
        let point = PricePoint::new(date, close)
            .map_err(|e| SourceError::internal(format!("bad close on {date}: {e}")))?;
        points.push(point);
    }

    Ok(PriceSeries::new(symbol.clone(), points))
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResponse {
    chart: YahooChartData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartData {
    result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    error: Option<YahooApiError>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooApiError {
    code: String,
    description: String,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResult {
    #[serde(default)]
    meta: YahooChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: YahooChartIndicators,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct YahooChartMeta {
    gmtoffset: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartIndicators {
    #[serde(default)]
    quote: Vec<YahooChartQuote>,
    #[serde(default)]
    adjclose: Vec<YahooChartAdjClose>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooQuoteResponse {
    quote_response: YahooQuoteData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooQuoteData {
    result: Option<Vec<YahooQuoteResult>>,
    #[serde(default)]
    error: Option<YahooApiError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooQuoteResult {
    symbol: String,
    shares_outstanding: Option<f64>,
    market_cap: Option<f64>,
    regular_market_previous_close: Option<f64>,
}

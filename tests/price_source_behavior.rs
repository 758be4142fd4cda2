//! Behavior-driven tests for price sources and the sequential fetcher
//!
//! These tests verify how Yahoo chart responses become price series, how
//! share counts are looked up behind Yahoo's cookie and crumb handshake, how
//! provider failures are classified, and how a multi-symbol fetch behaves
//! when one request fails.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use techdex_core::{
    fetch_all, fetch_share_counts, DateRange, HistoryRequest, HttpClient, HttpError, HttpRequest, HttpResponse,
    Interval, PriceField, PricePoint, PriceSeries, PriceSource, SourceError, SourceErrorKind,
    Symbol, TradingDate, YahooAdapter,
};

// =============================================================================
// Fakes
// =============================================================================

/// Serves canned responses keyed by the ticker in the request path.
#[derive(Default)]
struct ScriptedHttpClient {
    responses: BTreeMap<String, Result<HttpResponse, HttpError>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    fn respond(mut self, ticker: &str, response: Result<HttpResponse, HttpError>) -> Self {
        self.responses.insert(ticker.to_owned(), response);
        self
    }

    fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .iter()
            .map(|request| request.url.clone())
            .collect()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = self
            .responses
            .iter()
            .find(|(ticker, _)| request.url.contains(&format!("/chart/{ticker}?")))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| Ok(HttpResponse::new(404, "")));
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .push(request);
        Box::pin(async move { response })
    }
}

/// Serves queued responses for the first route whose fragment the URL
/// contains. The last queued response repeats once the others are used up.
#[derive(Default)]
struct RoutedHttpClient {
    routes: Mutex<Vec<(&'static str, VecDeque<HttpResponse>)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RoutedHttpClient {
    fn route(self, fragment: &'static str, responses: Vec<HttpResponse>) -> Self {
        self.routes
            .lock()
            .expect("route store should not be poisoned")
            .push((fragment, responses.into()));
        self
    }

    fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .iter()
            .map(|request| request.url.clone())
            .collect()
    }
}

impl HttpClient for RoutedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let mut routes = self.routes.lock().expect("route store should not be poisoned");
        let response = routes
            .iter_mut()
            .find(|(fragment, _)| request.url.contains(fragment))
            .and_then(|(_, queue)| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
            .unwrap_or_else(|| HttpResponse::new(404, ""));
        drop(routes);
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .push(request);
        Box::pin(async move { Ok(response) })
    }
}

/// In-memory source that records the order symbols were requested in.
struct MemorySource {
    series: Vec<PriceSeries>,
    fail_on: Option<Symbol>,
    seen: Mutex<Vec<Symbol>>,
}

impl PriceSource for MemorySource {
    fn id(&self) -> &'static str {
        "memory"
    }

    fn history<'a>(
        &'a self,
        request: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            self.seen
                .lock()
                .expect("seen store should not be poisoned")
                .push(request.symbol.clone());
            if self.fail_on.as_ref() == Some(&request.symbol) {
                return Err(SourceError::unavailable("connection reset").for_symbol(&request.symbol));
            }
            Ok(self
                .series
                .iter()
                .find(|series| series.symbol() == &request.symbol)
                .cloned()
                .unwrap_or_else(|| PriceSeries::empty(request.symbol)))
        })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

const MSFT_CHART: &str = r#"{
    "chart": {
        "result": [{
            "meta": {"currency": "USD", "symbol": "MSFT", "gmtoffset": -14400},
            "timestamp": [1717421400, 1717507800, 1717594200],
            "indicators": {
                "quote": [{"close": [413.52, 416.07, null]}],
                "adjclose": [{"adjclose": [412.73, 415.27, null]}]
            }
        }],
        "error": null
    }
}"#;

const NO_SESSIONS: &str = r#"{
    "chart": {
        "result": [{
            "meta": {"currency": "USD", "symbol": "MSFT", "gmtoffset": -14400},
            "indicators": {"quote": [{}], "adjclose": [{}]}
        }],
        "error": null
    }
}"#;

const UNKNOWN_SYMBOL: &str = r#"{
    "chart": {
        "result": null,
        "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
    }
}"#;

const NVDA_QUOTE: &str = r#"{
    "quoteResponse": {
        "result": [{
            "symbol": "NVDA",
            "sharesOutstanding": 24490000000,
            "marketCap": 2900000000000,
            "regularMarketPreviousClose": 118.42
        }],
        "error": null
    }
}"#;

const AVGO_QUOTE_WITHOUT_SHARES: &str = r#"{
    "quoteResponse": {
        "result": [{
            "symbol": "AVGO",
            "marketCap": 800000000000,
            "regularMarketPreviousClose": 160.0
        }],
        "error": null
    }
}"#;

const INVALID_CRUMB: &str = r#"{
    "quoteResponse": {
        "result": null,
        "error": {"code": "Unauthorized", "description": "Invalid Crumb"}
    }
}"#;

fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

fn june_request(ticker: &str) -> HistoryRequest {
    let range = DateRange::new(
        TradingDate::parse("2024-06-03").expect("valid date"),
        TradingDate::parse("2024-06-06").expect("valid date"),
    )
    .expect("valid range");
    HistoryRequest::new(symbol(ticker), range, Interval::OneDay)
}

fn adapter(client: ScriptedHttpClient) -> (YahooAdapter, Arc<ScriptedHttpClient>) {
    let client = Arc::new(client);
    let adapter = YahooAdapter::with_http_client(client.clone()).with_base_url("https://chart.test/");
    (adapter, client)
}

// =============================================================================
// Yahoo: Response Parsing
// =============================================================================

#[tokio::test]
async fn when_yahoo_returns_a_chart_closes_become_dated_points() {
    // Given: A chart with two sessions and one in-progress null close
    let (adapter, client) =
        adapter(ScriptedHttpClient::default().respond("MSFT", Ok(HttpResponse::ok_json(MSFT_CHART))));

    // When: History is requested
    let series = adapter
        .history(june_request("MSFT"))
        .await
        .expect("chart should parse");

    // Then: Null closes are skipped and dates follow the exchange's offset
    let dates: Vec<String> = series.dates().map(|d| d.to_string()).collect();
    assert_eq!(dates, vec!["2024-06-03", "2024-06-04"]);
    assert_eq!(series.points()[1].close, 416.07);

    // And: The request targets the chart endpoint with the window as epochs
    let urls = client.urls();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].starts_with("https://chart.test/v8/finance/chart/MSFT?"));
    assert!(urls[0].contains("period1=1717372800"));
    assert!(urls[0].contains("period2=1717632000"));
    assert!(urls[0].contains("interval=1d"));
}

#[tokio::test]
async fn when_adjusted_closes_are_requested_adjclose_block_is_used() {
    let (adapter, _) =
        adapter(ScriptedHttpClient::default().respond("MSFT", Ok(HttpResponse::ok_json(MSFT_CHART))));

    let series = adapter
        .history(june_request("MSFT").with_field(PriceField::AdjClose))
        .await
        .expect("chart should parse");

    assert_eq!(series.points()[0].close, 412.73);
}

#[tokio::test]
async fn when_window_has_no_sessions_series_is_empty_not_an_error() {
    let (adapter, _) =
        adapter(ScriptedHttpClient::default().respond("MSFT", Ok(HttpResponse::ok_json(NO_SESSIONS))));

    let series = adapter
        .history(june_request("MSFT"))
        .await
        .expect("empty window is not a failure");

    assert!(series.is_empty());
    assert_eq!(series.symbol().as_str(), "MSFT");
}

// =============================================================================
// Yahoo: Failure Classification
// =============================================================================

#[tokio::test]
async fn when_symbol_is_unknown_error_is_invalid_request_with_description() {
    // Given: Yahoo's 404 body for an unknown ticker
    let (adapter, _) = adapter(
        ScriptedHttpClient::default().respond("ZZZZ", Ok(HttpResponse::new(404, UNKNOWN_SYMBOL))),
    );

    // When: History is requested
    let error = adapter
        .history(june_request("ZZZZ"))
        .await
        .expect_err("unknown symbol should fail");

    // Then: The error names the symbol and carries Yahoo's description
    assert_eq!(error.kind(), SourceErrorKind::InvalidRequest);
    assert_eq!(error.code(), "source.invalid_request");
    assert_eq!(error.symbol().map(Symbol::as_str), Some("ZZZZ"));
    assert!(error.message().contains("symbol may be delisted"));
}

#[tokio::test]
async fn when_yahoo_throttles_error_is_rate_limited() {
    let (adapter, _) =
        adapter(ScriptedHttpClient::default().respond("MSFT", Ok(HttpResponse::new(429, "Too Many Requests"))));

    let error = adapter
        .history(june_request("MSFT"))
        .await
        .expect_err("429 should fail");

    assert_eq!(error.kind(), SourceErrorKind::RateLimited);
}

#[tokio::test]
async fn when_server_errors_or_transport_fails_error_is_unavailable() {
    let (adapter, _) = adapter(
        ScriptedHttpClient::default()
            .respond("MSFT", Ok(HttpResponse::new(503, "")))
            .respond("AAPL", Err(HttpError::timeout("request timed out"))),
    );

    let server = adapter
        .history(june_request("MSFT"))
        .await
        .expect_err("503 should fail");
    let transport = adapter
        .history(june_request("AAPL"))
        .await
        .expect_err("timeout should fail");

    assert_eq!(server.kind(), SourceErrorKind::Unavailable);
    assert_eq!(transport.kind(), SourceErrorKind::Unavailable);
    assert!(transport.message().contains("timed out"));
}

#[tokio::test]
async fn when_body_is_not_chart_json_error_is_internal() {
    let (adapter, _) =
        adapter(ScriptedHttpClient::default().respond("MSFT", Ok(HttpResponse::ok_json("<html>"))));

    let error = adapter
        .history(june_request("MSFT"))
        .await
        .expect_err("garbage body should fail");

    assert_eq!(error.kind(), SourceErrorKind::Internal);
}

// =============================================================================
// Yahoo: Shares Outstanding
// =============================================================================

fn quote_adapter(client: RoutedHttpClient) -> (YahooAdapter, Arc<RoutedHttpClient>) {
    let client = Arc::new(client);
    let adapter = YahooAdapter::with_http_client(client.clone()).with_base_url("https://quote.test");
    (adapter, client)
}

#[tokio::test]
async fn when_shares_are_requested_cookie_and_crumb_are_fetched_first() {
    // Given: Yahoo hands out a cookie, a crumb, and a quote
    let (adapter, client) = quote_adapter(
        RoutedHttpClient::default()
            .route("fc.yahoo.com", vec![HttpResponse::new(404, "")])
            .route("/v1/test/getcrumb", vec![HttpResponse::ok_json("Ab3.cd9")])
            .route("/v7/finance/quote", vec![HttpResponse::ok_json(NVDA_QUOTE)]),
    );

    // When: Shares outstanding are requested
    let count = adapter
        .shares_outstanding(symbol("NVDA"))
        .await
        .expect("quote should parse");

    // Then: The reported count is used as-is
    assert_eq!(count.shares, 24_490_000_000.0);
    assert!(!count.estimated);

    // And: The quote request carries the crumb after the handshake
    let urls = client.urls();
    assert_eq!(urls.len(), 3);
    assert_eq!(urls[0], "https://fc.yahoo.com");
    assert_eq!(urls[1], "https://quote.test/v1/test/getcrumb");
    assert!(urls[2].starts_with("https://quote.test/v7/finance/quote?symbols=NVDA&"));
    assert!(urls[2].ends_with("&crumb=Ab3.cd9"));
}

#[tokio::test]
async fn when_crumb_is_cached_later_lookups_skip_the_handshake() {
    let (adapter, client) = quote_adapter(
        RoutedHttpClient::default()
            .route("/v1/test/getcrumb", vec![HttpResponse::ok_json("Ab3.cd9")])
            .route("symbols=NVDA", vec![HttpResponse::ok_json(NVDA_QUOTE)])
            .route("symbols=AVGO", vec![HttpResponse::ok_json(AVGO_QUOTE_WITHOUT_SHARES)]),
    );

    let counts = fetch_share_counts(&adapter, &[symbol("NVDA"), symbol("AVGO")])
        .await
        .expect("both quotes parse");

    assert_eq!(counts.len(), 2);
    let crumb_requests = client
        .urls()
        .iter()
        .filter(|url| url.contains("getcrumb"))
        .count();
    assert_eq!(crumb_requests, 1);
}

#[tokio::test]
async fn when_shares_are_missing_they_are_derived_from_market_cap() {
    // Given: A quote with market cap and previous close but no share count
    let (adapter, _) = quote_adapter(
        RoutedHttpClient::default()
            .route("/v1/test/getcrumb", vec![HttpResponse::ok_json("Ab3.cd9")])
            .route("/v7/finance/quote", vec![HttpResponse::ok_json(AVGO_QUOTE_WITHOUT_SHARES)]),
    );

    // When: Shares outstanding are requested
    let count = adapter
        .shares_outstanding(symbol("AVGO"))
        .await
        .expect("fallback applies");

    // Then: Shares are market cap over previous close, flagged as estimated
    assert_eq!(count.shares, 5_000_000_000.0);
    assert!(count.estimated);
}

#[tokio::test]
async fn when_crumb_is_rejected_it_is_refreshed_once() {
    // Given: The first quote call reports an invalid crumb
    let (adapter, client) = quote_adapter(
        RoutedHttpClient::default()
            .route(
                "/v1/test/getcrumb",
                vec![HttpResponse::ok_json("stale"), HttpResponse::ok_json("fresh")],
            )
            .route(
                "/v7/finance/quote",
                vec![HttpResponse::new(401, INVALID_CRUMB), HttpResponse::ok_json(NVDA_QUOTE)],
            ),
    );

    // When: Shares outstanding are requested
    let count = adapter
        .shares_outstanding(symbol("NVDA"))
        .await
        .expect("retry succeeds");

    // Then: The retry used the fresh crumb
    assert_eq!(count.shares, 24_490_000_000.0);
    let quotes: Vec<String> = client
        .urls()
        .into_iter()
        .filter(|url| url.contains("/v7/finance/quote"))
        .collect();
    assert_eq!(quotes.len(), 2);
    assert!(quotes[1].ends_with("crumb=fresh"));
}

#[tokio::test]
async fn when_no_host_hands_out_a_crumb_lookup_is_unavailable() {
    let (adapter, _) = quote_adapter(
        RoutedHttpClient::default()
            .route("getcrumb", vec![HttpResponse::ok_json("<html><body>consent</body></html>")]),
    );

    let error = adapter
        .shares_outstanding(symbol("NVDA"))
        .await
        .expect_err("no crumb");

    assert_eq!(error.kind(), SourceErrorKind::Unavailable);
    assert_eq!(error.symbol(), Some(&symbol("NVDA")));
}

#[tokio::test]
async fn when_source_has_no_share_data_fetch_share_counts_fails() {
    let source = MemorySource {
        series: Vec::new(),
        fail_on: None,
        seen: Mutex::new(Vec::new()),
    };

    let error = fetch_share_counts(&source, &[symbol("NVDA")])
        .await
        .expect_err("memory source has no share counts");

    assert_eq!(error.kind(), SourceErrorKind::InvalidRequest);
}

// =============================================================================
// Fetcher: Sequential Multi-Symbol Fetch
// =============================================================================

#[tokio::test]
async fn when_fetching_many_symbols_results_come_back_in_input_order() {
    // Given: A source holding two series
    let point = |raw: &str, close: f64| {
        PricePoint::new(TradingDate::parse(raw).expect("valid date"), close).expect("valid point")
    };
    let source = MemorySource {
        series: vec![
            PriceSeries::new(symbol("AAPL"), vec![point("2024-06-03", 194.03)]),
            PriceSeries::new(symbol("NVDA"), vec![point("2024-06-03", 1150.0)]),
        ],
        fail_on: None,
        seen: Mutex::new(Vec::new()),
    };
    let symbols = vec![symbol("NVDA"), symbol("AAPL"), symbol("META")];

    // When: All symbols are fetched
    let all = fetch_all(&source, &symbols, &june_request("NVDA"))
        .await
        .expect("no failures");

    // Then: One series per symbol, in request order, empty where unknown
    let order: Vec<&str> = all.iter().map(|series| series.symbol().as_str()).collect();
    assert_eq!(order, vec!["NVDA", "AAPL", "META"]);
    assert!(all[2].is_empty());
    assert_eq!(*source.seen.lock().expect("lock"), symbols);
}

#[tokio::test]
async fn when_one_symbol_fails_fetch_stops_and_surfaces_that_error() {
    // Given: A source that fails on the second symbol
    let source = MemorySource {
        series: Vec::new(),
        fail_on: Some(symbol("MSFT")),
        seen: Mutex::new(Vec::new()),
    };
    let symbols = vec![symbol("NVDA"), symbol("MSFT"), symbol("AAPL")];

    // When: All symbols are fetched
    let error = fetch_all(&source, &symbols, &june_request("NVDA"))
        .await
        .expect_err("second symbol fails");

    // Then: The failure is returned as-is and later symbols are never requested
    assert_eq!(error.kind(), SourceErrorKind::Unavailable);
    assert_eq!(error.symbol(), Some(&symbol("MSFT")));
    assert_eq!(
        *source.seen.lock().expect("lock"),
        vec![symbol("NVDA"), symbol("MSFT")]
    );
}

#[tokio::test]
async fn when_fetching_through_yahoo_template_window_is_reused_per_symbol() {
    let (adapter, client) = adapter(
        ScriptedHttpClient::default()
            .respond("MSFT", Ok(HttpResponse::ok_json(MSFT_CHART)))
            .respond("AAPL", Ok(HttpResponse::ok_json(NO_SESSIONS))),
    );

    let all = fetch_all(&adapter, &[symbol("MSFT"), symbol("AAPL")], &june_request("MSFT"))
        .await
        .expect("both succeed");

    assert_eq!(all[0].len(), 2);
    assert!(all[1].is_empty());
    let urls = client.urls();
    assert!(urls[1].contains("/chart/AAPL?"));
    assert!(urls.iter().all(|url| url.contains("period1=1717372800")));
}

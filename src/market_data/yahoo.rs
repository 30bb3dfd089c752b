// =============================================================================
// Yahoo Finance chart API source
// =============================================================================
//
// Fetches intraday FX bars from the public v8 chart endpoint.  Currency pairs
// are quoted as `EURUSD=X`.  Yahoo has no native 4h interval, so 4h bars are
// built from hourly bars bucketed on UTC 4-hour boundaries.
//
// Transport failures are retried with exponential backoff here; the engine
// itself never retries.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::market_data::{Bar, BarSource};
use crate::types::Interval;

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// FX trades around the clock five days a week.
const FX_TRADING_DAYS_PER_WEEK: f64 = 5.0;

// -----------------------------------------------------------------------------
// Response shape
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

// -----------------------------------------------------------------------------
// YahooSource
// -----------------------------------------------------------------------------

/// Async HTTP client for the Yahoo chart API.
#[derive(Clone)]
pub struct YahooSource {
    base_url: String,
    client: reqwest::Client,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooSource {
    pub fn new(base_url: Option<String>, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) fxpulse/0.1")
            .build()
            .context("failed to build HTTP client")?;

        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        debug!(base_url = %base_url, "YahooSource initialised");

        Ok(Self {
            base_url,
            client,
            max_retries,
            base_delay: Duration::from_millis(500),
        })
    }

    /// `EURUSD` -> `EURUSD=X`.  Symbols that already carry a Yahoo suffix or
    /// index prefix are passed through.
    pub fn yahoo_symbol(instrument: &str) -> String {
        let upper = instrument.trim().to_uppercase();
        if upper.contains('=') || upper.starts_with('^') {
            upper
        } else {
            format!("{upper}=X")
        }
    }

    /// Native Yahoo interval used to serve `interval`.
    fn native_interval(interval: Interval) -> &'static str {
        match interval {
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::H1 | Interval::H4 => "60m",
        }
    }

    /// Smallest Yahoo `range` covering `lookback` bars of `interval`, allowing
    /// for weekends.  Intraday minute data is only served for ~60 days.
    pub fn range_for(interval: Interval, lookback: usize) -> &'static str {
        let seconds = interval.seconds() as f64 * lookback as f64;
        let trading_days = seconds / 86_400.0;
        let calendar_days = trading_days * 7.0 / FX_TRADING_DAYS_PER_WEEK + 1.0;

        let ranges: &[(&str, f64)] = &[
            ("1d", 1.0),
            ("5d", 5.0),
            ("1mo", 30.0),
            ("3mo", 90.0),
            ("6mo", 180.0),
            ("1y", 365.0),
            ("2y", 730.0),
        ];
        let cap = match interval {
            Interval::M5 | Interval::M15 => "1mo",
            Interval::H1 | Interval::H4 => "2y",
        };

        for &(name, days) in ranges {
            if name == cap || days >= calendar_days {
                return name;
            }
        }
        cap
    }

    fn chart_url(&self, instrument: &str, interval: Interval, lookback: usize) -> String {
        format!(
            "{}/v8/finance/chart/{}?interval={}&range={}",
            self.base_url,
            Self::yahoo_symbol(instrument),
            Self::native_interval(interval),
            Self::range_for(interval, lookback),
        )
    }

    /// Wait before retry number `attempt` (1-based): base, 2x base, 4x base...
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    async fn fetch_with_retry(
        &self,
        instrument: &str,
        url: &str,
    ) -> Result<ChartResponse, FetchError> {
        let mut last_error = String::from("no attempt made");

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.backoff_delay(attempt)).await;
            }

            let resp = match self.client.get(url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(instrument, attempt, error = %e, "chart request failed");
                    last_error = e.to_string();
                    continue;
                }
            };

            let status = resp.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(FetchError::unavailable(instrument, "symbol not found"));
            }
            if !status.is_success() {
                warn!(instrument, attempt, %status, "chart request returned error status");
                last_error = format!("HTTP {status}");
                continue;
            }

            return resp.json::<ChartResponse>().await.map_err(|e| {
                FetchError::transport(instrument, format!("failed to decode chart response: {e}"))
            });
        }

        Err(FetchError::transport(instrument, last_error))
    }
}

#[async_trait]
impl BarSource for YahooSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    #[instrument(skip(self), name = "yahoo::fetch")]
    async fn fetch(
        &self,
        instrument: &str,
        interval: Interval,
        lookback: usize,
    ) -> Result<Vec<Bar>, FetchError> {
        let url = self.chart_url(instrument, interval, lookback);
        let chart = self.fetch_with_retry(instrument, &url).await?;
        let mut bars = parse_chart(instrument, chart)?;

        if interval == Interval::H4 {
            bars = resample(&bars, Interval::H4);
        }
        if bars.len() > lookback {
            bars.drain(..bars.len() - lookback);
        }

        debug!(instrument, %interval, count = bars.len(), "bars fetched");
        Ok(bars)
    }
}

impl std::fmt::Debug for YahooSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooSource")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Parsing helpers
// -----------------------------------------------------------------------------

fn parse_chart(instrument: &str, resp: ChartResponse) -> Result<Vec<Bar>, FetchError> {
    let results = match (resp.chart.result, resp.chart.error) {
        (Some(results), _) => results,
        (None, Some(err)) => {
            return Err(FetchError::unavailable(
                instrument,
                format!("{}: {}", err.code, err.description),
            ))
        }
        (None, None) => return Err(FetchError::unavailable(instrument, "empty chart result")),
    };

    let Some(data) = results.into_iter().next() else {
        return Ok(Vec::new());
    };
    let timestamps = data.timestamp.unwrap_or_default();
    let Some(quote) = data.indicators.quote.into_iter().next() else {
        return Ok(Vec::new());
    };

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let row = (
            quote.open.get(i).copied().flatten(),
            quote.high.get(i).copied().flatten(),
            quote.low.get(i).copied().flatten(),
            quote.close.get(i).copied().flatten(),
        );
        // Rows with gaps are partial bars; skip them.
        let (Some(open), Some(high), Some(low), Some(close)) = row else {
            continue;
        };
        let Some(timestamp) = DateTime::from_timestamp(ts, 0) else {
            continue;
        };
        bars.push(Bar::new(timestamp, open, high, low, close));
    }

    Ok(bars)
}

/// Aggregate bars into UTC-aligned buckets of `target` length.
pub fn resample(bars: &[Bar], target: Interval) -> Vec<Bar> {
    let bucket_secs = target.seconds();
    let mut out: Vec<Bar> = Vec::new();

    for bar in bars {
        let secs = bar.timestamp.timestamp();
        let bucket_start = secs - secs.rem_euclid(bucket_secs);
        let Some(bucket_ts) = DateTime::from_timestamp(bucket_start, 0) else {
            continue;
        };

        match out.last_mut() {
            Some(last) if last.timestamp == bucket_ts => {
                last.high = last.high.max(bar.high);
                last.low = last.low.min(bar.low);
                last.close = bar.close;
            }
            _ => out.push(Bar::new(bucket_ts, bar.open, bar.high, bar.low, bar.close)),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CHART_PATH: &str = "/v8/finance/chart/EURUSD=X";

    /// 2024-03-04 00:00:00 UTC, a Monday.
    const MONDAY: i64 = 1_709_510_400;

    fn stub_source(server: &MockServer, max_retries: u32) -> YahooSource {
        let mut source = YahooSource::new(Some(server.uri()), 5, max_retries).unwrap();
        source.base_delay = Duration::ZERO;
        source
    }

    fn chart_body(start: i64, step: i64, closes: &[f64]) -> serde_json::Value {
        let timestamps: Vec<i64> = (0..closes.len() as i64).map(|i| start + i * step).collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 0.0005).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 0.0005).collect();
        serde_json::json!({
            "chart": {
                "result": [{
                    "timestamp": timestamps,
                    "indicators": { "quote": [{
                        "open": closes, "high": highs, "low": lows, "close": closes
                    }]}
                }],
                "error": null
            }
        })
    }

    async fn request_count(server: &MockServer) -> usize {
        server.received_requests().await.map_or(0, |r| r.len())
    }

    #[tokio::test]
    async fn error_status_is_retried_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CHART_PATH))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(CHART_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(
                MONDAY,
                300,
                &[1.0850, 1.0852, 1.0851, 1.0855, 1.0858],
            )))
            .mount(&server)
            .await;

        let bars = stub_source(&server, 2).fetch("EURUSD", Interval::M5, 10).await.unwrap();

        assert_eq!(bars.len(), 5);
        assert_eq!(request_count(&server).await, 3);
    }

    #[tokio::test]
    async fn exhausted_retries_become_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = stub_source(&server, 2).fetch("EURUSD", Interval::M5, 10).await.unwrap_err();

        assert_eq!(err.kind(), "TransportError");
        assert!(err.to_string().contains("502"), "{err}");
        assert_eq!(request_count(&server).await, 3);
    }

    #[tokio::test]
    async fn not_found_is_unavailable_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = stub_source(&server, 3).fetch("EURUSD", Interval::M5, 10).await.unwrap_err();

        assert_eq!(err.kind(), "DataUnavailable");
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn undecodable_body_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
            .mount(&server)
            .await;

        let err = stub_source(&server, 2).fetch("EURUSD", Interval::M5, 10).await.unwrap_err();

        assert_eq!(err.kind(), "TransportError");
        assert!(err.to_string().contains("decode"), "{err}");
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut source = YahooSource::new(Some(format!("http://{addr}")), 5, 1).unwrap();
        source.base_delay = Duration::ZERO;
        let err = source.fetch("EURUSD", Interval::M5, 10).await.unwrap_err();

        assert_eq!(err.kind(), "TransportError");
    }

    #[tokio::test]
    async fn fetch_keeps_only_the_last_lookback_bars() {
        let server = MockServer::start().await;
        let closes = [1.10, 1.11, 1.12, 1.13, 1.14, 1.15, 1.16, 1.17];
        Mock::given(method("GET"))
            .and(query_param("interval", "5m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(MONDAY, 300, &closes)))
            .mount(&server)
            .await;

        let bars = stub_source(&server, 0).fetch("EURUSD", Interval::M5, 3).await.unwrap();

        let got: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(got, vec![1.15, 1.16, 1.17]);
        assert_eq!(bars[2].timestamp.timestamp(), MONDAY + 7 * 300);
    }

    #[tokio::test]
    async fn four_hour_fetch_resamples_hourly_bars() {
        let server = MockServer::start().await;
        let closes = [1.20, 1.21, 1.22, 1.23, 1.24, 1.25, 1.26, 1.27];
        Mock::given(method("GET"))
            .and(query_param("interval", "60m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(MONDAY, 3600, &closes)))
            .mount(&server)
            .await;

        let bars = stub_source(&server, 0).fetch("EURUSD", Interval::H4, 10).await.unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp.timestamp(), MONDAY);
        assert_eq!(bars[1].timestamp.timestamp(), MONDAY + 4 * 3600);
        assert!((bars[0].open - 1.20).abs() < 1e-12);
        assert!((bars[0].close - 1.23).abs() < 1e-12);
        assert!((bars[1].close - 1.27).abs() < 1e-12);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let source = YahooSource::new(None, 5, 3).unwrap();
        assert_eq!(source.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(source.backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(source.backoff_delay(3), Duration::from_millis(2000));
    }

    #[test]
    fn symbol_mapping() {
        assert_eq!(YahooSource::yahoo_symbol("eurusd"), "EURUSD=X");
        assert_eq!(YahooSource::yahoo_symbol("GBPJPY=X"), "GBPJPY=X");
        assert_eq!(YahooSource::yahoo_symbol("^DXY"), "^DXY");
    }

    #[test]
    fn range_covers_lookback() {
        // 100 x 5m bars is under a day of trading, padded for weekends.
        assert_eq!(YahooSource::range_for(Interval::M5, 100), "5d");
        // 100 x 1h bars ~ 4 trading days ~ 6.6 calendar days.
        assert_eq!(YahooSource::range_for(Interval::H1, 100), "1mo");
        // 500 x 4h ~ 83 trading days ~ 117 calendar days.
        assert_eq!(YahooSource::range_for(Interval::H4, 500), "6mo");
        // Minute data is capped.
        assert_eq!(YahooSource::range_for(Interval::M15, 100_000), "1mo");
    }

    #[test]
    fn chart_url_shape() {
        let source = YahooSource::new(Some("http://localhost:9999/".into()), 5, 0).unwrap();
        let url = source.chart_url("EURUSD", Interval::H4, 100);
        assert_eq!(
            url,
            "http://localhost:9999/v8/finance/chart/EURUSD=X?interval=60m&range=1mo"
        );
    }

    #[test]
    fn parse_skips_partial_rows() {
        let json = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1700000000, 1700000300, 1700000600],
                    "indicators": { "quote": [{
                        "open":  [1.0850, null,   1.0860],
                        "high":  [1.0855, 1.0858, 1.0866],
                        "low":   [1.0848, 1.0850, 1.0857],
                        "close": [1.0852, 1.0856, 1.0863]
                    }]}
                }],
                "error": null
            }
        }"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        let bars = parse_chart("EURUSD", resp).unwrap();
        assert_eq!(bars.len(), 2);
        assert!((bars[1].close - 1.0863).abs() < 1e-12);
        assert_eq!(bars[0].timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn parse_not_found_is_unavailable() {
        let json = r#"{ "chart": { "result": null,
            "error": { "code": "Not Found", "description": "No data found" } } }"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        let err = parse_chart("XXXYYY", resp).unwrap_err();
        assert_eq!(err.kind(), "DataUnavailable");
    }

    #[test]
    fn resample_hourly_into_four_hour_buckets() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        let bars: Vec<Bar> = (0..6)
            .map(|h| {
                let p = 1.0 + h as f64 * 0.01;
                Bar::new(start + chrono::Duration::hours(h), p, p + 0.005, p - 0.005, p + 0.002)
            })
            .collect();

        let out = resample(&bars, Interval::H4);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].timestamp, start);
        assert!((out[0].open - 1.0).abs() < 1e-12);
        assert!((out[0].high - 1.035).abs() < 1e-12);
        assert!((out[0].low - 0.995).abs() < 1e-12);
        assert!((out[0].close - 1.032).abs() < 1e-12);
        assert_eq!(out[1].timestamp, start + chrono::Duration::hours(4));
    }
}

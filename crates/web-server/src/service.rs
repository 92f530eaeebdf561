use crate::AppState;
use crate::error::AppError;
use alerter::fetch_failure_message;
use analytics::{AggregationProfile, AnalyticsEngine, GroupedSeries, Summary, filter_records};
use api_client::FetchOutcome;
use chrono::{DateTime, Utc};
use core_types::{Credentials, Dataset, Period, RawRecord, TimeWindow};
use record_cache::{CacheKey, account_hash};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Everything needed to produce one report.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub credentials: Credentials,
    pub dataset: Dataset,
    pub period: Period,
    /// Upper-cased symbol (or coin) filter; empty means everything.
    pub symbols: Vec<String>,
}

impl ReportRequest {
    /// Splits a free-text filter like `"btcusdt, ETHUSDT solusdt"`.
    pub fn parse_symbols(raw: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        raw.split(|c: char| c == ',' || c.is_whitespace())
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect()
    }
}

/// A finished report: the aggregated series plus how they were obtained.
#[derive(Debug, Clone)]
pub struct Report {
    pub title: String,
    pub dataset: Dataset,
    pub window: TimeWindow,
    pub from_cache: bool,
    /// Set when the fetch failed part-way and only partial data is shown.
    pub warning: Option<String>,
    pub record_count: usize,
    pub profile: AggregationProfile,
    pub grouped: GroupedSeries,
    pub summary: Summary,
}

/// Remembers when each account last triggered an uncached fetch.
#[derive(Debug)]
pub struct RequestTracker {
    cooldown: Duration,
    last_seen: Mutex<HashMap<String, Instant>>,
}

impl RequestTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Records a fetch for `account`, or refuses it while the previous one is
    /// still inside the cooldown.
    pub fn check(&self, account: &str) -> Result<(), AppError> {
        if self.cooldown.is_zero() {
            return Ok(());
        }
        let now = Instant::now();
        let mut last_seen = self
            .last_seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = last_seen.get(account) {
            let elapsed = now.duration_since(*previous);
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                return Err(AppError::TooManyRequests {
                    retry_after_secs: remaining.as_secs().max(1),
                });
            }
        }
        last_seen.insert(account.to_string(), now);
        Ok(())
    }
}

/// Fetches (or loads from cache), filters and aggregates the records for
/// `request` as of `now`.
///
/// A fetch that fails with some data already gathered still produces a report,
/// flagged with a warning and never cached. A fetch that fails with nothing
/// gathered is an error.
pub async fn generate_report(
    state: &AppState,
    request: &ReportRequest,
    now: DateTime<Utc>,
) -> Result<Report, AppError> {
    if !request.credentials.is_complete() {
        return Err(AppError::InvalidInput("API key and secret are required".to_string()));
    }
    let window = request.period.resolve(now)?;
    let account = account_hash(&request.credentials.api_key);
    let key = CacheKey::new(
        &request.credentials.api_key,
        request.dataset,
        &request.period,
        now,
        &request.symbols,
    );

    let cached = match &state.cache {
        Some(cache) => match cache.load(&key).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(%key, error = %e, "Unreadable cache entry, fetching again.");
                None
            }
        },
        None => None,
    };
    let from_cache = cached.is_some();

    let (records, warning) = match cached {
        Some(records) => {
            tracing::info!(%key, records = records.len(), "Serving cached records.");
            (records, None)
        }
        None => fetch_records(state, request, &account, &key, window).await?,
    };

    let records = filter_records(&records, request.dataset.group_field(), &request.symbols);
    let engine = AnalyticsEngine::new(AggregationProfile::for_dataset(request.dataset));
    let grouped = engine.aggregate(&records);
    let summary = engine.summarize(&grouped);

    let title = format!(
        "{}{} {}",
        if from_cache { "[CACHED] " } else { "" },
        request.dataset.title(),
        request.period.title()
    );
    tracing::info!(
        dataset = %request.dataset,
        period = request.period.slug(),
        %account,
        records = records.len(),
        groups = summary.total_groups,
        from_cache,
        "Report ready."
    );

    Ok(Report {
        title,
        dataset: request.dataset,
        window,
        from_cache,
        warning,
        record_count: records.len(),
        profile: engine.profile().clone(),
        grouped,
        summary,
    })
}

async fn fetch_records(
    state: &AppState,
    request: &ReportRequest,
    account: &str,
    key: &CacheKey,
    window: TimeWindow,
) -> Result<(Vec<RawRecord>, Option<String>), AppError> {
    state.tracker.check(account)?;

    // The API filters on a single symbol only; longer lists are applied locally.
    let mut filters = BTreeMap::new();
    if let [symbol] = request.symbols.as_slice() {
        filters.insert(request.dataset.group_field().to_string(), symbol.clone());
    }

    tracing::info!(dataset = %request.dataset, %account, %window, "Fetching records from the exchange.");
    let outcome = state
        .fetcher
        .fetch_dataset(request.dataset, &request.credentials, &filters, window)
        .await;

    match outcome {
        FetchOutcome::Failed { partial, cause } => {
            tracing::error!(
                dataset = %request.dataset,
                %account,
                kind = cause.kind(),
                error = %cause,
                partial = partial.len(),
                "Fetch failed."
            );
            if let Some(alerter) = &state.alerter {
                alerter.notify(fetch_failure_message(
                    request.dataset.as_str(),
                    account,
                    &cause.to_string(),
                    partial.len(),
                ));
            }
            if partial.is_empty() {
                return Err(AppError::Fetch(cause));
            }
            let warning = format!(
                "The exchange request failed ({cause}). Showing the {} records fetched before the error.",
                partial.len()
            );
            Ok((partial, Some(warning)))
        }
        complete => {
            let records = complete.into_records();
            if let Some(cache) = &state.cache {
                if let Err(e) = cache.save(key, &records).await {
                    tracing::warn!(%key, error = %e, "Failed to cache records.");
                }
            }
            Ok((records, None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubClient, state_with};
    use api_client::ApiError;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn request(symbols: &[&str]) -> ReportRequest {
        ReportRequest {
            credentials: Credentials::new("key", "secret"),
            dataset: Dataset::ClosedPnl,
            period: Period::Today,
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn pnl(symbol: &str, time: i64, value: &str) -> serde_json::Value {
        json!({ "symbol": symbol, "updatedTime": time.to_string(), "closedPnl": value })
    }

    #[test]
    fn symbols_are_split_and_normalised() {
        assert_eq!(
            ReportRequest::parse_symbols(" btcusdt, ETHUSDT  solusdt,,"),
            ["BTCUSDT", "ETHUSDT", "SOLUSDT"]
        );
        assert!(ReportRequest::parse_symbols("  ").is_empty());
    }

    #[test]
    fn repeated_symbols_collapse_in_first_seen_order() {
        assert_eq!(
            ReportRequest::parse_symbols("ethusdt,BTCUSDT ETHUSDT btcusdt"),
            ["ETHUSDT", "BTCUSDT"]
        );
        assert_eq!(ReportRequest::parse_symbols("BTCUSDT x BTCUSDT"), ["BTCUSDT", "X"]);
        assert_eq!(ReportRequest::parse_symbols("solusdt SOLUSDT"), ["SOLUSDT"]);
    }

    #[test]
    fn tracker_enforces_cooldown_per_account() {
        let tracker = RequestTracker::new(Duration::from_secs(60));
        tracker.check("a").unwrap();
        tracker.check("b").unwrap();
        assert!(matches!(
            tracker.check("a"),
            Err(AppError::TooManyRequests { retry_after_secs }) if retry_after_secs > 0
        ));

        let disabled = RequestTracker::new(Duration::ZERO);
        disabled.check("a").unwrap();
        disabled.check("a").unwrap();
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let client = StubClient::pages(vec![vec![
            pnl("BTCUSDT", 1000, "10"),
            pnl("ETHUSDT", 2000, "-4"),
        ]]);
        let state = state_with(client.clone(), Some(dir.path())).await;

        let first = generate_report(&state, &request(&[]), now()).await.unwrap();
        let second = generate_report(&state, &request(&[]), now()).await.unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert!(second.title.starts_with("[CACHED] "));
        assert_eq!(client.calls(), 1);
        assert_eq!(first.summary, second.summary);
        assert_eq!(first.summary.total_groups, 2);
    }

    #[tokio::test]
    async fn single_symbol_is_sent_to_the_api_and_applied_locally() {
        let client = StubClient::pages(vec![vec![
            pnl("BTCUSDT", 1000, "10"),
            pnl("ETHUSDT", 2000, "-4"),
        ]]);
        let state = state_with(client.clone(), None).await;

        let report = generate_report(&state, &request(&["BTCUSDT"]), now()).await.unwrap();

        assert_eq!(client.last_filter("symbol").as_deref(), Some("BTCUSDT"));
        assert_eq!(report.record_count, 1);
        assert!(report.grouped.get("ETHUSDT").is_none());
    }

    #[tokio::test]
    async fn partial_failure_is_reported_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let client = StubClient::failing_after(
            vec![vec![pnl("BTCUSDT", 1000, "3")]],
            ApiError::Exchange { code: 10006, message: "Too many visits".to_string() },
        );
        let state = state_with(client.clone(), Some(dir.path())).await;

        let report = generate_report(&state, &request(&[]), now()).await.unwrap();

        assert_eq!(report.record_count, 1);
        assert!(report.warning.as_deref().unwrap().contains("10006"));
        let key = CacheKey::new("key", Dataset::ClosedPnl, &Period::Today, now(), &[]);
        let cache = state.cache.as_ref().unwrap();
        assert!(cache.load(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failure_without_data_is_an_error() {
        let client = StubClient::failing_after(
            vec![],
            ApiError::HttpStatus { status: 401, body: "denied".to_string() },
        );
        let state = state_with(client, None).await;

        let err = generate_report(&state, &request(&[]), now()).await.unwrap_err();

        assert!(matches!(err, AppError::Fetch(ApiError::HttpStatus { status: 401, .. })));
    }

    #[tokio::test]
    async fn missing_credentials_are_rejected() {
        let state = state_with(StubClient::pages(vec![]), None).await;
        let mut req = request(&[]);
        req.credentials = Credentials::new("key", " ");

        let err = generate_report(&state, &req, now()).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}

use crate::endpoints::descriptor;
use crate::error::ApiError;
use crate::{ApiClient, PageQuery};
use configuration::PacingSettings;
use core_types::{Credentials, Dataset, Endpoint, RawRecord, TimeWindow};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a history fetch produced.
///
/// Keeps "the exchange has nothing for this period" apart from "we stopped
/// because a request failed", which a plain `Vec` cannot.
#[derive(Debug)]
pub enum FetchOutcome {
    Data(Vec<RawRecord>),
    Empty,
    /// Records gathered before the first failing request, plus the cause.
    Failed {
        partial: Vec<RawRecord>,
        cause: ApiError,
    },
}

impl FetchOutcome {
    fn from_records(records: Vec<RawRecord>) -> Self {
        if records.is_empty() {
            FetchOutcome::Empty
        } else {
            FetchOutcome::Data(records)
        }
    }

    pub fn records(&self) -> &[RawRecord] {
        match self {
            FetchOutcome::Data(records) => records,
            FetchOutcome::Empty => &[],
            FetchOutcome::Failed { partial, .. } => partial,
        }
    }

    pub fn into_records(self) -> Vec<RawRecord> {
        match self {
            FetchOutcome::Data(records) => records,
            FetchOutcome::Empty => Vec::new(),
            FetchOutcome::Failed { partial, .. } => partial,
        }
    }

    pub fn cause(&self) -> Option<&ApiError> {
        match self {
            FetchOutcome::Failed { cause, .. } => Some(cause),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, FetchOutcome::Failed { .. })
    }
}

/// Pulls complete history from the windowed, cursor-paginated endpoints.
///
/// Requests are strictly sequential: one page at a time, one sub-window at a
/// time, with the configured pauses in between.
pub struct Fetcher<C> {
    client: C,
    pacing: PacingSettings,
}

impl<C: ApiClient> Fetcher<C> {
    pub fn new(client: C, pacing: PacingSettings) -> Self {
        Self { client, pacing }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetches every record of `endpoint` between `start_time` and `end_time`.
    ///
    /// When both bounds are given and the span exceeds the endpoint's maximum
    /// window, the range is split into consecutive sub-windows and the results
    /// are concatenated in window order. Within a window the exchange's own
    /// page order is kept. The first failing request ends the whole fetch.
    pub async fn fetch(
        &self,
        endpoint: Endpoint,
        credentials: &Credentials,
        filters: &BTreeMap<String, String>,
        start_time: Option<i64>,
        end_time: Option<i64>,
    ) -> FetchOutcome {
        let bounds: Vec<(Option<i64>, Option<i64>)> = match (start_time, end_time) {
            (Some(start), Some(end)) => match TimeWindow::new(start, end) {
                Ok(window) => {
                    let parts = window.split(descriptor(endpoint).max_window_ms);
                    if parts.len() > 1 {
                        info!(%endpoint, %window, windows = parts.len(), "Range exceeds the endpoint window, splitting.");
                    }
                    parts.into_iter().map(|w| (Some(w.start), Some(w.end))).collect()
                }
                Err(e) => {
                    return FetchOutcome::Failed {
                        partial: Vec::new(),
                        cause: ApiError::InvalidRequest(e.to_string()),
                    };
                }
            },
            open => vec![open],
        };

        let mut records = Vec::new();
        for (index, (start, end)) in bounds.into_iter().enumerate() {
            if index > 0 {
                pause(self.pacing.window_delay()).await;
            }
            if let Err(cause) = self
                .fetch_window(endpoint, credentials, filters, start, end, &mut records)
                .await
            {
                warn!(%endpoint, kind = cause.kind(), error = %cause, records = records.len(), "Fetch stopped early.");
                return FetchOutcome::Failed { partial: records, cause };
            }
        }

        info!(%endpoint, records = records.len(), "Fetch complete.");
        FetchOutcome::from_records(records)
    }

    /// Fetches every endpoint of `dataset` over `window`, one after another.
    ///
    /// Each record is tagged with the endpoint it came from under
    /// `RawRecord::SOURCE_FIELD` so mixed datasets can be told apart later.
    pub async fn fetch_dataset(
        &self,
        dataset: Dataset,
        credentials: &Credentials,
        filters: &BTreeMap<String, String>,
        window: TimeWindow,
    ) -> FetchOutcome {
        let mut records = Vec::new();
        for (index, endpoint) in dataset.endpoints().iter().copied().enumerate() {
            if index > 0 {
                pause(self.pacing.window_delay()).await;
            }
            let outcome = self
                .fetch(endpoint, credentials, filters, Some(window.start), Some(window.end))
                .await;
            let failed = match outcome {
                FetchOutcome::Failed { partial, cause } => Some((partial, cause)),
                other => {
                    records.extend(tag(other.into_records(), endpoint));
                    None
                }
            };
            if let Some((partial, cause)) = failed {
                records.extend(tag(partial, endpoint));
                return FetchOutcome::Failed { partial: records, cause };
            }
        }
        FetchOutcome::from_records(records)
    }

    async fn fetch_window(
        &self,
        endpoint: Endpoint,
        credentials: &Credentials,
        filters: &BTreeMap<String, String>,
        start_time: Option<i64>,
        end_time: Option<i64>,
        records: &mut Vec<RawRecord>,
    ) -> Result<(), ApiError> {
        let mut query = PageQuery {
            start_time,
            end_time,
            cursor: None,
            filters: filters.clone(),
        };

        for page_number in 1..=self.pacing.max_pages_per_window {
            if page_number > 1 {
                pause(self.pacing.page_delay()).await;
            }

            let page = self.client.fetch_page(endpoint, credentials, &query).await?;
            debug!(%endpoint, page = page_number, records = page.records.len(), "Page received.");

            let has_more = page.has_more();
            records.extend(page.records);
            if !has_more {
                return Ok(());
            }
            query.cursor = page.next_cursor;
        }

        Err(ApiError::PageLimitExceeded {
            endpoint,
            pages: self.pacing.max_pages_per_window,
        })
    }
}

fn tag(records: Vec<RawRecord>, endpoint: Endpoint) -> impl Iterator<Item = RawRecord> {
    records
        .into_iter()
        .map(move |r| r.with_field(RawRecord::SOURCE_FIELD, endpoint.as_str()))
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ApiKeyInfo;
    use async_trait::async_trait;
    use core_types::Page;
    use serde_json::json;
    use std::sync::Mutex;

    const DAY: i64 = 24 * 60 * 60 * 1000;

    type Responder = Box<dyn Fn(Endpoint, &PageQuery) -> Result<Page, ApiError> + Send + Sync>;

    /// Scripted exchange: answers from a closure and records every query.
    struct MockClient {
        respond: Responder,
        calls: Mutex<Vec<(Endpoint, PageQuery)>>,
    }

    impl MockClient {
        fn new(
            respond: impl Fn(Endpoint, &PageQuery) -> Result<Page, ApiError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                respond: Box::new(respond),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ApiClient for MockClient {
        async fn fetch_page(
            &self,
            endpoint: Endpoint,
            _credentials: &Credentials,
            query: &PageQuery,
        ) -> Result<Page, ApiError> {
            self.calls.lock().unwrap().push((endpoint, query.clone()));
            (self.respond)(endpoint, query)
        }

        async fn api_key_info(&self, _credentials: &Credentials) -> Result<ApiKeyInfo, ApiError> {
            Ok(ApiKeyInfo::default())
        }
    }

    fn rec(id: &str) -> RawRecord {
        serde_json::from_value(json!({ "id": id })).unwrap()
    }

    fn page(ids: &[&str], cursor: Option<&str>) -> Page {
        Page {
            records: ids.iter().map(|id| rec(id)).collect(),
            next_cursor: cursor.map(str::to_string),
        }
    }

    fn ids(records: &[RawRecord]) -> Vec<String> {
        records.iter().filter_map(|r| r.text("id")).collect()
    }

    fn fetcher(client: MockClient, max_pages: u32) -> Fetcher<MockClient> {
        Fetcher::new(client, PacingSettings::immediate(max_pages))
    }

    fn creds() -> Credentials {
        Credentials::new("key", "secret")
    }

    #[tokio::test]
    async fn concatenates_pages_until_cursor_is_absent() {
        let client = MockClient::new(|_, q| {
            Ok(match q.cursor.as_deref() {
                None => page(&["a", "b"], Some("c1")),
                Some("c1") => page(&["c"], Some("c2")),
                Some("c2") => page(&["d"], None),
                Some(other) => panic!("unexpected cursor {other}"),
            })
        });
        let fetcher = fetcher(client, 10);

        let outcome = fetcher
            .fetch(Endpoint::ClosedPnl, &creds(), &BTreeMap::new(), Some(0), Some(DAY))
            .await;

        assert_eq!(ids(outcome.records()), ["a", "b", "c", "d"]);
        assert!(matches!(outcome, FetchOutcome::Data(_)));
        let calls = fetcher.client().calls.lock().unwrap();
        let cursors: Vec<_> = calls.iter().map(|(_, q)| q.cursor.clone()).collect();
        assert_eq!(cursors, [None, Some("c1".to_string()), Some("c2".to_string())]);
    }

    #[tokio::test]
    async fn empty_first_page_is_empty_not_failure() {
        let fetcher = fetcher(MockClient::new(|_, _| Ok(page(&[], Some("ignored")))), 10);

        let outcome = fetcher
            .fetch(Endpoint::Executions, &creds(), &BTreeMap::new(), Some(0), Some(DAY))
            .await;

        assert!(matches!(outcome, FetchOutcome::Empty));
        assert_eq!(fetcher.client().calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn long_ranges_are_split_into_contiguous_windows() {
        let client = MockClient::new(|_, q| {
            let start = q.start_time.unwrap().to_string();
            Ok(page(&[start.as_str()], None))
        });
        let fetcher = fetcher(client, 10);

        let outcome = fetcher
            .fetch(Endpoint::ClosedPnl, &creds(), &BTreeMap::new(), Some(0), Some(20 * DAY))
            .await;

        let calls = fetcher.client().calls.lock().unwrap();
        let windows: Vec<_> = calls
            .iter()
            .map(|(_, q)| (q.start_time.unwrap(), q.end_time.unwrap()))
            .collect();
        assert_eq!(
            windows,
            [(0, 7 * DAY), (7 * DAY + 1, 14 * DAY + 1), (14 * DAY + 2, 20 * DAY)]
        );
        // Results keep window order.
        assert_eq!(
            ids(outcome.records()),
            ["0".to_string(), (7 * DAY + 1).to_string(), (14 * DAY + 2).to_string()]
        );
    }

    #[tokio::test]
    async fn treasury_endpoints_use_thirty_day_windows() {
        let fetcher = fetcher(MockClient::new(|_, _| Ok(page(&[], None))), 10);

        fetcher
            .fetch(Endpoint::Deposits, &creds(), &BTreeMap::new(), Some(0), Some(30 * DAY))
            .await;
        assert_eq!(fetcher.client().calls.lock().unwrap().len(), 1);

        fetcher
            .fetch(Endpoint::Deposits, &creds(), &BTreeMap::new(), Some(0), Some(30 * DAY + 1))
            .await;
        assert_eq!(fetcher.client().calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn single_bound_is_passed_through_unsplit() {
        let fetcher = fetcher(MockClient::new(|_, _| Ok(page(&["x"], None))), 10);

        fetcher
            .fetch(Endpoint::ClosedPnl, &creds(), &BTreeMap::new(), Some(5), None)
            .await;

        let calls = fetcher.client().calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.start_time, Some(5));
        assert_eq!(calls[0].1.end_time, None);
    }

    #[tokio::test]
    async fn page_ceiling_stops_a_runaway_cursor() {
        let fetcher = fetcher(MockClient::new(|_, _| Ok(page(&["loop"], Some("same")))), 3);

        let outcome = fetcher
            .fetch(Endpoint::ClosedPnl, &creds(), &BTreeMap::new(), Some(0), Some(DAY))
            .await;

        match outcome {
            FetchOutcome::Failed { partial, cause } => {
                assert_eq!(partial.len(), 3);
                assert!(matches!(cause, ApiError::PageLimitExceeded { pages: 3, .. }));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn failure_keeps_partial_records_and_stops() {
        let client = MockClient::new(|_, q| {
            if q.start_time == Some(0) {
                Ok(page(&["first"], None))
            } else {
                Err(ApiError::Exchange { code: 10006, message: "Too many visits".into() })
            }
        });
        let fetcher = fetcher(client, 10);

        let outcome = fetcher
            .fetch(Endpoint::ClosedPnl, &creds(), &BTreeMap::new(), Some(0), Some(30 * DAY))
            .await;

        assert!(outcome.is_failure());
        assert!(outcome.cause().unwrap().is_rate_limited());
        assert_eq!(ids(outcome.records()), ["first"]);
        // Second window failed; no further windows were requested.
        assert_eq!(fetcher.client().calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn inverted_range_fails_without_requests() {
        let fetcher = fetcher(MockClient::new(|_, _| Ok(page(&["x"], None))), 10);

        let outcome = fetcher
            .fetch(Endpoint::ClosedPnl, &creds(), &BTreeMap::new(), Some(10), Some(5))
            .await;

        assert!(matches!(
            outcome,
            FetchOutcome::Failed { cause: ApiError::InvalidRequest(_), .. }
        ));
        assert!(fetcher.client().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn treasury_dataset_tags_each_source_in_order() {
        let client = MockClient::new(|endpoint, _| Ok(page(&[endpoint.as_str()], None)));
        let fetcher = fetcher(client, 10);
        let filters = BTreeMap::from([("coin".to_string(), "USDT".to_string())]);

        let outcome = fetcher
            .fetch_dataset(Dataset::Treasury, &creds(), &filters, TimeWindow::new(0, DAY).unwrap())
            .await;

        let sources: Vec<_> = outcome
            .records()
            .iter()
            .filter_map(|r| r.text(RawRecord::SOURCE_FIELD))
            .collect();
        assert_eq!(
            sources,
            ["internal_transfers", "universal_transfers", "withdrawals", "deposits"]
        );
        let calls = fetcher.client().calls.lock().unwrap();
        assert!(calls.iter().all(|(_, q)| q.filters.get("coin").map(String::as_str) == Some("USDT")));
    }

    #[tokio::test]
    async fn dataset_stops_at_first_failing_endpoint() {
        let client = MockClient::new(|endpoint, _| match endpoint {
            Endpoint::Withdrawals => Err(ApiError::HttpStatus { status: 500, body: String::new() }),
            other => Ok(page(&[other.as_str()], None)),
        });
        let fetcher = fetcher(client, 10);

        let outcome = fetcher
            .fetch_dataset(Dataset::Treasury, &creds(), &BTreeMap::new(), TimeWindow::new(0, DAY).unwrap())
            .await;

        assert!(outcome.is_failure());
        assert_eq!(outcome.records().len(), 2);
        let endpoints: Vec<_> = fetcher.client().calls.lock().unwrap().iter().map(|(e, _)| *e).collect();
        assert!(!endpoints.contains(&Endpoint::Deposits));
    }
}

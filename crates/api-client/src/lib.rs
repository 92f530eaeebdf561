use crate::auth::signed_query;
use async_trait::async_trait;
use chrono::Utc;
use configuration::ExchangeSettings;
use core_types::{Credentials, Endpoint, Page};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

mod auth;
pub mod endpoints;
pub mod error;
pub mod fetcher;
pub mod responses;
// --- Public API ---
pub use auth::sign_request;
pub use endpoints::{EndpointDescriptor, descriptor};
pub use error::ApiError;
pub use fetcher::{FetchOutcome, Fetcher};
pub use responses::{ApiKeyInfo, Envelope, PageResult};

/// Parameters for one page request, before authentication is added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub cursor: Option<String>,
    /// Endpoint-specific filters, e.g. `symbol` or `coin`.
    pub filters: BTreeMap<String, String>,
}

/// The abstract interface to the exchange's account-history API.
/// The fetcher drives any implementation, which keeps pagination and window
/// splitting testable without a network.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Requests a single page of `endpoint`. (Authenticated)
    async fn fetch_page(
        &self,
        endpoint: Endpoint,
        credentials: &Credentials,
        query: &PageQuery,
    ) -> Result<Page, ApiError>;

    /// Describes the key the request is signed with. (Authenticated)
    async fn api_key_info(&self, credentials: &Credentials) -> Result<ApiKeyInfo, ApiError>;
}

/// A concrete implementation of the `ApiClient` for the Bybit v5 REST API.
#[derive(Clone)]
pub struct BybitClient {
    client: reqwest::Client,
    base_url: String,
    recv_window_ms: u64,
    category: String,
}

impl BybitClient {
    pub fn new(settings: &ExchangeSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            recv_window_ms: settings.recv_window_ms,
            category: settings.category.clone(),
        })
    }

    async fn get_signed<T: DeserializeOwned>(
        &self,
        path: &str,
        credentials: &Credentials,
        params: BTreeMap<&str, String>,
    ) -> Result<T, ApiError> {
        let query = signed_query(
            credentials,
            params,
            self.recv_window_ms,
            Utc::now().timestamp_millis(),
        )?;
        let url = format!("{}{}?{}", self.base_url, path, query);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                body: text.chars().take(256).collect(),
            });
        }

        let envelope: Envelope = serde_json::from_str(&text)
            .map_err(|e| ApiError::Deserialization(format!("{}. Original text: {}", e, text)))?;
        if envelope.ret_code != 0 {
            return Err(ApiError::Exchange {
                code: envelope.ret_code,
                message: envelope.ret_msg,
            });
        }

        let result = match envelope.result {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        serde_json::from_value::<T>(result).map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

#[async_trait]
impl ApiClient for BybitClient {
    async fn fetch_page(
        &self,
        endpoint: Endpoint,
        credentials: &Credentials,
        query: &PageQuery,
    ) -> Result<Page, ApiError> {
        let descriptor = descriptor(endpoint);

        let mut params = BTreeMap::new();
        params.insert("limit", descriptor.page_limit.to_string());
        if descriptor.needs_category {
            params.insert("category", self.category.clone());
        }
        if let Some(start) = query.start_time {
            params.insert("startTime", start.to_string());
        }
        if let Some(end) = query.end_time {
            params.insert("endTime", end.to_string());
        }
        if let Some(cursor) = &query.cursor {
            params.insert("cursor", cursor.clone());
        }
        for (key, value) in &query.filters {
            params.insert(key.as_str(), value.clone());
        }

        let result: PageResult = self.get_signed(descriptor.path, credentials, params).await?;
        Ok(result.into())
    }

    async fn api_key_info(&self, credentials: &Credentials) -> Result<ApiKeyInfo, ApiError> {
        self.get_signed(endpoints::API_KEY_INFO_PATH, credentials, BTreeMap::new())
            .await
    }
}

/// Lets shared clients (including `Arc<dyn ApiClient>`) drive a `Fetcher`.
#[async_trait]
impl<T: ApiClient + ?Sized> ApiClient for Arc<T> {
    async fn fetch_page(
        &self,
        endpoint: Endpoint,
        credentials: &Credentials,
        query: &PageQuery,
    ) -> Result<Page, ApiError> {
        (**self).fetch_page(endpoint, credentials, query).await
    }

    async fn api_key_info(&self, credentials: &Credentials) -> Result<ApiKeyInfo, ApiError> {
        (**self).api_key_info(credentials).await
    }
}

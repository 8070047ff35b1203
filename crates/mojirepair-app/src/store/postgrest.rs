use std::{num::NonZeroU32, sync::Arc, time::Duration};

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::{
    Client, StatusCode, Url,
    header::{self, HeaderMap, HeaderName, HeaderValue},
};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::constants::RECORD_COLUMNS;
use crate::store::{
    RecordStore,
    types::{Record, RecordId, RecordPatch, StoreError},
};

const REST_PREFIX: &str = "rest/v1/";
const API_KEY_HEADER: &str = "apikey";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

type StoreRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Supabase/PostgREST client for a single collection.
#[derive(Debug, Clone)]
pub struct PostgrestStore {
    collection_url: Url,
    http: Client,
    headers: HeaderMap,
    rate_limiter: Option<Arc<StoreRateLimiter>>,
    backoff: ExponentialBuilder,
}

impl PostgrestStore {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Result<Self, StoreError> {
        let mut normalized = base_url.trim().to_owned();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let parsed = Url::parse(&normalized)
            .map_err(|_| StoreError::InvalidBaseUrl(base_url.to_string()))?;
        let path = format!("{REST_PREFIX}{table}");
        let collection_url = parsed.join(&path).map_err(|err| StoreError::UrlJoin {
            path,
            source: Arc::new(err),
        })?;

        let key = HeaderValue::from_str(api_key).map_err(|_| StoreError::InvalidApiKey)?;
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| StoreError::InvalidApiKey)?;
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(API_KEY_HEADER), key);
        headers.insert(header::AUTHORIZATION, bearer);
        headers.insert(
            HeaderName::from_static("prefer"),
            HeaderValue::from_static("return=minimal"),
        );

        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("mojirepair/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| StoreError::request("build_client", err))?;

        Ok(Self {
            collection_url,
            http,
            headers,
            rate_limiter: None,
            backoff: fetch_backoff(3),
        })
    }

    /// Caps store requests per second. `0` disables the limiter.
    pub fn with_rate_limit(mut self, per_second: u32) -> Self {
        self.rate_limiter = NonZeroU32::new(per_second)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        self
    }

    /// Total attempts made for a page fetch before giving up.
    pub fn with_fetch_attempts(mut self, attempts: usize) -> Self {
        self.backoff = fetch_backoff(attempts);
        self
    }

    pub fn with_backoff(mut self, backoff: ExponentialBuilder) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn collection_url(&self) -> &Url {
        &self.collection_url
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
    }

    async fn fetch_once(&self, offset: usize, limit: usize) -> Result<Vec<Record>, StoreError> {
        let stage = "fetch_page";
        self.throttle().await;

        let response = self
            .http
            .get(self.collection_url.clone())
            .headers(self.headers.clone())
            .query(&[
                ("select", RECORD_COLUMNS.to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(|err| StoreError::request(stage, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), %body, "store rejected page fetch");
            return Err(StoreError::HttpStatus {
                stage,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| StoreError::body(stage, err))?;
        serde_json::from_slice(&body).map_err(|err| StoreError::json(stage, err))
    }
}

fn fetch_backoff(attempts: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(250))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(attempts.saturating_sub(1))
        .with_jitter()
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Record>, StoreError> {
        let stage = "fetch_page";
        (|| self.fetch_once(offset, limit))
            .retry(self.backoff.clone())
            .sleep(sleep)
            .when(StoreError::is_transient)
            .notify(|err: &StoreError, delay: Duration| {
                warn!(
                    stage,
                    offset,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "retrying page fetch"
                );
            })
            .await
    }

    async fn update(&self, id: &RecordId, patch: &RecordPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Err(StoreError::EmptyPatch { id: id.clone() });
        }

        let stage = "update_record";
        self.throttle().await;

        let response = self
            .http
            .patch(self.collection_url.clone())
            .headers(self.headers.clone())
            .query(&[("id", format!("eq.{id}"))])
            .json(patch)
            .send()
            .await
            .map_err(|err| StoreError::request(stage, err))?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            status => Err(StoreError::HttpStatus {
                stage,
                status: status.as_u16(),
            }),
        }
    }
}

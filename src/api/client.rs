use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::types::{BookmarkSummary, FilterCriteria, QueryResult};

/// Responses larger than this are rejected before decoding.
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Returns true if this error is transient and the request should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout(_) | ApiError::Network(_) => true,
            ApiError::HttpStatus(status) => *status >= 500,
            ApiError::ResponseTooLarge(_) | ApiError::Decode(_) | ApiError::InvalidUrl(_) => false,
        }
    }
}

/// Remote source of bookmark records.
///
/// The query cache owns one of these and calls it whenever an entry has to be
/// (re)fetched. Futures are `'static` so the cache can spawn them.
pub trait BookmarkSource: Send + Sync + 'static {
    /// List bookmarks matching `criteria`, in server order.
    fn get_bookmarks(&self, criteria: FilterCriteria)
        -> BoxFuture<'static, Result<QueryResult, ApiError>>;

    /// Fetch a single bookmark by id.
    fn get_bookmark(&self, id: String) -> BoxFuture<'static, Result<BookmarkSummary, ApiError>>;
}

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiOptions {
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// HTTP client for the bookmarks REST API.
///
/// Cheap to clone: `reqwest::Client` is reference counted and the rest is
/// small configuration.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
    options: ApiOptions,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("options", &self.options)
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        options: ApiOptions,
    ) -> Result<Self, ApiError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                base_url.scheme()
            )));
        }
        // Url::join replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("shelf/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key,
            options,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET api/v1/bookmarks` with the criteria as query pairs.
    ///
    /// An empty id set is answered locally with no bookmarks; sent as-is it
    /// would be indistinguishable from an unfiltered request.
    pub async fn list_bookmarks(&self, criteria: &FilterCriteria) -> Result<QueryResult, ApiError> {
        if criteria.matches_nothing() {
            tracing::debug!("Empty id set, skipping bookmark list request");
            return Ok(QueryResult::default());
        }
        let url = self.endpoint("api/v1/bookmarks")?;
        let pairs = criteria.query_pairs();
        tracing::debug!(criteria = %criteria.describe(), "Fetching bookmark list");
        self.get_with_retry(url, &pairs).await
    }

    /// `GET api/v1/bookmarks/{id}`.
    pub async fn bookmark(&self, id: &str) -> Result<BookmarkSummary, ApiError> {
        let mut url = self.endpoint("api/v1/bookmarks")?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .push(id);
        tracing::debug!(id, "Fetching bookmark");
        self.get_with_retry(url, &[]).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))
    }

    /// GET with retry logic for transient failures.
    /// Uses exponential backoff: 1s, 2s, 4s, ...
    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        mut url: Url,
        query: &[(&'static str, String)],
    ) -> Result<T, ApiError> {
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        let mut retry_count = 0;

        loop {
            match self.get_once(url.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retry_count < self.options.max_retries => {
                    let delay = 1u64 << retry_count.min(6);
                    tracing::debug!(
                        error = %e,
                        retry = retry_count + 1,
                        delay_secs = delay,
                        "Retrying bookmarks request after transient error"
                    );
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let mut request = self.http.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key.expose_secret()));
        }

        let timeout = self.options.timeout;
        let response = tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| ApiError::Timeout(timeout.as_secs()))?
            .map_err(ApiError::Network)?;

        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status().as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl BookmarkSource for ApiClient {
    fn get_bookmarks(
        &self,
        criteria: FilterCriteria,
    ) -> BoxFuture<'static, Result<QueryResult, ApiError>> {
        let client = self.clone();
        async move { client.list_bookmarks(&criteria).await }.boxed()
    }

    fn get_bookmark(&self, id: String) -> BoxFuture<'static, Result<BookmarkSummary, ApiError>> {
        let client = self.clone();
        async move { client.bookmark(&id).await }.boxed()
    }
}

async fn read_limited_bytes(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, ApiError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ApiError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

//! HTTP client with retry logic and caching.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{
    policies::ExponentialBackoff, Jitter, RetryTransientMiddleware, Retryable, RetryableStrategy,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use tachyon_core::{
    defaults, logging, validate_usecase_id, CreateDatasetRequest, Dataset, Error,
    EvaluationHistory, EvaluationRequest, EvaluationStatusReport, Golden, GoldenPatch, NewGolden,
    Result,
};

use crate::auth::{CredentialStore, LogUnauthorized, MemoryCredentialStore, UnauthorizedHandler};
use crate::cache::{cache_key, CacheStats, ResponseCache};
use crate::config::ClientConfig;
use crate::goldens::validate_new_goldens;

/// Whether a GET may be answered from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheRead {
    Allow,
    Bypass,
}

/// Evaluation backend client: tenant-scoped REST operations with response
/// caching, transient-failure retries and bearer authentication.
///
/// Build exactly one per application and share it as a [`SharedClient`].
pub struct ApiClient {
    http: ClientWithMiddleware,
    config: ClientConfig,
    cache: ResponseCache,
    usecase: RwLock<String>,
    credentials: Arc<dyn CredentialStore>,
    on_unauthorized: Arc<dyn UnauthorizedHandler>,
}

/// Arc-wrapped client for shared ownership.
pub type SharedClient = Arc<ApiClient>;

impl ApiClient {
    /// Create a client with host-provided credential store and 401 handler.
    pub fn new(
        config: ClientConfig,
        credentials: Arc<dyn CredentialStore>,
        on_unauthorized: Arc<dyn UnauthorizedHandler>,
    ) -> Result<Self> {
        config.validate()?;

        let reqwest_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

        // Retry n waits retry_delay * 2^(n-1), no jitter
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(config.retry_delay, config.backoff(config.max_retries.max(1)))
            .jitter(Jitter::None)
            .base(2)
            .build_with_max_retries(config.max_retries);

        let http = ClientBuilder::new(reqwest_client)
            .with(RetryTransientMiddleware::new_with_policy_and_strategy(
                retry_policy,
                TransientStrategy,
            ))
            .build();

        info!(
            base_url = %config.base_url,
            usecase = %config.usecase,
            max_retries = config.max_retries,
            cache_ttl_secs = config.cache_ttl.as_secs(),
            cache_capacity = config.cache_capacity,
            "Initializing API client"
        );

        Ok(Self {
            http,
            cache: ResponseCache::new(config.cache_capacity, config.cache_ttl),
            usecase: RwLock::new(config.usecase.clone()),
            config,
            credentials,
            on_unauthorized,
        })
    }

    /// Create a client with an in-memory credential store and a logging
    /// 401 handler.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::new(
            config,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(LogUnauthorized),
        )
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::with_config(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The credential store the client reads its bearer token from.
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    // =========================================================================
    // Tenant scope & cache
    // =========================================================================

    /// Active usecase.
    pub async fn usecase(&self) -> String {
        self.usecase.read().await.clone()
    }

    /// Switch the active usecase and drop everything cached under the old one.
    pub async fn set_usecase(&self, usecase: &str) -> Result<()> {
        validate_usecase_id(usecase)?;
        let mut current = self.usecase.write().await;
        let previous = std::mem::replace(&mut *current, usecase.to_string());
        self.cache.clear().await;
        info!(from = %previous, usecase = %usecase, "Usecase changed, cache cleared");
        Ok(())
    }

    /// Clear all cached responses.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    // =========================================================================
    // Datasets
    // =========================================================================

    /// List datasets of the active usecase.
    pub async fn get_datasets(&self) -> Result<Vec<Dataset>> {
        self.get(
            "get_datasets",
            &["datasets"],
            CacheRead::Allow,
            "Failed to fetch datasets",
        )
        .await
    }

    pub async fn create_dataset(&self, alias: &str) -> Result<Dataset> {
        if alias.trim().is_empty() {
            return Err(Error::InvalidInput("alias is required".into()));
        }
        self.mutate(
            "create_dataset",
            Method::POST,
            &["datasets"],
            Some(&CreateDatasetRequest { alias }),
            "Failed to create dataset",
        )
        .await
    }

    pub async fn delete_dataset(&self, dataset_id: &str) -> Result<()> {
        require_id("dataset id", dataset_id)?;
        self.mutate_empty(
            "delete_dataset",
            Method::DELETE,
            &["datasets", dataset_id],
        )
        .await
    }

    // =========================================================================
    // Goldens
    // =========================================================================

    pub async fn get_goldens(&self, dataset_id: &str) -> Result<Vec<Golden>> {
        require_id("dataset id", dataset_id)?;
        self.get(
            "get_goldens",
            &["datasets", dataset_id, "goldens"],
            CacheRead::Allow,
            "Failed to fetch goldens",
        )
        .await
    }

    pub async fn create_golden(&self, dataset_id: &str, golden: &NewGolden) -> Result<Golden> {
        require_id("dataset id", dataset_id)?;
        golden.validate()?;
        self.mutate(
            "create_golden",
            Method::POST,
            &["datasets", dataset_id, "goldens"],
            Some(golden),
            "Failed to create golden",
        )
        .await
    }

    pub async fn update_golden(
        &self,
        dataset_id: &str,
        golden_id: &str,
        patch: &GoldenPatch,
    ) -> Result<Golden> {
        require_id("dataset id", dataset_id)?;
        require_id("golden id", golden_id)?;
        patch.validate_update()?;
        self.mutate(
            "update_golden",
            Method::PUT,
            &["datasets", dataset_id, "goldens", golden_id],
            Some(patch),
            "Failed to update golden",
        )
        .await
    }

    pub async fn delete_golden(&self, dataset_id: &str, golden_id: &str) -> Result<()> {
        require_id("dataset id", dataset_id)?;
        require_id("golden id", golden_id)?;
        self.mutate_empty(
            "delete_golden",
            Method::DELETE,
            &["datasets", dataset_id, "goldens", golden_id],
        )
        .await
    }

    /// Bulk-create goldens. Every item is validated before anything is sent.
    pub async fn import_goldens(
        &self,
        dataset_id: &str,
        goldens: &[NewGolden],
    ) -> Result<Vec<Golden>> {
        require_id("dataset id", dataset_id)?;
        validate_new_goldens(goldens)?;
        self.mutate(
            "import_goldens",
            Method::POST,
            &["datasets", dataset_id, "goldens", "import"],
            Some(goldens),
            "Failed to import goldens",
        )
        .await
    }

    /// Ask the server to generate goldens from a seed.
    ///
    /// Leaves the cache untouched: a following `get_goldens` within the TTL
    /// may not include the generated items.
    pub async fn generate_content(
        &self,
        dataset_id: &str,
        seed: &GoldenPatch,
    ) -> Result<Vec<Golden>> {
        require_id("dataset id", dataset_id)?;
        seed.validate_seed()?;
        self.send(
            "generate_content",
            Method::POST,
            &["datasets", dataset_id, "goldens", "generate"],
            Some(seed),
            "Failed to generate content",
        )
        .await
    }

    // =========================================================================
    // Evaluations
    // =========================================================================

    /// Start an evaluation run. The returned record is the server's; callers
    /// treat it as running until a poll says otherwise.
    pub async fn submit_evaluation(&self, request: &EvaluationRequest) -> Result<EvaluationHistory> {
        request.validate()?;
        self.send(
            "submit_evaluation",
            Method::POST,
            &["evaluations"],
            Some(request),
            "Failed to evaluate model",
        )
        .await
    }

    pub async fn get_evaluation_status(&self, evaluation_id: &str) -> Result<EvaluationStatusReport> {
        require_id("evaluation id", evaluation_id)?;
        self.get(
            "get_evaluation_status",
            &["evaluations", evaluation_id, "status"],
            CacheRead::Allow,
            "Failed to get evaluation status",
        )
        .await
    }

    pub async fn get_evaluation_history(&self) -> Result<Vec<EvaluationHistory>> {
        self.get(
            "get_evaluation_history",
            &["evaluations"],
            CacheRead::Allow,
            "Failed to fetch evaluation history",
        )
        .await
    }

    /// Like [`get_evaluation_history`](Self::get_evaluation_history) but
    /// always asks the server; the fresh response replaces the cached one.
    pub async fn refresh_evaluation_history(&self) -> Result<Vec<EvaluationHistory>> {
        self.get(
            "refresh_evaluation_history",
            &["evaluations"],
            CacheRead::Bypass,
            "Failed to fetch evaluation history",
        )
        .await
    }

    // =========================================================================
    // Internal HTTP Methods
    // =========================================================================

    /// Absolute URL of a tenant-scoped endpoint. Segments are percent-encoded.
    fn scoped_url(&self, usecase: &str, segments: &[&str]) -> String {
        let mut url = format!(
            "{}{}/{}",
            self.config.base_url.trim_end_matches('/'),
            defaults::API_PREFIX,
            urlencoding::encode(usecase)
        );
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    /// Cached GET.
    async fn get<T: DeserializeOwned>(
        &self,
        op: &'static str,
        segments: &[&str],
        read: CacheRead,
        fallback: &str,
    ) -> Result<T> {
        let usecase = self.usecase().await;
        let url = self.scoped_url(&usecase, segments);
        let key = cache_key(&Method::GET, &url, None);
        let generation = self.cache.generation().await;

        if read == CacheRead::Allow {
            if let Some(cached) = self.cache.get(&key).await {
                if let Ok(value) = serde_json::from_slice(&cached) {
                    return Ok(value);
                }
            }
        }

        let body = self
            .execute(op, &usecase, Method::GET, &url, None)
            .await?;
        let value = decode(op, &body, fallback)?;
        self.cache.put(key, body, generation).await;
        Ok(value)
    }

    /// Request with a JSON response and no cache effect.
    async fn send<T, B>(
        &self,
        op: &'static str,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        fallback: &str,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let usecase = self.usecase().await;
        let url = self.scoped_url(&usecase, segments);
        let payload = body.map(serde_json::to_vec).transpose()?;
        let response = self.execute(op, &usecase, method, &url, payload).await?;
        decode(op, &response, fallback)
    }

    /// Mutating request with a JSON response; clears the cache on success.
    async fn mutate<T, B>(
        &self,
        op: &'static str,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        fallback: &str,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let usecase = self.usecase().await;
        let url = self.scoped_url(&usecase, segments);
        let payload = body.map(serde_json::to_vec).transpose()?;
        let response = self.execute(op, &usecase, method, &url, payload).await?;
        self.cache.clear().await;
        decode(op, &response, fallback)
    }

    /// Mutating request whose response body is ignored; clears the cache.
    async fn mutate_empty(
        &self,
        op: &'static str,
        method: Method,
        segments: &[&str],
    ) -> Result<()> {
        let usecase = self.usecase().await;
        let url = self.scoped_url(&usecase, segments);
        self.execute(op, &usecase, method, &url, None).await?;
        self.cache.clear().await;
        Ok(())
    }

    /// Send a request. Transient failures are retried by the middleware;
    /// what comes back is the final outcome.
    async fn execute(
        &self,
        op: &'static str,
        usecase: &str,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Bytes> {
        let request_id = Uuid::now_v7();
        let span = tracing::debug_span!(
            "request",
            { logging::REQUEST_ID } = tracing::field::display(request_id),
            { logging::OPERATION } = op,
            { logging::USECASE } = usecase,
        );

        async {
            let result = self.round_trip(&method, url, body).await;
            if let Err(err) = &result {
                if matches!(err, Error::Unauthorized(_)) {
                    self.handle_unauthorized();
                }
                if err.is_client_error() {
                    debug!(
                        method = %method,
                        path = %url,
                        status = err.status(),
                        error = %err,
                        "Request rejected"
                    );
                } else {
                    error!(
                        method = %method,
                        path = %url,
                        status = err.status(),
                        error = %err,
                        "Request failed"
                    );
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// One logical request, retries included, mapped to the error taxonomy.
    async fn round_trip(
        &self,
        method: &Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Bytes> {
        let start = Instant::now();
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.credentials.token() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        debug!(method = %method, path = %url, "Sending request");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(
                    method = %method,
                    path = %url,
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "No response received"
                );
                return Err(Error::network());
            }
        };

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            debug!(method = %method, path = %url, error = %e, "Failed to read response body");
            Error::network()
        })?;

        debug!(
            method = %method,
            path = %url,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Received response"
        );

        if status.is_success() {
            return Ok(bytes);
        }

        let data: Option<serde_json::Value> = serde_json::from_slice(&bytes).ok();
        let server_message = data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string);

        Err(Error::from_status(status.as_u16(), server_message, data))
    }

    /// Drop the stored token and ask the host to re-authenticate.
    fn handle_unauthorized(&self) {
        warn!("Received 401, clearing stored token");
        self.credentials.clear_token();
        self.on_unauthorized.on_unauthorized();
    }
}

/// Retry policy of the client.
///
/// Retries:
/// - requests that got no response (connect failure, timeout)
/// - 5xx responses
///
/// Never retries a 4xx, 401 and 429 included.
struct TransientStrategy;

impl RetryableStrategy for TransientStrategy {
    fn handle(&self, res: &reqwest_middleware::Result<reqwest::Response>) -> Option<Retryable> {
        match res {
            Ok(response) => {
                let status = response.status();
                if status.is_server_error() {
                    Some(Retryable::Transient)
                } else if status.is_success() {
                    None
                } else {
                    Some(Retryable::Fatal)
                }
            }
            Err(_) => Some(Retryable::Transient),
        }
    }
}

/// Decode a success body, mapping failures to the operation's fallback.
fn decode<T: DeserializeOwned>(op: &str, body: &[u8], fallback: &str) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(
            op = %op,
            error = %e,
            body = %String::from_utf8_lossy(body),
            "Failed to parse response"
        );
        Error::Operation(fallback.to_string())
    })
}

fn require_id(what: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(())
}

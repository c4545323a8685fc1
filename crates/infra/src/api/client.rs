//! Request executor
//!
//! Every call goes through the same sequence: rate-limiter admission,
//! bearer token, then the retry executor around one transport exchange per
//! attempt. Cancelling the [`CallContext`] aborts whichever stage is
//! suspended; a context deadline stops rate-limit and backoff waits at the
//! deadline with `Timeout`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use logrelay_common::error::StructuredError;
use logrelay_common::observability::{MetricsSink, NoOpMetrics};
use logrelay_common::resilience::{
    Clock, RateLimiterConfig, RetryExecutor, RetryPolicy, SystemClock, TokenBucket,
};
use logrelay_domain::constants::{HEALTH_PATH, REQUEST_ID_HEADER};
use logrelay_domain::{ApiRequest, ApiResponse, ClientConfig, HttpMethod};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::field::Empty;
use tracing::{debug, info, instrument, warn, Span};
use uuid::Uuid;

use super::auth::{Authenticator, Credential, TokenSource};
use super::context::CallContext;
use super::errors::ErrorClassifier;
use crate::http::{HttpClient, HttpTransport, RawResponse, TransportRequest};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

type SharedClock = Arc<dyn Clock>;

/// Client for the remote API
pub struct ApiClient {
    config: ClientConfig,
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    auth: Arc<Authenticator>,
    limiter: Arc<TokenBucket<SharedClock>>,
    retry: RetryExecutor<SharedClock>,
    metrics: Arc<dyn MetricsSink>,
    clock: SharedClock,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("limiter", &self.limiter.config())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Production client for `config`
    ///
    /// # Errors
    ///
    /// `Config` when the configuration is invalid or the HTTP client cannot
    /// be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, StructuredError> {
        Self::builder().config(config.clone()).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.auth
    }

    pub fn rate_limiter(&self) -> &Arc<TokenBucket<SharedClock>> {
        &self.limiter
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Execute one logical call
    ///
    /// # Errors
    ///
    /// The classified failure of the last attempt (tagged with its retry
    /// count), an authentication failure, or `Cancelled`.
    #[instrument(
        name = "api_request",
        skip_all,
        fields(
            method = %request.method,
            path = %request.path,
            operation = ctx.operation.as_deref(),
            request_id = Empty,
            status = Empty,
            retries = Empty,
            latency_ms = Empty,
        )
    )]
    pub async fn execute(
        &self,
        ctx: &CallContext,
        request: ApiRequest,
    ) -> Result<ApiResponse, StructuredError> {
        let span = Span::current();
        let request_id = Uuid::now_v7().to_string();
        span.record("request_id", request_id.as_str());

        let started = self.clock.now();
        let outcome = self.dispatch(ctx, &request, &request_id).await;
        let latency = self.clock.now().saturating_duration_since(started);
        span.record("latency_ms", u64::try_from(latency.as_millis()).unwrap_or(u64::MAX));

        match outcome {
            Ok(mut response) => {
                response.latency = latency;
                span.record("status", response.status);
                span.record("retries", response.retries);
                self.metrics.record_request(true, latency, Some(response.status));
                info!(status = response.status, retries = response.retries, "request completed");
                Ok(response)
            }
            Err(err) => {
                if let Some(status) = err.status {
                    span.record("status", status);
                }
                span.record("retries", err.retry_count);
                self.metrics.record_request(false, latency, err.status);
                if err.is_cancelled() {
                    debug!("request cancelled");
                } else {
                    warn!(code = %err.code, retries = err.retry_count, error = %err.message, "request failed");
                }
                Err(err)
            }
        }
    }

    async fn dispatch(
        &self,
        ctx: &CallContext,
        request: &ApiRequest,
        request_id: &str,
    ) -> Result<ApiResponse, StructuredError> {
        let admission = self.limiter.acquire_until(ctx.deadline, &ctx.cancel).await?;
        if admission.throttled {
            self.metrics.record_rate_limit_hit();
            debug!(waited = ?admission.waited, "rate limited before dispatch");
        }

        let mut template = self.transport_request(request, request_id);
        let token = self.auth.authenticate(&mut template, &ctx.cancel).await?;

        let bearer = Mutex::new(token.value().to_string());
        let calls = AtomicU32::new(0);

        let raw = {
            let (this, template, bearer, calls) = (self, &template, &bearer, &calls);
            let operation = move |call: u32| {
                calls.store(call, Ordering::Relaxed);
                let mut attempt = template.clone();
                attempt.set_bearer(&bearer.lock());
                async move { this.send_once(&attempt).await }
            };
            let reauthenticate = move || async move {
                let stale = bearer.lock().clone();
                let fresh = this.auth.force_refresh(&stale, &ctx.cancel).await?;
                *bearer.lock() = fresh.value().to_string();
                Ok::<(), StructuredError>(())
            };
            self.retry.execute_until(ctx.deadline, &ctx.cancel, operation, reauthenticate).await?
        };

        let body = decode_body(&raw)?;
        let mut response = ApiResponse::new(raw.status, body);
        response.retries = calls.load(Ordering::Relaxed).saturating_sub(1);
        Ok(response)
    }

    async fn send_once(&self, request: &TransportRequest) -> Result<RawResponse, StructuredError> {
        let raw = self.transport.send(request).await?;
        if raw.is_success() {
            Ok(raw)
        } else {
            Err(ErrorClassifier::from_response(&raw))
        }
    }

    fn transport_request(&self, request: &ApiRequest, request_id: &str) -> TransportRequest {
        let mut transport = TransportRequest::new(
            request.method,
            format!("{}{}", self.base_url, request.normalized_path()),
        );
        transport.query = request.query.clone();
        transport.headers = request.headers.clone();
        transport.headers.entry("accept".to_string()).or_insert_with(|| "application/json".into());
        transport.headers.insert(REQUEST_ID_HEADER.to_string(), request_id.to_string());
        transport.body = request.body.clone();
        transport
    }

    /// GET `path` and deserialize the body
    pub async fn get<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        path: &str,
    ) -> Result<T, StructuredError> {
        self.execute(ctx, ApiRequest::get(path)).await?.json()
    }

    /// POST `body` as JSON to `path`
    pub async fn post<B, T>(&self, ctx: &CallContext, path: &str, body: &B) -> Result<T, StructuredError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(ctx, ApiRequest::post(path, to_json(body)?)).await?.json()
    }

    /// PUT `body` as JSON to `path`
    pub async fn put<B, T>(&self, ctx: &CallContext, path: &str, body: &B) -> Result<T, StructuredError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(ctx, ApiRequest::put(path, to_json(body)?)).await?.json()
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        path: &str,
    ) -> Result<T, StructuredError> {
        self.execute(ctx, ApiRequest::delete(path)).await?.json()
    }

    /// Unauthenticated probe of the health endpoint, outside rate limiting
    /// and retry
    ///
    /// # Returns
    ///
    /// `true` for a 2xx answer, `false` for any other status
    ///
    /// # Errors
    ///
    /// `Timeout` after five seconds, `NetworkError` when unreachable.
    pub async fn health_check(&self) -> Result<bool, StructuredError> {
        let request = TransportRequest::new(HttpMethod::Get, format!("{}{HEALTH_PATH}", self.base_url));
        debug!(url = %request.url, "health check");

        let response = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, self.transport.send(&request))
            .await
            .map_err(|_| {
                warn!("health check timeout");
                StructuredError::timeout("health check", HEALTH_CHECK_TIMEOUT)
            })?;

        match response {
            Ok(raw) if raw.is_success() => {
                info!("API is healthy");
                Ok(true)
            }
            Ok(raw) => {
                warn!(status = raw.status, "API returned non-success status");
                Ok(false)
            }
            Err(err) => {
                warn!(error = %err, "health check failed");
                Err(err.into())
            }
        }
    }
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<Value, StructuredError> {
    serde_json::to_value(body).map_err(|err| {
        StructuredError::invalid_input(format!("failed to serialize request body: {err}"))
    })
}

/// Empty bodies and 204/205 become `Null`
fn decode_body(raw: &RawResponse) -> Result<Value, StructuredError> {
    if matches!(raw.status, 204 | 205) || raw.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&raw.body).map_err(|err| {
        StructuredError::api(format!("response body is not valid JSON: {err}")).with_status(raw.status)
    })
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    token_source: Option<Arc<dyn TokenSource>>,
    authenticator: Option<Arc<Authenticator>>,
    clock: Option<SharedClock>,
    metrics: Option<Arc<dyn MetricsSink>>,
    retry_policy: Option<RetryPolicy>,
}

impl ApiClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Token source for a new authenticator built from the config
    pub fn token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    /// Share an existing authenticator; overrides `token_source`
    pub fn authenticator(mut self, authenticator: Arc<Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replace the policy derived from the config's retry settings
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Build the API client
    ///
    /// # Errors
    ///
    /// `Config` when no configuration was given or it fails validation.
    pub fn build(self) -> Result<ApiClient, StructuredError> {
        let config =
            self.config.ok_or_else(|| StructuredError::config("client configuration not set"))?;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpClient::from_config(&config)?),
        };

        let auth = match (self.authenticator, self.token_source) {
            (Some(auth), _) => auth,
            (None, Some(source)) => Arc::new(
                Authenticator::new(Credential::new(config.api_key.clone()), source)
                    .with_margin(config.token_refresh_margin())
                    .with_clock(clock.clone()),
            ),
            (None, None) => Arc::new(
                Authenticator::from_config(&config, transport.clone()).with_clock(clock.clone()),
            ),
        };

        let limiter = TokenBucket::with_clock(
            RateLimiterConfig::new(config.rate_limit_per_second, config.burst_capacity),
            clock.clone(),
        )?;

        let policy = match self.retry_policy {
            Some(policy) => policy,
            None => RetryPolicy::builder()
                .max_attempts(config.max_retries)
                .min_wait(config.min_backoff())
                .max_wait(config.max_backoff())
                .build()
                .map_err(|err| StructuredError::config(err.to_string()))?,
        };

        let metrics = self.metrics.unwrap_or_else(|| Arc::new(NoOpMetrics));
        let retry = RetryExecutor::with_clock(policy, clock.clone()).with_metrics(metrics.clone());

        Ok(ApiClient {
            base_url: config.normalized_base_url().to_string(),
            config,
            transport,
            auth,
            limiter: Arc::new(limiter),
            retry,
            metrics,
            clock,
        })
    }
}

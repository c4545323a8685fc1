//! Long-running background queries
//!
//! The manager tracks every submitted query locally and drives its status
//! forward from remote status checks. Tracking ends when the caller
//! [`release`](BackgroundQueryManager::release)s a query or, for terminal
//! queries, once the TTL has elapsed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use logrelay_common::error::{ErrorCode, StructuredError};
use logrelay_common::resilience::Clock;
use logrelay_domain::constants::BACKGROUND_QUERY_BASE_PATH;
use logrelay_domain::{ApiRequest, BackgroundQuery, BackgroundQuerySpec, HttpMethod, QueryStatus};
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::field::Empty;
use tracing::{debug, info, instrument, warn, Span};

use super::client::ApiClient;
use super::context::CallContext;

/// Remote endpoint layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundQueryPaths {
    base: String,
}

impl BackgroundQueryPaths {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self { base: base.trim_end_matches('/').to_string() }
    }

    pub fn submit(&self) -> String {
        self.base.clone()
    }

    pub fn status(&self, id: &str) -> String {
        format!("{}/{id}/status", self.base)
    }

    pub fn cancel(&self, id: &str) -> String {
        format!("{}/{id}/cancel", self.base)
    }

    pub fn data(&self, id: &str) -> String {
        format!("{}/{id}/data", self.base)
    }
}

impl Default for BackgroundQueryPaths {
    fn default() -> Self {
        Self::new(BACKGROUND_QUERY_BASE_PATH)
    }
}

#[derive(Debug)]
struct Tracked {
    query: BackgroundQuery,
    terminal_since: Option<Instant>,
}

impl Tracked {
    fn mark_terminal(&mut self, now: Instant) {
        if self.query.is_terminal() && self.terminal_since.is_none() {
            self.terminal_since = Some(now);
        }
    }
}

/// Submit, poll, cancel and fetch background queries
#[derive(Debug)]
pub struct BackgroundQueryManager {
    client: Arc<ApiClient>,
    paths: BackgroundQueryPaths,
    queries: DashMap<String, Tracked>,
    poll_interval: Duration,
    timeout: Duration,
    ttl: Duration,
}

impl BackgroundQueryManager {
    /// Manager using the client's background settings
    pub fn new(client: Arc<ApiClient>) -> Self {
        let config = client.config();
        let (poll_interval, timeout, ttl) = (
            config.background_poll_interval(),
            config.background_timeout(),
            config.background_ttl(),
        );
        Self {
            client,
            paths: BackgroundQueryPaths::default(),
            queries: DashMap::new(),
            poll_interval,
            timeout,
            ttl,
        }
    }

    pub fn with_paths(mut self, paths: BackgroundQueryPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn clock(&self) -> &Arc<dyn Clock> {
        self.client.clock()
    }

    /// Submit `spec`; the returned query is `Submitted`
    ///
    /// # Errors
    ///
    /// The client's error, or `ApiError` when the response names no id.
    #[instrument(skip_all, fields(query_id = Empty))]
    pub async fn submit(
        &self,
        ctx: &CallContext,
        spec: BackgroundQuerySpec,
    ) -> Result<BackgroundQuery, StructuredError> {
        let purged = self.purge_expired();
        if purged > 0 {
            debug!(purged, "dropped expired background queries");
        }

        let body = serde_json::to_value(&spec).map_err(|err| {
            StructuredError::invalid_input(format!("failed to serialize query: {err}"))
        })?;
        let response = self.client.execute(ctx, ApiRequest::post(self.paths.submit(), body)).await?;

        let id = query_id(&response.body).ok_or_else(|| {
            StructuredError::api("submit response did not include a query id")
                .with_status(response.status)
                .with_details(response.body.clone())
        })?;
        Span::current().record("query_id", id.as_str());

        let query = BackgroundQuery::new(id.clone(), spec, Utc::now());
        let tracked = Tracked { query: query.clone(), terminal_since: None };
        if self.queries.insert(id, tracked).is_some() {
            warn!("remote reused a tracked query id, replacing local record");
        }
        info!("background query submitted");
        Ok(query)
    }

    /// One remote status check
    ///
    /// Terminal queries are returned as-is without a request.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` for untracked ids, otherwise the client's error.
    #[instrument(skip(self, ctx), fields(status = Empty))]
    pub async fn poll(&self, ctx: &CallContext, id: &str) -> Result<BackgroundQuery, StructuredError> {
        let current = self.get(id)?;
        if current.is_terminal() {
            return Ok(current);
        }

        let response = self.client.execute(ctx, ApiRequest::get(self.paths.status(id))).await?;
        let reported = remote_status(&response.body);
        let now = Utc::now();

        let mut entry = self.queries.get_mut(id).ok_or_else(|| untracked(id))?;
        let tracked = entry.value_mut();
        tracked.query.record_poll(now);

        let outcome = match reported.as_deref().and_then(QueryStatus::from_remote) {
            Some(QueryStatus::Failed) => {
                tracked.query.fail(remote_error(&response.body), now).map(|()| true)
            }
            Some(next) => {
                let changed = tracked.query.transition(next, now);
                if matches!(changed, Ok(true)) && next == QueryStatus::Completed {
                    tracked.query.result = Some(response.body.clone());
                }
                changed
            }
            None => {
                warn!(remote = ?reported, "unrecognized remote status, keeping local state");
                Ok(false)
            }
        };

        match outcome {
            Ok(true) => info!(status = %tracked.query.status, "background query advanced"),
            Ok(false) => {}
            Err(err) => debug!(error = %err, "ignoring stale remote status"),
        }
        tracked.mark_terminal(self.clock().now());

        Span::current().record("status", tracked.query.status.as_str());
        Ok(tracked.query.clone())
    }

    /// Poll until terminal
    ///
    /// Sleeps `poll_interval` (default from config) between polls. The
    /// overall timeout also bounds rate-limit and retry waits inside each
    /// poll. When it elapses the remote query keeps running. A timeout too
    /// large to represent means no deadline.
    ///
    /// # Errors
    ///
    /// `Timeout` when the deadline passes, `Cancelled` when `ctx` is
    /// cancelled, or any polling error.
    #[instrument(skip(self, ctx))]
    pub async fn wait_until_terminal(
        &self,
        ctx: &CallContext,
        id: &str,
        poll_interval: Option<Duration>,
        overall_timeout: Option<Duration>,
    ) -> Result<BackgroundQuery, StructuredError> {
        let interval = poll_interval.unwrap_or(self.poll_interval).max(Duration::from_millis(1));
        let timeout = overall_timeout.unwrap_or(self.timeout);
        let clock = self.clock();
        let deadline = clock.now().checked_add(timeout);
        let poll_ctx = match deadline {
            Some(deadline) => ctx.clone().with_deadline(deadline),
            None => ctx.clone(),
        };
        let expired = |status: QueryStatus| {
            warn!(?timeout, %status, "gave up waiting for background query");
            StructuredError::timeout(&format!("background query {id}"), timeout)
                .with_details(json!({ "query_id": id, "status": status }))
        };

        loop {
            let query = match self.poll(&poll_ctx, id).await {
                Ok(query) => query,
                Err(err)
                    if err.code == ErrorCode::Timeout
                        && deadline.is_some_and(|deadline| clock.now() >= deadline) =>
                {
                    debug!(error = %err, "poll stopped at the wait deadline");
                    return Err(expired(self.get(id)?.status));
                }
                Err(err) => return Err(err),
            };
            if query.is_terminal() {
                return Ok(query);
            }

            let now = clock.now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => return Err(expired(query.status)),
                Some(deadline) => interval.min(deadline - now),
                None => interval,
            };
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(StructuredError::cancelled()),
                _ = clock.sleep(pause) => {}
            }
        }
    }

    /// Cancel remotely and mark `Cancelled`
    ///
    /// Cancelling a terminal query is a no-op returning it unchanged.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` for untracked ids, otherwise the client's error.
    #[instrument(skip(self, ctx))]
    pub async fn cancel(&self, ctx: &CallContext, id: &str) -> Result<BackgroundQuery, StructuredError> {
        let current = self.get(id)?;
        if current.is_terminal() {
            debug!(status = %current.status, "query already terminal, nothing to cancel");
            return Ok(current);
        }

        self.client.execute(ctx, ApiRequest::new(HttpMethod::Post, self.paths.cancel(id))).await?;

        let mut entry = self.queries.get_mut(id).ok_or_else(|| untracked(id))?;
        let tracked = entry.value_mut();
        match tracked.query.transition(QueryStatus::Cancelled, Utc::now()) {
            Ok(_) => info!("background query cancelled"),
            Err(err) => debug!(error = %err, "query finished before the cancel landed"),
        }
        tracked.mark_terminal(self.clock().now());
        Ok(tracked.query.clone())
    }

    /// Result rows of a completed query
    ///
    /// # Errors
    ///
    /// `InvalidInput` unless the query is `Completed`.
    #[instrument(skip(self, ctx))]
    pub async fn fetch_data(
        &self,
        ctx: &CallContext,
        id: &str,
        offset: u64,
        limit: u32,
    ) -> Result<Value, StructuredError> {
        let current = self.get(id)?;
        if current.status != QueryStatus::Completed {
            return Err(StructuredError::invalid_input(format!(
                "background query {id} is {}; data is available once it has completed",
                current.status
            ))
            .with_details(json!({ "query_id": id, "status": current.status })));
        }

        let request = ApiRequest::get(self.paths.data(id))
            .with_query("offset", offset)
            .with_query("limit", limit);
        Ok(self.client.execute(ctx, request).await?.body)
    }

    /// Snapshot of a tracked query
    pub fn get(&self, id: &str) -> Result<BackgroundQuery, StructuredError> {
        self.queries.get(id).map(|t| t.query.clone()).ok_or_else(|| untracked(id))
    }

    /// All tracked queries, oldest first
    pub fn list(&self) -> Vec<BackgroundQuery> {
        let mut all: Vec<_> = self.queries.iter().map(|t| t.query.clone()).collect();
        all.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Stop tracking `id`
    pub fn release(&self, id: &str) -> Result<BackgroundQuery, StructuredError> {
        self.queries.remove(id).map(|(_, t)| t.query).ok_or_else(|| untracked(id))
    }

    /// Drop terminal queries older than the TTL; returns how many
    pub fn purge_expired(&self) -> usize {
        let now = self.clock().now();
        let mut purged = 0;
        self.queries.retain(|_, tracked| {
            let expired = tracked
                .terminal_since
                .is_some_and(|since| now.saturating_duration_since(since) >= self.ttl);
            purged += usize::from(expired);
            !expired
        });
        purged
    }
}

fn untracked(id: &str) -> StructuredError {
    StructuredError::not_found(format!("background query {id} is not tracked"))
}

fn query_id(body: &Value) -> Option<String> {
    ["queryId", "query_id", "id"].iter().find_map(|field| match body.get(*field)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    })
}

fn remote_status(body: &Value) -> Option<String> {
    let field = body.get("status").or_else(|| body.get("state"))?;
    match field {
        Value::String(status) => Some(status.clone()),
        Value::Object(nested) => {
            nested.get("state").or_else(|| nested.get("status"))?.as_str().map(str::to_string)
        }
        _ => None,
    }
}

fn remote_error(body: &Value) -> StructuredError {
    let message = match body.get("error") {
        Some(Value::String(message)) => Some(message.clone()),
        Some(Value::Object(error)) => error.get("message").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
    .or_else(|| body.get("message").and_then(Value::as_str).map(str::to_string))
    .unwrap_or_else(|| "background query failed".to_string());

    StructuredError::api(message)
        .with_details(body.clone())
        .with_suggestion("inspect the query text and time range, then resubmit")
}

#[cfg(test)]
mod tests {
    use logrelay_common::resilience::MockClock;
    use logrelay_domain::ClientConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const BASE: &str = "/api/v1/dataprime/background-query";

    async fn manager(server: &MockServer) -> (BackgroundQueryManager, MockClock) {
        Mock::given(method("POST"))
            .and(path(BASE))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "queryId": "q-1" })))
            .mount(server)
            .await;

        let clock = MockClock::new();
        let client = ApiClient::builder()
            .config(ClientConfig::new(server.uri(), "key"))
            .clock(Arc::new(clock.clone()))
            .build()
            .expect("client");
        let manager = BackgroundQueryManager::new(Arc::new(client))
            .with_poll_interval(Duration::from_secs(2))
            .with_timeout(Duration::from_secs(10));
        (manager, clock)
    }

    async fn status_sequence(server: &MockServer, statuses: &[&str]) {
        for (i, status) in statuses.iter().enumerate() {
            let template = ResponseTemplate::new(200).set_body_json(json!({ "status": status }));
            let mock = Mock::given(method("GET")).and(path(format!("{BASE}/q-1/status")));
            if i + 1 < statuses.len() {
                mock.respond_with(template).up_to_n_times(1).mount(server).await;
            } else {
                mock.respond_with(template).mount(server).await;
            }
        }
    }

    fn spec() -> BackgroundQuerySpec {
        BackgroundQuerySpec::new("source logs | filter severity == ERROR").with_syntax("dataprime")
    }

    #[tokio::test]
    async fn submit_then_poll_to_completion() {
        let server = MockServer::start().await;
        let (manager, _clock) = manager(&server).await;
        status_sequence(&server, &["queued", "completed"]).await;
        let ctx = CallContext::new();

        let submitted = manager.submit(&ctx, spec()).await.unwrap();
        assert_eq!(submitted.id, "q-1");
        assert_eq!(submitted.status, QueryStatus::Submitted);

        let running = manager.poll(&ctx, "q-1").await.unwrap();
        assert_eq!(running.status, QueryStatus::Running);
        assert!(running.last_polled_at.is_some());

        let completed = manager.poll(&ctx, "q-1").await.unwrap();
        assert_eq!(completed.status, QueryStatus::Completed);
        assert_eq!(completed.result, Some(json!({ "status": "completed" })));

        let again = manager.poll(&ctx, "q-1").await.unwrap();
        assert_eq!(again.finished_at, completed.finished_at);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn wait_sleeps_between_polls() {
        let server = MockServer::start().await;
        let (manager, clock) = manager(&server).await;
        status_sequence(&server, &["running", "running", "succeeded"]).await;
        let ctx = CallContext::new();

        manager.submit(&ctx, spec()).await.unwrap();
        let done = manager.wait_until_terminal(&ctx, "q-1", None, None).await.unwrap();

        assert_eq!(done.status, QueryStatus::Completed);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2), Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn wait_timeout_leaves_remote_query_running() {
        let server = MockServer::start().await;
        let (manager, _clock) = manager(&server).await;
        status_sequence(&server, &["running"]).await;
        Mock::given(path(format!("{BASE}/q-1/cancel")))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let ctx = CallContext::new();

        manager.submit(&ctx, spec()).await.unwrap();
        let err = manager
            .wait_until_terminal(&ctx, "q-1", Some(Duration::from_secs(3)), Some(Duration::from_secs(7)))
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::Timeout);
        assert_eq!(manager.get("q-1").unwrap().status, QueryStatus::Running);
    }

    #[tokio::test]
    async fn wait_honors_cancellation() {
        let server = MockServer::start().await;
        let (manager, _clock) = manager(&server).await;
        status_sequence(&server, &["running"]).await;
        let ctx = CallContext::new();
        manager.submit(&ctx, spec()).await.unwrap();

        let waiting = ctx.child();
        waiting.cancel();
        let err = manager.wait_until_terminal(&waiting, "q-1", None, None).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn wait_timeout_cuts_long_retry_after() {
        let server = MockServer::start().await;
        let (manager, clock) = manager(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/q-1/status")))
            .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "30"))
            .mount(&server)
            .await;
        let ctx = CallContext::new();
        manager.submit(&ctx, spec()).await.unwrap();
        let started = clock.now();

        let err = manager
            .wait_until_terminal(&ctx, "q-1", Some(Duration::from_secs(1)), Some(Duration::from_secs(5)))
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::Timeout);
        assert_eq!(err.details.as_ref().unwrap()["query_id"], "q-1");
        assert_eq!(clock.now() - started, Duration::from_secs(5));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5)]);
        assert_eq!(manager.get("q-1").unwrap().status, QueryStatus::Submitted);
    }

    #[tokio::test]
    async fn unbounded_wait_timeout_means_no_deadline() {
        let server = MockServer::start().await;
        let (manager, clock) = manager(&server).await;
        status_sequence(&server, &["running", "completed"]).await;
        let ctx = CallContext::new();
        manager.submit(&ctx, spec()).await.unwrap();

        let done = manager
            .wait_until_terminal(&ctx, "q-1", None, Some(Duration::MAX))
            .await
            .unwrap();

        assert_eq!(done.status, QueryStatus::Completed);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn remote_failure_attaches_error() {
        let server = MockServer::start().await;
        let (manager, _clock) = manager(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/q-1/status")))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({ "status": "failed", "error": { "message": "unknown field 'sevrity'" } }),
            ))
            .mount(&server)
            .await;
        let ctx = CallContext::new();

        manager.submit(&ctx, spec()).await.unwrap();
        let failed = manager.poll(&ctx, "q-1").await.unwrap();

        assert_eq!(failed.status, QueryStatus::Failed);
        let error = failed.error.unwrap();
        assert_eq!(error.code, ErrorCode::ApiError);
        assert_eq!(error.message, "unknown field 'sevrity'");
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let server = MockServer::start().await;
        let (manager, _clock) = manager(&server).await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/q-1/cancel")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let ctx = CallContext::new();

        manager.submit(&ctx, spec()).await.unwrap();
        assert_eq!(manager.cancel(&ctx, "q-1").await.unwrap().status, QueryStatus::Cancelled);
        assert_eq!(manager.cancel(&ctx, "q-1").await.unwrap().status, QueryStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_after_completion_is_a_no_op() {
        let server = MockServer::start().await;
        let (manager, _clock) = manager(&server).await;
        status_sequence(&server, &["completed"]).await;
        Mock::given(path(format!("{BASE}/q-1/cancel")))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let ctx = CallContext::new();

        manager.submit(&ctx, spec()).await.unwrap();
        manager.poll(&ctx, "q-1").await.unwrap();
        assert_eq!(manager.cancel(&ctx, "q-1").await.unwrap().status, QueryStatus::Completed);
    }

    #[tokio::test]
    async fn fetch_data_requires_completion() {
        let server = MockServer::start().await;
        let (manager, _clock) = manager(&server).await;
        status_sequence(&server, &["running", "completed"]).await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/q-1/data")))
            .and(query_param("offset", "100"))
            .and(query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [1, 2] })))
            .expect(1)
            .mount(&server)
            .await;
        let ctx = CallContext::new();

        manager.submit(&ctx, spec()).await.unwrap();
        let err = manager.fetch_data(&ctx, "q-1", 100, 50).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        manager.poll(&ctx, "q-1").await.unwrap();
        let err = manager.fetch_data(&ctx, "q-1", 100, 50).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        manager.poll(&ctx, "q-1").await.unwrap();
        let data = manager.fetch_data(&ctx, "q-1", 100, 50).await.unwrap();
        assert_eq!(data, json!({ "results": [1, 2] }));
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let server = MockServer::start().await;
        let (manager, _clock) = manager(&server).await;
        let ctx = CallContext::new();

        for err in [
            manager.poll(&ctx, "nope").await.unwrap_err(),
            manager.cancel(&ctx, "nope").await.unwrap_err(),
            manager.fetch_data(&ctx, "nope", 0, 10).await.unwrap_err(),
            manager.release("nope").unwrap_err(),
        ] {
            assert_eq!(err.code, ErrorCode::ResourceNotFound);
        }
    }

    #[tokio::test]
    async fn terminal_queries_expire_after_ttl() {
        let server = MockServer::start().await;
        let (manager, clock) = manager(&server).await;
        let manager = manager.with_ttl(Duration::from_secs(60));
        status_sequence(&server, &["completed"]).await;
        let ctx = CallContext::new();

        manager.submit(&ctx, spec()).await.unwrap();
        assert_eq!(manager.purge_expired(), 0);
        manager.poll(&ctx, "q-1").await.unwrap();

        clock.advance(Duration::from_secs(59));
        assert_eq!(manager.purge_expired(), 0);
        clock.advance(Duration::from_secs(1));
        assert_eq!(manager.purge_expired(), 1);
        assert!(manager.list().is_empty());
    }

    #[tokio::test]
    async fn release_drops_tracking() {
        let server = MockServer::start().await;
        let (manager, _clock) = manager(&server).await;
        let ctx = CallContext::new();

        manager.submit(&ctx, spec()).await.unwrap();
        assert_eq!(manager.list().len(), 1);
        assert_eq!(manager.release("q-1").unwrap().id, "q-1");
        assert!(manager.get("q-1").is_err());
    }

    #[tokio::test]
    async fn submit_without_id_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accepted": true })))
            .mount(&server)
            .await;
        let client = ApiClient::builder()
            .config(ClientConfig::new(server.uri(), "key"))
            .clock(Arc::new(MockClock::new()))
            .build()
            .unwrap();
        let manager = BackgroundQueryManager::new(Arc::new(client));

        let err = manager.submit(&CallContext::new(), spec()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ApiError);
        assert!(manager.list().is_empty());
    }

    #[test]
    fn paths_follow_base() {
        let paths = BackgroundQueryPaths::new("/custom/bq/");
        assert_eq!(paths.submit(), "/custom/bq");
        assert_eq!(paths.status("a"), "/custom/bq/a/status");
        assert_eq!(paths.cancel("a"), "/custom/bq/a/cancel");
        assert_eq!(paths.data("a"), "/custom/bq/a/data");
    }
}

//! Bearer token management
//!
//! [`Authenticator`] owns the API credential and the cached [`Token`]. A
//! refresh is single-flight: concurrent callers that find the cache stale
//! queue on one refresh lock, and everyone after the first re-checks the
//! cache before fetching.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use logrelay_common::error::StructuredError;
use logrelay_common::resilience::{Clock, SystemClock};
use logrelay_domain::constants::{DEFAULT_STATIC_TOKEN_LIFETIME_SECS, DEFAULT_TOKEN_REFRESH_MARGIN_SECS};
use logrelay_domain::{ClientConfig, HttpMethod};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::errors::ErrorClassifier;
use crate::http::{HttpTransport, TransportRequest};

/// Lifetime assumed when the token endpoint reports none
const DEFAULT_FETCHED_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// API key supplied at startup
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Raw secret, for token sources only
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Bearer token with its expiry
///
/// Replaced as a whole on refresh, never mutated in place.
#[derive(Clone, PartialEq)]
pub struct Token {
    value: String,
    expires_at: Instant,
    subject_claims: Option<Value>,
}

impl Token {
    pub fn new(value: impl Into<String>, expires_at: Instant) -> Self {
        Self { value: value.into(), expires_at, subject_claims: None }
    }

    pub fn with_claims(mut self, claims: Option<Value>) -> Self {
        self.subject_claims = claims;
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn subject_claims(&self) -> Option<&Value> {
        self.subject_claims.as_ref()
    }

    /// Remaining lifetime at `now`
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }

    /// Valid for strictly more than `margin` after `now`
    pub fn is_valid_at(&self, now: Instant, margin: Duration) -> bool {
        self.remaining(now) > margin
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"***")
            .field("expires_at", &self.expires_at)
            .field("has_claims", &self.subject_claims.is_some())
            .finish()
    }
}

/// Exchanges a credential for a bearer token
#[async_trait]
pub trait TokenSource: Send + Sync + fmt::Debug {
    /// Fetch a fresh token; `issued_at` anchors its relative lifetime
    ///
    /// # Errors
    ///
    /// `NetworkError` when the provider is unreachable, `AuthFailed` when it
    /// rejects the credential or answers with something unparsable.
    async fn fetch(
        &self,
        credential: &Credential,
        issued_at: Instant,
    ) -> Result<Token, StructuredError>;
}

/// Uses the API key itself as the bearer credential
#[derive(Debug, Clone)]
pub struct StaticTokenSource {
    lifetime: Duration,
}

impl StaticTokenSource {
    pub fn new(lifetime: Duration) -> Self {
        Self { lifetime }
    }
}

impl Default for StaticTokenSource {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_STATIC_TOKEN_LIFETIME_SECS))
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch(
        &self,
        credential: &Credential,
        issued_at: Instant,
    ) -> Result<Token, StructuredError> {
        if credential.is_empty() {
            return Err(StructuredError::auth_failed("no API key configured"));
        }
        Ok(Token::new(credential.expose(), issued_at + self.lifetime))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(alias = "token", alias = "accessToken")]
    access_token: String,
    #[serde(default, alias = "expiresIn")]
    expires_in: Option<u64>,
}

/// POSTs the API key to a token endpoint
#[derive(Debug, Clone)]
pub struct HttpTokenSource {
    transport: Arc<dyn HttpTransport>,
    token_url: String,
}

impl HttpTokenSource {
    pub fn new(transport: Arc<dyn HttpTransport>, token_url: impl Into<String>) -> Self {
        Self { transport, token_url: token_url.into() }
    }

    fn lifetime(response: &TokenResponse, claims: Option<&Value>) -> Duration {
        if let Some(secs) = response.expires_in {
            return Duration::from_secs(secs);
        }
        let exp = claims.and_then(|c| c.get("exp")).and_then(Value::as_u64);
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        match exp {
            Some(exp) => Duration::from_secs(exp.saturating_sub(now)),
            None => DEFAULT_FETCHED_TOKEN_LIFETIME,
        }
    }
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn fetch(
        &self,
        credential: &Credential,
        issued_at: Instant,
    ) -> Result<Token, StructuredError> {
        let request = TransportRequest::new(HttpMethod::Post, &self.token_url)
            .with_header("accept", "application/json")
            .with_body(json!({ "api_key": credential.expose() }));

        let raw = self.transport.send(&request).await.map_err(|err| {
            ErrorClassifier::from_transport(&err)
                .with_suggestion("check connectivity to the token endpoint")
        })?;

        if !raw.is_success() {
            return Err(StructuredError::auth_failed(format!(
                "token endpoint returned HTTP {}",
                raw.status
            ))
            .with_details(json!({ "status": raw.status })));
        }

        let response: TokenResponse = serde_json::from_str(&raw.body).map_err(|err| {
            StructuredError::auth_failed(format!("malformed token response: {err}"))
        })?;
        if response.access_token.trim().is_empty() {
            return Err(StructuredError::auth_failed("token endpoint returned an empty token"));
        }

        let claims = decode_jwt_claims(&response.access_token);
        let lifetime = Self::lifetime(&response, claims.as_ref());
        Ok(Token::new(response.access_token, issued_at + lifetime).with_claims(claims))
    }
}

/// Payload claims of a JWT, `None` when `token` is not one
pub fn decode_jwt_claims(token: &str) -> Option<Value> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<Value>(&bytes).ok().filter(Value::is_object)
}

/// Owner of the credential and the cached token
pub struct Authenticator {
    credential: Credential,
    source: Arc<dyn TokenSource>,
    clock: Arc<dyn Clock>,
    margin: Duration,
    cached: RwLock<Option<Token>>,
    refresh_lock: Mutex<()>,
    refreshes: AtomicU64,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("source", &self.source)
            .field("margin", &self.margin)
            .field("refreshes", &self.refresh_count())
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(credential: Credential, source: Arc<dyn TokenSource>) -> Self {
        Self {
            credential,
            source,
            clock: Arc::new(SystemClock),
            margin: Duration::from_secs(DEFAULT_TOKEN_REFRESH_MARGIN_SECS),
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Authenticator for `config`: an [`HttpTokenSource`] when a token URL
    /// is configured, otherwise a [`StaticTokenSource`]
    pub fn from_config(config: &ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let source: Arc<dyn TokenSource> = match &config.token_url {
            Some(url) if !url.trim().is_empty() => Arc::new(HttpTokenSource::new(transport, url)),
            _ => Arc::new(StaticTokenSource::default()),
        };
        Self::new(Credential::new(config.api_key.clone()), source)
            .with_margin(config.token_refresh_margin())
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Tokens expiring within `margin` are refreshed before use
    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Completed refreshes so far
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Current cached token, valid or not
    pub fn cached_token(&self) -> Option<Token> {
        self.cached.read().clone()
    }

    fn valid_cached(&self) -> Option<Token> {
        let now = self.clock.now();
        self.cached.read().as_ref().filter(|t| t.is_valid_at(now, self.margin)).cloned()
    }

    /// A token valid for at least the safety margin
    ///
    /// # Errors
    ///
    /// `Cancelled` if `cancel` fires while waiting, otherwise whatever the
    /// token source reported. A failed refresh leaves the cache untouched.
    #[instrument(skip_all)]
    pub async fn get_token(&self, cancel: &CancellationToken) -> Result<Token, StructuredError> {
        if let Some(token) = self.valid_cached() {
            return Ok(token);
        }

        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StructuredError::cancelled()),
            guard = self.refresh_lock.lock() => guard,
        };

        if let Some(token) = self.valid_cached() {
            debug!("token refreshed by a concurrent caller");
            return Ok(token);
        }

        self.refresh_locked(cancel).await
    }

    /// Attach a bearer header to `request`
    ///
    /// # Errors
    ///
    /// See [`get_token`](Self::get_token).
    pub async fn authenticate(
        &self,
        request: &mut TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<Token, StructuredError> {
        let token = self.get_token(cancel).await?;
        request.set_bearer(token.value());
        Ok(token)
    }

    /// Replace `stale`, which the server just rejected
    ///
    /// When another caller already swapped the cached token for a different
    /// unexpired one, that token is returned without fetching.
    ///
    /// # Errors
    ///
    /// See [`get_token`](Self::get_token).
    #[instrument(skip_all)]
    pub async fn force_refresh(
        &self,
        stale: &str,
        cancel: &CancellationToken,
    ) -> Result<Token, StructuredError> {
        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StructuredError::cancelled()),
            guard = self.refresh_lock.lock() => guard,
        };

        let now = self.clock.now();
        let replaced = self
            .cached
            .read()
            .as_ref()
            .filter(|t| t.value() != stale && t.is_valid_at(now, Duration::ZERO))
            .cloned();
        if let Some(token) = replaced {
            debug!("stale token already replaced");
            return Ok(token);
        }

        self.refresh_locked(cancel).await
    }

    /// Fetch and publish a new token; caller holds `refresh_lock`
    async fn refresh_locked(&self, cancel: &CancellationToken) -> Result<Token, StructuredError> {
        let issued_at = self.clock.now();
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("token refresh cancelled");
                return Err(StructuredError::cancelled());
            }
            fetched = self.source.fetch(&self.credential, issued_at) => fetched,
        };

        let token = match fetched {
            Ok(token) => token,
            Err(err) => {
                warn!(code = %err.code, error = %err.message, "token refresh failed");
                return Err(err);
            }
        };

        if !token.is_valid_at(issued_at, Duration::ZERO) {
            warn!("token source returned an expired token");
            return Err(StructuredError::auth_failed("credential provider returned an expired token"));
        }

        *self.cached.write() = Some(token.clone());
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        info!(expires_in = ?token.remaining(issued_at), "access token refreshed");
        Ok(token)
    }
}

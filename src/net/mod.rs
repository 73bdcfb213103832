//! Outbound HTTP: request dispatch, relay routing and rate limiting.
//!
//! This module provides the networking infrastructure for Tsunagi, including:
//!
//! - **HTTP Client**: A global client with a fixed 10-second request timeout
//! - **Rate Limiting**: Per-provider spacing between consecutive requests
//! - **Dispatch Modes**: Direct, proxy-relayed and translation-relayed requests
//! - **Relay Pools**: Categorized proxies in [`proxy`]
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use tsunagi::net::{Dispatcher, OutboundRequest, RequestMode};
//! use tsunagi::net::proxy::ProxyStore;
//!
//! # async fn example() -> tsunagi::Result<()> {
//! let dispatcher = Dispatcher::new("mangadex", Arc::new(ProxyStore::empty()))
//!     .with_rate_limit(250);
//!
//! let request = OutboundRequest::get("https://api.mangadex.org/manga?title=Berserk")?;
//! let data: serde_json::Value = dispatcher
//!     .send(&request, RequestMode::Direct)
//!     .await?
//!     .json()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, ORIGIN};
use reqwest::{Client, Method, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

pub mod proxy;

use proxy::ProxyStore;

/// Fixed timeout applied to every outbound request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Relay endpoint used for translation-relayed requests.
pub const TRANSLATE_ENDPOINT: &str = "http://translate.google.com/translate";

/// Global HTTP client instance.
///
/// This client is configured with:
/// - 10-second timeout
/// - Connection pooling (10 idle connections per host)
/// - Compression support (gzip, brotli)
///
/// The client is created lazily on first use and reused across all providers.
static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("Tsunagi/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .gzip(true)
        .brotli(true)
        .build()
        .expect("Failed to build HTTP client")
});

/// Per-provider rate limiter.
///
/// Tracks the last request time for each provider and enforces a minimum
/// delay between requests. Safe to share across tasks.
#[derive(Debug)]
pub struct RateLimiter {
    last_request: Mutex<HashMap<String, Instant>>,
    delay: Duration,
}

impl RateLimiter {
    /// Creates a new rate limiter with the specified delay.
    ///
    /// ```rust
    /// use tsunagi::net::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(250);
    /// assert_eq!(limiter.delay().as_millis(), 250);
    /// ```
    pub fn new(delay_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(HashMap::new()),
            delay: Duration::from_millis(delay_ms),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Reserves the provider's next request slot and waits until it.
    ///
    /// The slot is `delay` after the previous reservation, or now if that is
    /// already past. Concurrent callers each get their own slot.
    pub async fn wait(&self, provider_id: &str) {
        let slot = {
            let mut last_map = self.last_request.lock();
            let now = Instant::now();
            let slot = match last_map.get(provider_id) {
                Some(&last) => (last + self.delay).max(now),
                None => now,
            };
            last_map.insert(provider_id.to_string(), slot);
            slot
        };

        tokio::time::sleep_until(slot.into()).await;
    }
}

/// How a request leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// The original URL and headers, unmodified.
    Direct,
    /// Routed through a relay from the provider's proxy category.
    Proxied,
    /// Routed through the translation endpoint.
    Translated,
}

impl RequestMode {
    /// Picks the mode for a call.
    ///
    /// Translation only applies when relaying was requested, and then takes
    /// precedence over the proxy.
    ///
    /// ```rust
    /// use tsunagi::net::RequestMode;
    ///
    /// assert_eq!(RequestMode::resolve(true, true), RequestMode::Translated);
    /// assert_eq!(RequestMode::resolve(true, false), RequestMode::Proxied);
    /// assert_eq!(RequestMode::resolve(false, true), RequestMode::Direct);
    /// ```
    pub fn resolve(relay: bool, translate: bool) -> Self {
        match (relay, translate) {
            (true, true) => RequestMode::Translated,
            (true, false) => RequestMode::Proxied,
            (false, _) => RequestMode::Direct,
        }
    }
}

/// A request as a provider describes it, before any relay rewriting.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl OutboundRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
        }
    }

    /// Parses `url` into a GET request.
    pub fn get(url: &str) -> crate::Result<Self> {
        let url = Url::parse(url).map_err(|e| crate::Error::parse(format!("{url}: {e}")))?;
        Ok(Self::new(Method::GET, url))
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (name.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
            self.headers.append(name, value);
        }
        self
    }
}

/// The request that will actually be sent, after relay rewriting.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
}

/// Issues requests on behalf of one provider.
///
/// Cloning is cheap and clones share the rate limiter.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    provider_id: String,
    proxies: Arc<ProxyStore>,
    rate_limiter: Arc<RateLimiter>,
}

impl Dispatcher {
    /// Creates a dispatcher with no rate limit.
    pub fn new(provider_id: impl Into<String>, proxies: Arc<ProxyStore>) -> Self {
        Self {
            provider_id: provider_id.into(),
            proxies,
            rate_limiter: Arc::new(RateLimiter::new(0)),
        }
    }

    /// Sets the minimum delay between consecutive requests.
    pub fn with_rate_limit(self, delay_ms: u64) -> Self {
        self.with_limiter(Arc::new(RateLimiter::new(delay_ms)))
    }

    /// Uses an existing limiter, so every dispatcher holding it shares one
    /// request budget for the provider id.
    pub fn with_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn proxies(&self) -> &Arc<ProxyStore> {
        &self.proxies
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Rewrites a request for the given mode without sending it.
    ///
    /// # Errors
    ///
    /// [`Error::NoProxyAvailable`](crate::Error::NoProxyAvailable) when the
    /// mode is [`RequestMode::Proxied`] and the provider's category is empty.
    pub fn prepare(
        &self,
        request: &OutboundRequest,
        mode: RequestMode,
    ) -> crate::Result<PreparedRequest> {
        match mode {
            RequestMode::Direct => Ok(PreparedRequest {
                method: request.method.clone(),
                url: request.url.to_string(),
                headers: request.headers.clone(),
            }),
            RequestMode::Translated => Ok(PreparedRequest {
                method: request.method.clone(),
                url: format!(
                    "{}?sl=ja&tl=en&u={}",
                    TRANSLATE_ENDPOINT,
                    urlencoding::encode(request.url.as_str())
                ),
                headers: request.headers.clone(),
            }),
            RequestMode::Proxied => {
                let relay = self
                    .proxies
                    .select(&self.provider_id)
                    .ok_or_else(|| crate::Error::no_proxy(&self.provider_id))?;

                let mut headers = HeaderMap::new();
                let origin = request.url.origin().ascii_serialization();
                if let Ok(origin) = HeaderValue::from_str(&origin) {
                    headers.insert(ORIGIN, origin);
                }
                for (name, value) in request.headers.iter() {
                    headers.append(name.clone(), value.clone());
                }

                Ok(PreparedRequest {
                    method: request.method.clone(),
                    url: format!("{}/{}", relay.trim_end_matches('/'), request.url),
                    headers,
                })
            }
        }
    }

    /// Sends a request in the given mode.
    ///
    /// Waits for the provider's rate limit first. The caller validates the
    /// returned status and content type.
    pub async fn send(
        &self,
        request: &OutboundRequest,
        mode: RequestMode,
    ) -> crate::Result<Response> {
        let prepared = self.prepare(request, mode)?;
        self.rate_limiter.wait(&self.provider_id).await;

        debug!("[{}] {:?} {}", self.provider_id, mode, prepared.url);

        let inner = CLIENT
            .request(prepared.method, &prepared.url)
            .headers(prepared.headers)
            .send()
            .await
            .map_err(|e| crate::Error::transport(&self.provider_id, e))?;

        Ok(Response::new(&self.provider_id, inner))
    }
}

/// Normalized response from any dispatch mode.
///
/// The body is released when the wrapper is dropped or consumed.
#[derive(Debug)]
pub struct Response {
    provider_id: String,
    status: StatusCode,
    headers: HeaderMap,
    inner: reqwest::Response,
}

impl Response {
    fn new(provider_id: &str, inner: reqwest::Response) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            status: inner.status(),
            headers: inner.headers().clone(),
            inner,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Fails with [`Error::UpstreamStatus`](crate::Error::UpstreamStatus)
    /// unless the status is 200.
    pub fn ensure_ok(self) -> crate::Result<Self> {
        if self.status == StatusCode::OK {
            Ok(self)
        } else {
            Err(crate::Error::upstream(&self.provider_id, self.status.as_u16()))
        }
    }

    /// Whether the `Content-Type` header names a JSON body.
    pub fn is_json(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                let essence = v.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
                essence == "application/json" || essence.ends_with("+json")
            })
            .unwrap_or(false)
    }

    /// Validates status and content type, then decodes the body.
    pub async fn json<T>(self) -> crate::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.ensure_ok()?;
        if !response.is_json() {
            let content_type = response
                .headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("<none>")
                .to_string();
            return Err(crate::Error::UnexpectedContentType {
                provider: response.provider_id,
                content_type,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(Into::into)
    }

    pub async fn bytes(self) -> crate::Result<Bytes> {
        let provider_id = self.provider_id;
        self.inner
            .bytes()
            .await
            .map_err(|e| crate::Error::transport(provider_id, e))
    }
}

//! The cached DexScreener search proxy.
//!
//! One request flows through:
//!
//! ```text
//! limit -> key "dex:<limit>" -> cache hit?  -> 200 cached JSON
//!                              cache miss  -> GET upstream -> 2xx  -> store, 200 JSON
//!                                                          -> !2xx -> 502 {"error":"Upstream error <status>"}
//!                                                          -> fail -> 500 {"error":"internal_proxy_error"}
//! ```
//!
//! Concurrent misses for the same key are not coalesced: each one calls the
//! upstream and the last store wins.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::cache::TtlCache;
use crate::context::Context;
use crate::http::{Response, StatusCode};
use crate::upstream::{UpstreamClient, UpstreamError};

/// Search endpoint of the DexScreener API.
pub const DEXSCREENER_SEARCH_URL: &str = "https://api.dexscreener.com/latest/dex/search";

/// `limit` used when the query string omits it or leaves it empty.
pub const DEFAULT_LIMIT: &str = "200";

/// How long a successful upstream payload is served from cache.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Body message for every failure that is not an upstream status.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal_proxy_error";

/// Shared cache type: payloads are reference-counted so hits do not deep-copy JSON.
pub type ResponseCache = TtlCache<Arc<Value>>;

/// Failure of one proxied request.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("failed to encode response body: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ProxyError {
    /// Status returned to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Upstream(UpstreamError::Status(_)) => StatusCode::BadGateway,
            _ => StatusCode::InternalServerError,
        }
    }

    /// Message placed in the `error` field. Never carries transport detail.
    pub fn public_message(&self) -> String {
        match self {
            Self::Upstream(UpstreamError::Status(code)) => format!("Upstream error {code}"),
            _ => INTERNAL_ERROR_MESSAGE.to_owned(),
        }
    }

    fn into_response(self) -> Response {
        Response::new(self.status())
            .json(&ErrorBody {
                error: self.public_message(),
            })
            .unwrap_or_else(|_| Response::new(StatusCode::InternalServerError))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Cache-then-fetch handler for `/api/dexscreener`.
#[derive(Clone)]
pub struct DexProxy {
    cache: ResponseCache,
    upstream: Arc<dyn UpstreamClient>,
    search_url: String,
}

impl DexProxy {
    /// Proxies to [`DEXSCREENER_SEARCH_URL`], storing payloads in `cache`
    /// with the cache's default TTL.
    pub fn new(cache: ResponseCache, upstream: Arc<dyn UpstreamClient>) -> Self {
        Self {
            cache,
            upstream,
            search_url: DEXSCREENER_SEARCH_URL.to_owned(),
        }
    }

    /// Points the proxy at another search endpoint (useful for testing).
    #[doc(hidden)]
    #[must_use]
    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Cache key for a `limit` value.
    pub fn cache_key(limit: &str) -> String {
        format!("dex:{limit}")
    }

    /// Upstream URL for a `limit` value; the value is percent-encoded.
    pub fn upstream_url(&self, limit: &str) -> String {
        format!("{}?limit={}", self.search_url, urlencoding::encode(limit))
    }

    /// Returns the payload for `limit`, from cache or from the upstream.
    ///
    /// # Errors
    ///
    /// Propagates the upstream failure; nothing is cached in that case.
    pub async fn lookup(&self, limit: &str) -> Result<Arc<Value>, ProxyError> {
        let key = Self::cache_key(limit);
        if let Some(cached) = self.cache.get(&key) {
            debug!(%key, "cache hit");
            return Ok(cached);
        }

        debug!(%key, "cache miss");
        let payload = Arc::new(self.upstream.fetch_json(&self.upstream_url(limit)).await?);
        self.cache.insert(key, Arc::clone(&payload));
        Ok(payload)
    }

    /// Serves one request for `limit` (absent means [`DEFAULT_LIMIT`]).
    pub async fn respond(&self, limit: Option<&str>) -> Response {
        let limit = limit.filter(|l| !l.is_empty()).unwrap_or(DEFAULT_LIMIT);

        let result = match self.lookup(limit).await {
            Ok(payload) => Response::new(StatusCode::Ok)
                .json(payload.as_ref())
                .map_err(ProxyError::Encode),
            Err(err) => Err(err),
        };

        result.unwrap_or_else(|err| {
            error!(limit, error = %err, "proxy error");
            err.into_response()
        })
    }

    /// Route handler entry point.
    pub async fn handle(&self, ctx: Context) -> Response {
        self.respond(ctx.query("limit")).await
    }
}

//! Wires the proxy, the landing page and the router together.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::assets::IndexPage;
use crate::cache::TtlCache;
use crate::config::Config;
use crate::context::Context;
use crate::middleware::LoggerMiddleware;
use crate::proxy::DexProxy;
use crate::router::Router;
use crate::upstream::HttpUpstream;

/// Path of the proxied search endpoint.
pub const API_PATH: &str = "/api/dexscreener";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to build upstream HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to read index page {}: {source}", .path.display())]
    Index {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The application's long-lived components.
pub struct App {
    pub proxy: DexProxy,
    pub page: IndexPage,
}

impl App {
    /// Builds the components described by `config`.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built or the configured index file
    /// cannot be read.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let upstream = HttpUpstream::new(&config.upstream_options())?;
        let proxy = DexProxy::new(TtlCache::new(config.cache_ttl), Arc::new(upstream));

        let page = match &config.index_path {
            Some(path) => {
                let page = IndexPage::from_path(path).map_err(|source| AppError::Index {
                    path: path.clone(),
                    source,
                })?;
                info!(path = %path.display(), bytes = page.len(), "loaded index page");
                page
            }
            None => IndexPage::embedded(),
        };

        Ok(Self { proxy, page })
    }

    /// Starts the periodic cache sweep unless `config` disables it.
    pub fn spawn_cache_sweeper(&self, config: &Config) -> Option<JoinHandle<()>> {
        (!config.cache_check_period.is_zero())
            .then(|| self.proxy.cache().spawn_sweeper(config.cache_check_period))
    }

    pub fn router(&self) -> Router {
        router(self.proxy.clone(), self.page.clone())
    }
}

/// `GET /` serves `page`; `GET /api/dexscreener` goes through `proxy`.
/// Every request is logged.
pub fn router(proxy: DexProxy, page: IndexPage) -> Router {
    let mut router = Router::new();
    router.layer(LoggerMiddleware);

    router.get("/", move |_ctx: Context| {
        let response = page.respond();
        async move { response }
    });

    router.get(API_PATH, move |ctx: Context| {
        let proxy = proxy.clone();
        async move { proxy.handle(ctx).await }
    });

    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, StatusCode};
    use std::time::Duration;

    fn request(target: &str) -> Request {
        let raw = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    #[tokio::test]
    async fn builds_from_default_config() {
        let app = App::from_config(&Config::default()).unwrap();
        assert_eq!(app.proxy.cache().ttl(), Duration::from_secs(30));

        let response = app.router().route(request("/")).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert!(!response.body().is_empty());
    }

    #[test]
    fn missing_index_file_fails_startup() {
        let config = Config {
            index_path: Some(PathBuf::from("/nonexistent/dexproxy.html")),
            ..Config::default()
        };
        let err = App::from_config(&config).err().unwrap();
        assert!(matches!(err, AppError::Index { .. }));
        assert!(err.to_string().contains("/nonexistent/dexproxy.html"));
    }

    #[tokio::test]
    async fn sweeper_respects_zero_period() {
        let app = App::from_config(&Config::default()).unwrap();
        let disabled = Config {
            cache_check_period: Duration::ZERO,
            ..Config::default()
        };
        assert!(app.spawn_cache_sweeper(&disabled).is_none());

        let handle = app.spawn_cache_sweeper(&Config::default()).unwrap();
        handle.abort();
    }
}

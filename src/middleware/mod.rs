//! Middleware pipeline wrapped around every routed request.
//!
//! - [`Middleware`] is the trait implemented by each layer.
//! - [`Next`] is the cursor into the rest of the chain; the matched route
//!   handler sits at its end.
//! - [`LoggerMiddleware`] logs one line per request.

use std::{future::Future, pin::Pin, sync::Arc};

use tokio::time::Instant;

use crate::{Response, context::Context, router::Handler};

/// Boxed future returned by middleware and handlers.
///
/// Every layer and endpoint resolves to exactly one [`Response`].
pub type BoxResponse = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A type-erased, reference-counted middleware function.
///
/// The router keeps its layers as `Arc<[MiddlewareHandler]>`, so each request
/// clones a pointer rather than the stack.
pub type MiddlewareHandler = Arc<dyn Fn(Context, Next) -> BoxResponse + Send + Sync + 'static>;

/// Wraps a [`Middleware`] implementation as a [`MiddlewareHandler`].
///
/// # Examples
///
/// ```
/// use dexproxy::middleware::{LoggerMiddleware, MiddlewareHandler, from_middleware};
///
/// let layers: Vec<MiddlewareHandler> = vec![from_middleware(LoggerMiddleware)];
/// assert_eq!(layers.len(), 1);
/// ```
pub fn from_middleware<M>(middleware: M) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    let middleware = Arc::new(middleware);
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// The remainder of the chain for one request.
///
/// Consumed by [`run`](Self::run), so a layer can forward at most once.
///
/// # Examples
///
/// ```
/// use dexproxy::context::Context;
/// use dexproxy::middleware::{BoxResponse, Middleware, Next};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
pub struct Next {
    layers: Arc<[MiddlewareHandler]>,
    index: usize,
    endpoint: Handler,
}

impl Next {
    /// A cursor at the start of `layers`, ending in `endpoint`.
    pub fn new(layers: Arc<[MiddlewareHandler]>, endpoint: Handler) -> Self {
        Self {
            layers,
            index: 0,
            endpoint,
        }
    }

    /// Runs the next layer, or the endpoint once every layer has run.
    pub async fn run(mut self, ctx: Context) -> Response {
        match self.layers.get(self.index).cloned() {
            Some(layer) => {
                self.index += 1;
                layer(ctx, self).await
            }
            None => (self.endpoint)(ctx).await,
        }
    }
}

/// A layer around request handling.
///
/// A layer may forward (`next.run(ctx).await`), short-circuit by returning
/// its own [`Response`], or decorate the downstream response.
///
/// # Examples
///
/// A layer that stamps a header on whatever the handler returns:
///
/// ```
/// use dexproxy::context::Context;
/// use dexproxy::middleware::{BoxResponse, Middleware, Next};
///
/// struct ServedBy(&'static str);
///
/// impl Middleware for ServedBy {
///     fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
///         let name = self.0;
///         Box::pin(async move { next.run(ctx).await.header("X-Served-By", name) })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    /// Handles `ctx`, usually by awaiting `next.run(ctx)` somewhere inside.
    fn handle(&self, ctx: Context, next: Next) -> BoxResponse;
}

/// Logs method, path, status and elapsed time once the response is ready.
///
/// Emits one `info` event per request under the `dexproxy::middleware`
/// target, e.g. `request served method=GET path=/api/dexscreener status=200`.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().to_string();
            let path = ctx.request().path().to_owned();

            let response = next.run(ctx).await;

            tracing::info!(
                %method,
                %path,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request served"
            );
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, StatusCode};

    fn ctx() -> Context {
        let raw = b"GET /api/dexscreener HTTP/1.1\r\nHost: localhost\r\n\r\n";
        Context::new(Request::parse(raw).unwrap().0)
    }

    fn endpoint() -> Handler {
        Arc::new(|_ctx: Context| -> BoxResponse {
            Box::pin(async { Response::new(StatusCode::Ok).text("endpoint") })
        })
    }

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
            let tag = self.0;
            Box::pin(async move {
                let mut response = next.run(ctx).await;
                let seen = response
                    .headers()
                    .get("x-layers")
                    .map(|v| format!("{v},{tag}"))
                    .unwrap_or_else(|| tag.to_owned());
                response.set_header("X-Layers", seen);
                response
            })
        }
    }

    struct Deny;

    impl Middleware for Deny {
        fn handle(&self, _ctx: Context, _next: Next) -> BoxResponse {
            Box::pin(async { Response::new(StatusCode::NotFound) })
        }
    }

    #[tokio::test]
    async fn empty_chain_reaches_endpoint() {
        let next = Next::new(Arc::from(Vec::new()), endpoint());
        let response = next.run(ctx()).await;
        assert_eq!(response.body().as_ref(), b"endpoint");
    }

    #[tokio::test]
    async fn layers_unwind_innermost_first() {
        let layers: Vec<MiddlewareHandler> =
            vec![from_middleware(Tag("outer")), from_middleware(Tag("inner"))];
        let response = Next::new(layers.into(), endpoint()).run(ctx()).await;
        assert_eq!(response.headers().get("x-layers"), Some("inner,outer"));
    }

    #[tokio::test]
    async fn layer_can_short_circuit() {
        let layers: Vec<MiddlewareHandler> =
            vec![from_middleware(Deny), from_middleware(Tag("never"))];
        let response = Next::new(layers.into(), endpoint()).run(ctx()).await;
        assert_eq!(response.status(), StatusCode::NotFound);
        assert!(response.headers().get("x-layers").is_none());
    }

    #[tokio::test]
    async fn logger_passes_response_through() {
        let layers: Vec<MiddlewareHandler> = vec![from_middleware(LoggerMiddleware)];
        let response = Next::new(layers.into(), endpoint()).run(ctx()).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.body().as_ref(), b"endpoint");
    }
}

//! Request routing by exact path.
//!
//! [`Router`] maps `GET` paths to async handlers and runs every matched
//! request through its middleware stack. A `HEAD` request is answered by the
//! `GET` handler for the same path with the body left off the wire. Trailing
//! slashes are ignored, so `/api/dexscreener/` and `/api/dexscreener` are the
//! same route. Anything unmatched gets `404 Not Found`.

use std::sync::Arc;

use crate::context::Context;
use crate::middleware::{BoxResponse, Middleware, MiddlewareHandler, Next, from_middleware};
use crate::{Method, Request, Response, StatusCode};

/// Type-erased, heap-allocated async handler that turns a [`Context`] into a
/// [`Response`].
///
/// Handlers sit behind `Arc<dyn Fn(…)>` so the router can hand the same
/// closure to every connection task without copying it. Build one through
/// [`Router::get`] rather than by hand.
pub type Handler = Arc<dyn Fn(Context) -> BoxResponse + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is
/// `Send + Sync + 'static` implements it through the blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Calls the handler with `ctx`, boxing the returned future.
    fn call(&self, ctx: Context) -> BoxResponse;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxResponse {
        Box::pin((self)(ctx))
    }
}

// One registered path and its handler.
struct Route {
    path: String,
    handler: Handler,
}

/// Exact-path router with a middleware stack.
///
/// Routes are matched in registration order on the normalized path. Only
/// `GET` (and, through it, `HEAD`) is routable; any other method falls
/// through to the 404 handler.
///
/// # Examples
///
/// ```rust,no_run
/// use dexproxy::context::Context;
/// use dexproxy::{Response, Router, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/health", |_ctx: Context| async { Response::new(StatusCode::NoContent) });
/// ```
pub struct Router {
    routes: Vec<Route>,
    layers: Vec<MiddlewareHandler>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates a router with no routes and no middleware.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            layers: Vec::new(),
        }
    }

    /// Registers `handler` for `GET` (and `HEAD`) requests to `path`.
    ///
    /// The first registration for a path wins.
    ///
    /// # Arguments
    ///
    /// - `path`: an exact path such as `"/api/dexscreener"`. A trailing slash
    ///   is dropped, so `"/api/"` registers `"/api"`.
    /// - `handler`: any `Fn(Context) -> impl Future<Output = Response>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dexproxy::context::Context;
    /// use dexproxy::{Response, Router, StatusCode};
    ///
    /// let mut router = Router::new();
    /// router.get("/", |_ctx: Context| async { Response::new(StatusCode::Ok).html("<h1>hi</h1>") });
    /// router.get("/ping/", |_ctx: Context| async { Response::new(StatusCode::Ok).text("pong") });
    /// assert_eq!(router.len(), 2);
    /// ```
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        self.routes.push(Route {
            path: normalize(path).to_owned(),
            handler,
        });
    }

    /// Appends a middleware layer. Layers run in registration order, so the
    /// first one added is the outermost.
    ///
    /// Layers wrap every request, including the ones that end in a 404.
    ///
    /// # Examples
    ///
    /// ```
    /// use dexproxy::Router;
    /// use dexproxy::middleware::LoggerMiddleware;
    ///
    /// let mut router = Router::new();
    /// router.layer(LoggerMiddleware);
    /// ```
    pub fn layer(&mut self, middleware: impl Middleware + 'static) {
        self.layers.push(from_middleware(middleware));
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// `true` when no route has been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatches `request` through the middleware stack to its handler.
    ///
    /// # Returns
    ///
    /// The handler's response; for `HEAD` the same response with the body
    /// left off the wire (headers, `Content-Length` included, are kept). An
    /// unmatched method or path yields `404 Not Found`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dexproxy::context::Context;
    /// use dexproxy::{Request, Response, Router, StatusCode};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let mut router = Router::new();
    /// router.get("/ping", |_ctx: Context| async { Response::new(StatusCode::Ok).text("pong") });
    ///
    /// let (request, _) = Request::parse(b"GET /ping/ HTTP/1.1\r\n\r\n").unwrap();
    /// assert_eq!(router.route(request).await.body().as_ref(), b"pong");
    ///
    /// let (request, _) = Request::parse(b"DELETE /ping HTTP/1.1\r\n\r\n").unwrap();
    /// assert_eq!(router.route(request).await.status(), StatusCode::NotFound);
    /// # }
    /// ```
    pub async fn route(&self, request: Request) -> Response {
        let is_head = request.method() == &Method::Head;
        let handler = match request.method() {
            Method::Get | Method::Head => self.find(request.path()),
            _ => None,
        }
        .unwrap_or_else(not_found);

        let next = Next::new(Arc::from(self.layers.as_slice()), handler);
        let response = next.run(Context::new(request)).await;

        if is_head {
            response.without_body()
        } else {
            response
        }
    }

    // First route whose normalized path equals `path`'s.
    fn find(&self, path: &str) -> Option<Handler> {
        let path = normalize(path);
        self.routes
            .iter()
            .find(|route| route.path == path)
            .map(|route| Arc::clone(&route.handler))
    }
}

fn not_found() -> Handler {
    Arc::new(|_ctx: Context| -> BoxResponse {
        Box::pin(async { Response::new(StatusCode::NotFound) })
    })
}

// Strips trailing slashes; an all-slash path is the root.
fn normalize(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

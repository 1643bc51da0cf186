//! Per-request context handed to middleware and route handlers.
//!
//! A [`Context`] owns the parsed [`Request`] for the lifetime of one
//! dispatch. Handlers read the path, headers and query through it.

use crate::Request;

/// Everything a handler knows about the request it is serving.
///
/// # Examples
///
/// ```
/// use dexproxy::Request;
/// use dexproxy::context::Context;
///
/// let (request, _) = Request::parse(b"GET /api/dexscreener?limit=50 HTTP/1.1\r\n\r\n").unwrap();
/// let ctx = Context::new(request);
/// assert_eq!(ctx.query("limit"), Some("50"));
/// assert_eq!(ctx.request().path(), "/api/dexscreener");
/// ```
#[derive(Debug)]
pub struct Context {
    request: Request,
}

impl Context {
    /// Wraps a parsed request.
    pub fn new(request: Request) -> Self {
        Self { request }
    }

    /// The request being served.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Decoded query parameter, treating an empty value as absent.
    ///
    /// When `key` repeats, the first occurrence is returned, so
    /// `?limit=5&limit=9` yields `Some("5")` and `?limit=` yields `None`.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.request.query_param(key).filter(|v| !v.is_empty())
    }

    /// Gives the request back, consuming the context.
    pub fn into_request(self) -> Request {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(target: &str) -> Context {
        let raw = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Context::new(Request::parse(raw.as_bytes()).unwrap().0)
    }

    #[test]
    fn query_reads_decoded_values() {
        assert_eq!(ctx("/api/dexscreener?limit=75").query("limit"), Some("75"));
    }

    #[test]
    fn empty_query_value_is_absent() {
        assert_eq!(ctx("/api/dexscreener?limit=").query("limit"), None);
        assert_eq!(ctx("/api/dexscreener").query("limit"), None);
    }

    #[test]
    fn first_repeated_value_wins() {
        assert_eq!(ctx("/api/dexscreener?limit=5&limit=9").query("limit"), Some("5"));
    }

    #[test]
    fn into_request_returns_parsed_request() {
        assert_eq!(ctx("/x?a=1").into_request().path(), "/x");
    }
}

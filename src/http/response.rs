//! HTTP/1.1 response builder.
//!
//! Fluent construction of responses plus serialization to the wire format.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use super::{Headers, StatusCode};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use dexproxy::http::{Response, StatusCode};
/// use serde_json::json;
///
/// let response = Response::new(StatusCode::BadGateway)
///     .json(&json!({ "error": "Upstream error 503" }))
///     .unwrap();
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 502 Bad Gateway\r\n"));
/// assert!(text.ends_with(r#"{"error":"Upstream error 503"}"#));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
    keep_alive: bool,
    omit_body: bool,
}

impl Response {
    /// Creates a response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
            keep_alive: true,
            omit_body: false,
        }
    }

    /// Sets a header, replacing any previous value with the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Sets a header in place, for middleware decorating a downstream response.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Plain-text body.
    #[must_use]
    pub fn text(self, body: impl Into<String>) -> Self {
        self.with_body(TEXT_CONTENT_TYPE, Bytes::from(body.into()))
    }

    /// HTML body. `Bytes` clones are reference-counted, so a shared page is
    /// not copied per request.
    #[must_use]
    pub fn html(self, body: impl Into<Bytes>) -> Self {
        self.with_body(HTML_CONTENT_TYPE, body.into())
    }

    /// Serializes `value` as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns the serializer error when `value` cannot be represented as JSON
    /// (for example a map with non-string keys).
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(self.with_body(JSON_CONTENT_TYPE, Bytes::from(body)))
    }

    fn with_body(mut self, content_type: &str, body: Bytes) -> Self {
        self.headers.set("Content-Type", content_type);
        self.body = body;
        self
    }

    /// Keeps headers and `Content-Length` but drops the body on the wire,
    /// as a `HEAD` response requires.
    #[must_use]
    pub fn without_body(mut self) -> Self {
        self.omit_body = true;
        self
    }

    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Serializes the response in HTTP/1.1 wire format.
    ///
    /// `Connection` and `Content-Length` are always written last, after any
    /// headers set by handlers.
    pub fn into_bytes(self) -> BytesMut {
        let content_length = self.body.len();
        let connection = if self.keep_alive { "keep-alive" } else { "close" };

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );
        buf.put(self.headers.to_string().as_bytes());
        buf.put(format!("Connection: {connection}\r\n").as_bytes());
        buf.put(format!("Content-Length: {content_length}\r\n\r\n").as_bytes());

        if !self.omit_body {
            buf.put(self.body);
        }

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn text_response() {
        let s = to_string(Response::new(StatusCode::Ok).text("Hello").into_bytes());
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn json_response_sets_content_type() {
        let r = Response::new(StatusCode::InternalServerError)
            .json(&json!({ "error": "internal_proxy_error" }))
            .unwrap();
        assert_eq!(r.headers().get("content-type"), Some(JSON_CONTENT_TYPE));
        assert_eq!(r.body().as_ref(), br#"{"error":"internal_proxy_error"}"#);

        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[test]
    fn json_rejects_non_string_keys() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(vec![1u8], 1);
        assert!(Response::new(StatusCode::Ok).json(&map).is_err());
    }

    #[test]
    fn html_response() {
        let r = Response::new(StatusCode::Ok).html("<p>hi</p>");
        assert_eq!(r.headers().get("Content-Type"), Some(HTML_CONTENT_TYPE));
        assert_eq!(r.body().len(), 9);
    }

    #[test]
    fn head_keeps_length_drops_body() {
        let s = to_string(
            Response::new(StatusCode::Ok)
                .html("<p>hi</p>")
                .without_body()
                .into_bytes(),
        );
        assert!(s.contains("Content-Length: 9\r\n"));
        assert!(s.ends_with("\r\n\r\n"));
        assert!(!s.contains("<p>"));
    }

    #[test]
    fn empty_body_has_no_content_type() {
        let s = to_string(Response::new(StatusCode::NotFound).into_bytes());
        assert!(s.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(!s.contains("Content-Type"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn connection_close() {
        let s = to_string(Response::new(StatusCode::Ok).keep_alive(false).into_bytes());
        assert!(s.contains("Connection: close\r\n"));
    }

    #[test]
    fn header_overrides_content_type() {
        let r = Response::new(StatusCode::Ok)
            .text("x")
            .header("content-type", "text/csv");
        assert_eq!(r.headers().get("Content-Type"), Some("text/csv"));
        assert_eq!(r.headers().len(), 1);
    }
}

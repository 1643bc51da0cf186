//! The landing page served at `/`.

use std::path::Path;

use bytes::Bytes;

use crate::http::{Response, StatusCode};

static EMBEDDED_INDEX: &str = include_str!("../../static/index.html");

/// A fixed HTML document, loaded once and shared by every request.
#[derive(Debug, Clone)]
pub struct IndexPage {
    html: Bytes,
}

impl IndexPage {
    /// The page compiled into the binary.
    pub fn embedded() -> Self {
        Self {
            html: Bytes::from_static(EMBEDDED_INDEX.as_bytes()),
        }
    }

    /// Reads the page from disk.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let html = std::fs::read(path)?;
        Ok(Self {
            html: Bytes::from(html),
        })
    }

    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    pub fn respond(&self) -> Response {
        Response::new(StatusCode::Ok)
            .html(self.html.clone())
            .header("Cache-Control", "public, max-age=0")
    }
}

impl Default for IndexPage {
    fn default() -> Self {
        Self::embedded()
    }
}

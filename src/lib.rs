//! # dexproxy
//!
//! A small caching reverse proxy in front of the DexScreener search API.
//!
//! - `GET /` serves a static landing page.
//! - `GET /api/dexscreener?limit=N` returns the upstream search payload,
//!   cached for 30 seconds per `limit` value.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dexproxy::app::App;
//! use dexproxy::config::Config;
//! use dexproxy::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let app = App::from_config(&config)?;
//!     let server = Server::bind(config.bind_addr()).await?;
//!     server.serve(app.router(), std::future::pending()).await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod assets;
pub mod cache;
pub mod config;
pub mod context;
pub mod http;
pub mod middleware;
pub mod proxy;
pub mod router;
pub mod server;
pub mod upstream;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};

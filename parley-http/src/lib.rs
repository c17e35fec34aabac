//! HTTP plumbing shared by the assistant client and the scraping proxy client.
//!
//! - [`HttpClient`]: base-URL anchored requests with JSON, text and byte helpers
//! - [`RequestOpts`] / [`Auth`]: per-request headers, query, credentials, budgets
//! - 429/5xx and network failures retried with backoff (honours `Retry-After`)
//! - Secrets never reach the logs: bearer tokens and secret query params are
//!   redacted everywhere, including the raw request dump enabled by
//!   `PARLEY_HTTP_RAW=1` (target `http.raw`)
//!
//! ```no_run
//! # async fn demo() -> Result<(), parley_http::HttpError> {
//! let client = parley_http::HttpClient::new("https://api.example.com/v1/")?;
//! let thread: serde_json::Value = client
//!     .get_json("threads/thread_1", parley_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```

mod client;
mod error;
mod redact;
mod request;

pub use client::HttpClient;
pub use error::HttpError;
pub use request::{Auth, RequestOpts};

//! Local tools the assistant may call while a run is in progress.
//!
//! - Tool registry and argument types (`registry`)
//! - Name-based dispatch with error normalisation (`dispatch`)
//! - Content fetching through the scraping proxy (`fetch`)
//! - HTML text and link extraction (`extract`)

pub mod dispatch;
pub mod extract;
pub mod fetch;
pub mod registry;

pub use dispatch::{DispatchError, PageSource, ToolDispatcher, ToolError};
pub use extract::ScrapedPage;
pub use fetch::{ContentFetcher, DEFAULT_PROXY_ENDPOINT};
pub use registry::{ScrapeArgs, Tool, ToolInvocation};

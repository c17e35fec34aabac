//! Page fetching through the residential scraping proxy.

use crate::dispatch::{PageSource, ToolError};
use crate::extract::ScrapedPage;
use async_trait::async_trait;
use parley_http::{Auth, HttpClient, HttpError, RequestOpts};
use reqwest::StatusCode;
use std::borrow::Cow;
use std::time::Duration;
use url::Url;

pub const DEFAULT_PROXY_ENDPOINT: &str = "https://proxy.scrapeops.io/v1/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches a target URL via the proxy and extracts its text and links.
#[derive(Clone)]
pub struct ContentFetcher {
    http: HttpClient,
    api_key: String,
}

impl ContentFetcher {
    pub fn new(endpoint: &str, api_key: String) -> Result<Self, HttpError> {
        let http = HttpClient::new(endpoint)?
            .with_timeout(DEFAULT_TIMEOUT)
            .with_retries(0);
        Ok(Self { http, api_key })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    /// Fetch `url` through the proxy. Every failure is logged and becomes `None`.
    pub async fn fetch(&self, url: &str) -> Option<ScrapedPage> {
        let opts = RequestOpts {
            auth: Some(Auth::Query {
                name: "api_key",
                value: Cow::Borrowed(self.api_key.as_str()),
            }),
            query: Some(vec![
                ("url", Cow::Borrowed(url)),
                ("render_js", Cow::Borrowed("false")),
                ("residential", Cow::Borrowed("true")),
            ]),
            ..Default::default()
        };

        tracing::info!(target: "tools.fetch", %url, "fetch.start");
        match self.http.get_text_with_status("", opts).await {
            Ok((status, html)) if status == StatusCode::OK => {
                let page = ScrapedPage::from_html(&html);
                tracing::info!(
                    target: "tools.fetch",
                    %url,
                    content_len = page.content.len(),
                    links = page.links.len(),
                    "fetch.done"
                );
                Some(page)
            }
            Ok((status, _)) => {
                tracing::warn!(target: "tools.fetch", %url, %status, "fetch.unexpected_status");
                None
            }
            Err(e) => {
                tracing::warn!(target: "tools.fetch", %url, error = %e, "fetch.failed");
                None
            }
        }
    }
}

#[async_trait]
impl PageSource for ContentFetcher {
    async fn scrape(&self, url: &str) -> Result<Option<ScrapedPage>, ToolError> {
        let parsed = Url::parse(url).map_err(|e| ToolError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ToolError::InvalidUrl(format!(
                "{url}: unsupported scheme {}",
                parsed.scheme()
            )));
        }
        Ok(self.fetch(url).await)
    }
}

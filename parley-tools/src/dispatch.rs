//! Name → tool dispatch.
//!
//! Only an unknown tool name or undecodable arguments are errors. Whatever
//! happens inside the tool itself comes back as an output string so the run
//! can continue with a "tool failed" observation.

use crate::extract::ScrapedPage;
use crate::registry::{Tool, ToolInvocation};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {message}")]
    ArgumentParse { tool: &'static str, message: String },
}

impl DispatchError {
    /// JSON-encoded error string suitable as a tool output.
    pub fn to_output(&self) -> String {
        match self {
            DispatchError::UnknownTool(name) => encode_message(&format!("Unknown tool: {name}")),
            DispatchError::ArgumentParse { tool, .. } => {
                encode_message(&format!("Error occurred in {tool}: {self}"))
            }
        }
    }
}

/// Failure raised by a tool implementation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Failed(String),
}

/// Backend for the `scrape_content` tool.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// `Ok(None)` means the page could not be fetched.
    async fn scrape(&self, url: &str) -> Result<Option<ScrapedPage>, ToolError>;
}

#[derive(Clone)]
pub struct ToolDispatcher {
    pages: Arc<dyn PageSource>,
}

impl ToolDispatcher {
    pub fn new(pages: Arc<dyn PageSource>) -> Self {
        Self { pages }
    }

    /// Run `tool_name` with `args_json` and return its JSON-encoded output.
    pub async fn dispatch(&self, tool_name: &str, args_json: &str) -> Result<String, DispatchError> {
        let tool = Tool::from_name(tool_name)
            .ok_or_else(|| DispatchError::UnknownTool(tool_name.to_string()))?;
        let invocation = tool
            .parse_args(args_json)
            .map_err(|e| DispatchError::ArgumentParse {
                tool: tool.name(),
                message: e.to_string(),
            })?;

        tracing::info!(tool = tool.name(), "tool.dispatch.start");
        let output = match invocation {
            ToolInvocation::ScrapeContent(args) => match self.pages.scrape(&args.url).await {
                Ok(Some(page)) => serde_json::to_string(&page).unwrap_or_else(|e| {
                    encode_message(&format!("Error occurred in {}: {e}", tool.name()))
                }),
                Ok(None) => encode_message(&format!("No content returned from {}", tool.name())),
                Err(e) => {
                    tracing::warn!(tool = tool.name(), error = %e, "tool.dispatch.failed");
                    encode_message(&format!("Error occurred in {}: {e}", tool.name()))
                }
            },
        };
        tracing::debug!(tool = tool.name(), output_len = output.len(), "tool.dispatch.done");
        Ok(output)
    }
}

fn encode_message(message: &str) -> String {
    serde_json::Value::String(message.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageSource for CountingSource {
        async fn scrape(&self, _url: &str) -> Result<Option<ScrapedPage>, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(ScrapedPage {
                content: "Hello".into(),
                links: vec!["/a".into()],
            }))
        }
    }

    struct Exploding;

    #[async_trait]
    impl PageSource for Exploding {
        async fn scrape(&self, _url: &str) -> Result<Option<ScrapedPage>, ToolError> {
            Err(ToolError::Failed("proxy quota exhausted".into()))
        }
    }

    struct Empty;

    #[async_trait]
    impl PageSource for Empty {
        async fn scrape(&self, _url: &str) -> Result<Option<ScrapedPage>, ToolError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn unknown_tool_invokes_nothing() {
        let source = Arc::new(CountingSource::default());
        let dispatcher = ToolDispatcher::new(source.clone());

        let err = dispatcher
            .dispatch("delete_everything", r#"{"url":"https://a.b"}"#)
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::UnknownTool(ref n) if n == "delete_everything"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_arguments_invoke_nothing() {
        let source = Arc::new(CountingSource::default());
        let dispatcher = ToolDispatcher::new(source.clone());

        let err = dispatcher.dispatch("scrape_content", "{\"url\":").await.unwrap_err();
        assert!(matches!(err, DispatchError::ArgumentParse { tool: "scrape_content", .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        let output: String = serde_json::from_str(&err.to_output()).unwrap();
        assert!(output.starts_with("Error occurred in scrape_content: invalid arguments"));
    }

    #[tokio::test]
    async fn success_is_the_page_as_json() {
        let dispatcher = ToolDispatcher::new(Arc::new(CountingSource::default()));
        let out = dispatcher
            .dispatch("scrape_content", r#"{"url":"https://a.b"}"#)
            .await
            .unwrap();
        let page: ScrapedPage = serde_json::from_str(&out).unwrap();
        assert_eq!(page.content, "Hello");
        assert_eq!(page.links, vec!["/a"]);
    }

    #[tokio::test]
    async fn tool_failure_becomes_an_error_output() {
        let dispatcher = ToolDispatcher::new(Arc::new(Exploding));
        let out = dispatcher
            .dispatch("scrape_content", r#"{"url":"https://a.b"}"#)
            .await
            .expect("tool failures are not dispatch errors");
        let message: String = serde_json::from_str(&out).unwrap();
        assert_eq!(message, "Error occurred in scrape_content: proxy quota exhausted");
    }

    #[tokio::test]
    async fn missing_page_is_reported_as_no_content() {
        let dispatcher = ToolDispatcher::new(Arc::new(Empty));
        let out = dispatcher
            .dispatch("scrape_content", r#"{"url":"https://a.b"}"#)
            .await
            .unwrap();
        assert_eq!(out, "\"No content returned from scrape_content\"");
    }
}

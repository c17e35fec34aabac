use crate::api::AssistantApi;
use crate::types::{
    Assistant, AssistantSpec, ListResponse, Message, NewMessage, NewRun, Role, Run,
    SubmitToolOutputsRequest, Thread, ToolOutput,
};
use async_trait::async_trait;
use parley_common::{ParleyError, Result};
use parley_http::{Auth, HttpClient, HttpError, RequestOpts};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::borrow::Cow;
use std::time::Duration;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";

const BETA_HEADER: &str = "openai-beta";
const BETA_VALUE: &str = "assistants=v2";

/// [`AssistantApi`] backed by the OpenAI Assistants v2 REST API.
pub struct OpenAiAssistants {
    client: HttpClient,
    api_key: String,
}

impl OpenAiAssistants {
    /// Create a client for `base_url` (normally [`OPENAI_API_BASE`]).
    ///
    /// HTTP-level retries are disabled: the run orchestrator owns the retry
    /// policy for polling, and every other call fails fast.
    pub fn new(api_key: String, base_url: &str) -> Result<Self> {
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let client = HttpClient::new(&base)
            .map_err(|e| ParleyError::Config(format!("HttpClient init failed: {e}")))?
            .with_timeout(Duration::from_secs(60))
            .with_retries(0);

        Ok(Self { client, api_key })
    }

    fn opts(&self) -> RequestOpts<'_> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(BETA_HEADER),
            HeaderValue::from_static(BETA_VALUE),
        );
        RequestOpts {
            auth: Some(Auth::Bearer(&self.api_key)),
            headers: Some(headers),
            ..Default::default()
        }
    }
}

#[async_trait]
impl AssistantApi for OpenAiAssistants {
    async fn create_thread(&self) -> Result<Thread> {
        let thread: Thread = self
            .client
            .post_json_opts("threads", &serde_json::json!({}), self.opts())
            .await
            .map_err(http_to_parley)?;
        tracing::info!(thread_id = %thread.id, "assistant.thread.created");
        Ok(thread)
    }

    async fn create_message(&self, thread_id: &str, role: Role, content: &str) -> Result<Message> {
        self.client
            .post_json_opts(
                &format!("threads/{thread_id}/messages"),
                &NewMessage { role, content },
                self.opts(),
            )
            .await
            .map_err(http_to_parley)
    }

    async fn list_messages(&self, thread_id: &str, limit: u32) -> Result<Vec<Message>> {
        let mut opts = self.opts();
        opts.query = Some(vec![
            ("limit", Cow::Owned(limit.to_string())),
            ("order", Cow::Borrowed("desc")),
        ]);
        let page: ListResponse<Message> = self
            .client
            .get_json(&format!("threads/{thread_id}/messages"), opts)
            .await
            .map_err(http_to_parley)?;
        Ok(page.data)
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run> {
        let run: Run = self
            .client
            .post_json_opts(
                &format!("threads/{thread_id}/runs"),
                &NewRun { assistant_id },
                self.opts(),
            )
            .await
            .map_err(http_to_parley)?;
        tracing::info!(thread_id, run_id = %run.id, status = %run.status, "assistant.run.created");
        Ok(run)
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.client
            .get_json(&format!("threads/{thread_id}/runs/{run_id}"), self.opts())
            .await
            .map_err(http_to_parley)
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run> {
        self.client
            .post_json_opts(
                &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
                &SubmitToolOutputsRequest {
                    tool_outputs: outputs,
                },
                self.opts(),
            )
            .await
            .map_err(http_to_parley)
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.client
            .post_empty(&format!("threads/{thread_id}/runs/{run_id}/cancel"), self.opts())
            .await
            .map_err(http_to_parley)
    }

    async fn file_content(&self, file_id: &str) -> Result<Vec<u8>> {
        self.client
            .get_bytes(&format!("files/{file_id}/content"), self.opts())
            .await
            .map_err(http_to_parley)
    }

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant> {
        let assistant: Assistant = self
            .client
            .post_json_opts("assistants", spec, self.opts())
            .await
            .map_err(http_to_parley)?;
        tracing::info!(assistant_id = %assistant.id, model = %assistant.model, "assistant.created");
        Ok(assistant)
    }
}

fn http_to_parley(e: HttpError) -> ParleyError {
    match e {
        HttpError::Decode(..) => ParleyError::Decode(e.to_string()),
        e if e.is_transient() => ParleyError::Unavailable(e.to_string()),
        e => ParleyError::Service(e.to_string()),
    }
}

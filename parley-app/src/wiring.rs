use anyhow::{Context, Result, bail};
use parley_assistant::{AssistantApi, OpenAiAssistants};
use parley_chat::{Orchestrator, RetryPolicy, RunSettings, assistant_spec};
use parley_config::{AssistantConfig, ParleyConfig, RunConfig};
use parley_tools::{ContentFetcher, ToolDispatcher};
use std::sync::Arc;
use std::time::Duration;

/// Everything a chat needs, built once from config.
pub struct App {
    pub api: Arc<dyn AssistantApi>,
    pub orchestrator: Orchestrator,
}

impl App {
    /// Register a new assistant with the scraping tool and the hosted tools.
    pub async fn create_assistant(&self, cfg: &AssistantConfig) -> Result<String> {
        let spec = assistant_spec(&cfg.name, &cfg.instructions, &cfg.model, &cfg.file_ids);
        let assistant = self
            .api
            .create_assistant(&spec)
            .await
            .context("creating assistant")?;
        tracing::info!(assistant_id = %assistant.id, model = %assistant.model, "assistant created");
        Ok(assistant.id)
    }
}

pub fn run_settings(cfg: &RunConfig) -> RunSettings {
    RunSettings {
        poll_interval: cfg.poll_interval(),
        run_timeout: cfg.timeout(),
        cancel_grace: cfg.cancel_grace(),
        poll_retry: RetryPolicy {
            max_attempts: cfg.poll_retry.max_attempts,
            base_delay: Duration::from_millis(cfg.poll_retry.base_delay_ms),
        },
    }
}

pub fn build_from_config(cfg: &ParleyConfig) -> Result<App> {
    let api: Arc<dyn AssistantApi> = Arc::new(
        OpenAiAssistants::new(cfg.assistant.api_key.clone(), &cfg.assistant.base_url)
            .context("building assistant client")?,
    );

    let fetcher = ContentFetcher::new(&cfg.proxy.endpoint, cfg.proxy.api_key.clone())
        .context("building scraping proxy client")?
        .with_timeout(cfg.proxy.timeout());
    let tools = ToolDispatcher::new(Arc::new(fetcher));

    let orchestrator = Orchestrator::new(api.clone(), tools, run_settings(&cfg.run));
    Ok(App { api, orchestrator })
}

/// `--assistant-id` / `PARLEY_ASSISTANT_ID` first, then the config file.
pub fn resolve_assistant_id(cli: Option<String>, cfg: &AssistantConfig) -> Result<String> {
    match cli.or_else(|| cfg.assistant_id.clone()) {
        Some(id) if !id.trim().is_empty() => Ok(id.trim().to_string()),
        _ => bail!(
            "no assistant configured: pass --assistant-id, set PARLEY_ASSISTANT_ID, \
             or run `parley create-assistant` and put the id under assistant.assistant_id"
        ),
    }
}

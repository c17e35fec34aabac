//! Loader for Parley configuration with YAML + environment overlays.
//!
//! Sources are merged in order: YAML files/snippets first, then
//! `PARLEY__`-prefixed environment variables (`PARLEY__ASSISTANT__API_KEY`,
//! `PARLEY__RUN__TIMEOUT_SECS`, ...). String values may reference other
//! environment variables as `${VAR}`; references are expanded recursively
//! after merging.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Source(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParleyConfig {
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub run: RunConfig,
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    pub api_key: String,
    #[serde(default = "default_openai_endpoint")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Existing assistant to chat with; `None` means one must be created first.
    #[serde(default)]
    pub assistant_id: Option<String>,
    #[serde(default = "default_assistant_name")]
    pub name: String,
    #[serde(default)]
    pub instructions: String,
    /// Previously uploaded files to attach to the assistant's file_search store.
    #[serde(default)]
    pub file_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_cancel_grace_secs")]
    pub cancel_grace_secs: u64,
    #[serde(default)]
    pub poll_retry: RetryConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
            cancel_grace_secs: default_cancel_grace_secs(),
            poll_retry: RetryConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    pub api_key: String,
    #[serde(default = "default_proxy_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_proxy_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub emit_stderr: bool,
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            emit_stderr: false,
            filter: default_log_filter(),
            dir: None,
        }
    }
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1/".into()
}
fn default_model() -> String {
    "gpt-4o-2024-11-20".into()
}
fn default_assistant_name() -> String {
    "Q&A AI assistant".into()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_cancel_grace_secs() -> u64 {
    10
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_proxy_endpoint() -> String {
    "https://proxy.scrapeops.io/v1/".into()
}
fn default_proxy_timeout_secs() -> u64 {
    30
}
fn default_log_format() -> String {
    "text".into()
}
fn default_log_filter() -> String {
    "info".into()
}

/// Per-user config file location (`~/.config/parley/parley.yaml` on Linux).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("parley").join("parley.yaml"))
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Reject values that would only fail later, at the first remote call.
fn validate(cfg: &ParleyConfig) -> Result<(), LoadError> {
    let secrets = [
        ("assistant.api_key", cfg.assistant.api_key.as_str()),
        ("proxy.api_key", cfg.proxy.api_key.as_str()),
    ];
    for (key, value) in secrets {
        if value.trim().is_empty() {
            return Err(LoadError::Invalid(format!("{key} is empty")));
        }
        if value.contains("${") {
            return Err(LoadError::Invalid(format!(
                "{key} references an unset environment variable"
            )));
        }
    }
    if cfg.run.poll_interval_ms == 0 {
        return Err(LoadError::Invalid("run.poll_interval_ms must be > 0".into()));
    }
    if cfg.run.timeout_secs == 0 {
        return Err(LoadError::Invalid("run.timeout_secs must be > 0".into()));
    }
    if cfg.run.poll_retry.max_attempts == 0 {
        return Err(LoadError::Invalid(
            "run.poll_retry.max_attempts must be >= 1".into(),
        ));
    }
    Ok(())
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct ParleyConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for ParleyConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ParleyConfigLoader {
    /// Start empty; `PARLEY__` environment overrides are always applied last.
    ///
    /// ```
    /// use parley_config::ParleyConfigLoader;
    ///
    /// let config = ParleyConfigLoader::new()
    ///     .with_yaml_str("assistant:\n  api_key: sk-test\nproxy:\n  api_key: px-test\n")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.assistant.model, "gpt-4o-2024-11-20");
    /// assert_eq!(config.run.timeout_secs, 300);
    /// assert_eq!(config.proxy.timeout_secs, 30);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, so deployments can rely purely on
    /// environment variables.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// ```
    /// use parley_config::ParleyConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOCTEST_PROXY_KEY", "injected-from-env"); }
    ///
    /// let config = ParleyConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// assistant:
    ///   api_key: "sk-doc"
    ///   model: "gpt-4o-mini"
    /// proxy:
    ///   api_key: "${DOCTEST_PROXY_KEY}"
    /// run:
    ///   poll_interval_ms: 250
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.proxy.api_key, "injected-from-env");
    /// assert_eq!(config.run.poll_interval().as_millis(), 250);
    /// assert_eq!(config.proxy.endpoint, "https://proxy.scrapeops.io/v1/");
    ///
    /// unsafe { std::env::remove_var("DOCTEST_PROXY_KEY"); }
    /// ```
    pub fn load(self) -> Result<ParleyConfig, LoadError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("PARLEY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: ParleyConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        validate(&typed)?;

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MINIMAL: &str = "assistant:\n  api_key: sk-a\nproxy:\n  api_key: px-b\n";

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("FILE_A", Some("file-1")), ("FILE_B", Some("file-2"))], || {
            let mut v = json!({ "file_ids": ["${FILE_A}", "$FILE_B"], "n": 3 });
            expand_env_in_value(&mut v);
            assert_eq!(v, json!({ "file_ids": ["file-1", "file-2"], "n": 3 }));
        });
    }

    #[test]
    fn stops_on_cycles() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let cfg = ParleyConfigLoader::new().with_yaml_str(MINIMAL).load().unwrap();
        assert_eq!(cfg.run.poll_interval(), Duration::from_secs(1));
        assert_eq!(cfg.run.timeout(), Duration::from_secs(300));
        assert_eq!(cfg.run.cancel_grace(), Duration::from_secs(10));
        assert_eq!(cfg.run.poll_retry.max_attempts, 3);
        assert_eq!(cfg.proxy.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.logging.format, "text");
        assert!(cfg.assistant.assistant_id.is_none());
        assert!(cfg.assistant.file_ids.is_empty());
    }

    #[test]
    fn rejects_unresolved_secret() {
        let err = ParleyConfigLoader::new()
            .with_yaml_str(
                "assistant:\n  api_key: \"${PARLEY_TEST_SURELY_UNSET}\"\nproxy:\n  api_key: px\n",
            )
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("assistant.api_key"), "{err}");
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let err = ParleyConfigLoader::new()
            .with_yaml_str(MINIMAL)
            .with_yaml_str("run:\n  poll_interval_ms: 0\n")
            .load()
            .unwrap_err();
        assert!(matches!(err, LoadError::Invalid(_)));
    }
}

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use parley_assistant::types::{Assistant, AssistantSpec, Message, Role, Run, Thread, ToolOutput};
use parley_assistant::AssistantApi;
use parley_common::observability::{LogConfig, LogFormat};
use parley_common::{ParleyError, Result};
use parley_tools::{PageSource, ScrapedPage, ToolError};
use serde_json::{json, Value};
use tokio::time::Instant;

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "parley-tests",
            log_dir: Some(std::env::temp_dir().join("parley-tests")),
            emit_stderr: true,
            format: if std::env::var("PARLEY_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug".to_string(),
        };

        parley_common::observability::init_logging(config).unwrap_or_default()
    });
}

/// One scripted run: the JSON bodies returned by create_run then each retrieve.
/// The last body repeats once the script runs out.
pub type Script = Vec<Value>;

pub fn run_json(id: &str, status: &str) -> Value {
    json!({"id": id, "object": "thread.run", "thread_id": "thread_1", "status": status})
}

pub fn requires_tool(id: &str, calls: &[(&str, &str, &str)]) -> Value {
    let tool_calls: Vec<Value> = calls
        .iter()
        .map(|(call_id, name, args)| {
            json!({"id": call_id, "type": "function", "function": {"name": name, "arguments": args}})
        })
        .collect();
    json!({
        "id": id,
        "thread_id": "thread_1",
        "status": "requires_action",
        "required_action": {"type": "submit_tool_outputs", "submit_tool_outputs": {"tool_calls": tool_calls}}
    })
}

pub fn text_message(role: &str, text: &str) -> Message {
    serde_json::from_value(json!({
        "id": "msg_1",
        "role": role,
        "content": [{"type": "text", "text": {"value": text, "annotations": []}}]
    }))
    .unwrap()
}

/// In-memory assistant service driven by per-run scripts.
#[derive(Default)]
pub struct FakeAssistant {
    pending_scripts: Mutex<VecDeque<Script>>,
    runs: Mutex<HashMap<String, VecDeque<Value>>>,
    next_run: AtomicU32,
    pub messages: Mutex<Vec<Message>>,
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub submissions: Mutex<Vec<Vec<ToolOutput>>>,
    /// `(operation, run or thread id, when)` for every call.
    pub calls: Mutex<Vec<(String, String, Instant)>>,
    pub fail_cancel: AtomicBool,
    /// Cancel reports `cancelled` straight away instead of `cancelling`.
    pub cancel_settles: AtomicBool,
    /// Transient errors handed out by retrieve_run before the script resumes.
    pub poll_failures: AtomicUsize,
}

impl FakeAssistant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, script: Script) -> Self {
        self.pending_scripts.lock().unwrap().push_back(script);
        self
    }

    pub fn reply(self, message: Message) -> Self {
        self.messages.lock().unwrap().push(message);
        self
    }

    pub fn calls_to(&self, op: &str) -> Vec<(String, Instant)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _, _)| name == op)
            .map(|(_, id, at)| (id.clone(), *at))
            .collect()
    }

    pub fn ops(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, id, _)| format!("{name} {id}"))
            .collect()
    }

    fn record(&self, op: &str, id: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((op.to_string(), id.to_string(), Instant::now()));
    }

    fn step(&self, run_id: &str) -> Result<Run> {
        let mut runs = self.runs.lock().unwrap();
        let script = runs
            .get_mut(run_id)
            .ok_or_else(|| ParleyError::Service(format!("404 no run {run_id}")))?;
        let body = if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        };
        Ok(serde_json::from_value(body).unwrap())
    }
}

#[async_trait]
impl AssistantApi for FakeAssistant {
    async fn create_thread(&self) -> Result<Thread> {
        self.record("create_thread", "thread_1");
        Ok(Thread {
            id: "thread_1".into(),
        })
    }

    async fn create_message(&self, thread_id: &str, _role: Role, _content: &str) -> Result<Message> {
        self.record("create_message", thread_id);
        Ok(text_message("user", "ok"))
    }

    async fn list_messages(&self, thread_id: &str, limit: u32) -> Result<Vec<Message>> {
        self.record("list_messages", thread_id);
        let messages = self.messages.lock().unwrap();
        Ok(messages.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn create_run(&self, _thread_id: &str, _assistant_id: &str) -> Result<Run> {
        let n = self.next_run.fetch_add(1, Ordering::SeqCst) + 1;
        let run_id = format!("run_{n}");
        self.record("create_run", &run_id);
        let script = self
            .pending_scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![run_json("", "queued")]);
        let script: VecDeque<Value> = script
            .into_iter()
            .map(|mut body| {
                body["id"] = json!(run_id);
                body
            })
            .collect();
        self.runs.lock().unwrap().insert(run_id.clone(), script);
        self.step(&run_id)
    }

    async fn retrieve_run(&self, _thread_id: &str, run_id: &str) -> Result<Run> {
        self.record("retrieve_run", run_id);
        let failures = self.poll_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.poll_failures.store(failures - 1, Ordering::SeqCst);
            return Err(ParleyError::Unavailable("503 Service Unavailable".into()));
        }
        self.step(run_id)
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run> {
        self.record("submit_tool_outputs", run_id);
        self.submissions.lock().unwrap().push(outputs.to_vec());
        self.step(run_id)
    }

    async fn cancel_run(&self, _thread_id: &str, run_id: &str) -> Result<Run> {
        self.record("cancel_run", run_id);
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(ParleyError::Unavailable("connection reset".into()));
        }
        let mut runs = self.runs.lock().unwrap();
        let script = runs
            .get_mut(run_id)
            .ok_or_else(|| ParleyError::Service(format!("404 no run {run_id}")))?;
        *script = VecDeque::from([run_json(run_id, "cancelled")]);
        let status = if self.cancel_settles.load(Ordering::SeqCst) {
            "cancelled"
        } else {
            "cancelling"
        };
        Ok(serde_json::from_value(run_json(run_id, status)).unwrap())
    }

    async fn file_content(&self, file_id: &str) -> Result<Vec<u8>> {
        self.record("file_content", file_id);
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| ParleyError::Service(format!("404 no file {file_id}")))
    }

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant> {
        self.record("create_assistant", &spec.name);
        Ok(Assistant {
            id: "asst_1".into(),
            name: Some(spec.name.clone()),
            model: spec.model.clone(),
        })
    }
}

/// Page source that serves one fixed page and counts calls.
#[derive(Default)]
pub struct FakePages {
    pub scraped: Mutex<Vec<String>>,
}

#[async_trait]
impl PageSource for FakePages {
    async fn scrape(&self, url: &str) -> std::result::Result<Option<ScrapedPage>, ToolError> {
        self.scraped.lock().unwrap().push(url.to_string());
        Ok(Some(ScrapedPage {
            content: "Rust\nA language".into(),
            links: vec!["/learn".into()],
        }))
    }
}

//! One user turn against the assistant service.
//!
//! `respond` appends the user's message, starts a run and follows it through
//! [`RunPhase`] until it completes, fails, or runs out of time. Tool calls the
//! run asks for are executed locally and answered in a single batch. A turn
//! that fails while its run is still live cancels it and keeps it as the
//! session's orphan, which the next turn settles before posting anything.

use std::sync::Arc;
use std::time::Duration;

use parley_assistant::types::{
    AssistantSpec, FunctionSpec, Role, Run, RunStatus, ToolCall, ToolOutput, ToolResources,
    ToolSpec,
};
use parley_assistant::AssistantApi;
use parley_tools::{DispatchError, Tool, ToolDispatcher};
use tokio::time::Instant;

use crate::error::OrchestrationError;
use crate::render::{render, Reply};
use crate::retry::{RetryError, RetryPolicy};
use crate::session::{ChatEntry, ChatSession};
use crate::state::{RunEvent, RunPhase};

/// Timing knobs for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub poll_interval: Duration,
    /// Measured from run creation.
    pub run_timeout: Duration,
    /// How long reconciliation waits for an orphaned run to wind down.
    pub cancel_grace: Duration,
    pub poll_retry: RetryPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            run_timeout: Duration::from_secs(300),
            cancel_grace: Duration::from_secs(10),
            poll_retry: RetryPolicy::default(),
        }
    }
}

pub struct Orchestrator {
    api: Arc<dyn AssistantApi>,
    tools: ToolDispatcher,
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(api: Arc<dyn AssistantApi>, tools: ToolDispatcher, settings: RunSettings) -> Self {
        Self {
            api,
            tools,
            settings,
        }
    }

    pub fn api(&self) -> &Arc<dyn AssistantApi> {
        &self.api
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Send `user_message` on the session's thread and wait for the reply.
    ///
    /// The exchange is recorded in `session.history` either way; on failure the
    /// assistant side of the entry carries the error text.
    pub async fn respond(
        &self,
        session: &mut ChatSession,
        user_message: &str,
    ) -> Result<Reply, OrchestrationError> {
        let result = self.turn(session, user_message).await;

        session.history.push(ChatEntry::user(user_message));
        match &result {
            Ok(reply) => session.history.push(ChatEntry::assistant(reply)),
            Err(err) => {
                tracing::warn!(thread_id = %session.thread_id, error = %err, "respond failed");
                session.history.push(ChatEntry {
                    role: Role::Assistant,
                    text: format!("Error: {err}"),
                    files: Vec::new(),
                    images: Vec::new(),
                });
            }
        }
        result
    }

    async fn turn(
        &self,
        session: &mut ChatSession,
        user_message: &str,
    ) -> Result<Reply, OrchestrationError> {
        self.reconcile(session).await?;

        let thread_id = session.thread_id.clone();
        self.api
            .create_message(&thread_id, Role::User, user_message)
            .await
            .map_err(OrchestrationError::SubmitMessage)?;

        let mut run = self
            .api
            .create_run(&thread_id, &session.assistant_id)
            .await
            .map_err(OrchestrationError::StartRun)?;
        let deadline = Instant::now() + self.settings.run_timeout;
        tracing::info!(thread_id = %thread_id, run_id = %run.id, "run started");

        let result = self.follow(&thread_id, &mut run, deadline).await;
        if result.is_err() && !run.status.is_terminal() {
            self.abandon(session, &run).await;
        }
        result
    }

    /// Drive `run` to a reply. `run` always holds the last status observed.
    async fn follow(
        &self,
        thread_id: &str,
        run: &mut Run,
        deadline: Instant,
    ) -> Result<Reply, OrchestrationError> {
        let mut phase = advance(&run.id, RunPhase::Submitted, RunEvent::RunCreated);
        phase = advance(&run.id, phase, RunEvent::Status(run.status));

        loop {
            match phase {
                RunPhase::Submitted => {
                    phase = advance(&run.id, phase, RunEvent::RunCreated);
                }
                RunPhase::Polling => {
                    tokio::time::sleep(self.settings.poll_interval).await;
                    if Instant::now() >= deadline {
                        phase = advance(&run.id, phase, RunEvent::DeadlineElapsed);
                        continue;
                    }
                    let run_id = run.id.clone();
                    let polled = self
                        .settings
                        .poll_retry
                        .run_until("retrieve_run", deadline, || {
                            self.api.retrieve_run(thread_id, &run_id)
                        })
                        .await;
                    match polled {
                        Ok(next) => {
                            phase = advance(&run.id, phase, RunEvent::Status(next.status));
                            *run = next;
                        }
                        Err(RetryError::Deadline(e)) => {
                            tracing::warn!(run_id = %run.id, error = %e, "no time left to retry poll");
                            phase = advance(&run.id, phase, RunEvent::DeadlineElapsed);
                        }
                        Err(RetryError::Failed(_)) if Instant::now() >= deadline => {
                            phase = advance(&run.id, phase, RunEvent::DeadlineElapsed);
                        }
                        Err(RetryError::Failed(e)) => return Err(OrchestrationError::Poll(e)),
                    }
                }
                RunPhase::AwaitingToolOutput => {
                    if Instant::now() >= deadline {
                        phase = advance(&run.id, phase, RunEvent::DeadlineElapsed);
                        continue;
                    }
                    let outputs = self.run_tools(run.pending_tool_calls()).await?;
                    let submitted = self
                        .api
                        .submit_tool_outputs(thread_id, &run.id, &outputs)
                        .await
                        .map_err(|e| {
                            OrchestrationError::ToolExecution(format!(
                                "submitting tool outputs failed: {e}"
                            ))
                        })?;
                    phase = advance(&run.id, phase, RunEvent::ToolOutputsSubmitted);
                    *run = submitted;
                }
                RunPhase::Completed => return self.final_reply(thread_id).await,
                RunPhase::Failed => return Err(failure(run)),
                RunPhase::TimedOut => {
                    return Err(OrchestrationError::Timeout {
                        run_id: run.id.clone(),
                        waited: self.settings.run_timeout,
                    });
                }
            }
        }
    }

    /// The turn failed with `run` still live: ask once for a cancel and leave
    /// the run as the session's orphan unless it is already over.
    async fn abandon(&self, session: &mut ChatSession, run: &Run) {
        let status = if run.status == RunStatus::Cancelling {
            Some(run.status)
        } else {
            match self.api.cancel_run(&session.thread_id, &run.id).await {
                Ok(cancelled) => Some(cancelled.status),
                Err(e) => {
                    tracing::warn!(run_id = %run.id, error = %e, "cancel of abandoned run failed");
                    None
                }
            }
        };
        if status.is_some_and(RunStatus::is_terminal) {
            return;
        }
        tracing::info!(run_id = %run.id, status = ?status, "run left orphaned");
        session.orphaned_run = Some(run.id.clone());
    }

    /// One output per call, in call order.
    async fn run_tools(&self, calls: &[ToolCall]) -> Result<Vec<ToolOutput>, OrchestrationError> {
        if calls.is_empty() {
            return Err(OrchestrationError::ToolExecution(
                "run requires action but lists no tool calls".into(),
            ));
        }

        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            tracing::info!(call_id = %call.id, tool = %call.function.name, "dispatching tool call");
            let output = match self
                .tools
                .dispatch(&call.function.name, &call.function.arguments)
                .await
            {
                Ok(output) => output,
                Err(e @ DispatchError::ArgumentParse { .. }) => {
                    tracing::warn!(call_id = %call.id, error = %e, "tool arguments rejected");
                    e.to_output()
                }
                Err(e @ DispatchError::UnknownTool(_)) => {
                    return Err(OrchestrationError::ToolExecution(e.to_string()));
                }
            };
            outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }
        Ok(outputs)
    }

    async fn final_reply(&self, thread_id: &str) -> Result<Reply, OrchestrationError> {
        let messages = self
            .api
            .list_messages(thread_id, 1)
            .await
            .map_err(OrchestrationError::FetchReply)?;
        let message = messages
            .into_iter()
            .next()
            .ok_or(OrchestrationError::NoMessage)?;
        if message.role != Role::Assistant {
            return Err(OrchestrationError::UnexpectedRole(message.role));
        }
        Ok(render(self.api.as_ref(), &message).await)
    }

    /// Bring a previously orphaned run to a terminal status before the thread
    /// is used again.
    async fn reconcile(&self, session: &mut ChatSession) -> Result<(), OrchestrationError> {
        let Some(run_id) = session.orphaned_run.clone() else {
            return Ok(());
        };
        let thread_id = session.thread_id.as_str();
        let grace_end = Instant::now() + self.settings.cancel_grace;
        tracing::info!(thread_id, run_id = %run_id, "reconciling orphaned run");

        let mut run = match self.api.retrieve_run(thread_id, &run_id).await {
            Ok(run) => run,
            Err(e) if e.is_transient() => return Err(OrchestrationError::Reconcile(e)),
            Err(e) => {
                // The service does not know the run, so nothing can be active.
                tracing::warn!(run_id = %run_id, error = %e, "orphaned run not retrievable; dropping it");
                session.orphaned_run = None;
                return Ok(());
            }
        };

        if !run.status.is_terminal() && run.status != RunStatus::Cancelling {
            if let Err(e) = self.api.cancel_run(thread_id, &run_id).await {
                tracing::warn!(run_id = %run_id, error = %e, "cancel of orphaned run failed");
            }
        }

        while !run.status.is_terminal() {
            if Instant::now() >= grace_end {
                return Err(OrchestrationError::RunStillActive { run_id });
            }
            tokio::time::sleep(self.settings.poll_interval).await;
            if Instant::now() >= grace_end {
                return Err(OrchestrationError::RunStillActive { run_id });
            }
            run = self
                .api
                .retrieve_run(thread_id, &run_id)
                .await
                .map_err(OrchestrationError::Reconcile)?;
        }

        tracing::info!(run_id = %run_id, status = %run.status, "orphaned run settled");
        session.orphaned_run = None;
        Ok(())
    }
}

fn advance(run_id: &str, phase: RunPhase, event: RunEvent) -> RunPhase {
    let next = phase.on(event);
    if next != phase {
        tracing::debug!(run_id, from = ?phase, to = ?next, event = ?event, "run phase");
    }
    next
}

fn failure(run: &Run) -> OrchestrationError {
    let (code, message) = match &run.last_error {
        Some(err) => (non_empty(&err.code), non_empty(&err.message)),
        None => (
            None,
            run.incomplete_details
                .as_ref()
                .and_then(|d| d.reason.clone()),
        ),
    };
    OrchestrationError::RunFailed {
        status: run.status,
        code,
        message,
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Assistant definition with every local tool plus the hosted
/// `code_interpreter` and `file_search` tools.
pub fn assistant_spec(
    name: &str,
    instructions: &str,
    model: &str,
    file_ids: &[String],
) -> AssistantSpec {
    let mut tools: Vec<ToolSpec> = Tool::ALL
        .into_iter()
        .map(|tool| ToolSpec::Function {
            function: FunctionSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            },
        })
        .collect();
    tools.push(ToolSpec::CodeInterpreter);
    tools.push(ToolSpec::FileSearch);

    AssistantSpec {
        name: name.to_string(),
        instructions: instructions.to_string(),
        model: model.to_string(),
        tools,
        tool_resources: ToolResources::file_search(file_ids),
    }
}

use std::time::Duration;

use parley_assistant::types::{Role, RunStatus};
use parley_common::ParleyError;

/// Why a single `respond` call did not produce a reply.
#[derive(thiserror::Error, Debug)]
pub enum OrchestrationError {
    /// An earlier run could not be confirmed as finished and is still active.
    #[error("previous run {run_id} is still active on this thread; try again shortly")]
    RunStillActive { run_id: String },

    #[error("could not check on previous run: {0}")]
    Reconcile(#[source] ParleyError),

    #[error("could not send your message: {0}")]
    SubmitMessage(#[source] ParleyError),

    #[error("could not start the assistant: {0}")]
    StartRun(#[source] ParleyError),

    #[error("lost track of run progress: {0}")]
    Poll(#[source] ParleyError),

    #[error("assistant did not finish within {}s (run {run_id})", .waited.as_secs())]
    Timeout { run_id: String, waited: Duration },

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("run ended with status {status}{}", describe_failure(.code, .message))]
    RunFailed {
        status: RunStatus,
        code: Option<String>,
        message: Option<String>,
    },

    #[error("expected an assistant message, got one from {0}")]
    UnexpectedRole(Role),

    #[error("run completed without a message")]
    NoMessage,

    #[error("could not fetch the reply: {0}")]
    FetchReply(#[source] ParleyError),
}

fn describe_failure(code: &Option<String>, message: &Option<String>) -> String {
    match (code.as_deref(), message.as_deref()) {
        (Some(code), Some(message)) => format!(" ({code}: {message})"),
        (Some(code), None) => format!(" ({code})"),
        (None, Some(message)) => format!(" ({message})"),
        (None, None) => String::new(),
    }
}

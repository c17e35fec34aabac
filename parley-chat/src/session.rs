use parley_assistant::types::Role;
use parley_assistant::AssistantApi;
use parley_common::Result;

use crate::render::Reply;

/// One turn as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub role: Role,
    pub text: String,
    /// Names of attached files.
    pub files: Vec<String>,
    /// Names of generated images.
    pub images: Vec<String>,
}

impl ChatEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            files: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn assistant(reply: &Reply) -> Self {
        Self {
            role: Role::Assistant,
            text: reply.text.clone(),
            files: reply.files.iter().map(|a| a.name.clone()).collect(),
            images: reply.images.iter().map(|a| a.name.clone()).collect(),
        }
    }
}

/// Per-user conversation context: one thread, one assistant.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub thread_id: String,
    pub assistant_id: String,
    pub history: Vec<ChatEntry>,
    /// A run we stopped waiting on without seeing it finish.
    pub orphaned_run: Option<String>,
}

impl ChatSession {
    /// Open a fresh thread on the service.
    pub async fn start(api: &dyn AssistantApi, assistant_id: impl Into<String>) -> Result<Self> {
        let thread = api.create_thread().await?;
        tracing::info!(thread_id = %thread.id, "chat session started");
        Ok(Self::resume(thread.id, assistant_id))
    }

    /// Attach to an existing thread. History starts empty.
    pub fn resume(thread_id: impl Into<String>, assistant_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            assistant_id: assistant_id.into(),
            history: Vec::new(),
            orphaned_run: None,
        }
    }
}

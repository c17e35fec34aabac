use crate::types::{Assistant, AssistantSpec, Message, Role, Run, Thread, ToolOutput};
use async_trait::async_trait;
use parley_common::Result;

/// Operations Parley needs from the hosted assistant service.
///
/// Every method is a single remote call; none of them retry on their own.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn create_thread(&self) -> Result<Thread>;

    async fn create_message(&self, thread_id: &str, role: Role, content: &str) -> Result<Message>;

    /// Newest messages first.
    async fn list_messages(&self, thread_id: &str, limit: u32) -> Result<Vec<Message>>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// Answer every pending tool call of a `requires_action` run in one batch.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run>;

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    async fn file_content(&self, file_id: &str) -> Result<Vec<u8>>;

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant>;
}

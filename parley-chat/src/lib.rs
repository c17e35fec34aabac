//! Conversation flow on top of the assistant service.
//!
//! - [`Orchestrator::respond`] drives one user turn: append the message,
//!   start a run, poll it, answer tool calls, and render the reply.
//! - [`ChatSession`] is the per-user context (thread, assistant, history).
//! - [`render`] turns the final assistant message into a [`Reply`].
//! - [`RunPhase`] is the explicit run state machine the orchestrator follows.

pub mod error;
pub mod orchestrator;
pub mod render;
pub mod retry;
pub mod session;
pub mod state;

pub use error::OrchestrationError;
pub use orchestrator::{assistant_spec, Orchestrator, RunSettings};
pub use render::{render, Attachment, Reply};
pub use retry::{RetryError, RetryPolicy};
pub use session::{ChatEntry, ChatSession};
pub use state::{RunEvent, RunPhase};

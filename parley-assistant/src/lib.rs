//! Client side of the hosted assistant service.
//!
//! This crate exposes the [`api::AssistantApi`] trait that the run
//! orchestrator drives, the service's wire [`types`], and the OpenAI
//! Assistants v2 implementation in [`openai`].
//!
//! # Examples
//! ```no_run
//! use parley_assistant::{AssistantApi, OpenAiAssistants, OPENAI_API_BASE};
//!
//! # #[tokio::main]
//! # async fn main() -> parley_common::Result<()> {
//! let api = OpenAiAssistants::new("sk-...".into(), OPENAI_API_BASE)?;
//! let thread = api.create_thread().await?;
//! assert!(!thread.id.is_empty());
//! # Ok(())
//! # }
//! ```
pub mod api;
pub mod openai;
pub mod types;

pub use api::AssistantApi;
pub use openai::{OpenAiAssistants, OPENAI_API_BASE};

/// Default model for newly created assistants.
pub const DEFAULT_MODEL: &str = "gpt-4o-2024-11-20";

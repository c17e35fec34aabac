//! The closed set of tools Parley can run for the assistant.

use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    ScrapeContent,
}

/// Arguments of [`Tool::ScrapeContent`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScrapeArgs {
    pub url: String,
}

/// A tool resolved by name together with its decoded arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    ScrapeContent(ScrapeArgs),
}

impl Tool {
    pub const ALL: [Tool; 1] = [Tool::ScrapeContent];

    /// Name the assistant uses in tool calls.
    pub fn name(self) -> &'static str {
        match self {
            Tool::ScrapeContent => "scrape_content",
        }
    }

    pub fn from_name(name: &str) -> Option<Tool> {
        Tool::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            Tool::ScrapeContent => "Use this function to scrape text content from any URL.",
        }
    }

    /// JSON Schema for the argument object, as registered with the assistant.
    pub fn parameters(self) -> Value {
        match self {
            Tool::ScrapeContent => json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "The URL to scrape content from."
                    }
                },
                "required": ["url"]
            }),
        }
    }

    /// Decode the JSON-encoded argument string of a tool call.
    pub fn parse_args(self, args_json: &str) -> Result<ToolInvocation, serde_json::Error> {
        match self {
            Tool::ScrapeContent => serde_json::from_str(args_json).map(ToolInvocation::ScrapeContent),
        }
    }
}

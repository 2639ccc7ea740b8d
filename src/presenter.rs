use serde::Serialize;

use crate::{CiJobsError, Outcome};

/// Tool-call result in the shape agent runtimes expect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<Content>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text { text: String },
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }
}

/// Renders the outcome as indented JSON text in a single content item.
pub fn present(outcome: &Outcome) -> ToolResult {
    // Every field of `Outcome` is plain JSON, so serialization cannot fail.
    let text = serde_json::to_string_pretty(outcome)
        .unwrap_or_else(|err| format!("{{\"error\": \"unable to render outcome: {err}\"}}"));
    ToolResult::text(text)
}

/// Renders a failure as an error result carrying its message.
pub fn present_error(error: &CiJobsError) -> ToolResult {
    ToolResult::error(error.to_string())
}

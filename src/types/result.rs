//! Normalized tool invocation results.

use serde::{Deserialize, Serialize};

/// A typed block of tool output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: serde_json::Value,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Outcome of one tool call as fed back into the conversation.
///
/// Serializes to `{"content": [...]}` or `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolInvocationResult {
    Success { content: Vec<ContentBlock> },
    Failure { error: String },
}

impl ToolInvocationResult {
    pub fn success(content: Vec<ContentBlock>) -> Self {
        Self::Success { content }
    }

    /// A single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Success {
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Wrap a raw JSON result as one pretty-printed text block.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::text(text)
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Concatenated text blocks, or the error description.
    pub fn text_content(&self) -> String {
        match self {
            Self::Success { content } => content
                .iter()
                .filter_map(ContentBlock::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Failure { error } => error.clone(),
        }
    }

    /// JSON payload placed in the tool message.
    pub fn to_payload(&self) -> String {
        match serde_json::to_string(self) {
            Ok(payload) => payload,
            Err(_) => serde_json::json!({ "error": self.text_content() }).to_string(),
        }
    }
}

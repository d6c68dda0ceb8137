//! Chat-completion boundary consumed by the conversation driver.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tools::ToolDescriptor;
use crate::types::ConversationMessage;

pub use openai::OpenAiCompatibleGateway;

/// A tool offered to the model, in function-calling shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl From<&ToolDescriptor> for FunctionSchema {
    fn from(tool: &ToolDescriptor) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema(),
            },
        }
    }
}

/// How the model may pick tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToolChoice {
    Auto,
}

/// One model call.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ConversationMessage>,
    pub tools: Vec<FunctionSchema>,
    pub tool_choice: Option<ToolChoice>,
}

impl CompletionRequest {
    /// Build a request offering `tools`; `tool_choice` is `auto` only when
    /// there is something to choose.
    pub fn new(messages: Vec<ConversationMessage>, tools: Vec<FunctionSchema>) -> Self {
        let tool_choice = (!tools.is_empty()).then_some(ToolChoice::Auto);
        Self {
            messages,
            tools,
            tool_choice,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    /// Always an assistant message.
    pub message: ConversationMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    pub choices: Vec<Choice>,
}

impl CompletionResponse {
    pub fn first(&self) -> Option<&Choice> {
        self.choices.first()
    }
}

/// Opaque chat-completion transport.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Run one completion. Transport and HTTP failures surface as
    /// [`MeshError::Gateway`](crate::error::MeshError::Gateway).
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

//! OpenAI-compatible chat-completions gateway (OpenRouter by default).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::{MeshError, Result};
use crate::types::{ConversationMessage, ToolCallRequest};

use super::{Choice, CompletionRequest, CompletionResponse, ModelGateway};

/// Gateway speaking the `/chat/completions` wire format.
pub struct OpenAiCompatibleGateway {
    config: GatewayConfig,
    api_key: String,
    http: reqwest::Client,
}

impl OpenAiCompatibleGateway {
    /// Fails with a configuration error when no API key is set.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                MeshError::Configuration("OPENROUTER_API_KEY is required".into())
            })?;
        Ok(Self {
            config,
            api_key,
            http: reqwest::Client::new(),
        })
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, val);
        }
        if let Ok(val) = HeaderValue::from_str(&self.config.referer) {
            headers.insert("http-referer", val);
        }
        if let Ok(val) = HeaderValue::from_str(&self.config.title) {
            headers.insert("x-title", val);
        }
        headers
    }

    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> =
            request.messages.iter().map(message_to_wire).collect();

        let mut body = serde_json::Map::new();
        body.insert("model".into(), self.config.model.clone().into());
        body.insert("messages".into(), messages.into());
        body.insert("temperature".into(), self.config.temperature.into());
        body.insert("max_tokens".into(), self.config.max_tokens.into());

        if !request.tools.is_empty() {
            body.insert("tools".into(), serde_json::json!(request.tools));
            if let Some(choice) = request.tool_choice {
                body.insert("tool_choice".into(), choice.to_string().into());
            }
        }

        serde_json::Value::Object(body)
    }
}

#[async_trait]
impl ModelGateway for OpenAiCompatibleGateway {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = self.build_request_body(request);
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "chat completion request"
        );

        let resp = self
            .http
            .post(&url)
            .headers(self.headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| MeshError::Gateway(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status.as_u16(), &body_text));
        }

        let data: WireChatResponse = resp
            .json()
            .await
            .map_err(|e| MeshError::Gateway(format!("malformed response: {e}")))?;

        Ok(CompletionResponse {
            choices: data.choices.into_iter().map(choice_from_wire).collect(),
        })
    }
}

fn status_to_error(status: u16, body: &str) -> MeshError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());
    match status {
        401 | 403 => MeshError::Gateway(format!("authentication failed ({status}): {detail}")),
        429 => MeshError::Gateway(format!("rate limited: {detail}")),
        _ => MeshError::Gateway(format!("HTTP {status}: {detail}")),
    }
}

/// Render a message in wire form. Tool-call arguments travel as JSON text.
fn message_to_wire(msg: &ConversationMessage) -> serde_json::Value {
    match msg {
        ConversationMessage::Assistant {
            content,
            tool_calls,
        } if !tool_calls.is_empty() => {
            let calls: Vec<serde_json::Value> = tool_calls
                .iter()
                .map(|tc| {
                    let arguments = match &tc.arguments {
                        serde_json::Value::String(raw) => raw.clone(),
                        other => other.to_string(),
                    };
                    serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": arguments,
                        }
                    })
                })
                .collect();
            serde_json::json!({
                "role": "assistant",
                "content": content,
                "tool_calls": calls,
            })
        }
        ConversationMessage::Tool {
            tool_call_id,
            content,
        } => serde_json::json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content,
        }),
        other => serde_json::json!({
            "role": other.role().to_string(),
            "content": other.text(),
        }),
    }
}

fn choice_from_wire(choice: WireChoice) -> Choice {
    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let arguments = if tc.function.arguments.trim().is_empty() {
                serde_json::Value::Object(serde_json::Map::new())
            } else {
                serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::String(tc.function.arguments))
            };
            ToolCallRequest::new(tc.id, tc.function.name, arguments)
        })
        .collect();

    Choice {
        message: ConversationMessage::assistant_with_tool_calls(choice.message.content, tool_calls),
        finish_reason: choice.finish_reason,
    }
}

// Wire response types (internal)

#[derive(Deserialize)]
struct WireChatResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

//! Shared test helpers: a scripted model gateway and REST backend fixtures.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use toolmesh::config::BackendConfig;
use toolmesh::error::{MeshError, Result};
use toolmesh::gateway::{Choice, CompletionRequest, CompletionResponse, ModelGateway};
use toolmesh::types::{ConversationMessage, ToolCallRequest};

/// A gateway that replays queued replies and records every request.
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<CompletionResponse>>>,
    fallback: Option<CompletionResponse>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Reply with `response` whenever the queue is empty.
    pub fn repeating(response: CompletionResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::new()
        }
    }

    pub fn queue_text(&self, text: &str) -> &Self {
        self.queue(Ok(reply(ConversationMessage::assistant(text))))
    }

    pub fn queue_tool_calls(&self, calls: Vec<ToolCallRequest>) -> &Self {
        self.queue(Ok(tool_call_reply(calls)))
    }

    pub fn queue(&self, response: Result<CompletionResponse>) -> &Self {
        self.replies.lock().unwrap().push_back(response);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn model(&self) -> &str {
        "scripted/test"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(reply) => reply,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| MeshError::Gateway("script exhausted".into())),
        }
    }
}

pub fn reply(message: ConversationMessage) -> CompletionResponse {
    CompletionResponse {
        choices: vec![Choice {
            message,
            finish_reason: None,
        }],
    }
}

pub fn tool_call_reply(calls: Vec<ToolCallRequest>) -> CompletionResponse {
    reply(ConversationMessage::assistant_with_tool_calls(None, calls))
}

pub fn call(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, arguments)
}

/// Catalog entry for a REST tool.
pub fn rest_tool(name: &str, http_method: &str, endpoint: &str, params: Value) -> Value {
    json!({
        "name": name,
        "description": format!("{name} tool"),
        "endpoint": endpoint,
        "method": http_method,
        "parameters": params,
    })
}

/// Start a REST tool server answering `/health` and `/tools`.
pub async fn rest_backend(tools: Vec<Value>) -> MockServer {
    let server = MockServer::start().await;
    let names: Vec<Value> = tools.iter().map(|t| t["name"].clone()).collect();

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "healthy",
            "service": "test-tools",
            "version": "1.0.0",
            "available_tools": names,
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/tools"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tools": tools })))
        .mount(&server)
        .await;

    server
}

/// Start a REST tool server whose health probe fails.
pub async fn unhealthy_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    server
}

pub fn rest_config(name: &str, server: &MockServer) -> BackendConfig {
    BackendConfig::rest(name, server.uri())
}

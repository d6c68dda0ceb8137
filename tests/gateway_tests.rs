mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use toolmesh::client::ToolMeshClient;
use toolmesh::config::{GatewayConfig, MeshConfig};
use toolmesh::driver::Termination;
use toolmesh::error::MeshError;
use toolmesh::gateway::{CompletionRequest, ModelGateway, OpenAiCompatibleGateway};
use toolmesh::types::ConversationMessage;

use common::{rest_backend, rest_config, rest_tool};

fn gateway_config(server: &MockServer) -> GatewayConfig {
    GatewayConfig {
        api_key: Some("or-test".into()),
        base_url: server.uri(),
        model: "test/model".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn sends_attribution_headers_and_parses_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer or-test"))
        .and(header("http-referer", "http://localhost:3000"))
        .and(header("x-title", "MCP Client"))
        .and(body_partial_json(json!({
            "model": "test/model",
            "temperature": 0.7,
            "max_tokens": 4000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "gen-1",
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "search", "arguments": "{\"q\":\"abc\"}"}
                    }]
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = OpenAiCompatibleGateway::new(gateway_config(&server)).unwrap();
    let response = gateway
        .complete(&CompletionRequest::new(
            vec![ConversationMessage::user("find abc")],
            Vec::new(),
        ))
        .await
        .unwrap();

    let choice = response.first().unwrap();
    assert_eq!(choice.finish_reason.as_deref(), Some("tool_calls"));
    let calls = choice.message.tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "search");
    assert_eq!(calls[0].arguments, json!({"q": "abc"}));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("tools").is_none());
    assert!(body.get("tool_choice").is_none());
}

#[tokio::test]
async fn http_failure_is_a_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})),
        )
        .mount(&server)
        .await;

    let gateway = OpenAiCompatibleGateway::new(gateway_config(&server)).unwrap();
    let err = gateway
        .complete(&CompletionRequest::new(vec![ConversationMessage::user("hi")], Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, MeshError::Gateway(msg) if msg.contains("bad key")));
}

#[tokio::test]
async fn empty_choices_parse_to_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let gateway = OpenAiCompatibleGateway::new(gateway_config(&server)).unwrap();
    let response = gateway
        .complete(&CompletionRequest::new(vec![ConversationMessage::user("hi")], Vec::new()))
        .await
        .unwrap();
    assert!(response.first().is_none());
}

#[tokio::test]
async fn client_runs_a_full_tool_round_trip() {
    let tools = rest_backend(vec![rest_tool(
        "search",
        "GET",
        "/tools/search",
        json!([{"name": "q", "type": "string", "description": "query", "required": true}]),
    )])
    .await;
    Mock::given(method("GET"))
        .and(path("/tools/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": ["doc-1"]})))
        .expect(1)
        .mount(&tools)
        .await;

    let model = MockServer::start().await;
    // Second turn: the tool result is in the conversation, so answer.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"messages": [{}, {}, {}, {"role": "tool", "tool_call_id": "call_1"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Found doc-1."}}]
        })))
        .with_priority(1)
        .mount(&model)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"tool_choice": "auto"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "search", "arguments": "{\"q\":\"abc\"}"}
                }]
            }}]
        })))
        .with_priority(2)
        .mount(&model)
        .await;

    let config = MeshConfig {
        backends: vec![rest_config("docs", &tools)],
        gateway: gateway_config(&model),
        ..Default::default()
    };
    let mut client = ToolMeshClient::new(config).unwrap();
    assert_eq!(client.initialize().await, 1);
    assert!(client.system_prompt().contains("- search: search tool"));

    let outcome = client.process_query("find abc").await.unwrap();
    assert_eq!(outcome.answer, "Found doc-1.");
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.termination, Termination::Completed);
    assert_eq!(outcome.conversation.len(), 5);

    let first_request: serde_json::Value =
        serde_json::from_slice(&model.received_requests().await.unwrap()[0].body).unwrap();
    assert_eq!(first_request["tools"][0]["function"]["name"], "search");
    assert_eq!(
        first_request["tools"][0]["function"]["parameters"]["required"],
        json!(["q"])
    );

    client.close().await;
    client.close().await;
    assert_eq!(client.tool_count(), 0);
}

#[tokio::test]
async fn shared_gateway_handle_works_with_client() {
    let gateway = Arc::new(common::ScriptedGateway::new());
    gateway.queue_text("hello there");
    let client = ToolMeshClient::with_gateway(MeshConfig::default(), gateway.clone());
    let outcome = client.process_query("hi").await.unwrap();
    assert_eq!(outcome.answer, "hello there");
    let request = &gateway.requests()[0];
    assert!(request.tools.is_empty());
    assert_eq!(request.tool_choice, None);
}

#![cfg(feature = "native")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::time::timeout;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use toolmesh::backend::{ConnectionState, NativeProtocolClient, ToolBackend};
use toolmesh::config::{BackendConfig, BackendKind, MeshConfig};
use toolmesh::connection::BackendConnectionManager;
use toolmesh::driver::ConversationDriver;
use toolmesh::tools::{InvocationSpec, ToolArguments};
use toolmesh::types::{ConversationMessage, Role};

use common::{call, rest_backend, rest_config, rest_tool, ScriptedGateway};

fn weather_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": { "city": { "type": "string" } },
        "required": ["city"]
    })
}

/// JSON-RPC handler for a streamable-HTTP tool server. `tools/call` echoes
/// the arguments; a tool named `explode` answers with `isError`.
fn tool_server_handler(
    server_name: &'static str,
    tools: &'static [(&'static str, &'static str)],
) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync {
    move |request: &Request| {
        let body: serde_json::Value = request.body_json().unwrap_or_else(|_| json!({}));
        let rpc_method = body.get("method").and_then(|v| v.as_str()).unwrap_or_default();
        let id = body.get("id").cloned().unwrap_or_else(|| json!(1));

        match rpc_method {
            "initialize" => ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2025-03-26",
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": { "name": server_name, "version": "0.1.0" }
                }
            })),
            "tools/list" => {
                let listed: Vec<_> = tools
                    .iter()
                    .map(|(name, description)| {
                        json!({
                            "name": name,
                            "description": description,
                            "inputSchema": weather_schema()
                        })
                    })
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": { "tools": listed, "nextCursor": null }
                }))
            }
            "tools/call" => {
                let params = body.get("params").cloned().unwrap_or_else(|| json!({}));
                let name = params.get("name").and_then(|v| v.as_str()).unwrap_or_default();
                let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
                let result = if name == "explode" {
                    json!({
                        "content": [{ "type": "text", "text": "station offline" }],
                        "isError": true
                    })
                } else {
                    json!({
                        "content": [{ "type": "text", "text": format!("args={arguments}") }],
                        "isError": false
                    })
                };
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": result
                }))
            }
            "notifications/initialized" => ResponseTemplate::new(202),
            _ => ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": null
            })),
        }
    }
}

async fn tool_server(
    server_name: &'static str,
    tools: &'static [(&'static str, &'static str)],
) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(tool_server_handler(server_name, tools))
        .mount(&server)
        .await;
    server
}

fn native_config(name: &str, server: &MockServer) -> BackendConfig {
    BackendConfig::native(name, format!("{}/mcp", server.uri()))
}

async fn tool_calls(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter_map(|r| r.body_json::<serde_json::Value>().ok())
        .filter(|body| body["method"] == "tools/call")
        .collect()
}

#[tokio::test]
async fn client_connects_and_discovers_tools() {
    let server = tool_server("weather", &[("forecast", "Forecast for a city")]).await;
    let mut client = NativeProtocolClient::new("weather", format!("{}/mcp", server.uri()));

    timeout(Duration::from_secs(5), client.initialize())
        .await
        .expect("initialize should finish")
        .expect("initialize");
    assert_eq!(client.state(), ConnectionState::Connected);

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "forecast");
    assert_eq!(tools[0].backend, "weather");
    assert_eq!(tools[0].description, "Forecast for a city");
    assert_eq!(tools[0].invocation, InvocationSpec::Native);
    assert_eq!(tools[0].input_schema(), weather_schema());

    let result = client
        .call_tool("forecast", &ToolArguments::new(json!({"city": "nyc"})))
        .await
        .unwrap();
    assert_eq!(result.text_content(), r#"args={"city":"nyc"}"#);

    client.close().await.unwrap();
    client.close().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn driver_dispatches_calls_to_native_backend() {
    let server = tool_server(
        "weather",
        &[("forecast", "Forecast for a city"), ("explode", "Always fails")],
    )
    .await;
    let config = MeshConfig {
        backends: vec![native_config("weather", &server)],
        ..Default::default()
    };
    let mut manager = BackendConnectionManager::new(Arc::new(config));
    assert_eq!(manager.connect_all().await, 1);
    assert_eq!(manager.tool_count(), 2);
    let connection = manager.registry().resolve_backend("forecast").unwrap();
    assert_eq!(connection.kind(), BackendKind::NativeProtocol);

    let gateway = ScriptedGateway::new();
    gateway
        .queue_tool_calls(vec![
            call("c1", "forecast", json!({"city": "nyc"})),
            call("c2", "explode", json!({"city": "nyc"})),
        ])
        .queue_text("Sunny in NYC.");

    let outcome = ConversationDriver::new(manager.registry(), &gateway)
        .run(vec![ConversationMessage::user("weather in nyc?")])
        .await
        .expect("conversation");
    assert_eq!(outcome.answer, "Sunny in NYC.");

    let tool_messages: Vec<&ConversationMessage> = outcome
        .conversation
        .iter()
        .filter(|m| m.role() == Role::Tool)
        .collect();
    assert_eq!(tool_messages.len(), 2);

    let ok: serde_json::Value = serde_json::from_str(tool_messages[0].text().unwrap()).unwrap();
    assert_eq!(
        ok,
        json!({"content": [{"type": "text", "text": r#"args={"city":"nyc"}"#}]})
    );
    let failed: serde_json::Value =
        serde_json::from_str(tool_messages[1].text().unwrap()).unwrap();
    assert!(failed["error"].as_str().unwrap().contains("station offline"));

    let calls = tool_calls(&server).await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0]["params"]["name"], "forecast");
    assert_eq!(calls[0]["params"]["arguments"], json!({"city": "nyc"}));

    manager.close().await;
    assert_eq!(manager.connected_count(), 0);
}

#[tokio::test]
async fn rest_and_native_backends_share_one_registry() {
    let native = tool_server("weather", &[("forecast", "Forecast for a city")]).await;
    let rest = rest_backend(vec![rest_tool("search", "GET", "/search", json!([]))]).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": 1})))
        .mount(&rest)
        .await;

    let config = MeshConfig {
        backends: vec![rest_config("docs", &rest), native_config("weather", &native)],
        ..Default::default()
    };
    let mut manager = BackendConnectionManager::new(Arc::new(config));
    assert_eq!(manager.connect_all().await, 2);

    let names: Vec<&str> = manager.registry().all().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["search", "forecast"]);
    assert_eq!(
        manager.registry().resolve_backend("search").unwrap().kind(),
        BackendKind::RestAdapter
    );
    assert_eq!(
        manager.registry().resolve_backend("forecast").unwrap().kind(),
        BackendKind::NativeProtocol
    );

    let gateway = ScriptedGateway::new();
    gateway
        .queue_tool_calls(vec![
            call("s", "search", json!({})),
            call("f", "forecast", json!({"city": "sf"})),
        ])
        .queue_text("done");
    let outcome = ConversationDriver::new(manager.registry(), &gateway)
        .run(vec![ConversationMessage::user("both please")])
        .await
        .unwrap();

    let texts: Vec<&str> = outcome
        .conversation
        .iter()
        .filter(|m| m.role() == Role::Tool)
        .filter_map(|m| m.text())
        .collect();
    assert!(texts[0].contains("hits"));
    assert!(texts[1].contains(r#"args={\"city\":\"sf\"}"#));

    manager.close().await;
}

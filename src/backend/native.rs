//! Native tool-protocol client over streamable HTTP.

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, CallToolResult, ClientInfo, Content, ResourceContents},
    service::{ClientInitializeError, DynService, RoleClient, RunningService, ServiceError, ServiceExt},
    transport::StreamableHttpClientTransport,
};
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::error::{MeshError, Result};
use crate::tools::{InvocationSpec, ParameterSchema, ToolArguments, ToolDescriptor};
use crate::types::{ContentBlock, ToolInvocationResult};

use super::{ConnectionState, ToolBackend};

type DynClientService = Box<dyn DynService<RoleClient>>;
type Session = RunningService<RoleClient, DynClientService>;

/// Client for a server speaking the tool protocol natively.
pub struct NativeProtocolClient {
    name: String,
    url: String,
    session: Option<Session>,
    state: ConnectionState,
    tools: Vec<ToolDescriptor>,
}

impl NativeProtocolClient {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            session: None,
            state: ConnectionState::Disconnected,
            tools: Vec::new(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        if config.api_key.is_some() {
            warn!(
                backend = %config.name,
                "native backends do not send api_key; embed credentials in the URL"
            );
        }
        Self::new(config.name.clone(), config.base_url.clone())
    }

    async fn connect(&mut self) -> Result<()> {
        info!(backend = %self.name, url = %self.url, "connecting to native tool server");
        let transport = StreamableHttpClientTransport::from_uri(self.url.clone());
        let session = ClientInfo::default()
            .into_dyn()
            .serve(transport)
            .await
            .map_err(|e| map_initialize_error(&self.name, e))?;
        self.session = Some(session);
        Ok(())
    }

    async fn fetch_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        let name = self.name.clone();
        let session = self.session_mut()?;

        let tools = match session.list_all_tools().await {
            Ok(tools) => tools,
            Err(ServiceError::UnexpectedResponse) => {
                session
                    .list_tools(None)
                    .await
                    .map_err(|e| map_service_error(&name, "list_tools", e))?
                    .tools
            }
            Err(e) => return Err(map_service_error(&name, "list_tools", e)),
        };

        Ok(tools
            .into_iter()
            .map(|tool| {
                ToolDescriptor::new(
                    tool.name.to_string(),
                    tool.description.map(|d| d.to_string()).unwrap_or_default(),
                    InvocationSpec::Native,
                    ParameterSchema::JsonSchema(serde_json::Value::Object(
                        (*tool.input_schema).clone(),
                    )),
                )
                .with_backend(name.as_str())
            })
            .collect())
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        if self.state == ConnectionState::Closed {
            return Err(MeshError::NotConnected(format!(
                "native tool server '{}' is closed",
                self.name
            )));
        }
        let name = &self.name;
        self.session.as_mut().ok_or_else(|| {
            MeshError::NotConnected(format!("native tool server '{name}' is not connected"))
        })
    }
}

#[async_trait]
impl ToolBackend for NativeProtocolClient {
    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn initialize(&mut self) -> Result<()> {
        self.state = ConnectionState::Disconnected;
        self.connect().await?;
        match self.fetch_tools().await {
            Ok(tools) => self.tools = tools,
            Err(e) => {
                warn!(backend = %self.name, error = %e, "tool discovery failed");
                self.tools.clear();
            }
        }
        self.state = ConnectionState::Connected;
        info!(backend = %self.name, tools = self.tools.len(), "discovered tools");
        Ok(())
    }

    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        self.session_mut()?;
        Ok(self.tools.clone())
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<ToolInvocationResult> {
        let backend = self.name.clone();
        let arguments = arguments.to_object()?;
        let session = self.session_mut()?;
        debug!(backend = %backend, tool = %name, "calling native tool");

        let result = session
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments: Some(arguments),
                task: None,
            })
            .await
            .map_err(|e| map_service_error(&backend, "call_tool", e))?;

        map_call_result(name, result)
    }

    async fn close(&mut self) -> Result<()> {
        self.state = ConnectionState::Closed;
        self.tools.clear();
        if let Some(session) = self.session.take() {
            debug!(backend = %self.name, "closing native tool session");
            session.cancel().await.map_err(|e| {
                MeshError::connection(&self.name, format!("session shutdown failed: {e}"))
            })?;
        }
        Ok(())
    }
}

fn content_to_block(item: &Content) -> Option<ContentBlock> {
    if let Some(text) = item.as_text() {
        return Some(ContentBlock::text(text.text.clone()));
    }
    if let Some(resource) = item.as_resource() {
        if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
            return Some(ContentBlock::text(text.clone()));
        }
    }
    serde_json::to_value(item)
        .ok()
        .map(|resource| ContentBlock::Resource { resource })
}

fn map_call_result(name: &str, result: CallToolResult) -> Result<ToolInvocationResult> {
    let blocks: Vec<ContentBlock> = result.content.iter().filter_map(content_to_block).collect();

    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or_else(|| {
                let text: Vec<&str> = blocks.iter().filter_map(ContentBlock::as_text).collect();
                (!text.is_empty()).then(|| text.join("\n"))
            })
            .unwrap_or_else(|| "tool returned an error result".into());
        return Err(MeshError::tool(name, message));
    }

    if blocks.is_empty() {
        if let Some(structured) = result.structured_content {
            return Ok(ToolInvocationResult::from_json(&structured));
        }
    }
    Ok(ToolInvocationResult::success(blocks))
}

fn map_initialize_error(backend: &str, error: ClientInitializeError) -> MeshError {
    let message = match error {
        ClientInitializeError::ConnectionClosed(context) => {
            format!("connection closed during initialize: {context}")
        }
        ClientInitializeError::TransportError { error, context } => {
            format!("transport error ({context}): {error}")
        }
        ClientInitializeError::JsonRpcError(error) => {
            format!("JSON-RPC error {}: {}", error.code.0, error.message)
        }
        ClientInitializeError::Cancelled => "initialize cancelled".to_string(),
        other => format!("initialize error: {other}"),
    };
    MeshError::connection(backend, message)
}

fn map_service_error(backend: &str, context: &str, error: ServiceError) -> MeshError {
    match error {
        ServiceError::Timeout { timeout } => MeshError::Timeout(timeout.as_millis() as u64),
        ServiceError::McpError(error) => MeshError::connection(
            backend,
            format!("{context}: error {}: {}", error.code.0, error.message),
        ),
        ServiceError::TransportClosed => {
            MeshError::connection(backend, format!("{context}: transport closed"))
        }
        ServiceError::TransportSend(error) => {
            MeshError::connection(backend, format!("{context}: transport send failed: {error}"))
        }
        other => MeshError::connection(backend, format!("{context}: {other}")),
    }
}

//! REST tool adapter.
//!
//! Presents a REST server that publishes `GET /health`, `GET /tools` and one
//! endpoint per tool as a [`ToolBackend`], indistinguishable from a native
//! protocol client as far as the registry is concerned.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::error::{MeshError, Result};
use crate::tools::{
    convert_parameters, HttpMethod, InvocationSpec, RawParameter, ToolArguments, ToolDescriptor,
};
use crate::types::ToolInvocationResult;

use super::{ConnectionState, ToolBackend};

const HEALTH_PATH: &str = "/health";
const TOOLS_PATH: &str = "/tools";

/// Body of `GET /health`. Every field is optional; servers vary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub available_tools: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    parameters: Option<Vec<RawParameter>>,
}

/// Adapter for one REST tool server.
pub struct RestToolAdapter {
    name: String,
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
    state: ConnectionState,
    tools: Vec<ToolDescriptor>,
    health: Option<HealthStatus>,
}

impl RestToolAdapter {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http: reqwest::Client::new(),
            state: ConnectionState::Disconnected,
            tools: Vec::new(),
            health: None,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(
            config.name.clone(),
            config.normalized_base_url(),
            config.api_key.clone(),
        )
    }

    /// Use a caller-supplied HTTP client (timeouts, proxies, pooling).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Health report from the last successful probe.
    pub fn health(&self) -> Option<&HealthStatus> {
        self.health.as_ref()
    }

    /// Headers sent on every request. The credential goes out both as
    /// `X-API-Key` and as a bearer token; servers accept either.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = self.api_key.as_deref() {
            if let Ok(val) = HeaderValue::from_str(key) {
                headers.insert("x-api-key", val);
            }
            if let Ok(val) = HeaderValue::from_str(&format!("Bearer {key}")) {
                headers.insert(AUTHORIZATION, val);
            }
        }
        headers
    }

    /// Probe `/health`, then discover tools.
    ///
    /// On failure the adapter is left disconnected with no tools.
    pub async fn initialize(&mut self) -> Result<()> {
        info!(backend = %self.name, url = %self.base_url, "connecting to REST tool server");
        self.state = ConnectionState::Disconnected;
        self.tools.clear();
        self.health = None;

        let url = format!("{}{HEALTH_PATH}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| MeshError::connection(&self.name, format!("health check failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MeshError::connection(
                &self.name,
                format!("health check failed: {}", status.as_u16()),
            ));
        }

        let body = resp.text().await.unwrap_or_default();
        self.health = serde_json::from_str::<HealthStatus>(&body).ok();
        debug!(backend = %self.name, health = ?self.health, "REST tool server is healthy");

        self.tools = self.discover_tools().await;
        self.state = ConnectionState::Connected;
        info!(backend = %self.name, tools = self.tools.len(), "discovered tools");
        Ok(())
    }

    /// Fetch the tool catalog. Any failure yields an empty tool set.
    pub async fn discover_tools(&self) -> Vec<ToolDescriptor> {
        let url = format!("{}{TOOLS_PATH}", self.base_url);
        let resp = match self.http.get(&url).headers(self.headers()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(backend = %self.name, error = %e, "tool discovery request failed");
                return Vec::new();
            }
        };

        if !resp.status().is_success() {
            warn!(
                backend = %self.name,
                status = resp.status().as_u16(),
                "tool discovery failed"
            );
            return Vec::new();
        }

        match resp.json::<serde_json::Value>().await {
            Ok(body) => parse_catalog(&self.name, &body),
            Err(e) => {
                warn!(backend = %self.name, error = %e, "tool catalog is not valid JSON");
                Vec::new()
            }
        }
    }

    /// Current tool set.
    pub fn list_tools(&self) -> Result<&[ToolDescriptor]> {
        self.ensure_connected()?;
        Ok(&self.tools)
    }

    /// Invoke one tool.
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments: &ToolArguments,
    ) -> Result<ToolInvocationResult> {
        self.ensure_connected()?;

        let tool = self
            .tools
            .iter()
            .find(|t| t.upstream_name == tool_name)
            .ok_or_else(|| MeshError::UnknownTool(tool_name.to_string()))?;

        let (method, endpoint) = match &tool.invocation {
            InvocationSpec::Http { method, endpoint } => (*method, endpoint.as_str()),
            InvocationSpec::Native => {
                return Err(MeshError::tool(
                    tool_name,
                    "descriptor has no HTTP invocation",
                ))
            }
        };

        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self
            .http
            .request(method.as_reqwest(), &url)
            .headers(self.headers());

        if method.sends_body() {
            request = request.json(&serde_json::Value::Object(arguments.to_object()?));
        } else {
            let pairs = arguments.query_pairs()?;
            if !pairs.is_empty() {
                request = request.query(&pairs);
            }
        }

        debug!(backend = %self.name, tool = %tool_name, %method, url = %url, "calling REST tool");

        let resp = request
            .send()
            .await
            .map_err(|e| MeshError::tool(tool_name, format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let reason = status.canonical_reason().unwrap_or("");
            return Err(MeshError::tool_status(
                tool_name,
                status.as_u16(),
                format!("{reason} - {body}").trim().to_string(),
            ));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| MeshError::tool(tool_name, format!("failed to read response body: {e}")))?;
        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            MeshError::tool_status(
                tool_name,
                status.as_u16(),
                format!("invalid JSON response: {e}"),
            )
        })?;
        Ok(ToolInvocationResult::from_json(&value))
    }

    /// Drop connection state and tools.
    pub fn close(&mut self) {
        if self.state != ConnectionState::Closed {
            debug!(backend = %self.name, "disconnecting from REST tool server");
        }
        self.state = ConnectionState::Closed;
        self.tools.clear();
    }

    fn ensure_connected(&self) -> Result<()> {
        match self.state {
            ConnectionState::Connected => Ok(()),
            _ => Err(MeshError::NotConnected(format!(
                "REST tool server '{}' is not connected",
                self.name
            ))),
        }
    }
}

/// Build descriptors from a `/tools` body. Entries that cannot be invoked are
/// skipped; a missing `tools` array yields nothing.
fn parse_catalog(backend: &str, body: &serde_json::Value) -> Vec<ToolDescriptor> {
    let Some(entries) = body.get("tools").and_then(|t| t.as_array()) else {
        warn!(backend = %backend, "no tools found in catalog response");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|raw| {
            let entry: CatalogEntry = match serde_json::from_value(raw.clone()) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(backend = %backend, error = %e, "skipping malformed tool entry");
                    return None;
                }
            };
            let Some(endpoint) = entry.endpoint.filter(|e| !e.is_empty()) else {
                warn!(backend = %backend, tool = %entry.name, "skipping tool without endpoint");
                return None;
            };
            let method = match entry.method.as_deref() {
                None | Some("") => HttpMethod::Get,
                Some(raw) => match raw.parse::<HttpMethod>() {
                    Ok(method) => method,
                    Err(_) => {
                        warn!(backend = %backend, tool = %entry.name, method = %raw, "skipping tool with unsupported method");
                        return None;
                    }
                },
            };
            let parameters = convert_parameters(&entry.parameters.unwrap_or_default());

            Some(
                ToolDescriptor::new(
                    entry.name,
                    entry.description.unwrap_or_default(),
                    InvocationSpec::Http { method, endpoint },
                    parameters,
                )
                .with_backend(backend),
            )
        })
        .collect()
}

#[async_trait]
impl ToolBackend for RestToolAdapter {
    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn initialize(&mut self) -> Result<()> {
        RestToolAdapter::initialize(self).await
    }

    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        RestToolAdapter::list_tools(self).map(<[ToolDescriptor]>::to_vec)
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<ToolInvocationResult> {
        RestToolAdapter::invoke(self, name, arguments).await
    }

    async fn close(&mut self) -> Result<()> {
        RestToolAdapter::close(self);
        Ok(())
    }
}

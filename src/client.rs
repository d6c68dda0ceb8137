//! High-level client: connect backends, answer queries, tear down.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::MeshConfig;
use crate::connection::{BackendConnectionManager, BackendFactory};
use crate::driver::{ConversationDriver, ConversationOutcome};
use crate::error::Result;
use crate::gateway::{ModelGateway, OpenAiCompatibleGateway};
use crate::registry::ToolRegistry;
use crate::types::ConversationMessage;

const SYSTEM_PREAMBLE: &str =
    "You are an AI assistant with access to MCP (Model Context Protocol) tools.";

/// Owns the backend connections and the model gateway.
pub struct ToolMeshClient {
    config: Arc<MeshConfig>,
    manager: BackendConnectionManager,
    gateway: Arc<dyn ModelGateway>,
    instructions: Option<String>,
}

impl ToolMeshClient {
    /// Build with the OpenAI-compatible gateway described by `config.gateway`.
    pub fn new(config: MeshConfig) -> Result<Self> {
        config.validate()?;
        let gateway = OpenAiCompatibleGateway::new(config.gateway.clone())?;
        Ok(Self::with_gateway(config, Arc::new(gateway)))
    }

    pub fn with_gateway(config: MeshConfig, gateway: Arc<dyn ModelGateway>) -> Self {
        let config = Arc::new(config);
        Self {
            manager: BackendConnectionManager::new(Arc::clone(&config)),
            config,
            gateway,
            instructions: None,
        }
    }

    /// Swap the backend factory. Only meaningful before `initialize`.
    pub fn with_backend_factory(mut self, factory: Box<dyn BackendFactory>) -> Self {
        self.manager = BackendConnectionManager::with_factory(Arc::clone(&self.config), factory);
        self
    }

    /// Extra text appended to the generated system prompt.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.manager.registry()
    }

    pub fn connected_count(&self) -> usize {
        self.manager.connected_count()
    }

    pub fn tool_count(&self) -> usize {
        self.manager.tool_count()
    }

    /// Connect every enabled backend. Returns the number that connected.
    pub async fn initialize(&mut self) -> usize {
        let connected = self.manager.connect_all().await;
        info!(
            backends = connected,
            tools = self.manager.tool_count(),
            "client ready"
        );
        connected
    }

    /// System prompt listing every registered tool.
    pub fn system_prompt(&self) -> String {
        let tools: Vec<String> = self
            .registry()
            .all()
            .iter()
            .map(|tool| format!("- {}: {}", tool.name, tool.description))
            .collect();

        let mut prompt = format!("{SYSTEM_PREAMBLE}\n\nAvailable tools:\n{}", tools.join("\n"));
        if let Some(extra) = self.instructions.as_deref().filter(|s| !s.trim().is_empty()) {
            prompt.push_str("\n\n");
            prompt.push_str(extra.trim());
        }
        prompt
    }

    /// Answer a single user query.
    pub async fn process_query(&self, query: &str) -> Result<ConversationOutcome> {
        self.process_query_with_cancel(query, &CancellationToken::new())
            .await
    }

    pub async fn process_query_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<ConversationOutcome> {
        info!(query = %query, "processing user query");
        let messages = vec![
            ConversationMessage::system(self.system_prompt()),
            ConversationMessage::user(query),
        ];
        self.chat_loop_with_cancel(messages, cancel).await
    }

    /// Continue an existing conversation.
    pub async fn chat_loop(&self, messages: Vec<ConversationMessage>) -> Result<ConversationOutcome> {
        self.chat_loop_with_cancel(messages, &CancellationToken::new())
            .await
    }

    pub async fn chat_loop_with_cancel(
        &self,
        messages: Vec<ConversationMessage>,
        cancel: &CancellationToken,
    ) -> Result<ConversationOutcome> {
        ConversationDriver::with_settings(
            self.manager.registry(),
            self.gateway.as_ref(),
            self.config.driver.clone(),
        )
        .run_with_cancel(messages, cancel)
        .await
    }

    /// Close every backend and clear the registry. Safe to call twice.
    pub async fn close(&mut self) {
        self.manager.close().await;
    }
}

//! Bounded tool-calling conversation loop.
//!
//! Each iteration submits the whole conversation plus the registry's tools to
//! the model. Requested tool calls are dispatched one at a time, in the order
//! the model listed them, and answered with one `tool` message each. The loop
//! ends when the model replies without tool calls or the iteration budget
//! runs out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::config::DriverSettings;
use crate::error::{MeshError, Result};
use crate::gateway::{CompletionRequest, FunctionSchema, ModelGateway};
use crate::registry::ToolRegistry;
use crate::tools::ToolArguments;
use crate::types::{ConversationMessage, ToolCallRequest, ToolInvocationResult};
use crate::util::{until_cancelled, with_optional_timeout};

/// Answer reported when the iteration budget runs out.
pub const BUDGET_EXHAUSTED_ANSWER: &str = "Maximum conversation iterations reached.";

/// Where the loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DriverState {
    AwaitingModel,
    DispatchingTools,
    Terminated,
}

/// Why a conversation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model answered without requesting tools.
    Completed,
    /// The iteration budget was spent.
    BudgetExhausted,
}

/// Result of a finished conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationOutcome {
    pub id: Uuid,
    pub answer: String,
    /// Model calls made.
    pub iterations: usize,
    pub termination: Termination,
    /// Every message, in order, including the caller's seed messages.
    pub conversation: Vec<ConversationMessage>,
    pub finished_at: DateTime<Utc>,
}

/// Runs conversations against a registry and a model gateway.
///
/// Holds only shared references; any number of conversations may run
/// concurrently over the same registry.
pub struct ConversationDriver<'a> {
    registry: &'a ToolRegistry,
    gateway: &'a dyn ModelGateway,
    settings: DriverSettings,
}

impl<'a> ConversationDriver<'a> {
    pub fn new(registry: &'a ToolRegistry, gateway: &'a dyn ModelGateway) -> Self {
        Self::with_settings(registry, gateway, DriverSettings::default())
    }

    pub fn with_settings(
        registry: &'a ToolRegistry,
        gateway: &'a dyn ModelGateway,
        settings: DriverSettings,
    ) -> Self {
        Self {
            registry,
            gateway,
            settings,
        }
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Tools offered to the model, in registration order.
    pub fn function_schemas(&self) -> Vec<FunctionSchema> {
        self.registry.all().iter().map(FunctionSchema::from).collect()
    }

    pub async fn run(&self, messages: Vec<ConversationMessage>) -> Result<ConversationOutcome> {
        self.run_with_cancel(messages, &CancellationToken::new()).await
    }

    /// Run until the model stops calling tools, the budget is spent, the
    /// gateway fails, or `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        messages: Vec<ConversationMessage>,
        cancel: &CancellationToken,
    ) -> Result<ConversationOutcome> {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("conversation", %id, model = %self.gateway.model());
        self.drive(id, messages, cancel).instrument(span).await
    }

    async fn drive(
        &self,
        id: Uuid,
        mut conversation: Vec<ConversationMessage>,
        cancel: &CancellationToken,
    ) -> Result<ConversationOutcome> {
        let tools = self.function_schemas();
        let max_iterations = self.settings.max_iterations;
        let mut state = DriverState::AwaitingModel;

        for iteration in 1..=max_iterations {
            debug!(iteration, %state, tools = tools.len(), "calling model");
            let request = CompletionRequest::new(conversation.clone(), tools.clone());
            let response = until_cancelled(
                cancel,
                "model call",
                with_optional_timeout(self.settings.call_timeout(), self.gateway.complete(&request)),
            )
            .await
            .map_err(|e| match e {
                MeshError::Cancelled(_) | MeshError::Gateway(_) => e,
                MeshError::Timeout(ms) => {
                    MeshError::Gateway(format!("model call timed out after {ms}ms"))
                }
                other => MeshError::Gateway(other.to_string()),
            })?;

            let choice = response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| MeshError::Gateway("No response from LLM".into()))?;

            let calls = choice.message.tool_calls().to_vec();
            let content = choice.message.text().map(str::to_string);
            conversation.push(ConversationMessage::assistant_with_tool_calls(
                content.clone(),
                calls.clone(),
            ));

            if calls.is_empty() {
                state = DriverState::Terminated;
                info!(iteration, %state, "conversation completed");
                return Ok(ConversationOutcome {
                    id,
                    answer: content.unwrap_or_default(),
                    iterations: iteration,
                    termination: Termination::Completed,
                    conversation,
                    finished_at: Utc::now(),
                });
            }

            state = DriverState::DispatchingTools;
            debug!(iteration, %state, calls = calls.len(), "dispatching tool calls");
            for call in &calls {
                if cancel.is_cancelled() {
                    return Err(MeshError::Cancelled("conversation cancelled".into()));
                }
                let result = self.dispatch(call, cancel).await?;
                conversation.push(ConversationMessage::tool_result(call.id.as_str(), &result));
            }
            state = DriverState::AwaitingModel;
        }

        info!(iterations = max_iterations, "iteration budget exhausted");
        Ok(ConversationOutcome {
            id,
            answer: BUDGET_EXHAUSTED_ANSWER.to_string(),
            iterations: max_iterations,
            termination: Termination::BudgetExhausted,
            conversation,
            finished_at: Utc::now(),
        })
    }

    /// Answer one tool call. Unrecoverable failures (cancellation) escape as
    /// errors; every other failure becomes an error result for the model.
    async fn dispatch(
        &self,
        call: &ToolCallRequest,
        cancel: &CancellationToken,
    ) -> Result<ToolInvocationResult> {
        let Some(tool) = self.registry.find(&call.name) else {
            warn!(tool = %call.name, "model requested unknown tool");
            return Ok(ToolInvocationResult::failure(
                MeshError::UnknownTool(call.name.clone()).to_string(),
            ));
        };
        let Some(connection) = self.registry.backend(&tool.backend) else {
            warn!(tool = %call.name, backend = %tool.backend, "owning backend not connected");
            return Ok(ToolInvocationResult::failure(format!(
                "Server '{}' not connected",
                tool.backend
            )));
        };

        debug!(tool = %call.name, backend = %tool.backend, call_id = %call.id, "calling tool");
        let arguments = ToolArguments::new(call.arguments.clone());
        let outcome = until_cancelled(
            cancel,
            "tool call",
            with_optional_timeout(
                self.settings.call_timeout(),
                connection.call_tool(&tool.upstream_name, &arguments),
            ),
        )
        .await;

        match outcome {
            Ok(result) => Ok(result),
            Err(e) if !e.is_recoverable() => Err(e),
            Err(e) => {
                warn!(
                    tool = %call.name,
                    backend = %tool.backend,
                    category = ?e.category(),
                    error = %e,
                    "tool call failed"
                );
                Ok(ToolInvocationResult::failure(e.to_string()))
            }
        }
    }
}

//! Convenience re-exports for common use.

pub use crate::backend::{ConnectionState, RestToolAdapter, ToolBackend};
pub use crate::client::ToolMeshClient;
pub use crate::config::{BackendConfig, BackendKind, DriverSettings, GatewayConfig, MeshConfig};
pub use crate::connection::{BackendConnection, BackendConnectionManager, BackendFactory};
pub use crate::driver::{ConversationDriver, ConversationOutcome, Termination};
pub use crate::error::{MeshError, Result};
pub use crate::gateway::{CompletionRequest, CompletionResponse, FunctionSchema, ModelGateway};
pub use crate::registry::{CollisionPolicy, ToolRegistry};
pub use crate::tools::{ParameterSchema, ToolArguments, ToolDescriptor};
pub use crate::types::{ConversationMessage, ContentBlock, Role, ToolCallRequest, ToolInvocationResult};

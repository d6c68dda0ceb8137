//! Tool backends: the common contract and its REST and native implementations.

pub mod rest;

#[cfg(feature = "native")]
pub mod native;

use async_trait::async_trait;

use crate::error::Result;
use crate::tools::{ToolArguments, ToolDescriptor};
use crate::types::ToolInvocationResult;

pub use rest::{HealthStatus, RestToolAdapter};

#[cfg(feature = "native")]
pub use native::NativeProtocolClient;

/// Lifecycle state shared by every backend client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Closed,
}

/// Operations every tool backend supports, whatever its wire protocol.
#[async_trait]
pub trait ToolBackend: Send {
    fn state(&self) -> ConnectionState;

    /// Connect, verify liveness and discover tools.
    async fn initialize(&mut self) -> Result<()>;

    /// Tools discovered by the last successful `initialize`.
    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a tool by the name the backend knows it under.
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<ToolInvocationResult>;

    /// Release the connection. Calling this more than once is a no-op.
    async fn close(&mut self) -> Result<()>;
}

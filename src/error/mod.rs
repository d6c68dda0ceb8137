//! Error types for toolmesh.

use thiserror::Error;

/// Primary error type for all toolmesh operations.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("Connection error ({backend}): {message}")]
    Connection { backend: String, message: String },

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Tool '{0}' not found")]
    UnknownTool(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution {
        tool_name: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

/// Broad error category used to route failure handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A backend is unreachable or unhealthy.
    Backend,
    /// An operation was attempted against a backend that never connected.
    Lifecycle,
    /// A single tool call failed; the conversation can continue.
    ToolCall,
    /// The model gateway failed; the conversation cannot continue.
    Gateway,
    Configuration,
    Transport,
    Interrupted,
}

impl MeshError {
    /// Create a connection error for the named backend.
    pub fn connection(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a tool execution error carrying an HTTP status.
    pub fn tool_status(tool_name: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            status: Some(status),
            message: format!("HTTP {status}: {}", message.into()),
        }
    }

    /// Create a tool execution error without a transport status.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Backend,
            Self::NotConnected(_) => ErrorCategory::Lifecycle,
            Self::UnknownTool(_) | Self::ToolExecution { .. } | Self::InvalidArgument(_) => {
                ErrorCategory::ToolCall
            }
            Self::Gateway(_) => ErrorCategory::Gateway,
            Self::Configuration(_) | Self::ConfigParse(_) => ErrorCategory::Configuration,
            Self::Io(_) | Self::Timeout(_) => ErrorCategory::Transport,
            Self::Cancelled(_) => ErrorCategory::Interrupted,
        }
    }

    /// Whether a failure inside tool dispatch may be fed back to the model
    /// instead of ending the conversation.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::Gateway | ErrorCategory::Interrupted
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, MeshError>;

//! Backend-agnostic tool descriptors.

use serde::{Deserialize, Serialize};

use super::types::ParameterSchema;

/// HTTP verb used to invoke a REST tool.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Whether arguments travel in a JSON body rather than the query string.
    pub fn sends_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }

    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

/// How a tool is reached on its backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvocationSpec {
    /// `METHOD {base_url}{endpoint}`.
    Http { method: HttpMethod, endpoint: String },
    /// Dispatched by name over the protocol session.
    Native,
}

/// A tool as the registry and the model see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Name exposed to the model. Unique within a registry.
    pub name: String,
    /// Name the owning backend knows the tool by.
    pub upstream_name: String,
    pub description: String,
    /// Name of the owning backend connection.
    pub backend: String,
    pub invocation: InvocationSpec,
    pub parameters: ParameterSchema,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        invocation: InvocationSpec,
        parameters: ParameterSchema,
    ) -> Self {
        let name = name.into();
        Self {
            upstream_name: name.clone(),
            name,
            description: description.into(),
            backend: String::new(),
            invocation,
            parameters,
        }
    }

    /// Tag with the owning backend.
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    /// Expose under a different name while keeping the upstream name.
    pub fn with_exposed_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn input_schema(&self) -> serde_json::Value {
        self.parameters.to_json_schema()
    }
}

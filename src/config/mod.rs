//! Configuration (layered: file > env overrides > defaults).
//!
//! A [`MeshConfig`] is built once at startup and handed to the components
//! that need it. Nothing in the crate reads configuration from global state.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MeshError, Result};
use crate::registry::CollisionPolicy;

const DEFAULT_MODEL: &str = "google/gemini-pro-1.5";
const DEFAULT_GATEWAY_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_REFERER: &str = "http://localhost:3000";
const DEFAULT_TITLE: &str = "MCP Client";
const DEFAULT_MAX_ITERATIONS: usize = 5;
const DEFAULT_CALL_TIMEOUT_MS: u64 = 120_000;

/// Which adapter a backend is reached through.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// REST/OpenAPI-style server exposing `/health`, `/tools` and one
    /// endpoint per tool.
    #[serde(alias = "fastapi-mcp")]
    #[strum(to_string = "rest-adapter", serialize = "fastapi-mcp")]
    RestAdapter,
    /// JSON-RPC Model Context Protocol server.
    #[serde(alias = "standard")]
    #[strum(to_string = "native-protocol", serialize = "standard")]
    NativeProtocol,
}

/// One configured tool backend.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    pub kind: BackendKind,
    #[serde(alias = "url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is not set inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_enabled", alias = "is_open")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl BackendConfig {
    pub fn new(name: impl Into<String>, kind: BackendKind, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            base_url: base_url.into(),
            api_key: None,
            api_key_env: None,
            enabled: true,
        }
    }

    /// Shorthand for a REST adapter backend.
    pub fn rest(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::new(name, BackendKind::RestAdapter, base_url)
    }

    /// Shorthand for a native protocol backend.
    pub fn native(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::new(name, BackendKind::NativeProtocol, base_url)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Base URL without trailing slashes.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Settings for the chat-completion gateway.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub referer: String,
    pub title: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            temperature: 0.7,
            max_tokens: 4000,
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Conversation loop limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    pub max_iterations: usize,
    /// Per-call deadline for gateway and backend calls. `None` or `0` waits
    /// forever.
    pub call_timeout_ms: Option<u64>,
    pub collision_policy: CollisionPolicy,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            call_timeout_ms: Some(DEFAULT_CALL_TIMEOUT_MS),
            collision_policy: CollisionPolicy::default(),
        }
    }
}

impl DriverSettings {
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout_ms = timeout.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        self
    }
}

/// Complete process configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub backends: Vec<BackendConfig>,
    pub gateway: GatewayConfig,
    pub driver: DriverSettings,
}

impl MeshConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Build from `TOOLMESH_CONFIG` (when set) plus environment overrides.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = match std::env::var("TOOLMESH_CONFIG") {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment-style overrides from an arbitrary lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENROUTER_API_KEY") {
            self.gateway.api_key = Some(key);
        }
        if let Some(model) = lookup("TOOLMESH_MODEL") {
            self.gateway.model = model;
        }
        if let Some(url) = lookup("TOOLMESH_GATEWAY_URL") {
            self.gateway.base_url = url;
        }
        if let Some(raw) = lookup("TOOLMESH_MAX_ITERATIONS") {
            self.driver.max_iterations = raw.trim().parse().map_err(|_| {
                MeshError::Configuration(format!(
                    "TOOLMESH_MAX_ITERATIONS must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        for backend in &mut self.backends {
            if backend.api_key.is_some() {
                continue;
            }
            if let Some(var) = backend.api_key_env.as_deref() {
                backend.api_key = lookup(var);
            }
        }
        self.validate()
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.driver.max_iterations == 0 {
            return Err(MeshError::Configuration(
                "max_iterations must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            let name = backend.name.trim();
            if name.is_empty() {
                return Err(MeshError::Configuration(
                    "backend name must not be empty".into(),
                ));
            }
            if backend.normalized_base_url().is_empty() {
                return Err(MeshError::Configuration(format!(
                    "backend '{name}' has an empty base_url"
                )));
            }
            if !seen.insert(name.to_string()) {
                return Err(MeshError::Configuration(format!(
                    "Duplicate backend name '{name}'"
                )));
            }
        }
        Ok(())
    }

    /// Enabled backends in declaration order.
    pub fn enabled_backends(&self) -> impl Iterator<Item = &BackendConfig> {
        self.backends.iter().filter(|b| b.enabled)
    }
}

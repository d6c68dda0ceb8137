//! Tool call arguments.

use crate::error::{MeshError, Result};

/// Wrapper around the argument payload of one tool call.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Coerce into a JSON object.
    ///
    /// `null` and blank strings become an empty object; strings are parsed as
    /// JSON. Anything that is not an object afterwards is rejected.
    pub fn to_object(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        coerce_object(self.value.clone())
    }

    /// Query-string pairs in argument order. Null values are omitted;
    /// strings are sent bare, everything else as compact JSON.
    pub fn query_pairs(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .to_object()?
            .into_iter()
            .filter_map(|(key, value)| match value {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some((key, s)),
                other => Some((key, other.to_string())),
            })
            .collect())
    }
}

fn coerce_object(value: serde_json::Value) -> Result<serde_json::Map<String, serde_json::Value>> {
    match value {
        serde_json::Value::Null => Ok(serde_json::Map::new()),
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(serde_json::Map::new());
            }
            let parsed: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
                MeshError::InvalidArgument(format!("tool arguments must be valid JSON: {e}"))
            })?;
            coerce_object(parsed)
        }
        other => Err(MeshError::InvalidArgument(format!(
            "tool arguments must be a JSON object; got {other}"
        ))),
    }
}

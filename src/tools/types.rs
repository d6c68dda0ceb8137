//! Parameter schemas and their conversion into model-facing JSON Schema.

use serde::{Deserialize, Serialize};

/// One named parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
    pub required: bool,
}

/// A parameter entry as a REST backend publishes it. Every field except
/// `name` may be missing or null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawParameter {
    pub name: String,
    #[serde(default, rename = "type")]
    pub param_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
}

/// Parameters accepted by a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSchema {
    /// Flat, ordered parameter list (REST backends).
    Fields(Vec<ToolParameter>),
    /// A JSON Schema object supplied verbatim by the backend (native backends).
    JsonSchema(serde_json::Value),
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::empty()
    }
}

impl ParameterSchema {
    /// No parameters.
    pub fn empty() -> Self {
        Self::Fields(Vec::new())
    }

    /// Builder for a flat parameter list.
    pub fn object() -> ParameterBuilder {
        ParameterBuilder { fields: Vec::new() }
    }

    /// Render as a JSON Schema object the model can consume.
    pub fn to_json_schema(&self) -> serde_json::Value {
        match self {
            Self::Fields(fields) => {
                let mut properties = serde_json::Map::new();
                for field in fields {
                    properties.insert(
                        field.name.clone(),
                        serde_json::json!({
                            "type": field.param_type,
                            "description": field.description,
                        }),
                    );
                }
                let required: Vec<&str> = fields
                    .iter()
                    .filter(|f| f.required)
                    .map(|f| f.name.as_str())
                    .collect();
                serde_json::json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                })
            }
            Self::JsonSchema(schema) if schema.is_object() => schema.clone(),
            Self::JsonSchema(_) => Self::empty().to_json_schema(),
        }
    }

    /// Names of the required parameters.
    pub fn required(&self) -> Vec<String> {
        match self {
            Self::Fields(fields) => fields
                .iter()
                .filter(|f| f.required)
                .map(|f| f.name.clone())
                .collect(),
            Self::JsonSchema(schema) => schema
                .get("required")
                .and_then(|r| r.as_array())
                .map(|names| {
                    names
                        .iter()
                        .filter_map(|n| n.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Normalize a backend parameter list. Missing or empty types become
/// `"string"`, missing descriptions become empty, and `required` comes from
/// each parameter's own flag.
pub fn convert_parameters(raw: &[RawParameter]) -> ParameterSchema {
    ParameterSchema::Fields(
        raw.iter()
            .map(|param| ToolParameter {
                name: param.name.clone(),
                param_type: param
                    .param_type
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .unwrap_or("string")
                    .to_string(),
                description: param.description.clone().unwrap_or_default(),
                required: param.required.unwrap_or(false),
            })
            .collect(),
    )
}

/// Builder for flat parameter lists.
pub struct ParameterBuilder {
    fields: Vec<ToolParameter>,
}

impl ParameterBuilder {
    /// Add a parameter of arbitrary JSON type.
    pub fn field(
        mut self,
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.fields.push(ToolParameter {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required,
        });
        self
    }

    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.field(name, "string", description, required)
    }

    pub fn number(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.field(name, "number", description, required)
    }

    pub fn build(self) -> ParameterSchema {
        ParameterSchema::Fields(self.fields)
    }
}

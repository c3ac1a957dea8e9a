//! The DXT package manifest (spec §4.5).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub server: ServerSection,
    #[serde(default)]
    pub compatibility: Option<Compatibility>,
    #[serde(default)]
    pub user_config: Option<HashMap<String, UserConfigField>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(rename = "type")]
    pub server_type: String,
    pub entry_point: String,
    pub mcp_config: McpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct McpConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub working_directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Compatibility {
    #[serde(default)]
    pub platforms: Option<Vec<String>>,
    #[serde(default)]
    pub runtimes: Option<HashMap<String, String>>,
    /// A semver requirement (e.g. `">=1.2.0"`) the embedding host
    /// application's own version must satisfy.
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub platform_overrides: Option<HashMap<String, McpConfigOverride>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct McpConfigOverride {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub env: Option<HashMap<String, String>>,
    #[serde(default)]
    pub working_directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfigField {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl McpConfig {
    /// Applies a platform override on top of this config, key by key — the
    /// override wins wherever it sets a value.
    pub fn with_override(&self, over: &McpConfigOverride) -> Self {
        let mut merged = self.clone();
        if let Some(command) = &over.command {
            merged.command = command.clone();
        }
        if let Some(args) = &over.args {
            merged.args = args.clone();
        }
        if let Some(env) = &over.env {
            for (k, v) in env {
                merged.env.insert(k.clone(), v.clone());
            }
        }
        if let Some(wd) = &over.working_directory {
            merged.working_directory = Some(wd.clone());
        }
        merged
    }
}

/// A resolved user-config value; arrays expand specially during variable
/// substitution (spec §4.5 step 5).
#[derive(Debug, Clone)]
pub enum UserConfigValue {
    String(String),
    Array(Vec<String>),
}

impl UserConfigValue {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(items) => Some(Self::Array(
                items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            Value::Number(n) => Some(Self::String(n.to_string())),
            Value::Bool(b) => Some(Self::String(b.to_string())),
            _ => None,
        }
    }
}

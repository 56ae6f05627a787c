//! Operator assistant tool runner.
//!
//! The assistant service advertises its tools and runs them on request.
//! Results are arbitrary JSON and are passed through untouched.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::http::ServiceClient;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Parse operator input for the echo tool. Blank or malformed input becomes
/// an empty object rather than an error.
pub fn parse_echo_payload(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::Object(Map::new()))
}

#[derive(Clone, Debug)]
pub struct ToolsClient {
    client: ServiceClient,
}

impl ToolsClient {
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: ServiceClient::new(base_url, path, timeout)?,
        })
    }

    pub fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        let reply = self.client.get("tools", &[])?;
        if !reply.is_success() {
            return Err(anyhow!("Failed to load tools ({})", reply.status));
        }
        reply.json()
    }

    /// Tools to offer the operator. A failed lookup offers none.
    pub fn available_tools(&self) -> Vec<ToolInfo> {
        self.list_tools().unwrap_or_else(|err| {
            log::warn!("assistant tools unavailable: {:#}", err);
            Vec::new()
        })
    }

    /// Run tool `name` with `body` and return its JSON answer.
    ///
    /// A rejected call keeps the service's JSON answer (e.g. a validation
    /// `detail`) in the error message.
    pub fn invoke(&self, name: &str, body: &Value) -> Result<Value> {
        let reply = self.client.post_json(&format!("tools/{name}"), body)?;
        if !reply.is_success() {
            return Err(match reply.json::<Value>() {
                Ok(detail) => anyhow!("Tool {} failed ({}): {}", name, reply.status, detail),
                Err(_) => anyhow!("Tool {} failed ({})", name, reply.status),
            });
        }
        reply.json()
    }

    pub fn echo(&self, payload: &Value) -> Result<Value> {
        self.invoke("echo", payload)
    }

    pub fn summarize(&self, text: &str) -> Result<Value> {
        self.invoke("summarize", &json!({ "text": text }))
    }
}

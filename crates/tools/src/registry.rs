//! Name → handler table for function tools.
//!
//! Every handler declares a [`ToolDefinition`] whose `parameters` is a JSON
//! schema. The schema is compiled once at registration and every call is
//! checked against it before the handler runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use ar_domain::tool::ToolDefinition;
use async_trait::async_trait;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::error::ToolError;

/// A locally executed function tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    /// Run the tool with arguments that already passed schema validation.
    async fn call(&self, args: Value) -> Result<Value, ToolError>;
}

struct Entry {
    handler: Arc<dyn ToolHandler>,
    schema: JSONSchema,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Entry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its declared name, replacing any previous
    /// handler with that name. Fails if the declared schema does not compile.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) -> Result<(), ToolError> {
        let def = handler.definition();
        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&def.parameters)
            .map_err(|e| ToolError::InvalidArguments {
                tool: def.name.clone(),
                reason: format!("parameter schema does not compile: {e}"),
            })?;
        let name = def.name.clone();
        if self.tools.insert(name.clone(), Entry { handler, schema }).is_some() {
            tracing::warn!(tool = %name, "tool re-registered, previous handler replaced");
        }
        Ok(())
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|e| e.handler.definition().clone())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Resolve `name`, parse and validate `arguments_json`, and run the
    /// handler. Never panics on malformed input.
    pub async fn execute(&self, name: &str, arguments_json: &str) -> Result<Value, ToolError> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let raw = if arguments_json.trim().is_empty() {
            "{}"
        } else {
            arguments_json
        };
        let args: Value = serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
            tool: name.to_string(),
            reason: format!("arguments are not valid JSON: {e}"),
        })?;
        if !args.is_object() {
            return Err(ToolError::InvalidArguments {
                tool: name.to_string(),
                reason: "arguments must be a JSON object".into(),
            });
        }

        if let Err(errors) = entry.schema.validate(&args) {
            let reason = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{path}: {e}")
                    }
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ToolError::InvalidArguments {
                tool: name.to_string(),
                reason,
            });
        }

        tracing::debug!(tool = name, "executing tool");
        entry.handler.call(args).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

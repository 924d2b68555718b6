// Tool registry
// Named catalogue of callable functions the model may request, each
// pairing a JSON-schema definition with its implementation

pub mod handlers;


use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::ToolSpec;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("duplicate tool name: {0}")]
    DuplicateName(String),

    #[error("tool '{0}' does not declare an object parameter schema")]
    InvalidSchema(String),
}

/// Implementation side of a tool. Handlers may fail; the registry
/// turns every failure into a structured error payload at dispatch.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: Value) -> anyhow::Result<Value>;
}

struct ToolEntry {
    spec: ToolSpec,
    handler: Box<dyn ToolHandler>,
}

/// Outcome of one dispatched tool call, doubling as the user-auditable
/// usage record.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub name: String,
    pub description: String,
    pub success: bool,
    pub arguments: Value,
    pub result: Value,
}

/// Mapping from tool name to its schema and implementation, validated
/// at startup.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A second registration under the same name is a
    /// wiring bug and fails immediately.
    #[inline]
    pub fn register<H>(&mut self, spec: ToolSpec, handler: H) -> Result<(), ToolError>
    where
        H: ToolHandler + 'static,
    {
        if self.tools.contains_key(&spec.name) {
            return Err(ToolError::DuplicateName(spec.name));
        }

        debug!("Registered tool: {}", spec.name);
        self.tools.insert(
            spec.name.clone(),
            ToolEntry {
                spec,
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    /// Startup sanity check over every registered schema.
    #[inline]
    pub fn validate(&self) -> Result<(), ToolError> {
        for entry in self.tools.values() {
            let is_object = entry
                .spec
                .parameters
                .get("type")
                .and_then(Value::as_str)
                .is_some_and(|t| t == "object");
            if !is_object {
                return Err(ToolError::InvalidSchema(entry.spec.name.clone()));
            }
        }
        Ok(())
    }

    /// Schemas advertised to the model.
    #[inline]
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|e| e.spec.clone()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute one requested call. Nothing escapes this boundary: bad
    /// argument JSON, unknown names, and handler failures all come
    /// back as a failed outcome carrying `{error, message}`.
    #[inline]
    pub async fn dispatch(&self, name: &str, raw_arguments: &str) -> ToolOutcome {
        let arguments: Value = if raw_arguments.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str(raw_arguments) {
                Ok(value) => value,
                Err(error) => {
                    warn!("Tool '{}' got unparseable arguments: {}", name, error);
                    return failure_outcome(
                        name,
                        self.description_of(name),
                        json!({ "raw": raw_arguments }),
                        format!("arguments are not valid JSON: {error}"),
                    );
                }
            }
        };

        let Some(entry) = self.tools.get(name) else {
            warn!("Model requested unknown tool: {}", name);
            return failure_outcome(
                name,
                String::new(),
                arguments,
                format!("unknown tool: {name}"),
            );
        };

        debug!("Dispatching tool '{}'", name);
        match entry.handler.handle(arguments.clone()).await {
            Ok(result) => ToolOutcome {
                name: name.to_string(),
                description: entry.spec.description.clone(),
                success: true,
                arguments,
                result,
            },
            Err(error) => {
                warn!("Tool '{}' failed: {}", name, error);
                failure_outcome(
                    name,
                    entry.spec.description.clone(),
                    arguments,
                    error.to_string(),
                )
            }
        }
    }

    fn description_of(&self, name: &str) -> String {
        self.tools
            .get(name)
            .map(|e| e.spec.description.clone())
            .unwrap_or_default()
    }
}

fn failure_outcome(name: &str, description: String, arguments: Value, message: String) -> ToolOutcome {
    ToolOutcome {
        name: name.to_string(),
        description,
        success: false,
        arguments,
        result: json!({ "error": true, "message": message }),
    }
}

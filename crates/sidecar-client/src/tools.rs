//! Caller-defined tools and the bridge that exposes them to the agent
//!
//! A [`ToolDefinition`] describes a callback the agent may invoke while it
//! reasons about a prompt. The handler runs in the caller's process. The
//! bridge turns definitions into the schema/invoker pair the agent expects and
//! converts handler failures into text the model can read, so a failing lookup
//! becomes part of the conversation instead of a transport error.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sidecar_types::{
    json_kind, BoxError, ProtocolError, Tool, ToolInvocation, ToolInvoker, ToolResult,
    ToolResultType,
};
use std::fmt;
use std::sync::Arc;

/// Primitive JSON schema type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

/// A single named parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: ParameterType,
    pub description: String,
    pub required: bool,
}

impl ToolParameter {
    /// Create an optional parameter.
    pub fn new(
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
        }
    }

    /// Mark the parameter as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Handler executed when the agent calls a tool.
///
/// Errors are reported back to the model as `error: <message>`; they never
/// fail the tool call at the transport level.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Map<String, Value>) -> Result<String>;
}

#[async_trait]
impl<F> ToolHandler for F
where
    F: Fn(Map<String, Value>) -> Result<String> + Send + Sync,
{
    async fn call(&self, arguments: Map<String, Value>) -> Result<String> {
        self(arguments)
    }
}

/// A tool the agent may invoke.
#[derive(Clone)]
pub struct ToolDefinition {
    /// Tool identifier, e.g. `lookup_inventory`.
    pub name: String,
    /// What the tool does. This is the text the model reads.
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Object-typed JSON schema built from the parameter list.
    ///
    /// `properties` is always an object and `required` always an array, even
    /// when there are no parameters.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::with_capacity(self.parameters.len());
        let mut required = Vec::new();

        for parameter in &self.parameters {
            properties.insert(
                parameter.name.clone(),
                json!({
                    "type": parameter.param_type,
                    "description": parameter.description,
                }),
            );
            if parameter.required {
                required.push(Value::String(parameter.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// The descriptor advertised to the agent.
    pub fn to_descriptor(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema(),
            handler: Arc::new(ToolBridge {
                definition: self.clone(),
            }),
        }
    }

    /// Run the handler for an agent-issued tool call.
    ///
    /// Fails only when the arguments are not a JSON object. Handler errors are
    /// returned as an error-typed result.
    pub async fn invoke(
        &self,
        invocation: ToolInvocation,
    ) -> std::result::Result<ToolResult, ProtocolError> {
        let arguments = match invocation.arguments {
            Value::Object(arguments) => arguments,
            other => return Err(ProtocolError::unexpected_arguments(json_kind(&other))),
        };

        match self.handler.call(arguments).await {
            Ok(text) => {
                log::debug!("Tool {} executed successfully", self.name);
                Ok(ToolResult {
                    text_result_for_llm: text,
                    result_type: ToolResultType::Success,
                    session_log: Some(format!("Tool {} executed successfully", self.name)),
                })
            }
            Err(e) => {
                log::debug!("Tool {} failed: {:#}", self.name, e);
                Ok(ToolResult {
                    text_result_for_llm: format!("error: {:#}", e),
                    result_type: ToolResultType::Error,
                    session_log: Some(format!("Tool {} failed: {:#}", self.name, e)),
                })
            }
        }
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

struct ToolBridge {
    definition: ToolDefinition,
}

#[async_trait]
impl ToolInvoker for ToolBridge {
    async fn invoke(&self, invocation: ToolInvocation) -> std::result::Result<ToolResult, BoxError> {
        self.definition
            .invoke(invocation)
            .await
            .map_err(|e| Box::new(e) as BoxError)
    }
}

/// Tool definitions in registration order.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ToolDefinition) {
        self.tools.push(tool);
    }

    /// Look a tool up by name. The first registration wins on duplicates.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors for the registered tools, or `None` when there are none.
    ///
    /// Each name appears once, resolved through [`ToolRegistry::get`].
    pub fn descriptors(&self) -> Option<Vec<Tool>> {
        if self.tools.is_empty() {
            return None;
        }
        Some(
            self.tools
                .iter()
                .filter(|tool| {
                    self.get(&tool.name)
                        .is_some_and(|first| std::ptr::eq(first, *tool))
                })
                .map(ToolDefinition::to_descriptor)
                .collect(),
        )
    }
}
